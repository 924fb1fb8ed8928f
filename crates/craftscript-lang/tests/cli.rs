use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// A `craftscript` command isolated from the user's config and environment.
fn craftscript(home: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("craftscript").unwrap();
    cmd.env("HOME", home.path())
        .env_remove("CRAFTSCRIPT_ACTOR")
        .env_remove("CRAFTSCRIPT_LOG_DIR")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_exits_zero() {
    let home = tempfile::tempdir().unwrap();
    craftscript(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("craftscript"));
}

#[test]
fn test_check_valid_script() {
    let home = tempfile::tempdir().unwrap();
    craftscript(&home)
        .args(["check", fixture_path("tunnel.cs").to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("ok (6 statements"));
}

#[test]
fn test_check_reports_syntax_error_location() {
    let home = tempfile::tempdir().unwrap();
    craftscript(&home)
        .args(["check", fixture_path("unclosed.cs").to_str().unwrap()])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("line 2, column 17"))
        .stderr(predicate::str::contains("unclosed"));
}

#[test]
fn test_check_missing_file() {
    let home = tempfile::tempdir().unwrap();
    craftscript(&home)
        .args(["check", "/nonexistent/path/script.cs"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("IO error"));
}

#[test]
fn test_run_completes_against_simulated_world() {
    let home = tempfile::tempdir().unwrap();
    craftscript(&home)
        .args(["run", fixture_path("tunnel.cs").to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("#0 move ok"))
        .stdout(predicate::str::contains("tunnel done"))
        .stdout(predicate::str::contains("run finished: Completed"));
}

#[test]
fn test_run_syntax_error_executes_nothing() {
    let home = tempfile::tempdir().unwrap();
    craftscript(&home)
        .args(["run", fixture_path("unclosed.cs").to_str().unwrap()])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("#0").not())
        .stderr(predicate::str::contains("SyntaxError"));
}

#[test]
fn test_run_assertion_failure() {
    let home = tempfile::tempdir().unwrap();
    craftscript(&home)
        .args(["run", fixture_path("blocked.cs").to_str().unwrap()])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("#0 move ok"))
        .stdout(predicate::str::contains("#1").not())
        .stderr(predicate::str::contains("AssertionError at 2:1"))
        .stderr(predicate::str::contains("expected lava ahead"));
}

#[test]
fn test_run_failed_command_continues() {
    let home = tempfile::tempdir().unwrap();
    craftscript(&home)
        .args(["run", fixture_path("failing.cs").to_str().unwrap()])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("#0 place failed"))
        .stdout(predicate::str::contains("#1 log ok"))
        .stderr(predicate::str::contains("1 command(s) failed"));
}

#[test]
fn test_run_stop_on_failure() {
    let home = tempfile::tempdir().unwrap();
    craftscript(&home)
        .args(["run", "--stop-on-failure", fixture_path("failing.cs").to_str().unwrap()])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("#1").not())
        .stderr(predicate::str::contains("CommandError"));
}

#[test]
fn test_run_unknown_command_is_rejected_up_front() {
    let home = tempfile::tempdir().unwrap();
    craftscript(&home)
        .args(["run", fixture_path("unknown.cs").to_str().unwrap()])
        .assert()
        .code(3)
        .stdout(predicate::str::contains("#0").not())
        .stderr(predicate::str::contains("unknown command 'teleport'"));
}

#[test]
fn test_run_op_limit() {
    let home = tempfile::tempdir().unwrap();
    craftscript(&home)
        .args(["run", "--op-limit", "1", fixture_path("tunnel.cs").to_str().unwrap()])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("OpLimitExceeded"));
}

#[test]
fn test_run_json_lines() {
    let home = tempfile::tempdir().unwrap();
    let assert = craftscript(&home)
        .args(["run", "--json", "--trace", fixture_path("tunnel.cs").to_str().unwrap()])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let events: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(events.first().unwrap()["event"], "started");
    assert_eq!(events.last().unwrap()["event"], "finished");
    assert!(events.iter().any(|e| e["event"] == "trace" && e["type"] == "macro_entered"));
    assert!(events.iter().any(|e| e["event"] == "step" && e["op"] == "place"));
}

#[test]
fn test_run_prints_every_step() {
    let home = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    let script = data.path().join("many.cs");
    std::fs::write(&script, "repeat(600) { log(\"tick\"); }\n").unwrap();

    let assert = craftscript(&home).args(["run", "--json"]).arg(&script).assert().success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let steps = stdout
        .lines()
        .map(|line| serde_json::from_str::<serde_json::Value>(line).unwrap())
        .filter(|e| e["event"] == "step")
        .count();
    assert_eq!(steps, 600);
}

#[test]
fn test_run_resolves_waypoints_from_store() {
    let home = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    std::fs::write(
        data.path().join("steve_waypoints.json"),
        r#"[{"name": "ledge", "x": 0, "y": 64, "z": -1}]"#,
    )
    .unwrap();
    let script = data.path().join("go.cs");
    std::fs::write(&script, "move(waypoint(\"ledge\"));\nmove(waypoint(\"nowhere\"));\n").unwrap();

    craftscript(&home)
        .args(["run", "--actor", "steve", "--waypoints"])
        .arg(data.path())
        .arg(&script)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("#0 move ok"))
        .stdout(predicate::str::contains("at (0, 64, -1)"))
        .stdout(predicate::str::contains("AbsoluteLookupError"));
}

#[test]
fn test_run_writes_journal() {
    let home = tempfile::tempdir().unwrap();
    let journal = tempfile::tempdir().unwrap();
    craftscript(&home)
        .args(["run", "--journal"])
        .arg(journal.path())
        .arg(fixture_path("tunnel.cs"))
        .assert()
        .success();

    let entry = std::fs::read_dir(journal.path()).unwrap().next().unwrap().unwrap();
    let text = std::fs::read_to_string(entry.path()).unwrap();
    let last: serde_json::Value = serde_json::from_str(text.lines().last().unwrap()).unwrap();
    assert_eq!(last["event"], "finished");
}

#[test]
fn test_key_prints_offsets_per_heading() {
    let home = tempfile::tempdir().unwrap();
    craftscript(&home)
        .args(["key", "F3+R1"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("F3+R1\n"))
        .stdout(predicate::str::contains("(1, 0, -3)"));
}

#[test]
fn test_key_rejects_non_selector() {
    let home = tempfile::tempdir().unwrap();
    craftscript(&home).args(["key", "42"]).assert().code(2);
}
