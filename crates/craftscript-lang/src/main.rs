//! Command-line runner for CraftScript.
//!
//! # Usage
//!
//! ```bash
//! # Check a script for syntax errors
//! craftscript check tunnel.cs
//!
//! # Run a script against the simulated world
//! craftscript run tunnel.cs
//!
//! # Emit results and trace events as JSON lines
//! craftscript run tunnel.cs --json --trace
//!
//! # Resolve waypoints and custom functions from JSON stores
//! craftscript run tunnel.cs --actor steve --waypoints ./data --functions ./data
//!
//! # Show a selector's canonical key and its offset under each heading
//! craftscript key F3+R1
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use craftscript::ast::walk_calls;
use craftscript::parser::{parse, parse_selector};
use craftscript::{Interpreter, RunContext, ScriptError};
use craftscript_core::config::CraftscriptConfig;
use craftscript_core::functions::JsonFunctionStore;
use craftscript_core::journal::{RunEvent, RunJournal};
use craftscript_core::selector::Heading;
use craftscript_core::sim::SimWorld;
use craftscript_core::waypoint::JsonWaypointStore;

#[derive(Parser)]
#[command(name = "craftscript", about = "Parse and run CraftScript command scripts", version)]
struct Cli {
    /// Write diagnostic logs to this directory instead of stderr
    #[arg(long, global = true, env = "CRAFTSCRIPT_LOG_DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a script and report the first syntax error
    Check {
        /// Path to the script file
        script: PathBuf,
    },
    /// Run a script against the simulated world
    Run(RunArgs),
    /// Print a selector's canonical key and its offset under each heading
    Key {
        /// Selector text, e.g. F3+R1
        selector: String,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Path to the script file
    script: PathBuf,

    /// Maximum number of atomic commands
    #[arg(long)]
    op_limit: Option<u64>,

    /// Emit trace events
    #[arg(long)]
    trace: bool,

    /// Print events as JSON lines
    #[arg(long)]
    json: bool,

    /// Stop at the first failed command
    #[arg(long)]
    stop_on_failure: bool,

    /// Do not rescan the world before spatial commands
    #[arg(long)]
    no_autoscan: bool,

    /// Actor id for waypoint and function lookups
    #[arg(short, long, env = "CRAFTSCRIPT_ACTOR")]
    actor: Option<String>,

    /// Correlation id attached to the run report
    #[arg(long)]
    correlation_id: Option<String>,

    /// Directory holding <actor>_waypoints.json
    #[arg(long)]
    waypoints: Option<PathBuf>,

    /// Directory holding <actor>_functions.json
    #[arg(long)]
    functions: Option<PathBuf>,

    /// Persist the run journal as JSON lines in this directory
    #[arg(long)]
    journal: Option<PathBuf>,
}

fn init_logging(log_dir: Option<&Path>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).ok();
            let file_appender = tracing_appender::rolling::never(dir, "craftscript.log");
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(file_appender)
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_dir.as_deref());

    let result = match cli.command {
        Command::Check { script } => check_script(&script),
        Command::Run(args) => run_script(args).await,
        Command::Key { selector } => print_key(&selector),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

fn check_script(path: &Path) -> Result<(), ScriptError> {
    let source = std::fs::read_to_string(path)?;
    let program = parse(&source)?;

    let (mut commands, mut predicates) = (0, 0);
    walk_calls(&program.statements, &mut |_, _, is_predicate| {
        if is_predicate {
            predicates += 1;
        } else {
            commands += 1;
        }
    });
    println!(
        "{}: ok ({} statements, {} command calls, {} predicate calls)",
        path.display(),
        program.statements.len(),
        commands,
        predicates
    );
    Ok(())
}

fn print_key(text: &str) -> Result<(), ScriptError> {
    let selector = parse_selector(text)?;
    println!("{}", selector.key());
    for heading in Heading::ALL {
        match selector.offset(heading) {
            Ok(offset) => println!("  {:<6} {}", heading.name(), offset),
            Err(_) => println!("  {:<6} out of range", heading.name()),
        }
    }
    Ok(())
}

async fn run_script(args: RunArgs) -> Result<(), ScriptError> {
    let source = std::fs::read_to_string(&args.script)?;
    let config = CraftscriptConfig::load();

    let mut options = config.run.clone();
    if let Some(limit) = args.op_limit {
        options.op_limit = limit;
    }
    options.trace |= args.trace;
    options.stop_on_failure |= args.stop_on_failure;
    if args.no_autoscan {
        options.auto_scan_before_ops = false;
    }
    if let Some(actor) = args.actor {
        options.actor = actor;
    }
    if args.correlation_id.is_some() {
        options.correlation_id = args.correlation_id;
    }

    let world = SimWorld::flat();
    let registry = world.registry().map_err(|e| ScriptError::Setup(e.to_string()))?;
    let mut ctx = RunContext::new(registry, world.clone());
    if let Some(dir) = args.waypoints.or(config.waypoint_dir) {
        debug!(dir = %dir.display(), "using waypoint store");
        ctx = ctx.with_waypoints(Arc::new(JsonWaypointStore::new(dir)));
    }
    if let Some(dir) = args.functions.or(config.function_dir) {
        debug!(dir = %dir.display(), "using function store");
        ctx = ctx.with_functions(Arc::new(JsonFunctionStore::new(dir)));
    }

    let journal = match args.journal {
        Some(dir) => RunJournal::with_log_dir(&options.actor, options.correlation_id.clone(), &dir),
        None => RunJournal::new(&options.actor, options.correlation_id.clone()),
    };
    let interpreter = Interpreter::new(ctx, options).with_journal(journal.clone());

    let mut events = journal.subscribe();
    let json = args.json;
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            print_event(&event, json);
            if event.is_finished() {
                break;
            }
        }
    });

    let cancel = interpreter.cancellation_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let report = interpreter.run_source(&source).await;
    if let Err(e) = printer.await {
        warn!(error = %e, "output task failed");
    }
    interrupt.abort();

    ScriptError::check_report(&report)
}

fn print_event(event: &RunEvent, json: bool) {
    if json {
        if let Ok(line) = serde_json::to_string(event) {
            println!("{}", line);
        }
        return;
    }

    let now = chrono::Utc::now().format("%H:%M:%S%.3fZ");
    match event {
        RunEvent::Started { run_id, actor, .. } => {
            println!("[{}] run {} started for {}", now, run_id, actor);
        }
        RunEvent::Step(result) => {
            println!("[{}] {}", now, result);
            for note in result.notes() {
                println!("    {}", note);
            }
        }
        RunEvent::Trace(trace) => {
            let detail = serde_json::to_string(&trace.kind).unwrap_or_default();
            println!("[{}] trace {} {}", now, trace.location, detail);
        }
        RunEvent::Finished(report) => {
            println!(
                "[{}] run finished: {:?}, {} ops, {} failed",
                now,
                report.state(),
                report.ops,
                report.failures().count()
            );
        }
    }
}
