//! Per-command results, diagnostic trace events and run reports.
//!
//! Every atomic command executed by a run produces exactly one
//! [`CraftscriptResult`]. Control-flow diagnostics are reported separately as
//! [`TraceEvent`]s so that consumers interested only in side effects can ignore
//! them. A run ends with a [`RunReport`] whose [`RunOutcome`] says whether the
//! script completed or was terminated.
//!
//! All types serialize to camelCase JSON and form the wire/log contract.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Error taxonomy shared by step failures and run terminations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The script text could not be parsed.
    Syntax,
    /// An unknown or unbound name was referenced.
    Scope,
    /// An `assert` evaluated to false.
    Assertion,
    /// The operation budget or loop guard was exhausted.
    OpLimitExceeded,
    /// An atomic command handler reported a failure.
    Command,
    /// The run was cancelled from outside.
    Cancelled,
    /// A waypoint or other absolute reference could not be resolved.
    AbsoluteLookup,
    /// Type mismatch, arithmetic error, bad arity or call depth.
    Runtime,
    /// The connection to the game world was lost.
    ConnectionLost,
}

impl ErrorKind {
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Syntax => "SyntaxError",
            ErrorKind::Scope => "ScopeError",
            ErrorKind::Assertion => "AssertionError",
            ErrorKind::OpLimitExceeded => "OpLimitExceeded",
            ErrorKind::Command => "CommandError",
            ErrorKind::Cancelled => "Cancelled",
            ErrorKind::AbsoluteLookup => "AbsoluteLookupError",
            ErrorKind::Runtime => "RuntimeError",
            ErrorKind::ConnectionLost => "ConnectionLost",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 1-based line and column in the script source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Outcome of one executed atomic command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum CraftscriptResult {
    Success {
        op_index: u64,
        op: String,
        elapsed_ms: u64,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        notes: Vec<String>,
    },
    Failure {
        error: ErrorKind,
        /// Handler-specific failure code such as `no_path`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        message: String,
        location: SourceLocation,
        op_index: u64,
        op: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        notes: Vec<String>,
        timestamp: DateTime<Utc>,
    },
}

impl CraftscriptResult {
    pub fn success(op_index: u64, op: impl Into<String>, elapsed_ms: u64) -> Self {
        CraftscriptResult::Success {
            op_index,
            op: op.into(),
            elapsed_ms,
            notes: Vec::new(),
        }
    }

    pub fn failure(
        error: ErrorKind,
        message: impl Into<String>,
        location: SourceLocation,
        op_index: u64,
        op: impl Into<String>,
    ) -> Self {
        CraftscriptResult::Failure {
            error,
            code: None,
            message: message.into(),
            location,
            op_index,
            op: op.into(),
            notes: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// Attaches a failure code. No effect on successes.
    pub fn with_code(mut self, value: impl Into<String>) -> Self {
        if let CraftscriptResult::Failure { ref mut code, .. } = self {
            *code = Some(value.into());
        }
        self
    }

    pub fn with_notes(mut self, extra: Vec<String>) -> Self {
        match self {
            CraftscriptResult::Success { ref mut notes, .. }
            | CraftscriptResult::Failure { ref mut notes, .. } => notes.extend(extra),
        }
        self
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CraftscriptResult::Success { .. })
    }

    pub fn op_index(&self) -> u64 {
        match self {
            CraftscriptResult::Success { op_index, .. }
            | CraftscriptResult::Failure { op_index, .. } => *op_index,
        }
    }

    pub fn op(&self) -> &str {
        match self {
            CraftscriptResult::Success { op, .. } | CraftscriptResult::Failure { op, .. } => op,
        }
    }

    pub fn notes(&self) -> &[String] {
        match self {
            CraftscriptResult::Success { notes, .. }
            | CraftscriptResult::Failure { notes, .. } => notes,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            CraftscriptResult::Success { .. } => None,
            CraftscriptResult::Failure { error, .. } => Some(*error),
        }
    }
}

impl fmt::Display for CraftscriptResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CraftscriptResult::Success { op_index, op, elapsed_ms, .. } => {
                write!(f, "#{} {} ok ({}ms)", op_index, op, elapsed_ms)
            }
            CraftscriptResult::Failure { op_index, op, error, message, location, .. } => {
                write!(f, "#{} {} failed at {}: {}: {}", op_index, op, location, error, message)
            }
        }
    }
}

/// What a trace event records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum TraceKind {
    BranchTaken {
        taken: bool,
    },
    LoopIteration {
        iteration: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        variable: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<i64>,
    },
    VariableBound {
        name: String,
        value: String,
    },
    PredicateEvaluated {
        name: String,
        value: bool,
    },
    MacroEntered {
        name: String,
        depth: usize,
    },
    AssertionChecked {
        passed: bool,
    },
    CommandStarted {
        op_index: u64,
        op: String,
    },
}

/// A timestamped diagnostic emitted while a run walks the script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceEvent {
    pub timestamp: DateTime<Utc>,
    pub location: SourceLocation,
    #[serde(flatten)]
    pub kind: TraceKind,
}

impl TraceEvent {
    pub fn new(location: SourceLocation, kind: TraceKind) -> Self {
        Self {
            timestamp: Utc::now(),
            location,
            kind,
        }
    }
}

/// Why a run stopped before reaching the end of the script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Termination {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_op_index: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl Termination {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            location: None,
            last_op_index: None,
            op: None,
            notes: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(f, "{} at {}: {}", self.kind, loc, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    Terminated(Termination),
}

/// Coarse run status derived from the outcome and results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Completed,
    Failed,
    Cancelled,
}

/// Terminal value of one script run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    pub results: Vec<CraftscriptResult>,
    /// Number of atomic commands dispatched.
    pub ops: u64,
    pub outcome: RunOutcome,
}

impl RunReport {
    pub fn termination(&self) -> Option<&Termination> {
        match &self.outcome {
            RunOutcome::Completed => None,
            RunOutcome::Terminated(t) => Some(t),
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &CraftscriptResult> {
        self.results.iter().filter(|r| !r.is_success())
    }

    /// `Completed` only when the script ran to the end and every command succeeded.
    pub fn state(&self) -> RunState {
        match &self.outcome {
            RunOutcome::Terminated(t) if t.kind == ErrorKind::Cancelled => RunState::Cancelled,
            RunOutcome::Terminated(_) => RunState::Failed,
            RunOutcome::Completed if self.failures().next().is_some() => RunState::Failed,
            RunOutcome::Completed => RunState::Completed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_serializes_camel_case() {
        let r = CraftscriptResult::success(3, "dig", 12);
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["opIndex"], 3);
        assert_eq!(json["elapsedMs"], 12);
        assert!(json.get("notes").is_none());
    }

    #[test]
    fn failure_carries_code_and_notes() {
        let r = CraftscriptResult::failure(
            ErrorKind::Command,
            "no path",
            SourceLocation::new(2, 5),
            1,
            "move",
        )
        .with_code("no_path")
        .with_notes(vec!["target (1, 64, -3)".to_string()]);

        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["error"], "command");
        assert_eq!(json["code"], "no_path");
        assert_eq!(json["location"]["line"], 2);
        assert_eq!(r.notes().len(), 1);
        assert_eq!(r.error_kind(), Some(ErrorKind::Command));
    }

    #[test]
    fn result_json_roundtrip() {
        let r = CraftscriptResult::failure(
            ErrorKind::AbsoluteLookup,
            "waypoint 'home' not found",
            SourceLocation::new(1, 1),
            0,
            "goto",
        );
        let json = serde_json::to_string(&r).unwrap();
        let back: CraftscriptResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn trace_kind_is_flattened() {
        let ev = TraceEvent::new(
            SourceLocation::new(4, 1),
            TraceKind::PredicateEvaluated { name: "is_air".into(), value: true },
        );
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "predicate_evaluated");
        assert_eq!(json["name"], "is_air");
        assert_eq!(json["location"]["line"], 4);
    }

    #[test]
    fn report_state() {
        let mut report = RunReport {
            run_id: Uuid::new_v4(),
            correlation_id: None,
            results: vec![CraftscriptResult::success(0, "dig", 1)],
            ops: 1,
            outcome: RunOutcome::Completed,
        };
        assert_eq!(report.state(), RunState::Completed);

        report.results.push(CraftscriptResult::failure(
            ErrorKind::Command,
            "boom",
            SourceLocation::new(2, 1),
            1,
            "dig",
        ));
        assert_eq!(report.state(), RunState::Failed);

        report.outcome = RunOutcome::Terminated(Termination::new(ErrorKind::Cancelled, "cancelled"));
        assert_eq!(report.state(), RunState::Cancelled);
    }

    #[test]
    fn termination_display_includes_location() {
        let t = Termination::new(ErrorKind::Assertion, "nope").at(SourceLocation::new(3, 7));
        assert_eq!(t.to_string(), "AssertionError at 3:7: nope");
    }
}
