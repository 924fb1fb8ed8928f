use std::fmt;

use craftscript_core::result::{ErrorKind, RunReport, SourceLocation, Termination};

/// A script could not be lexed or parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl SyntaxError {
    pub fn new(loc: SourceLocation, message: impl Into<String>) -> Self {
        Self {
            line: loc.line,
            column: loc.column,
            message: message.into(),
        }
    }

    pub fn location(&self) -> SourceLocation {
        SourceLocation::new(self.line, self.column)
    }

    pub fn into_termination(self) -> Termination {
        let loc = self.location();
        Termination::new(ErrorKind::Syntax, self.message).at(loc)
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Syntax error at line {}, column {}: {}", self.line, self.column, self.message)
    }
}

impl std::error::Error for SyntaxError {}

/// Errors surfaced by the `craftscript` runner.
#[derive(Debug)]
pub enum ScriptError {
    Syntax(SyntaxError),
    Terminated(Termination),
    /// The script completed but some commands failed.
    CommandsFailed { count: usize },
    Setup(String),
    Io(std::io::Error),
}

impl ScriptError {
    pub fn exit_code(&self) -> i32 {
        match self {
            ScriptError::Syntax(_) => 2,
            ScriptError::Terminated(t) => match t.kind {
                ErrorKind::Syntax => 2,
                ErrorKind::Assertion | ErrorKind::Command | ErrorKind::AbsoluteLookup => 1,
                _ => 3,
            },
            ScriptError::CommandsFailed { .. } => 1,
            ScriptError::Setup(_) => 3,
            ScriptError::Io(_) => 4,
        }
    }

    /// Maps a finished run to `Ok` or the error the runner should exit with.
    pub fn check_report(report: &RunReport) -> Result<(), ScriptError> {
        if let Some(t) = report.termination() {
            return Err(ScriptError::Terminated(t.clone()));
        }
        match report.failures().count() {
            0 => Ok(()),
            count => Err(ScriptError::CommandsFailed { count }),
        }
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptError::Syntax(e) => write!(f, "{}", e),
            ScriptError::Terminated(t) => write!(f, "Run terminated: {}", t),
            ScriptError::CommandsFailed { count } => write!(f, "{} command(s) failed", count),
            ScriptError::Setup(msg) => write!(f, "Setup error: {}", msg),
            ScriptError::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for ScriptError {}

impl From<std::io::Error> for ScriptError {
    fn from(e: std::io::Error) -> Self {
        ScriptError::Io(e)
    }
}

impl From<SyntaxError> for ScriptError {
    fn from(e: SyntaxError) -> Self {
        ScriptError::Syntax(e)
    }
}
