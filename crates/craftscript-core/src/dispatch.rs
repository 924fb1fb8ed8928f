//! Command dispatch table.
//!
//! This module defines the [`CommandHandler`] and [`PredicateHandler`] traits
//! that atomic actions implement, and the [`CommandRegistry`] that maps script
//! names to them. The interpreter only ever talks to game actions through this
//! table, so any backend (a live bot, a simulator, a test mock) can be plugged
//! in without the interpreter knowing about it.
//!
//! Names are validated when they are registered: a handler can never shadow a
//! keyword, a selector axis word or one of the built-in expression forms.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::selector::{Axis, Vec3};
use crate::world::BlockQuery;

/// Reserved words of the language.
pub const KEYWORDS: &[&str] = &[
    "macro", "if", "else", "repeat", "while", "assert", "let", "true", "false",
];

/// Names taken by built-in expression forms and intrinsic predicates.
pub const BUILTIN_NAMES: &[&str] = &["world", "waypoint", "block", "last_ok"];

/// Whether `name` is a syntactically valid identifier.
///
/// A lone `_` is the down shorthand, not a name.
pub fn is_identifier(name: &str) -> bool {
    if name == "_" {
        return false;
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Errors that can occur when registering a handler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("'{0}' is not a valid identifier")]
    InvalidName(String),

    #[error("'{0}' is a reserved keyword")]
    Keyword(String),

    #[error("'{0}' would be read as a selector term")]
    AxisWord(String),

    #[error("'{0}' is a built-in name")]
    Builtin(String),

    #[error("'{0}' is already registered")]
    Duplicate(String),
}

/// A fully evaluated command argument.
///
/// Spatial expressions (selectors, `world(...)`, waypoints) arrive already
/// resolved to absolute positions.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Int(i64),
    Bool(bool),
    Str(String),
    Position(Vec3),
    Query(BlockQuery),
}

impl ArgValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ArgValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ArgValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_position(&self) -> Option<Vec3> {
        match self {
            ArgValue::Position(p) => Some(*p),
            ArgValue::Query(q) => q.at,
            _ => None,
        }
    }

    pub fn as_query(&self) -> Option<&BlockQuery> {
        match self {
            ArgValue::Query(q) => Some(q),
            _ => None,
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Int(n) => write!(f, "{}", n),
            ArgValue::Bool(b) => write!(f, "{}", b),
            ArgValue::Str(s) => write!(f, "{:?}", s),
            ArgValue::Position(p) => write!(f, "{}", p),
            ArgValue::Query(q) => write!(f, "{}", q),
        }
    }
}

/// Positional and named arguments passed to a handler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandArgs {
    pub positional: Vec<ArgValue>,
    pub named: BTreeMap<String, ArgValue>,
}

impl CommandArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, value: ArgValue) -> Self {
        self.positional.push(value);
        self
    }

    pub fn named(mut self, key: impl Into<String>, value: ArgValue) -> Self {
        self.named.insert(key.into(), value);
        self
    }

    /// Looks up an argument by name first, then by position.
    pub fn get(&self, index: usize, key: &str) -> Option<&ArgValue> {
        self.named.get(key).or_else(|| self.positional.get(index))
    }

    pub fn int(&self, index: usize, key: &str) -> Option<i64> {
        self.get(index, key).and_then(ArgValue::as_int)
    }

    pub fn string(&self, index: usize, key: &str) -> Option<&str> {
        self.get(index, key).and_then(ArgValue::as_str)
    }

    pub fn position(&self, index: usize, key: &str) -> Option<Vec3> {
        self.get(index, key).and_then(ArgValue::as_position)
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }
}

/// What a successful handler call reports back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOutput {
    pub notes: Vec<String>,
}

impl CommandOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

/// Errors reported by command and predicate handlers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HandlerError {
    /// The action could not be carried out.
    #[error("{message}")]
    Failed {
        /// Machine-readable code such as `no_path` or `unavailable`.
        code: String,
        message: String,
        notes: Vec<String>,
    },

    /// The arguments were rejected before any side effect.
    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    /// The connection to the game server was lost.
    #[error("Connection lost: {0}")]
    ConnectionLost(String),
}

impl HandlerError {
    pub fn failed(code: impl Into<String>, message: impl Into<String>) -> Self {
        HandlerError::Failed {
            code: code.into(),
            message: message.into(),
            notes: Vec::new(),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            HandlerError::Failed { code, .. } => code,
            HandlerError::InvalidArgs(_) => "invalid_args",
            HandlerError::ConnectionLost(_) => "connection_lost",
        }
    }

    pub fn notes(&self) -> &[String] {
        match self {
            HandlerError::Failed { notes, .. } => notes,
            _ => &[],
        }
    }
}

/// An atomic, side-effecting action invoked by a command statement.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Checks arguments before execution. Runs after spatial resolution.
    fn validate(&self, _args: &CommandArgs) -> Result<(), HandlerError> {
        Ok(())
    }

    /// Whether the world view should be rescanned right before this command.
    fn needs_fresh_scan(&self) -> bool {
        false
    }

    async fn execute(&self, args: &CommandArgs) -> Result<CommandOutput, HandlerError>;
}

/// A side-effect free boolean query usable in conditions.
#[async_trait]
pub trait PredicateHandler: Send + Sync {
    async fn evaluate(&self, args: &CommandArgs) -> Result<bool, HandlerError>;
}

/// Maps command and predicate names to their handlers.
#[derive(Default, Clone)]
pub struct CommandRegistry {
    commands: HashMap<String, Arc<dyn CommandHandler>>,
    predicates: HashMap<String, Arc<dyn PredicateHandler>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_name(&self, name: &str) -> Result<(), RegistryError> {
        if !is_identifier(name) {
            return Err(RegistryError::InvalidName(name.to_string()));
        }
        if KEYWORDS.contains(&name) {
            return Err(RegistryError::Keyword(name.to_string()));
        }
        if Axis::is_axis_word(name) {
            return Err(RegistryError::AxisWord(name.to_string()));
        }
        if BUILTIN_NAMES.contains(&name) {
            return Err(RegistryError::Builtin(name.to_string()));
        }
        if self.commands.contains_key(name) || self.predicates.contains_key(name) {
            return Err(RegistryError::Duplicate(name.to_string()));
        }
        Ok(())
    }

    pub fn register_command(
        &mut self,
        name: &str,
        handler: Arc<dyn CommandHandler>,
    ) -> Result<(), RegistryError> {
        self.check_name(name)?;
        self.commands.insert(name.to_string(), handler);
        Ok(())
    }

    pub fn register_predicate(
        &mut self,
        name: &str,
        handler: Arc<dyn PredicateHandler>,
    ) -> Result<(), RegistryError> {
        self.check_name(name)?;
        self.predicates.insert(name.to_string(), handler);
        Ok(())
    }

    pub fn command(&self, name: &str) -> Option<Arc<dyn CommandHandler>> {
        self.commands.get(name).cloned()
    }

    pub fn predicate(&self, name: &str) -> Option<Arc<dyn PredicateHandler>> {
        self.predicates.get(name).cloned()
    }

    pub fn has_command(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    pub fn has_predicate(&self, name: &str) -> bool {
        self.predicates.contains_key(name)
    }

    /// Registered command names, sorted.
    pub fn command_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn predicate_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.predicates.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.command_names())
            .field("predicates", &self.predicate_names())
            .finish()
    }
}
