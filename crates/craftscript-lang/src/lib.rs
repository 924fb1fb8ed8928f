//! CraftScript language: lexer, parser and async interpreter.
//!
//! A script is parsed into an [`ast::Program`] and run by an
//! [`interpreter::Interpreter`] against a [`interpreter::RunContext`], which
//! bundles the command registry, the world probe and the waypoint and custom
//! function stores. Results stream out through the run's journal and are
//! collected into a [`RunReport`].
//!
//! # Example
//!
//! ```no_run
//! use craftscript::{parse, Interpreter, RunContext};
//! use craftscript_core::config::RunOptions;
//! use craftscript_core::sim::SimWorld;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let program = parse("if (is_air(F1)) { move(F1); } else { dig(F1); }")?;
//! let world = SimWorld::flat();
//! let ctx = RunContext::new(world.registry()?, world.clone());
//! let report = Interpreter::new(ctx, RunOptions::default()).run(&program).await;
//! assert!(report.termination().is_none());
//! # Ok(())
//! # }
//! ```

pub mod ast;
pub mod error;
pub mod grammar;
pub mod interpreter;
pub mod parser;
pub mod resolve;
pub mod runtime;

pub use craftscript_core::result::RunReport;
pub use error::{ScriptError, SyntaxError};
pub use interpreter::{Interpreter, RunContext};
pub use parser::parse;
