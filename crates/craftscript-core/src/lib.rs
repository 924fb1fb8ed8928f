//! # craftscript-core
//!
//! Core library for the CraftScript command language.
//!
//! This crate holds everything the interpreter needs apart from the language
//! front end itself: the egocentric coordinate model, result and trace types,
//! the command dispatch table and the collaborator traits through which a run
//! touches the outside world.
//!
//! ## Modules
//!
//! - [`selector`] - Headings, selector terms and relative-to-absolute resolution
//! - [`result`] - Per-command results, trace events and run reports
//! - [`dispatch`] - Command/predicate handler traits and the registry
//! - [`world`] - Read-only world probe and block queries
//! - [`waypoint`] - Named waypoint lookup (in-memory and JSON files)
//! - [`functions`] - Persisted custom functions (in-memory and JSON files)
//! - [`journal`] - Per-run event stream and JSON Lines log
//! - [`config`] - Run options and `~/.craftscript/config.json`
//! - [`sim`] - In-memory simulated world with a full handler set
//!
//! ## Example
//!
//! ```
//! use craftscript_core::selector::{Axis, Heading, SelTerm, Selector, Vec3};
//!
//! let sel = Selector::new(vec![SelTerm::new(Axis::F, 3), SelTerm::new(Axis::R, 1)]);
//! assert_eq!(sel.offset(Heading::E), Ok(Vec3::new(3, 0, 1)));
//! ```

pub mod config;
pub mod dispatch;
pub mod functions;
pub mod journal;
pub mod result;
pub mod selector;
pub mod sim;
pub mod store;
pub mod waypoint;
pub mod world;
