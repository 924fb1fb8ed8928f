//! Turns spatial values into absolute block positions.
//!
//! Selectors are resolved relative to a [`HeadingContext`] read from the
//! world at the moment of use. World coordinates pass through unchanged and
//! waypoints are looked up per actor.
//!
//! # Example
//!
//! ```
//! use craftscript::resolve::resolve_position;
//! use craftscript::runtime::Value;
//! use craftscript_core::selector::{Axis, Heading, HeadingContext, SelTerm, Selector, Vec3};
//! use craftscript_core::waypoint::MemoryWaypointStore;
//!
//! let rt = tokio::runtime::Runtime::new().unwrap();
//! let ctx = HeadingContext::new(Heading::E, Vec3::new(0, 64, 0));
//! let forward = Value::Selector(Selector::new(vec![SelTerm::new(Axis::F, 2)]));
//! let store = MemoryWaypointStore::new();
//! let pos = rt.block_on(resolve_position(&forward, &ctx, &store, "steve")).unwrap();
//! assert_eq!(pos, Vec3::new(2, 64, 0));
//! ```

use craftscript_core::selector::{CoordinateOverflow, HeadingContext, Vec3};
use craftscript_core::store::StoreError;
use craftscript_core::waypoint::WaypointStore;
use thiserror::Error;

use crate::runtime::Value;

#[derive(Error, Debug)]
pub enum ResolveError {
    /// The actor has no waypoint with this name.
    #[error("unknown waypoint '{name}'")]
    MissingWaypoint { name: String },

    /// The waypoint store could not be read.
    #[error("waypoint lookup failed: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Overflow(#[from] CoordinateOverflow),

    #[error("{0} is not a position")]
    NotSpatial(&'static str),
}

/// Resolves a selector, world coordinate, waypoint or pinned block query to
/// an absolute position.
pub async fn resolve_position(
    value: &Value,
    ctx: &HeadingContext,
    waypoints: &dyn WaypointStore,
    actor: &str,
) -> Result<Vec3, ResolveError> {
    match value {
        Value::Selector(sel) => Ok(sel.resolve(ctx)?),
        Value::World(pos) => Ok(*pos),
        Value::Waypoint(name) => waypoints
            .get_waypoint(actor, name)
            .await?
            .map(|wp| wp.position())
            .ok_or_else(|| ResolveError::MissingWaypoint { name: name.clone() }),
        Value::Query(q) => q.at.ok_or(ResolveError::NotSpatial("an unpinned block query")),
        other => Err(ResolveError::NotSpatial(other.type_name())),
    }
}
