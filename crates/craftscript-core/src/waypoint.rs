//! Named waypoints per actor.
//!
//! Scripts refer to saved locations with `waypoint("home")`. Lookups go
//! through [`WaypointStore`]; a missing waypoint is `Ok(None)`, leaving it to
//! the interpreter to report a lookup failure for the command that needed it.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::selector::Vec3;
use crate::store::{read_json_list, sanitize_actor, StoreError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Waypoint {
    pub fn new(name: impl Into<String>, position: Vec3) -> Self {
        Self {
            name: name.into(),
            x: position.x as f64,
            y: position.y as f64,
            z: position.z as f64,
            description: None,
        }
    }

    /// Block position containing this waypoint.
    pub fn position(&self) -> Vec3 {
        Vec3::new(
            self.x.floor() as i32,
            self.y.floor() as i32,
            self.z.floor() as i32,
        )
    }
}

#[async_trait]
pub trait WaypointStore: Send + Sync {
    async fn get_waypoint(&self, actor: &str, name: &str) -> Result<Option<Waypoint>, StoreError>;
}

/// Reads `<dir>/<actor>_waypoints.json`, a JSON array of waypoints.
#[derive(Debug, Clone)]
pub struct JsonWaypointStore {
    dir: PathBuf,
}

impl JsonWaypointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, actor: &str) -> PathBuf {
        self.dir
            .join(format!("{}_waypoints.json", sanitize_actor(actor)))
    }
}

#[async_trait]
impl WaypointStore for JsonWaypointStore {
    async fn get_waypoint(&self, actor: &str, name: &str) -> Result<Option<Waypoint>, StoreError> {
        let path = self.path_for(actor);
        let Some(waypoints) = read_json_list::<Waypoint>(&path).await? else {
            debug!(path = %path.display(), "no waypoint file");
            return Ok(None);
        };
        Ok(waypoints.into_iter().find(|w| w.name == name))
    }
}

/// In-memory waypoints, keyed by actor then name.
#[derive(Debug, Clone, Default)]
pub struct MemoryWaypointStore {
    waypoints: HashMap<String, HashMap<String, Waypoint>>,
}

impl MemoryWaypointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_waypoint(mut self, actor: &str, waypoint: Waypoint) -> Self {
        self.waypoints
            .entry(actor.to_string())
            .or_default()
            .insert(waypoint.name.clone(), waypoint);
        self
    }
}

#[async_trait]
impl WaypointStore for MemoryWaypointStore {
    async fn get_waypoint(&self, actor: &str, name: &str) -> Result<Option<Waypoint>, StoreError> {
        Ok(self
            .waypoints
            .get(actor)
            .and_then(|m| m.get(name))
            .cloned())
    }
}
