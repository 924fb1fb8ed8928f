//! Read-only view of the game world.
//!
//! The interpreter never mutates the world directly. It reads the actor's
//! [`Pose`] before resolving relative selectors, asks for fresh scans before
//! spatially sensitive commands, and evaluates `block(...)` queries through
//! the [`WorldProbe`] trait. Command handlers own all mutation.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::selector::{Pose, Vec3};

/// Errors reported by a [`WorldProbe`].
#[derive(Error, Debug, Clone)]
pub enum ProbeError {
    /// The world view is temporarily unavailable.
    #[error("World unavailable: {0}")]
    Unavailable(String),

    /// The connection to the game server was lost.
    #[error("Connection lost: {0}")]
    ConnectionLost(String),
}

/// A block at some position: namespaced name plus state properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockState {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

impl BlockState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn air() -> Self {
        Self::new("minecraft:air")
    }

    pub fn is_air(&self) -> bool {
        matches!(
            normalize_block_name(&self.name),
            "air" | "cave_air" | "void_air"
        )
    }

    pub fn is_liquid(&self) -> bool {
        matches!(normalize_block_name(&self.name), "water" | "lava")
    }

    /// Whether the actor can stand on top of this block.
    pub fn is_solid(&self) -> bool {
        !self.is_air() && !self.is_liquid()
    }
}

/// Strips the `minecraft:` namespace so `stone` and `minecraft:stone` compare equal.
pub fn normalize_block_name(name: &str) -> &str {
    name.strip_prefix("minecraft:").unwrap_or(name)
}

/// Predicate over block state, written `block(name: "stone", at: f1)` in scripts.
///
/// The keys `name`, `id` and `type` match the block name; any other key must
/// match a state property of the same name. `at` pins the query to one
/// position instead of searching around the actor.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockQuery {
    pub criteria: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<Vec3>,
}

impl BlockQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.criteria.insert(key.into(), value.into());
        self
    }

    pub fn at(mut self, position: Vec3) -> Self {
        self.at = Some(position);
        self
    }

    pub fn matches(&self, block: &BlockState) -> bool {
        self.criteria.iter().all(|(key, expected)| match key.as_str() {
            "name" | "id" | "type" => {
                normalize_block_name(&block.name) == normalize_block_name(expected)
            }
            _ => block.properties.get(key) == Some(expected),
        })
    }
}

impl fmt::Display for BlockQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block(")?;
        let mut first = true;
        for (k, v) in &self.criteria {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{}: {:?}", k, v)?;
            first = false;
        }
        if let Some(at) = self.at {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "at: {}", at)?;
        }
        write!(f, ")")
    }
}

/// Read-only access to the actor's surroundings.
#[async_trait]
pub trait WorldProbe: Send + Sync {
    /// Current facing and block position of the actor.
    async fn pose(&self) -> Result<Pose, ProbeError>;

    /// Block at `position`, or `None` when the chunk is not loaded.
    async fn block_at(&self, position: Vec3) -> Result<Option<BlockState>, ProbeError>;

    /// Refreshes the cached view of blocks within `radius`.
    async fn scan(&self, _radius: u32) -> Result<(), ProbeError> {
        Ok(())
    }

    /// Nearest position within `radius` of `origin` whose block matches `query`.
    ///
    /// A query with `at` only inspects that position.
    async fn find_block(
        &self,
        query: &BlockQuery,
        origin: Vec3,
        radius: u32,
    ) -> Result<Option<Vec3>, ProbeError> {
        if let Some(at) = query.at {
            let found = self.block_at(at).await?;
            return Ok(found.filter(|b| query.matches(b)).map(|_| at));
        }

        let r = radius as i32;
        let mut best: Option<Vec3> = None;
        for dx in -r..=r {
            for dy in -r..=r {
                for dz in -r..=r {
                    let pos = origin + Vec3::new(dx, dy, dz);
                    let Some(block) = self.block_at(pos).await? else {
                        continue;
                    };
                    if !query.matches(&block) {
                        continue;
                    }
                    let closer = best
                        .map(|b| pos.distance_sq(origin) < b.distance_sq(origin))
                        .unwrap_or(true);
                    if closer {
                        best = Some(pos);
                    }
                }
            }
        }
        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_match_with_or_without_namespace() {
        let block = BlockState::new("minecraft:oak_log").with_property("axis", "y");
        assert!(BlockQuery::new().with("name", "oak_log").matches(&block));
        assert!(BlockQuery::new().with("id", "minecraft:oak_log").matches(&block));
        assert!(BlockQuery::new().with("axis", "y").matches(&block));
        assert!(!BlockQuery::new().with("axis", "x").matches(&block));
        assert!(!BlockQuery::new().with("name", "stone").matches(&block));
    }

    #[test]
    fn empty_query_matches_anything() {
        assert!(BlockQuery::new().matches(&BlockState::air()));
    }

    #[test]
    fn air_and_liquids_are_not_solid() {
        assert!(BlockState::air().is_air());
        assert!(!BlockState::new("cave_air").is_solid());
        assert!(!BlockState::new("minecraft:water").is_solid());
        assert!(BlockState::new("minecraft:stone").is_solid());
    }

    #[test]
    fn query_display() {
        let q = BlockQuery::new().with("name", "stone").at(Vec3::new(1, 2, 3));
        assert_eq!(q.to_string(), "block(name: \"stone\", at: (1, 2, 3))");
    }
}
