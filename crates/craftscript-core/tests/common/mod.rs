//! Shared test helpers for craftscript-core integration tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use craftscript_core::selector::{Pose, Vec3};
use craftscript_core::world::{BlockState, ProbeError, WorldProbe};

/// A probe over a sparse block map. Positions not in the map are unloaded.
pub struct MapProbe {
    pub pose: Pose,
    pub blocks: HashMap<Vec3, BlockState>,
    pub lookups: AtomicUsize,
}

impl MapProbe {
    pub fn new(pose: Pose) -> Self {
        Self {
            pose,
            blocks: HashMap::new(),
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn with_block(mut self, pos: Vec3, name: &str) -> Self {
        self.blocks.insert(pos, BlockState::new(name));
        self
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorldProbe for MapProbe {
    async fn pose(&self) -> Result<Pose, ProbeError> {
        Ok(self.pose)
    }

    async fn block_at(&self, position: Vec3) -> Result<Option<BlockState>, ProbeError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.blocks.get(&position).cloned())
    }
}
