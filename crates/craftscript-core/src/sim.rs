//! In-memory simulated world.
//!
//! [`SimWorld`] implements [`WorldProbe`] over a flat stone world with sparse
//! block overrides, and provides a handler set for the common atomic commands
//! (movement, turning, digging, placing, scanning, waiting, logging) and
//! predicates. It backs dry runs from the command line and the test suites.
//!
//! # Example
//!
//! ```
//! use craftscript_core::sim::SimWorld;
//!
//! let world = SimWorld::flat();
//! let registry = world.registry().unwrap();
//! assert!(registry.has_command("dig"));
//! assert!(registry.has_predicate("is_air"));
//! ```

use std::collections::HashMap;
use std::f64::consts::{FRAC_PI_2, PI};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::dispatch::{
    ArgValue, CommandArgs, CommandHandler, CommandOutput, CommandRegistry, HandlerError,
    PredicateHandler, RegistryError,
};
use crate::selector::{Heading, Pose, Vec3};
use crate::world::{normalize_block_name, BlockState, ProbeError, WorldProbe};

/// Blocks at or below this height are stone unless overridden.
const GROUND_Y: i32 = 63;

/// Squared reach distance (4.5 blocks).
const REACH_SQ: i64 = 20;

const MAX_WAIT_MS: i64 = 300_000;

#[derive(Debug)]
struct SimState {
    pose: Pose,
    overrides: HashMap<Vec3, BlockState>,
    inventory: HashMap<String, u32>,
    held: Option<String>,
    scans: u32,
    messages: Vec<String>,
}

impl SimState {
    fn block(&self, pos: Vec3) -> BlockState {
        match self.overrides.get(&pos) {
            Some(b) => b.clone(),
            None if pos.y <= GROUND_Y => BlockState::new("minecraft:stone"),
            None => BlockState::air(),
        }
    }

    fn can_stand(&self, pos: Vec3) -> bool {
        !self.block(pos).is_solid()
            && !self.block(pos + Vec3::UP).is_solid()
            && self.block(pos + Vec3::DOWN).is_solid()
    }

    fn has_gravity_overhead(&self, pos: Vec3) -> bool {
        [1, 2].iter().any(|dy| {
            let name = self.block(pos + Vec3::new(0, *dy, 0)).name;
            name.contains("gravel") || name.contains("sand")
        })
    }
}

/// A deterministic world that lives entirely in memory.
#[derive(Debug)]
pub struct SimWorld {
    state: Mutex<SimState>,
}

impl SimWorld {
    pub fn new(pose: Pose) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(SimState {
                pose,
                overrides: HashMap::new(),
                inventory: HashMap::new(),
                held: None,
                scans: 0,
                messages: Vec::new(),
            }),
        })
    }

    /// Flat world with the actor standing at `(0, 64, 0)` facing north.
    pub fn flat() -> Arc<Self> {
        Self::new(Pose::new(0.0, Vec3::new(0, GROUND_Y + 1, 0)))
    }

    pub async fn set_block(&self, pos: Vec3, block: BlockState) {
        self.state.lock().await.overrides.insert(pos, block);
    }

    pub async fn block(&self, pos: Vec3) -> BlockState {
        self.state.lock().await.block(pos)
    }

    pub async fn set_pose(&self, pose: Pose) {
        self.state.lock().await.pose = pose;
    }

    pub async fn current_pose(&self) -> Pose {
        self.state.lock().await.pose
    }

    pub async fn give_item(&self, item: &str, count: u32) {
        let mut state = self.state.lock().await;
        *state
            .inventory
            .entry(normalize_block_name(item).to_string())
            .or_insert(0) += count;
    }

    pub async fn item_count(&self, item: &str) -> u32 {
        let state = self.state.lock().await;
        state
            .inventory
            .get(normalize_block_name(item))
            .copied()
            .unwrap_or(0)
    }

    pub async fn scan_count(&self) -> u32 {
        self.state.lock().await.scans
    }

    /// Item selected by the last `equip`, cleared once the stack is used up.
    pub async fn held_item(&self) -> Option<String> {
        self.state.lock().await.held.clone()
    }

    /// Lines written by `log(...)` commands, in order.
    pub async fn messages(&self) -> Vec<String> {
        self.state.lock().await.messages.clone()
    }

    /// Registry with every simulated command and predicate.
    pub fn registry(self: &Arc<Self>) -> Result<CommandRegistry, RegistryError> {
        let mut registry = CommandRegistry::new();
        for (name, op) in [
            ("move", SimOp::Move),
            ("goto", SimOp::Goto),
            ("turn", SimOp::Turn),
            ("turn_face", SimOp::TurnFace),
            ("dig", SimOp::Dig),
            ("break", SimOp::Dig),
            ("place", SimOp::Place),
            ("equip", SimOp::Equip),
            ("scan", SimOp::Scan),
            ("wait", SimOp::Wait),
            ("log", SimOp::Log),
        ] {
            registry.register_command(name, Arc::new(SimCommand { world: self.clone(), op }))?;
        }
        for (name, check) in [
            ("is_air", SimCheck::IsAir),
            ("can_stand", SimCheck::CanStand),
            ("safe_step_up", SimCheck::SafeStepUp),
            ("safe_step_down", SimCheck::SafeStepDown),
            ("block_is", SimCheck::BlockIs),
            ("has_item", SimCheck::HasItem),
            ("is_hazard", SimCheck::IsHazard),
        ] {
            registry.register_predicate(name, Arc::new(SimPredicate { world: self.clone(), check }))?;
        }
        Ok(registry)
    }
}

#[async_trait]
impl WorldProbe for SimWorld {
    async fn pose(&self) -> Result<Pose, ProbeError> {
        Ok(self.state.lock().await.pose)
    }

    async fn block_at(&self, position: Vec3) -> Result<Option<BlockState>, ProbeError> {
        Ok(Some(self.state.lock().await.block(position)))
    }

    async fn scan(&self, radius: u32) -> Result<(), ProbeError> {
        let mut state = self.state.lock().await;
        state.scans += 1;
        debug!(radius, scans = state.scans, "sim scan");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SimOp {
    Move,
    Goto,
    Turn,
    TurnFace,
    Dig,
    Place,
    Equip,
    Scan,
    Wait,
    Log,
}

struct SimCommand {
    world: Arc<SimWorld>,
    op: SimOp,
}

fn turn_delta(token: &str) -> Option<f64> {
    match token.to_ascii_lowercase().as_str() {
        "l90" | "left" => Some(FRAC_PI_2),
        "r90" | "right" => Some(-FRAC_PI_2),
        "180" | "around" => Some(PI),
        _ => None,
    }
}

fn require_position(args: &CommandArgs, index: usize, key: &str) -> Result<Vec3, HandlerError> {
    args.position(index, key)
        .ok_or_else(|| HandlerError::InvalidArgs(format!("expected a position for '{}'", key)))
}

/// Scan radius argument, 2 when omitted.
fn scan_radius(args: &CommandArgs) -> Result<u32, HandlerError> {
    match args.int(0, "r") {
        None => Ok(2),
        Some(r) => u32::try_from(r)
            .map_err(|_| HandlerError::InvalidArgs(format!("scan radius out of range: {}", r))),
    }
}

fn require_string<'a>(args: &'a CommandArgs, index: usize, key: &str) -> Result<&'a str, HandlerError> {
    args.string(index, key)
        .ok_or_else(|| HandlerError::InvalidArgs(format!("expected a string for '{}'", key)))
}

#[async_trait]
impl CommandHandler for SimCommand {
    fn validate(&self, args: &CommandArgs) -> Result<(), HandlerError> {
        match self.op {
            SimOp::Move | SimOp::Goto | SimOp::Dig => require_position(args, 0, "target").map(|_| ()),
            SimOp::Place => {
                require_string(args, 0, "id")?;
                require_position(args, 1, "target").map(|_| ())
            }
            SimOp::Equip => require_string(args, 0, "id").map(|_| ()),
            SimOp::Turn => {
                let token = require_string(args, 0, "dir")?;
                turn_delta(token)
                    .map(|_| ())
                    .ok_or_else(|| HandlerError::InvalidArgs(format!("invalid turn token: {}", token)))
            }
            SimOp::TurnFace => {
                let dir = require_string(args, 0, "face")?;
                Heading::from_name(dir)
                    .map(|_| ())
                    .ok_or_else(|| HandlerError::InvalidArgs(format!("unknown face: {}", dir)))
            }
            SimOp::Wait => match args.int(0, "ms") {
                Some(ms) if (0..=MAX_WAIT_MS).contains(&ms) => Ok(()),
                _ => Err(HandlerError::InvalidArgs(
                    "wait time must be between 0 and 300000ms".to_string(),
                )),
            },
            SimOp::Scan => scan_radius(args).map(|_| ()),
            SimOp::Log => Ok(()),
        }
    }

    fn needs_fresh_scan(&self) -> bool {
        matches!(self.op, SimOp::Move | SimOp::Dig | SimOp::Place)
    }

    async fn execute(&self, args: &CommandArgs) -> Result<CommandOutput, HandlerError> {
        match self.op {
            SimOp::Move | SimOp::Goto => {
                let target = require_position(args, 0, "target")?;
                let mut state = self.world.state.lock().await;
                if !state.can_stand(target) {
                    return Err(HandlerError::failed(
                        "no_path",
                        format!("cannot reach {}", target),
                    ));
                }
                state.pose.position = target;
                Ok(CommandOutput::new().with_note(format!("at {}", target)))
            }
            SimOp::Turn => {
                let token = require_string(args, 0, "dir")?;
                let delta = turn_delta(token)
                    .ok_or_else(|| HandlerError::InvalidArgs(format!("invalid turn token: {}", token)))?;
                let mut state = self.world.state.lock().await;
                state.pose.yaw = (state.pose.yaw + delta).rem_euclid(2.0 * PI);
                Ok(CommandOutput::new().with_note(format!("facing {}", state.pose.heading())))
            }
            SimOp::TurnFace => {
                let dir = require_string(args, 0, "face")?;
                let heading = Heading::from_name(dir)
                    .ok_or_else(|| HandlerError::InvalidArgs(format!("unknown face: {}", dir)))?;
                self.world.state.lock().await.pose.yaw = heading.center();
                Ok(CommandOutput::new().with_note(format!("facing {}", heading)))
            }
            SimOp::Dig => {
                let target = require_position(args, 0, "target")?;
                let mut state = self.world.state.lock().await;
                if state.has_gravity_overhead(target) {
                    return Err(HandlerError::failed("invariant_violation", "gravity_block_overhead"));
                }
                let block = state.block(target);
                if block.is_air() {
                    return Err(HandlerError::failed("no_target", "no block to dig"));
                }
                if state.pose.position.distance_sq(target) > REACH_SQ {
                    return Err(HandlerError::failed("out_of_reach", "target beyond reach (4.5)"));
                }
                state.overrides.insert(target, BlockState::air());
                let item = normalize_block_name(&block.name).to_string();
                *state.inventory.entry(item).or_insert(0) += 1;
                Ok(CommandOutput::new().with_note(format!("dug {} at {}", block.name, target)))
            }
            SimOp::Place => {
                let id = normalize_block_name(require_string(args, 0, "id")?).to_string();
                let target = require_position(args, 1, "target")?;
                let mut state = self.world.state.lock().await;
                let count = state.inventory.get(&id).copied().unwrap_or(0);
                if count == 0 {
                    return Err(HandlerError::failed("unavailable", format!("no {} in inventory", id)));
                }
                let occupied = state.block(target);
                if !occupied.is_air() {
                    return Err(HandlerError::Failed {
                        code: "occupied".to_string(),
                        message: format!("target not empty: {}", occupied.name),
                        notes: vec![format!("target {}", target)],
                    });
                }
                if state.pose.position.distance_sq(target) > REACH_SQ {
                    return Err(HandlerError::failed("out_of_reach", "target beyond reach (4.5)"));
                }
                state.inventory.insert(id.clone(), count - 1);
                if count == 1 && state.held.as_deref() == Some(id.as_str()) {
                    state.held = None;
                }
                state
                    .overrides
                    .insert(target, BlockState::new(format!("minecraft:{}", id)));
                Ok(CommandOutput::new().with_note(format!("placed {} at {}", id, target)))
            }
            SimOp::Equip => {
                let id = normalize_block_name(require_string(args, 0, "id")?).to_string();
                let mut state = self.world.state.lock().await;
                if state.inventory.get(&id).copied().unwrap_or(0) == 0 {
                    return Err(HandlerError::failed("unavailable", format!("no {} in inventory", id)));
                }
                state.held = Some(id.clone());
                Ok(CommandOutput::new().with_note(format!("holding {}", id)))
            }
            SimOp::Scan => {
                let radius = scan_radius(args)?;
                self.world
                    .scan(radius)
                    .await
                    .map_err(|e| HandlerError::failed("unavailable", e.to_string()))?;
                Ok(CommandOutput::new().with_note(format!("scanned r={}", radius)))
            }
            SimOp::Wait => {
                let ms = args.int(0, "ms").unwrap_or(0).clamp(0, MAX_WAIT_MS) as u64;
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(CommandOutput::new())
            }
            SimOp::Log => {
                let text = args
                    .positional
                    .iter()
                    .chain(args.named.values())
                    .map(|a| match a {
                        ArgValue::Str(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(" ");
                self.world.state.lock().await.messages.push(text.clone());
                Ok(CommandOutput::new().with_note(text))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SimCheck {
    IsAir,
    CanStand,
    SafeStepUp,
    SafeStepDown,
    BlockIs,
    HasItem,
    IsHazard,
}

struct SimPredicate {
    world: Arc<SimWorld>,
    check: SimCheck,
}

#[async_trait]
impl PredicateHandler for SimPredicate {
    async fn evaluate(&self, args: &CommandArgs) -> Result<bool, HandlerError> {
        let state = self.world.state.lock().await;
        match self.check {
            SimCheck::IsAir => Ok(state.block(require_position(args, 0, "target")?).is_air()),
            SimCheck::CanStand => Ok(state.can_stand(require_position(args, 0, "target")?)),
            SimCheck::SafeStepUp => {
                let pos = require_position(args, 0, "target")?;
                Ok(state.block(pos).is_solid()
                    && state.block(pos + Vec3::UP).is_air()
                    && state.block(pos + Vec3::new(0, 2, 0)).is_air())
            }
            SimCheck::SafeStepDown => {
                let pos = require_position(args, 0, "target")?;
                Ok(state.block(pos + Vec3::DOWN).is_solid()
                    && state.block(pos).is_air()
                    && state.block(pos + Vec3::UP).is_air())
            }
            SimCheck::BlockIs => {
                let pos = require_position(args, 0, "target")?;
                let want = require_string(args, 1, "id")?;
                Ok(normalize_block_name(&state.block(pos).name) == normalize_block_name(want))
            }
            SimCheck::HasItem => {
                let id = require_string(args, 0, "id")?;
                Ok(state.inventory.get(normalize_block_name(id)).copied().unwrap_or(0) > 0)
            }
            SimCheck::IsHazard => {
                let tag = require_string(args, 0, "tag")?;
                let center = state.pose.position;
                let hazard = match tag {
                    "gravel_overhead" => state.has_gravity_overhead(center),
                    "lava_near" => (-2..=2).any(|dx| {
                        (-2..=2).any(|dz| {
                            state.block(center + Vec3::new(dx, 0, dz)).name.contains("lava")
                        })
                    }),
                    _ => false,
                };
                Ok(hazard)
            }
        }
    }
}
