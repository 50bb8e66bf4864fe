//! Simulation Boundary
//!
//! The sync core drives gameplay only through [`Simulation`]. The host feeds
//! it validated inputs and fixed steps, and captures a snapshot from it on
//! every broadcast tick. [`ArenaSimulation`] is the reference implementation,
//! built on the same [`MotionModel`] clients use for prediction.

pub mod arena;
pub mod entity;
pub mod motion;

pub use arena::{ArenaConfig, ArenaSimulation};
pub use entity::{AuthoritativeEntity, AuthoritativeState, PredictedEntity};
pub use motion::{Arena, Body, MotionModel, Pose};

use crate::core::rng::DeterministicRng;
use crate::network::message::{InputCommand, SlotId, WorldSnapshot};
use crate::network::protocol::{GameEvent, RoundMode, ScoreEntry};

/// Authoritative gameplay simulation, owned by the host session.
pub trait Simulation {
    /// Apply a validated, in-order input for `slot`.
    fn apply_input(&mut self, slot: SlotId, cmd: &InputCommand);

    /// Advance one fixed step of `dt` seconds.
    fn step(&mut self, dt: f64);

    /// Capture every entity's state. `sequence_ack` and `timestamp` are left
    /// for the broadcaster to fill per recipient.
    fn capture_snapshot(&self) -> WorldSnapshot;

    /// Current pose of one entity.
    fn entity_pose(&self, slot: SlotId) -> Option<Pose>;

    /// Create the entity for a newly joined participant. `rng` is private to
    /// the host; the result reaches clients through snapshots and events.
    fn spawn(&mut self, slot: SlotId, rng: &mut DeterministicRng) -> Pose;

    /// Remove a departed participant's entity.
    fn despawn(&mut self, slot: SlotId);

    /// Reset positions and mode state for a new round, drawing from the
    /// host-private `rng`.
    fn start_round(&mut self, mode: RoundMode, rng: &mut DeterministicRng);

    /// Take gameplay events produced since the last call.
    fn drain_events(&mut self) -> Vec<GameEvent>;

    /// Highest scorer, reported as the round winner. Ties go to the lower slot.
    fn leader(&self) -> Option<SlotId>;

    /// Current non-zero scores, in slot order.
    fn scores(&self) -> Vec<ScoreEntry>;

    /// Holder of the passable object, in modes that have one.
    fn carrier(&self) -> Option<SlotId> {
        None
    }
}
