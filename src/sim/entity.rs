//! Entities
//!
//! The host owns [`AuthoritativeEntity`] values; a client owns exactly one
//! [`PredictedEntity`] for its own slot. The two never mix: the only bridge
//! is an [`AuthoritativeState`] decoded from a snapshot and handed to the
//! reconciler.

use crate::core::vec2::Vec2;
use crate::network::message::{EntityState, SlotId, WorldSnapshot};
use crate::sim::motion::{Body, MotionModel, Pose};
use crate::network::message::InputAction;

/// Host-side entity, the source of truth for one slot.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthoritativeEntity {
    /// Owner slot.
    pub slot: SlotId,
    /// Kinematic body.
    pub body: Body,
    /// Ticks until the next dash is accepted.
    pub dash_cooldown: u32,
    /// Round score.
    pub score: u32,
}

impl AuthoritativeEntity {
    /// Entity at rest at `pos`.
    pub fn new(slot: SlotId, pos: Vec2, radius: f32) -> Self {
        Self {
            slot,
            body: Body::at(pos, radius),
            dash_cooldown: 0,
            score: 0,
        }
    }

    /// Current pose.
    pub fn pose(&self) -> Pose {
        self.body.pose
    }

    /// Snapshot record for this entity (latency filled in by the broadcaster).
    pub fn to_state(&self) -> EntityState {
        let pose = self.body.pose;
        EntityState {
            slot: self.slot,
            x: pose.pos.x,
            y: pose.pos.y,
            dx: pose.vel.x,
            dy: pose.vel.y,
            radius: pose.radius,
            latency_ms: 0,
        }
    }
}

/// Client-side locally simulated entity.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictedEntity {
    /// Owner slot.
    pub slot: SlotId,
    /// Kinematic body.
    pub body: Body,
}

impl PredictedEntity {
    /// Predicted entity at rest at `pos`.
    pub fn new(slot: SlotId, pos: Vec2, radius: f32) -> Self {
        Self {
            slot,
            body: Body::at(pos, radius),
        }
    }

    /// Position.
    #[inline]
    pub fn pos(&self) -> Vec2 {
        self.body.pose.pos
    }

    /// Velocity.
    #[inline]
    pub fn vel(&self) -> Vec2 {
        self.body.pose.vel
    }

    /// Current pose.
    pub fn pose(&self) -> Pose {
        self.body.pose
    }

    /// Apply an input locally.
    pub fn apply(&mut self, model: &MotionModel, action: &InputAction) {
        model.apply_action(&mut self.body, action);
    }

    /// Advance local prediction one fixed step.
    pub fn step(&mut self, model: &MotionModel, dt: f32) {
        model.integrate(&mut self.body, dt);
    }
}

/// The host's view of one entity, as decoded from a snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AuthoritativeState {
    /// Authoritative position.
    pub pos: Vec2,
    /// Authoritative velocity.
    pub vel: Vec2,
    /// Last input sequence the host applied for this client.
    pub ack_seq: u32,
    /// Snapshot timestamp (ms).
    pub timestamp: f64,
}

impl AuthoritativeState {
    /// Extract the state for `slot` from a decoded snapshot.
    pub fn from_snapshot(snapshot: &WorldSnapshot, slot: SlotId) -> Option<Self> {
        snapshot.entity(slot).map(|e| Self {
            pos: e.pos(),
            vel: e.vel(),
            ack_seq: snapshot.sequence_ack,
            timestamp: snapshot.timestamp,
        })
    }
}
