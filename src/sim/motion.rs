//! Motion Model
//!
//! Kinematics shared by host simulation and client prediction. Both sides
//! must apply an input the same way, or every input turns into a correction.
//!
//! Velocities are in arena units per tick; the integrator runs once per
//! fixed step.

use serde::{Serialize, Deserialize};

use crate::core::vec2::Vec2;
use crate::network::message::InputAction;

/// Position, velocity and size of one body.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    /// Position.
    pub pos: Vec2,
    /// Velocity (units per tick).
    pub vel: Vec2,
    /// Collision radius.
    pub radius: f32,
}

/// A moving body.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Body {
    /// Current pose.
    pub pose: Pose,
    /// Seconds of dash left; low friction while positive.
    pub dash_remaining: f32,
}

impl Body {
    /// Body at rest at `pos`.
    pub fn at(pos: Vec2, radius: f32) -> Self {
        Self {
            pose: Pose {
                pos,
                vel: Vec2::ZERO,
                radius,
            },
            dash_remaining: 0.0,
        }
    }

    /// True while a dash is in progress.
    pub fn is_dashing(&self) -> bool {
        self.dash_remaining > 0.0
    }
}

/// Arena bounds, origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Arena {
    /// Width.
    pub width: f32,
    /// Height.
    pub height: f32,
}

impl Arena {
    /// Arena center.
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width * 0.5, self.height * 0.5)
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self {
            width: 1920.0,
            height: 1080.0,
        }
    }
}

/// Tuning for the shared kinematics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotionModel {
    /// Velocity added per unit of input direction.
    pub speed: f32,
    /// Speed set by a dash.
    pub dash_force: f32,
    /// Dash duration in seconds.
    pub dash_duration: f32,
    /// Friction while dashing.
    pub dash_friction: f32,
    /// Speed-tiered friction `(min_speed, friction)`, highest tier first.
    pub friction_tiers: Vec<(f32, f32)>,
    /// Friction below every tier.
    pub base_friction: f32,
    /// Default body radius.
    pub radius: f32,
    /// Arena bounds.
    pub arena: Arena,
}

impl Default for MotionModel {
    fn default() -> Self {
        Self {
            speed: 0.6,
            dash_force: 17.5,
            dash_duration: 0.48,
            dash_friction: 0.99995,
            friction_tiers: vec![(10.0, 0.985), (6.0, 0.975), (3.0, 0.965), (1.5, 0.955)],
            base_friction: 0.93,
            radius: 30.0,
            arena: Arena::default(),
        }
    }
}

impl MotionModel {
    /// Apply one input action to a body.
    ///
    /// This is the operation replayed after reconciliation, so it only touches
    /// velocity and dash state; position changes happen in [`integrate`](Self::integrate).
    pub fn apply_action(&self, body: &mut Body, action: &InputAction) {
        if let Some(dir) = action.direction {
            let dir = sanitize_direction(dir);
            body.pose.vel += dir * self.speed;
        }

        if action.dash && action.cursor.is_finite() {
            let aim = (action.cursor - body.pose.pos).normalize_or_zero();
            if aim != Vec2::ZERO {
                body.pose.vel = aim * self.dash_force;
                body.dash_remaining = self.dash_duration;
            }
        }
    }

    /// Friction factor for a body at its current speed.
    pub fn friction_for(&self, body: &Body) -> f32 {
        if body.is_dashing() {
            return self.dash_friction;
        }
        let speed = body.pose.vel.length();
        self.friction_tiers
            .iter()
            .find(|(min_speed, _)| speed > *min_speed)
            .map_or(self.base_friction, |(_, friction)| *friction)
    }

    /// Advance a body by one fixed step of `dt` seconds.
    pub fn integrate(&self, body: &mut Body, dt: f32) {
        let friction = self.friction_for(body);
        body.pose.vel = body.pose.vel * friction;
        body.pose.pos += body.pose.vel;

        if body.dash_remaining > 0.0 {
            body.dash_remaining = (body.dash_remaining - dt).max(0.0);
        }

        self.confine(&mut body.pose);
    }

    /// Keep a pose inside the arena, zeroing velocity into the wall.
    pub fn confine(&self, pose: &mut Pose) {
        let r = pose.radius;
        let (max_x, max_y) = (self.arena.width - r, self.arena.height - r);

        if pose.pos.x < r {
            pose.pos.x = r;
            pose.vel.x = pose.vel.x.max(0.0);
        } else if pose.pos.x > max_x {
            pose.pos.x = max_x;
            pose.vel.x = pose.vel.x.min(0.0);
        }

        if pose.pos.y < r {
            pose.pos.y = r;
            pose.vel.y = pose.vel.y.max(0.0);
        } else if pose.pos.y > max_y {
            pose.pos.y = max_y;
            pose.vel.y = pose.vel.y.min(0.0);
        }
    }
}

/// Clamp a requested direction to unit length; non-finite input is ignored.
fn sanitize_direction(dir: Vec2) -> Vec2 {
    if !dir.is_finite() {
        return Vec2::ZERO;
    }
    if dir.length_squared() > 1.0 {
        dir.normalize_or_zero()
    } else {
        dir
    }
}
