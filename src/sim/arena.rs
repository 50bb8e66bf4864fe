//! Reference Arena Simulation
//!
//! A small authoritative simulation used to exercise the sync core: circular
//! bodies in a walled arena, dashes with a cooldown, body bumping, and the
//! per-mode extras (a ball for soccer, a passable object for hot potato).
//!
//! Entities are kept in a `BTreeMap` so iteration, and therefore every RNG
//! draw made while iterating, happens in slot order.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::core::rng::DeterministicRng;
use crate::core::vec2::Vec2;
use crate::network::message::{BallState, InputCommand, SlotId, WorldSnapshot};
use crate::network::message::AuxAction;
use crate::network::protocol::{GameEvent, RoundMode, ScoreEntry};
use crate::sim::entity::AuthoritativeEntity;
use crate::sim::motion::{Body, MotionModel, Pose};
use crate::sim::Simulation;

/// Spawn margin from the arena walls.
const SPAWN_BORDER: f32 = 60.0;

/// Spawn placement attempts before accepting an overlapping point.
const SPAWN_ATTEMPTS: u32 = 100;

/// Tuning for the arena extras.
#[derive(Debug, Clone)]
pub struct ArenaConfig {
    /// Ticks between accepted dashes.
    pub dash_cooldown_ticks: u32,
    /// Ball radius.
    pub ball_radius: f32,
    /// Ball friction per tick.
    pub ball_friction: f32,
    /// Ball speed retained after a wall bounce.
    pub ball_restitution: f32,
    /// Fraction of the side wall (centered) that counts as a goal.
    pub goal_fraction: f32,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            dash_cooldown_ticks: 30, // 500ms at 60Hz
            ball_radius: 20.0,
            ball_friction: 0.98,
            ball_restitution: 0.8,
            goal_fraction: 1.0 / 3.0,
        }
    }
}

/// Reference authoritative simulation.
#[derive(Debug, Clone)]
pub struct ArenaSimulation {
    model: MotionModel,
    config: ArenaConfig,
    mode: RoundMode,
    entities: BTreeMap<SlotId, AuthoritativeEntity>,
    ball: Option<Body>,
    last_touch: Option<SlotId>,
    carrier: Option<SlotId>,
    events: Vec<GameEvent>,
    tick: u64,
}

impl ArenaSimulation {
    /// Create an empty arena.
    pub fn new(model: MotionModel, config: ArenaConfig) -> Self {
        Self {
            model,
            config,
            mode: RoundMode::Arena,
            entities: BTreeMap::new(),
            ball: None,
            last_touch: None,
            carrier: None,
            events: Vec::new(),
            tick: 0,
        }
    }

    /// Shared motion model.
    pub fn model(&self) -> &MotionModel {
        &self.model
    }

    /// Current round mode.
    pub fn mode(&self) -> RoundMode {
        self.mode
    }

    /// Ticks simulated since creation.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Number of live entities.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Entity by slot.
    pub fn entity(&self, slot: SlotId) -> Option<&AuthoritativeEntity> {
        self.entities.get(&slot)
    }

    /// Pick a spawn point away from other bodies.
    fn spawn_point(&self, rng: &mut DeterministicRng, radius: f32, exclude: SlotId) -> Vec2 {
        let arena = self.model.arena;
        let border = SPAWN_BORDER.max(radius);
        let span_x = (arena.width - 2.0 * border).max(0.0) as f64;
        let span_y = (arena.height - 2.0 * border).max(0.0) as f64;

        let mut point = arena.center();
        for _ in 0..SPAWN_ATTEMPTS {
            point = Vec2::new(
                border + rng.next_range(0.0, span_x) as f32,
                border + rng.next_range(0.0, span_y) as f32,
            );
            let clear = self.entities.values().filter(|e| e.slot != exclude).all(|e| {
                let pose = e.pose();
                pose.pos.distance(point) > pose.radius + radius
            });
            if clear {
                break;
            }
        }
        point
    }

    fn handle_aux(&mut self, slot: SlotId, aux: AuxAction) {
        let Some(pos) = self.entities.get(&slot).map(|e| e.pose().pos) else {
            return;
        };
        match aux {
            AuxAction::None => {}
            AuxAction::Emote(emote) => self.events.push(GameEvent::Emote { slot, emote }),
            AuxAction::SpawnDecoy => self.events.push(GameEvent::DecoySpawned {
                slot,
                x: pos.x,
                y: pos.y,
            }),
            AuxAction::PassObject => {
                if self.mode != RoundMode::HotPotato || self.carrier != Some(slot) {
                    trace!(slot, "pass ignored, not the carrier");
                    return;
                }
                let nearest = self
                    .entities
                    .values()
                    .filter(|e| e.slot != slot)
                    .min_by(|a, b| {
                        let da = a.pose().pos.distance(pos);
                        let db = b.pose().pos.distance(pos);
                        da.total_cmp(&db)
                    })
                    .map(|e| e.slot);
                if let Some(to) = nearest {
                    self.carrier = Some(to);
                    self.events.push(GameEvent::ObjectPassed { from: slot, to });
                }
            }
        }
    }

    /// Separate overlapping bodies and exchange their normal velocities.
    fn resolve_bumps(&mut self) {
        let mut poses: Vec<(SlotId, Pose)> =
            self.entities.values().map(|e| (e.slot, e.pose())).collect();

        for i in 0..poses.len() {
            for j in (i + 1)..poses.len() {
                let (a, b) = (poses[i].1, poses[j].1);
                let delta = b.pos - a.pos;
                let dist = delta.length();
                let min_dist = a.radius + b.radius;
                if dist >= min_dist || dist == 0.0 {
                    continue;
                }
                let normal = delta * (1.0 / dist);
                let push = normal * ((min_dist - dist) * 0.5);

                let va = a.vel.x * normal.x + a.vel.y * normal.y;
                let vb = b.vel.x * normal.x + b.vel.y * normal.y;
                let exchange = normal * (vb - va);

                poses[i].1.pos = a.pos - push;
                poses[i].1.vel = a.vel + exchange;
                poses[j].1.pos = b.pos + push;
                poses[j].1.vel = b.vel - exchange;
            }
        }

        for (slot, mut pose) in poses {
            self.model.confine(&mut pose);
            if let Some(entity) = self.entities.get_mut(&slot) {
                entity.body.pose = pose;
            }
        }
    }

    fn step_ball(&mut self) {
        let Some(mut ball) = self.ball else {
            return;
        };
        let cfg = &self.config;
        let arena = self.model.arena;

        // Kicks
        for entity in self.entities.values() {
            let pose = entity.pose();
            let delta = ball.pose.pos - pose.pos;
            let dist = delta.length();
            let min_dist = pose.radius + ball.pose.radius;
            if dist < min_dist && dist > 0.0 {
                let normal = delta * (1.0 / dist);
                ball.pose.pos = pose.pos + normal * min_dist;
                let kick = pose.vel.length().max(2.0) * 1.2;
                ball.pose.vel = normal * kick + pose.vel * 0.5;
                self.last_touch = Some(entity.slot);
            }
        }

        ball.pose.vel = ball.pose.vel * cfg.ball_friction;
        ball.pose.pos += ball.pose.vel;

        let r = ball.pose.radius;
        let goal_half = arena.height * cfg.goal_fraction * 0.5;
        let in_goal_mouth = (ball.pose.pos.y - arena.height * 0.5).abs() < goal_half;

        if (ball.pose.pos.x < r || ball.pose.pos.x > arena.width - r) && in_goal_mouth {
            if let Some(scorer) = self.last_touch.take() {
                if let Some(entity) = self.entities.get_mut(&scorer) {
                    entity.score += 1;
                    self.events.push(GameEvent::Score {
                        slot: scorer,
                        score: entity.score,
                    });
                }
            }
            debug!(tick = self.tick, "goal, ball reset");
            self.ball = Some(Body::at(arena.center(), r));
            return;
        }

        if ball.pose.pos.x < r || ball.pose.pos.x > arena.width - r {
            ball.pose.pos.x = ball.pose.pos.x.clamp(r, arena.width - r);
            ball.pose.vel.x = -ball.pose.vel.x * cfg.ball_restitution;
        }
        if ball.pose.pos.y < r || ball.pose.pos.y > arena.height - r {
            ball.pose.pos.y = ball.pose.pos.y.clamp(r, arena.height - r);
            ball.pose.vel.y = -ball.pose.vel.y * cfg.ball_restitution;
        }

        self.ball = Some(ball);
    }
}

impl Default for ArenaSimulation {
    fn default() -> Self {
        Self::new(MotionModel::default(), ArenaConfig::default())
    }
}

impl Simulation for ArenaSimulation {
    fn apply_input(&mut self, slot: SlotId, cmd: &InputCommand) {
        let cooldown_ticks = self.config.dash_cooldown_ticks;
        let Some(entity) = self.entities.get_mut(&slot) else {
            trace!(slot, "input for unknown entity");
            return;
        };

        let mut action = cmd.action;
        if action.dash {
            if entity.dash_cooldown > 0 {
                action.dash = false;
            } else {
                entity.dash_cooldown = cooldown_ticks;
            }
        }
        self.model.apply_action(&mut entity.body, &action);

        self.handle_aux(slot, action.aux);
    }

    fn step(&mut self, dt: f64) {
        self.tick += 1;
        let dt = dt as f32;
        for entity in self.entities.values_mut() {
            self.model.integrate(&mut entity.body, dt);
            entity.dash_cooldown = entity.dash_cooldown.saturating_sub(1);
        }
        self.resolve_bumps();
        self.step_ball();
    }

    fn capture_snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            sequence_ack: 0,
            timestamp: 0.0,
            entities: self.entities.values().map(AuthoritativeEntity::to_state).collect(),
            ball: self.ball.map(|b| BallState {
                x: b.pose.pos.x,
                y: b.pose.pos.y,
                dx: b.pose.vel.x,
                dy: b.pose.vel.y,
            }),
        }
    }

    fn entity_pose(&self, slot: SlotId) -> Option<Pose> {
        self.entities.get(&slot).map(AuthoritativeEntity::pose)
    }

    fn spawn(&mut self, slot: SlotId, rng: &mut DeterministicRng) -> Pose {
        let radius = self.model.radius;
        let pos = self.spawn_point(rng, radius, slot);
        let entity = AuthoritativeEntity::new(slot, pos, radius);
        let pose = entity.pose();
        self.entities.insert(slot, entity);
        self.events.push(GameEvent::Spawn { slot, x: pos.x, y: pos.y });
        debug!(slot, x = pos.x, y = pos.y, "entity spawned");
        pose
    }

    fn despawn(&mut self, slot: SlotId) {
        if self.entities.remove(&slot).is_none() {
            return;
        }
        if self.last_touch == Some(slot) {
            self.last_touch = None;
        }
        if self.carrier == Some(slot) {
            self.carrier = self.entities.keys().next().copied();
            if let Some(to) = self.carrier {
                self.events.push(GameEvent::ObjectPassed { from: slot, to });
            }
        }
        debug!(slot, "entity despawned");
    }

    fn start_round(&mut self, mode: RoundMode, rng: &mut DeterministicRng) {
        self.mode = mode;
        self.last_touch = None;

        let slots: Vec<SlotId> = self.entities.keys().copied().collect();
        for slot in &slots {
            let radius = self.model.radius;
            let pos = self.spawn_point(rng, radius, *slot);
            if let Some(entity) = self.entities.get_mut(slot) {
                *entity = AuthoritativeEntity::new(*slot, pos, radius);
                self.events.push(GameEvent::Respawn { slot: *slot, x: pos.x, y: pos.y });
            }
        }

        self.ball = mode
            .has_ball()
            .then(|| Body::at(self.model.arena.center(), self.config.ball_radius));
        self.carrier = match mode {
            RoundMode::HotPotato => rng.choice(&slots).copied(),
            _ => None,
        };
    }

    fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    fn leader(&self) -> Option<SlotId> {
        self.entities
            .values()
            .filter(|e| e.score > 0)
            .max_by(|a, b| a.score.cmp(&b.score).then(b.slot.cmp(&a.slot)))
            .map(|e| e.slot)
    }

    fn scores(&self) -> Vec<ScoreEntry> {
        self.entities
            .values()
            .filter(|e| e.score > 0)
            .map(|e| ScoreEntry { slot: e.slot, score: e.score })
            .collect()
    }

    fn carrier(&self) -> Option<SlotId> {
        self.carrier
    }
}
