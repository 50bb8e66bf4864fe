//! Reconciliation Engine
//!
//! Corrects the locally predicted entity toward the host's authoritative
//! state: large errors snap, moderate errors blend, tiny errors are left
//! alone. After a correction the unacknowledged inputs are replayed so the
//! prediction stays ahead of the host by exactly the inputs it has not seen.

use tracing::{debug, trace};

use crate::client::input::ReplayBuffer;
use crate::config::ReconcileConfig;
use crate::network::message::InputAction;
use crate::sim::entity::{AuthoritativeState, PredictedEntity};

/// What a reconcile call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectionKind {
    /// Position and velocity overwritten.
    Snapped,
    /// Position and velocity blended toward the authority.
    Blended,
    /// Error within tolerance; entity untouched.
    None,
    /// This authoritative state was already consumed.
    Duplicate,
    /// A newer authoritative state was already consumed.
    Superseded,
}

/// Outcome of one reconcile call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correction {
    /// Action taken.
    pub kind: CorrectionKind,
    /// Position error measured before correcting.
    pub error: f32,
    /// Inputs replayed afterwards.
    pub replayed: usize,
}

impl Correction {
    fn skipped(kind: CorrectionKind) -> Self {
        Self {
            kind,
            error: 0.0,
            replayed: 0,
        }
    }
}

/// Running totals, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReconcileStats {
    /// Hard snaps.
    pub snaps: u64,
    /// Soft blends.
    pub blends: u64,
    /// States within tolerance.
    pub untouched: u64,
    /// Repeated or out-of-date states ignored.
    pub skipped: u64,
    /// Largest error seen.
    pub max_error: f32,
}

/// Applies authoritative corrections to one predicted entity.
#[derive(Debug, Clone)]
pub struct Reconciler {
    config: ReconcileConfig,
    last_consumed: Option<(u32, f64)>,
    stats: ReconcileStats,
}

impl Reconciler {
    /// Create a reconciler with the given thresholds.
    pub fn new(config: ReconcileConfig) -> Self {
        Self {
            config,
            last_consumed: None,
            stats: ReconcileStats::default(),
        }
    }

    /// Thresholds in use.
    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Running totals.
    pub fn stats(&self) -> ReconcileStats {
        self.stats
    }

    /// Reconcile `local` against `auth`.
    ///
    /// Acknowledges `auth.ack_seq` in `replay` on every consumed state, and
    /// replays what remains through `apply` whenever the entity was corrected.
    pub fn reconcile<F>(
        &mut self,
        local: &mut PredictedEntity,
        auth: &AuthoritativeState,
        replay: &mut ReplayBuffer,
        apply: F,
    ) -> Correction
    where
        F: FnMut(&mut PredictedEntity, &InputAction),
    {
        if let Some((ack, ts)) = self.last_consumed {
            if ack == auth.ack_seq && ts == auth.timestamp {
                self.stats.skipped += 1;
                return Correction::skipped(CorrectionKind::Duplicate);
            }
            if auth.timestamp < ts || auth.ack_seq < ack {
                self.stats.skipped += 1;
                trace!(ack = auth.ack_seq, ts = auth.timestamp, "authoritative state superseded");
                return Correction::skipped(CorrectionKind::Superseded);
            }
        }
        self.last_consumed = Some((auth.ack_seq, auth.timestamp));

        let offset = auth.pos - local.pos();
        let error = offset.length();
        self.stats.max_error = self.stats.max_error.max(error);

        let kind = if error > self.config.hard_snap_threshold {
            local.body.pose.pos = auth.pos;
            local.body.pose.vel = auth.vel;
            self.stats.snaps += 1;
            debug!(error, ack = auth.ack_seq, "hard snap");
            CorrectionKind::Snapped
        } else if error > self.config.epsilon {
            let w = self.config.velocity_blend;
            local.body.pose.pos += offset * self.config.position_blend;
            local.body.pose.vel = local.vel() * (1.0 - w) + auth.vel * w;
            self.stats.blends += 1;
            trace!(error, ack = auth.ack_seq, "soft blend");
            CorrectionKind::Blended
        } else {
            self.stats.untouched += 1;
            CorrectionKind::None
        };

        replay.acknowledge(auth.ack_seq);

        let replayed = match kind {
            CorrectionKind::Snapped | CorrectionKind::Blended => replay.replay_all(local, apply),
            _ => 0,
        };

        Correction { kind, error, replayed }
    }

    /// Forget the last consumed state (new round).
    pub fn reset(&mut self) {
        self.last_consumed = None;
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(ReconcileConfig::default())
    }
}
