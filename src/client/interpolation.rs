//! Interpolation Buffer
//!
//! Remote entities are rendered a fixed delay behind the host clock, blending
//! between the two buffered snapshots that bracket the render time. Snapshots
//! may arrive out of order; the buffer keeps them sorted by timestamp.
//!
//! Retention is measured from the newest buffered timestamp, never from the
//! local clock, so host/client clock skew cannot empty the buffer.

use std::collections::VecDeque;

use tracing::trace;

use crate::config::InterpolationConfig;
use crate::core::vec2::Vec2;
use crate::network::message::{BallState, EntityState, SlotId, WorldSnapshot};

/// Blended pose of one remote entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterpolatedPose {
    /// Owner slot.
    pub slot: SlotId,
    /// Position.
    pub pos: Vec2,
    /// Velocity.
    pub vel: Vec2,
    /// Radius, from the nearer sample.
    pub radius: f32,
    /// Owner latency, from the nearer sample.
    pub latency_ms: u16,
}

impl From<&EntityState> for InterpolatedPose {
    fn from(e: &EntityState) -> Self {
        Self {
            slot: e.slot,
            pos: e.pos(),
            vel: e.vel(),
            radius: e.radius,
            latency_ms: e.latency_ms,
        }
    }
}

/// Time-ordered snapshot store.
#[derive(Debug, Clone)]
pub struct InterpolationBuffer {
    snapshots: VecDeque<WorldSnapshot>,
    config: InterpolationConfig,
}

impl InterpolationBuffer {
    /// Create an empty buffer.
    pub fn new(config: InterpolationConfig) -> Self {
        Self {
            snapshots: VecDeque::with_capacity(config.capacity),
            config,
        }
    }

    /// Insert a snapshot in timestamp order.
    ///
    /// A snapshot with the same timestamp as a buffered one replaces it.
    /// Returns false if the snapshot was rejected (non-finite timestamp, or
    /// already older than the retention window).
    pub fn push(&mut self, snapshot: WorldSnapshot) -> bool {
        let ts = snapshot.timestamp;
        if !ts.is_finite() {
            return false;
        }
        if let Some(newest) = self.newest_timestamp() {
            if ts < newest - self.config.retention_ms {
                trace!(ts, newest, "snapshot older than retention window");
                return false;
            }
        }

        let idx = self.snapshots.partition_point(|s| s.timestamp < ts);
        match self.snapshots.get_mut(idx) {
            Some(existing) if existing.timestamp == ts => *existing = snapshot,
            _ => self.snapshots.insert(idx, snapshot),
        }

        self.evict();
        true
    }

    fn evict(&mut self) {
        let Some(newest) = self.newest_timestamp() else {
            return;
        };
        let cutoff = newest - self.config.retention_ms;
        while self.snapshots.front().map_or(false, |s| s.timestamp < cutoff) {
            self.snapshots.pop_front();
        }
        while self.snapshots.len() > self.config.capacity {
            self.snapshots.pop_front();
        }
    }

    /// Render time for a given host clock reading.
    #[inline]
    pub fn render_time(&self, host_now: f64) -> f64 {
        host_now - self.config.delay_ms
    }

    /// Latest snapshot at or before `t`, and earliest strictly after it.
    fn bracket(&self, t: f64) -> (Option<&WorldSnapshot>, Option<&WorldSnapshot>) {
        let idx = self.snapshots.partition_point(|s| s.timestamp <= t);
        let before = idx.checked_sub(1).and_then(|i| self.snapshots.get(i));
        let after = self.snapshots.get(idx);
        (before, after)
    }

    /// Pose of `slot` at `render_time`.
    ///
    /// Blends when both bracketing snapshots contain the slot; returns the
    /// single available sample otherwise; never extrapolates.
    pub fn sample_at(&self, slot: SlotId, render_time: f64) -> Option<InterpolatedPose> {
        let (before, after) = self.bracket(render_time);
        let a = before.and_then(|s| s.entity(slot).map(|e| (s.timestamp, e)));
        let b = after.and_then(|s| s.entity(slot).map(|e| (s.timestamp, e)));

        match (a, b) {
            (Some((t0, e0)), Some((t1, e1))) => {
                let alpha = blend_alpha(render_time, t0, t1);
                let nearer = if alpha < 0.5 { e0 } else { e1 };
                Some(InterpolatedPose {
                    slot,
                    pos: e0.pos().lerp(e1.pos(), alpha),
                    vel: e0.vel().lerp(e1.vel(), alpha),
                    radius: nearer.radius,
                    latency_ms: nearer.latency_ms,
                })
            }
            (Some((_, e)), None) | (None, Some((_, e))) => Some(e.into()),
            (None, None) => None,
        }
    }

    /// Poses of every slot present in either bracketing snapshot, in slot order.
    pub fn sample_all(&self, render_time: f64) -> Vec<InterpolatedPose> {
        let (before, after) = self.bracket(render_time);
        let mut slots: Vec<SlotId> = before
            .into_iter()
            .chain(after)
            .flat_map(|s| s.entities.iter().map(|e| e.slot))
            .collect();
        slots.sort_unstable();
        slots.dedup();
        slots
            .into_iter()
            .filter_map(|slot| self.sample_at(slot, render_time))
            .collect()
    }

    /// Ball at `render_time`: position blended, velocity from the older sample.
    pub fn sample_ball_at(&self, render_time: f64) -> Option<BallState> {
        let (before, after) = self.bracket(render_time);
        let a = before.and_then(|s| s.ball.map(|b| (s.timestamp, b)));
        let b = after.and_then(|s| s.ball.map(|b| (s.timestamp, b)));

        match (a, b) {
            (Some((t0, b0)), Some((t1, b1))) => {
                let pos = b0.pos().lerp(b1.pos(), blend_alpha(render_time, t0, t1));
                Some(BallState { x: pos.x, y: pos.y, dx: b0.dx, dy: b0.dy })
            }
            (Some((_, ball)), None) | (None, Some((_, ball))) => Some(ball),
            (None, None) => None,
        }
    }

    /// Timestamp of the newest buffered snapshot.
    pub fn newest_timestamp(&self) -> Option<f64> {
        self.snapshots.back().map(|s| s.timestamp)
    }

    /// Timestamp of the oldest buffered snapshot.
    pub fn oldest_timestamp(&self) -> Option<f64> {
        self.snapshots.front().map(|s| s.timestamp)
    }

    /// Buffered snapshot count.
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// True when nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Drop everything (new round).
    pub fn clear(&mut self) {
        self.snapshots.clear();
    }
}

impl Default for InterpolationBuffer {
    fn default() -> Self {
        Self::new(InterpolationConfig::default())
    }
}

#[inline]
fn blend_alpha(t: f64, t0: f64, t1: f64) -> f32 {
    if t1 <= t0 {
        return 0.0;
    }
    ((t - t0) / (t1 - t0)).clamp(0.0, 1.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;

    fn snap(ts: f64, entities: &[(SlotId, f32, f32)]) -> WorldSnapshot {
        WorldSnapshot {
            sequence_ack: 0,
            timestamp: ts,
            entities: entities
                .iter()
                .map(|&(slot, x, y)| EntityState {
                    slot,
                    x,
                    y,
                    dx: x / 10.0,
                    dy: 0.0,
                    radius: 30.0,
                    latency_ms: 0,
                })
                .collect(),
            ball: None,
        }
    }

    fn timestamps(buffer: &InterpolationBuffer) -> Vec<f64> {
        buffer.snapshots.iter().map(|s| s.timestamp).collect()
    }

    #[test]
    fn test_midpoint_is_linear() {
        let mut buffer = InterpolationBuffer::default();
        buffer.push(snap(1000.0, &[(1, 0.0, 0.0)]));
        buffer.push(snap(1100.0, &[(1, 100.0, 50.0)]));

        let pose = buffer.sample_at(1, 1050.0).unwrap();
        assert!((pose.pos.x - 50.0).abs() < 1e-4);
        assert!((pose.pos.y - 25.0).abs() < 1e-4);
        assert!((pose.vel.x - 5.0).abs() < 1e-4);

        let pose = buffer.sample_at(1, 1025.0).unwrap();
        assert!((pose.pos.x - 25.0).abs() < 1e-4);
    }

    #[test]
    fn test_exact_sample_time() {
        let mut buffer = InterpolationBuffer::default();
        buffer.push(snap(1000.0, &[(1, 0.0, 0.0)]));
        buffer.push(snap(1100.0, &[(1, 100.0, 0.0)]));

        // t == t0 selects the earlier sample as "before"
        assert_eq!(buffer.sample_at(1, 1000.0).unwrap().pos.x, 0.0);
        assert_eq!(buffer.sample_at(1, 1100.0).unwrap().pos.x, 100.0);
    }

    #[test]
    fn test_no_extrapolation() {
        let mut buffer = InterpolationBuffer::default();
        buffer.push(snap(1000.0, &[(1, 0.0, 0.0)]));
        buffer.push(snap(1100.0, &[(1, 100.0, 0.0)]));

        assert_eq!(buffer.sample_at(1, 5000.0).unwrap().pos.x, 100.0);
        assert_eq!(buffer.sample_at(1, 10.0).unwrap().pos.x, 0.0);
    }

    #[test]
    fn test_slot_in_one_sample_only() {
        let mut buffer = InterpolationBuffer::default();
        buffer.push(snap(1000.0, &[(1, 0.0, 0.0)]));
        buffer.push(snap(1100.0, &[(1, 100.0, 0.0), (2, 7.0, 8.0)]));

        let pose = buffer.sample_at(2, 1050.0).unwrap();
        assert_eq!(pose.pos, Vec2::new(7.0, 8.0));
        assert!(buffer.sample_at(3, 1050.0).is_none());
        assert_eq!(buffer.sample_all(1050.0).len(), 2);
    }

    #[test]
    fn test_empty_buffer() {
        let buffer = InterpolationBuffer::default();
        assert!(buffer.sample_at(1, 0.0).is_none());
        assert!(buffer.sample_ball_at(0.0).is_none());
    }

    #[test]
    fn test_out_of_order_arrival_is_sorted() {
        let mut arrivals: Vec<f64> = (0..20).map(|i| 10_000.0 + i as f64 * 50.0).collect();
        arrivals.shuffle(&mut StdRng::seed_from_u64(7));

        let mut buffer = InterpolationBuffer::new(InterpolationConfig {
            delay_ms: 150.0,
            retention_ms: 2_000.0,
            capacity: 60,
        });
        for ts in &arrivals {
            buffer.push(snap(*ts, &[(1, (*ts - 10_000.0) as f32, 0.0)]));
        }

        let ts = timestamps(&buffer);
        assert_eq!(ts.len(), 20);
        assert!(ts.windows(2).all(|w| w[0] < w[1]));

        // Sampling matches an in-order buffer
        let pose = buffer.sample_at(1, 10_125.0).unwrap();
        assert!((pose.pos.x - 125.0).abs() < 1e-3);
    }

    #[test]
    fn test_duplicate_timestamp_replaces() {
        let mut buffer = InterpolationBuffer::default();
        buffer.push(snap(1000.0, &[(1, 1.0, 0.0)]));
        buffer.push(snap(1000.0, &[(1, 2.0, 0.0)]));

        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.sample_at(1, 1000.0).unwrap().pos.x, 2.0);
    }

    #[test]
    fn test_eviction_relative_to_newest() {
        let mut buffer = InterpolationBuffer::default();
        // Host clock far from any local clock
        for i in 0..20 {
            buffer.push(snap(5.0e9 + i as f64 * 50.0, &[(1, 0.0, 0.0)]));
        }
        let newest = buffer.newest_timestamp().unwrap();
        assert!(buffer.oldest_timestamp().unwrap() >= newest - 500.0);
        assert_eq!(buffer.len(), 11);

        // Too old to matter
        assert!(!buffer.push(snap(newest - 501.0, &[(1, 0.0, 0.0)])));
        assert!(!buffer.push(snap(f64::NAN, &[])));
    }

    #[test]
    fn test_capacity_bound() {
        let mut buffer = InterpolationBuffer::new(InterpolationConfig {
            delay_ms: 0.0,
            retention_ms: 1.0e9,
            capacity: 5,
        });
        for i in 0..10 {
            buffer.push(snap(i as f64, &[]));
        }
        assert_eq!(timestamps(&buffer), vec![5.0, 6.0, 7.0, 8.0, 9.0]);
    }

    #[test]
    fn test_render_time() {
        let buffer = InterpolationBuffer::default();
        assert_eq!(buffer.render_time(1_000.0), 850.0);
    }

    #[test]
    fn test_ball_keeps_older_velocity() {
        let mut buffer = InterpolationBuffer::default();
        let mut a = snap(1000.0, &[]);
        a.ball = Some(BallState { x: 0.0, y: 0.0, dx: 1.0, dy: 1.0 });
        let mut b = snap(1100.0, &[]);
        b.ball = Some(BallState { x: 10.0, y: 20.0, dx: 9.0, dy: 9.0 });
        buffer.push(a);
        buffer.push(b);

        let ball = buffer.sample_ball_at(1050.0).unwrap();
        assert!((ball.x - 5.0).abs() < 1e-4);
        assert!((ball.y - 10.0).abs() < 1e-4);
        assert_eq!((ball.dx, ball.dy), (1.0, 1.0));
    }
}
