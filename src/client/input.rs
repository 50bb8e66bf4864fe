//! Input Capture and Replay
//!
//! Every captured input gets the next sequence number, is applied to the
//! local predicted entity immediately, and is kept until a snapshot
//! acknowledges it. Unacknowledged inputs are replayed on top of each
//! authoritative correction.

use std::collections::VecDeque;

use tracing::debug;

use crate::core::vec2::Vec2;
use crate::network::message::{InputAction, InputCommand};

/// Ordered store of unacknowledged inputs.
#[derive(Debug, Clone)]
pub struct ReplayBuffer {
    entries: VecDeque<InputCommand>,
    capacity: usize,
    last_ack: u32,
    overflowed: u64,
}

impl ReplayBuffer {
    /// Create a buffer holding at most `capacity` inputs.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            last_ack: 0,
            overflowed: 0,
        }
    }

    /// Append an input. When full, the oldest entry is dropped.
    pub fn push(&mut self, cmd: InputCommand) {
        if self.entries.len() >= self.capacity {
            if let Some(dropped) = self.entries.pop_front() {
                self.overflowed += 1;
                debug!(sequence = dropped.sequence, "replay buffer full, dropped oldest input");
            }
        }
        self.entries.push_back(cmd);
    }

    /// Drop every entry with `sequence <= ack`. Returns how many were dropped.
    pub fn acknowledge(&mut self, ack: u32) -> usize {
        self.last_ack = self.last_ack.max(ack);
        let before = self.entries.len();
        while self.entries.front().map_or(false, |e| e.sequence <= ack) {
            self.entries.pop_front();
        }
        before - self.entries.len()
    }

    /// Re-apply every remaining entry, in sequence order. Returns the count.
    pub fn replay_all<E, F>(&self, entity: &mut E, mut apply: F) -> usize
    where
        F: FnMut(&mut E, &InputAction),
    {
        for cmd in &self.entries {
            apply(entity, &cmd.action);
        }
        self.entries.len()
    }

    /// Remaining entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &InputCommand> {
        self.entries.iter()
    }

    /// Number of unacknowledged inputs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when every input has been acknowledged.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest acknowledgment seen.
    pub fn last_ack(&self) -> u32 {
        self.last_ack
    }

    /// Inputs lost to the capacity bound.
    pub fn overflowed(&self) -> u64 {
        self.overflowed
    }

    /// Forget everything (new round).
    pub fn clear(&mut self) {
        self.entries.clear();
        self.last_ack = 0;
    }
}

impl Default for ReplayBuffer {
    fn default() -> Self {
        Self::new(60)
    }
}

/// Assigns sequences and records captured inputs.
#[derive(Debug, Clone)]
pub struct InputCapture {
    next_sequence: u32,
    buffer: ReplayBuffer,
}

impl InputCapture {
    /// Create a capture with an empty replay buffer of `capacity`.
    pub fn new(capacity: usize) -> Self {
        Self {
            next_sequence: 1,
            buffer: ReplayBuffer::new(capacity),
        }
    }

    /// Capture one input.
    ///
    /// The action is aimed at `cursor`, applied to `entity` through `apply`,
    /// and stored for replay. The returned command carries the assigned
    /// sequence and is what goes on the wire.
    pub fn capture<E, F>(
        &mut self,
        mut action: InputAction,
        cursor: Vec2,
        now_ms: f64,
        entity: &mut E,
        mut apply: F,
    ) -> InputCommand
    where
        F: FnMut(&mut E, &InputAction),
    {
        action.cursor = cursor;
        apply(entity, &action);

        let cmd = InputCommand {
            sequence: self.next_sequence,
            action,
            timestamp: now_ms,
        };
        self.next_sequence = self.next_sequence.wrapping_add(1).max(1);
        self.buffer.push(cmd);
        cmd
    }

    /// Sequence of the most recent capture (0 before the first).
    pub fn last_sequence(&self) -> u32 {
        self.next_sequence.wrapping_sub(1)
    }

    /// The replay buffer.
    pub fn buffer(&self) -> &ReplayBuffer {
        &self.buffer
    }

    /// The replay buffer, mutably (reconciliation acknowledges through it).
    pub fn buffer_mut(&mut self) -> &mut ReplayBuffer {
        &mut self.buffer
    }

    /// Restart sequences and clear pending inputs.
    pub fn reset(&mut self) {
        self.next_sequence = 1;
        self.buffer.clear();
    }
}

impl Default for InputCapture {
    fn default() -> Self {
        Self::new(60)
    }
}

/// Spaces out movement captures.
///
/// Captures that only steer are limited to one per `interval_ms`; dashes and
/// auxiliary actions always pass.
#[derive(Debug, Clone)]
pub struct InputThrottle {
    interval_ms: f64,
    last_movement: Option<f64>,
}

impl InputThrottle {
    /// Create a throttle with the given spacing.
    pub fn new(interval_ms: f64) -> Self {
        Self {
            interval_ms,
            last_movement: None,
        }
    }

    /// Whether `action` may be captured at `now_ms`.
    pub fn admit(&mut self, action: &InputAction, now_ms: f64) -> bool {
        if action.dash || action.aux != crate::network::message::AuxAction::None {
            return true;
        }
        if action.direction.is_none() {
            return false;
        }
        match self.last_movement {
            Some(last) if now_ms - last < self.interval_ms => false,
            _ => {
                self.last_movement = Some(now_ms);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::message::AuxAction;

    fn cmd(sequence: u32) -> InputCommand {
        InputCommand {
            sequence,
            action: InputAction::movement(sequence as f32, 0.0),
            timestamp: 0.0,
        }
    }

    #[test]
    fn test_capture_assigns_increasing_sequences() {
        let mut capture = InputCapture::new(60);
        let mut applied = Vec::new();

        let mut last = 0;
        for i in 0..100 {
            let c = capture.capture(
                InputAction::movement(1.0, 0.0),
                Vec2::new(i as f32, 0.0),
                i as f64,
                &mut applied,
                |log: &mut Vec<Vec2>, a| log.push(a.cursor),
            );
            assert!(c.sequence > last);
            last = c.sequence;
        }
        assert_eq!(last, 100);
        assert_eq!(capture.last_sequence(), 100);
        assert_eq!(applied.len(), 100);
        assert_eq!(applied[5], Vec2::new(5.0, 0.0));
        assert_eq!(capture.buffer().len(), 60);
    }

    #[test]
    fn test_acknowledge_drops_prefix() {
        let mut buffer = ReplayBuffer::new(10);
        for seq in 4..=7 {
            buffer.push(cmd(seq));
        }

        assert_eq!(buffer.acknowledge(5), 2);
        let remaining: Vec<_> = buffer.iter().map(|c| c.sequence).collect();
        assert_eq!(remaining, vec![6, 7]);
        assert_eq!(buffer.last_ack(), 5);

        // Older acks never resurrect or drop anything
        assert_eq!(buffer.acknowledge(3), 0);
        assert_eq!(buffer.last_ack(), 5);
    }

    #[test]
    fn test_replay_in_sequence_order() {
        let mut buffer = ReplayBuffer::new(10);
        for seq in 1..=3 {
            buffer.push(cmd(seq));
        }

        let mut order = Vec::new();
        let count = buffer.replay_all(&mut order, |log: &mut Vec<f32>, a| {
            log.push(a.direction.map_or(0.0, |d| d.x))
        });
        assert_eq!(count, 3);
        assert_eq!(order, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let mut buffer = ReplayBuffer::new(2);
        buffer.push(cmd(1));
        buffer.push(cmd(2));
        buffer.push(cmd(3));
        assert_eq!(buffer.overflowed(), 1);
        assert_eq!(buffer.iter().next().map(|c| c.sequence), Some(2));
    }

    #[test]
    fn test_throttle() {
        let mut throttle = InputThrottle::new(33.0);
        let steer = InputAction::movement(1.0, 0.0);

        assert!(throttle.admit(&steer, 0.0));
        assert!(!throttle.admit(&steer, 20.0));
        assert!(throttle.admit(&steer, 33.0));
        assert!(throttle.admit(&InputAction::dash_toward(Vec2::ZERO), 34.0));
        assert!(throttle.admit(&InputAction::aux(AuxAction::Emote(1)), 35.0));
        assert!(!throttle.admit(&InputAction::default(), 100.0));
    }
}
