//! Snapshot Broadcast
//!
//! One snapshot is captured from the simulation per broadcast tick and then
//! encoded once per recipient, because the acknowledged sequence differs per
//! addressee. Entity latency fields are filled from the host's link stats
//! before encoding.

use crate::network::codec::{encode_snapshot, CodecError};
use crate::network::message::{SlotId, WorldSnapshot};

/// Broadcast every `every` simulation ticks.
#[derive(Debug, Clone)]
pub struct BroadcastSchedule {
    every: u32,
    counter: u32,
}

impl BroadcastSchedule {
    /// `every` is clamped to at least 1.
    pub fn new(every: u32) -> Self {
        Self {
            every: every.max(1),
            counter: 0,
        }
    }

    /// Count one tick; true when a broadcast is due.
    pub fn tick(&mut self) -> bool {
        self.counter += 1;
        if self.counter >= self.every {
            self.counter = 0;
            true
        } else {
            false
        }
    }

    /// Restart the count (round start).
    pub fn reset(&mut self) {
        self.counter = 0;
    }
}

/// Stamp `snapshot` with the broadcast time and per-slot latency.
pub fn stamp<F>(snapshot: &mut WorldSnapshot, timestamp: f64, mut latency_of: F)
where
    F: FnMut(SlotId) -> u16,
{
    snapshot.timestamp = timestamp;
    for entity in &mut snapshot.entities {
        entity.latency_ms = latency_of(entity.slot);
    }
}

/// Encode one snapshot for each `(recipient, ack)` pair.
pub fn encode_per_recipient<K: Copy>(
    snapshot: &WorldSnapshot,
    recipients: &[(K, u32)],
) -> Result<Vec<(K, Vec<u8>)>, CodecError> {
    recipients
        .iter()
        .map(|&(key, ack)| encode_snapshot(snapshot, ack).map(|bytes| (key, bytes)))
        .collect()
}
