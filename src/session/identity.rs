//! Identity Map
//!
//! Bidirectional `slot <-> participant` mapping. The host owns the
//! authoritative copy and assigns slots; clients hold a read-only replica
//! rebuilt from every roster message. Slots are handed out once per session
//! and never reused, so a stale snapshot can never attribute one
//! participant's entity to another.

use std::collections::{BTreeMap, HashMap};

use crate::network::message::{SlotId, HOST_SLOT};
use crate::network::protocol::{ParticipantId, RosterEntry};

/// Identity map errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    /// Every slot value has been handed out.
    #[error("Slot space exhausted")]
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Member {
    participant: ParticipantId,
    name: String,
}

/// Bidirectional slot map.
#[derive(Debug, Clone, Default)]
pub struct IdentityMap {
    by_slot: BTreeMap<SlotId, Member>,
    by_participant: HashMap<ParticipantId, SlotId>,
    next_slot: SlotId,
}

impl IdentityMap {
    /// Empty map (client replica before the first roster).
    pub fn new() -> Self {
        Self::default()
    }

    /// Host map with the host in slot 0.
    pub fn with_host(host: ParticipantId, name: impl Into<String>) -> Self {
        let mut map = Self::new();
        map.insert(HOST_SLOT, host, name.into());
        map.next_slot = HOST_SLOT + 1;
        map
    }

    fn insert(&mut self, slot: SlotId, participant: ParticipantId, name: String) {
        self.by_slot.insert(slot, Member { participant, name });
        self.by_participant.insert(participant, slot);
    }

    /// Assign the next unused slot, or return the participant's existing one.
    pub fn assign(
        &mut self,
        participant: ParticipantId,
        name: impl Into<String>,
    ) -> Result<SlotId, IdentityError> {
        if let Some(&slot) = self.by_participant.get(&participant) {
            return Ok(slot);
        }
        let slot = self.next_slot;
        self.next_slot = slot.checked_add(1).ok_or(IdentityError::Exhausted)?;
        self.insert(slot, participant, name.into());
        Ok(slot)
    }

    /// Remove a participant. The slot is retired, not recycled.
    pub fn release(&mut self, participant: &ParticipantId) -> Option<SlotId> {
        let slot = self.by_participant.remove(participant)?;
        self.by_slot.remove(&slot);
        Some(slot)
    }

    /// Slot of a participant.
    pub fn slot_of(&self, participant: &ParticipantId) -> Option<SlotId> {
        self.by_participant.get(participant).copied()
    }

    /// Participant in a slot.
    pub fn participant_of(&self, slot: SlotId) -> Option<ParticipantId> {
        self.by_slot.get(&slot).map(|m| m.participant)
    }

    /// Display name in a slot.
    pub fn name_of(&self, slot: SlotId) -> Option<&str> {
        self.by_slot.get(&slot).map(|m| m.name.as_str())
    }

    /// Whether a slot is currently mapped.
    pub fn contains_slot(&self, slot: SlotId) -> bool {
        self.by_slot.contains_key(&slot)
    }

    /// Members in slot order.
    pub fn roster(&self) -> Vec<RosterEntry> {
        self.by_slot
            .iter()
            .map(|(&slot, m)| RosterEntry {
                slot,
                participant: m.participant,
                name: m.name.clone(),
            })
            .collect()
    }

    /// Replace the whole map from a roster (client side).
    pub fn replace_from_roster(&mut self, entries: &[RosterEntry]) {
        self.by_slot.clear();
        self.by_participant.clear();
        for entry in entries {
            self.insert(entry.slot, entry.participant, entry.name.clone());
        }
        let highest = entries.iter().map(|e| e.slot).max();
        self.next_slot = self.next_slot.max(highest.map_or(0, |s| s.saturating_add(1)));
    }

    /// Number of mapped members.
    pub fn len(&self) -> usize {
        self.by_slot.len()
    }

    /// True with no members.
    pub fn is_empty(&self) -> bool {
        self.by_slot.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_host_is_slot_zero() {
        let host = Uuid::new_v4();
        let map = IdentityMap::with_host(host, "host");
        assert_eq!(map.slot_of(&host), Some(HOST_SLOT));
        assert_eq!(map.participant_of(0), Some(host));
        assert_eq!(map.name_of(0), Some("host"));
    }

    #[test]
    fn test_slots_never_reused() {
        let mut map = IdentityMap::with_host(Uuid::new_v4(), "host");
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        assert_eq!(map.assign(a, "a").unwrap(), 1);
        assert_eq!(map.release(&a), Some(1));
        assert!(!map.contains_slot(1));

        assert_eq!(map.assign(b, "b").unwrap(), 2);
        // Reassigning the same participant is stable
        assert_eq!(map.assign(b, "b").unwrap(), 2);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_roster_roundtrip() {
        let mut host_map = IdentityMap::with_host(Uuid::new_v4(), "host");
        host_map.assign(Uuid::new_v4(), "a").unwrap();
        host_map.assign(Uuid::new_v4(), "b").unwrap();

        let mut replica = IdentityMap::new();
        replica.replace_from_roster(&host_map.roster());
        assert_eq!(replica.roster(), host_map.roster());
        assert!(replica.contains_slot(2));

        // A shrinking roster drops members
        let entries: Vec<_> = host_map.roster().into_iter().take(1).collect();
        replica.replace_from_roster(&entries);
        assert_eq!(replica.len(), 1);
        assert!(!replica.contains_slot(2));
    }

    #[test]
    fn test_exhaustion() {
        let mut map = IdentityMap::new();
        map.next_slot = SlotId::MAX;
        assert_eq!(map.assign(Uuid::new_v4(), "x"), Err(IdentityError::Exhausted));
    }
}
