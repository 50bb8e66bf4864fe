//! Hot-Path Messages
//!
//! World snapshots (host -> client) and input commands (client -> host).
//! These are the only fixed-layout messages; everything else travels as a
//! control message.

use serde::{Serialize, Deserialize};

use crate::core::vec2::Vec2;
use crate::network::schema::wire_record;

/// Small stable alias for a participant identity. Slot 0 is the host.
pub type SlotId = u16;

/// Slot reserved for the host.
pub const HOST_SLOT: SlotId = 0;

wire_record! {
    /// One entity inside a world snapshot.
    #[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
    pub struct EntityState {
        /// Owner slot.
        pub slot: u16,
        /// Position X.
        pub x: f32,
        /// Position Y.
        pub y: f32,
        /// Velocity X.
        pub dx: f32,
        /// Velocity Y.
        pub dy: f32,
        /// Collision radius.
        pub radius: f32,
        /// Owner's measured round-trip latency (ms).
        pub latency_ms: u16,
    }
}

impl EntityState {
    /// Position as a vector.
    #[inline]
    pub fn pos(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    /// Velocity as a vector.
    #[inline]
    pub fn vel(&self) -> Vec2 {
        Vec2::new(self.dx, self.dy)
    }
}

wire_record! {
    /// Mode-dependent ball state, optional in a snapshot.
    #[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
    pub struct BallState {
        /// Position X.
        pub x: f32,
        /// Position Y.
        pub y: f32,
        /// Velocity X.
        pub dx: f32,
        /// Velocity Y.
        pub dy: f32,
    }
}

impl BallState {
    /// Position as a vector.
    #[inline]
    pub fn pos(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

/// A full positional sample of all tracked entities at one instant.
///
/// Built fresh from simulation state every broadcast tick and never mutated
/// once serialized.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Last input sequence the host applied for the addressee.
    pub sequence_ack: u32,
    /// Host wall clock at encode time (ms).
    pub timestamp: f64,
    /// Entities in slot order.
    pub entities: Vec<EntityState>,
    /// Ball, when the round mode has one.
    pub ball: Option<BallState>,
}

impl WorldSnapshot {
    /// Find the entity owned by `slot`.
    pub fn entity(&self, slot: SlotId) -> Option<&EntityState> {
        self.entities.iter().find(|e| e.slot == slot)
    }
}

/// Secondary action carried by an input command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum AuxAction {
    /// No secondary action.
    #[default]
    None,
    /// Hand the carried object to the nearest participant.
    PassObject,
    /// Spawn a decoy at the current position.
    SpawnDecoy,
    /// Show an emote (index into the shared emote table).
    Emote(u16),
}

impl AuxAction {
    /// Wire tag for this action.
    pub fn tag(self) -> u8 {
        match self {
            AuxAction::None => 0,
            AuxAction::PassObject => 1,
            AuxAction::SpawnDecoy => 2,
            AuxAction::Emote(_) => 3,
        }
    }

    /// Wire payload for this action.
    pub fn payload(self) -> u16 {
        match self {
            AuxAction::Emote(id) => id,
            _ => 0,
        }
    }

    /// Rebuild from wire tag and payload.
    pub fn from_wire(tag: u8, payload: u16) -> Option<Self> {
        match tag {
            0 => Some(AuxAction::None),
            1 => Some(AuxAction::PassObject),
            2 => Some(AuxAction::SpawnDecoy),
            3 => Some(AuxAction::Emote(payload)),
            _ => None,
        }
    }
}

/// What the participant asked for during one capture.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct InputAction {
    /// Movement direction, if any.
    pub direction: Option<Vec2>,
    /// Dash toward the cursor.
    pub dash: bool,
    /// Secondary action.
    pub aux: AuxAction,
    /// Aim reference for dash/attack direction.
    pub cursor: Vec2,
}

impl InputAction {
    /// Movement only.
    pub fn movement(dx: f32, dy: f32) -> Self {
        Self {
            direction: Some(Vec2::new(dx, dy)),
            ..Self::default()
        }
    }

    /// Dash toward a target point.
    pub fn dash_toward(cursor: Vec2) -> Self {
        Self {
            dash: true,
            cursor,
            ..Self::default()
        }
    }

    /// Secondary action only.
    pub fn aux(aux: AuxAction) -> Self {
        Self {
            aux,
            ..Self::default()
        }
    }

    /// True when the action changes motion (and is therefore replayed).
    pub fn affects_motion(&self) -> bool {
        self.direction.is_some() || self.dash
    }
}

/// A sequenced input as sent on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct InputCommand {
    /// Strictly increasing per sender; the sole ordering and dedup key.
    pub sequence: u32,
    /// The captured action.
    pub action: InputAction,
    /// Capture wall clock (ms). Never used for ordering.
    pub timestamp: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_record_layout() {
        assert_eq!(EntityState::WIRE_SIZE, 24);
        assert_eq!(BallState::WIRE_SIZE, 16);
        assert_eq!(EntityState::FIELDS[0], ("slot", 2));
        assert_eq!(EntityState::FIELDS[6], ("latency_ms", 2));
    }

    #[test]
    fn test_aux_wire_mapping() {
        for aux in [
            AuxAction::None,
            AuxAction::PassObject,
            AuxAction::SpawnDecoy,
            AuxAction::Emote(11),
        ] {
            assert_eq!(AuxAction::from_wire(aux.tag(), aux.payload()), Some(aux));
        }
        assert_eq!(AuxAction::from_wire(9, 0), None);
    }

    #[test]
    fn test_snapshot_entity_lookup() {
        let snapshot = WorldSnapshot {
            entities: vec![
                EntityState { slot: 0, x: 1.0, ..Default::default() },
                EntityState { slot: 3, x: 2.0, ..Default::default() },
            ],
            ..Default::default()
        };
        assert_eq!(snapshot.entity(3).map(|e| e.x), Some(2.0));
        assert!(snapshot.entity(1).is_none());
    }

    #[test]
    fn test_action_affects_motion() {
        assert!(InputAction::movement(1.0, 0.0).affects_motion());
        assert!(InputAction::dash_toward(Vec2::new(5.0, 5.0)).affects_motion());
        assert!(!InputAction::aux(AuxAction::Emote(1)).affects_motion());
    }
}
