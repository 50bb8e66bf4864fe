//! Protocol Messages
//!
//! Control messages travel as JSON text frames, tagged by `type`. Snapshots
//! and inputs travel as binary frames in the fixed layouts of `codec`.
//! Every inbound frame is decoded once, at the transport boundary, into the
//! closed [`Inbound`] enum.

use serde::{Serialize, Deserialize};
use uuid::Uuid;

use crate::network::codec::{self, CodecError, PacketKind};
use crate::network::message::{InputCommand, SlotId, WorldSnapshot};
use crate::network::transport::Frame;

/// Stable participant identity (survives slot reassignment across sessions).
pub type ParticipantId = Uuid;

// =============================================================================
// CONTROL MESSAGES
// =============================================================================

/// Variable-size control messages, both directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    /// Client asks to join the session.
    JoinRequest {
        /// Display name.
        name: String,
        /// Client crate version, for compatibility checks.
        client_version: String,
    },

    /// Host assigned a slot to the requester.
    JoinAccept {
        /// Session identifier.
        session_id: Uuid,
        /// Identity of the requester.
        participant: ParticipantId,
        /// Slot assigned to the requester.
        slot: SlotId,
    },

    /// Full identity map, pushed on every membership change.
    Roster {
        /// All current members, host included.
        entries: Vec<RosterEntry>,
    },

    /// A round begins; all participants reseed their RNG with `seed`.
    RoundStart {
        /// Round number, starting at 1.
        round: u32,
        /// Seed for the shared deterministic RNG.
        seed: u64,
        /// Round mode.
        mode: RoundMode,
    },

    /// A round ended.
    RoundEnd {
        /// Round number.
        round: u32,
        /// Winning slot, if any.
        winner: Option<SlotId>,
    },

    /// Round state for a participant that was not there when it started.
    /// Also follows every `RoundStart`, since the carrier is picked then.
    FullSync {
        /// Round number.
        round: u32,
        /// Round mode.
        mode: RoundMode,
        /// Non-zero scores, by slot.
        scores: Vec<ScoreEntry>,
        /// Hot potato carrier.
        carrier: Option<SlotId>,
        /// Simulated time since the round started (ms).
        round_elapsed_ms: f64,
    },

    /// Discrete gameplay event.
    GameEvent(GameEvent),

    /// Lobby chat line. The host rewrites `slot` to the sender's slot.
    Chat {
        /// Author slot.
        slot: SlotId,
        /// Message body.
        text: String,
    },

    /// Host liveness ping.
    Ping {
        /// Ping sequence per link.
        seq: u32,
        /// Host wall clock at send (ms), echoed back in the pong.
        sent_at: f64,
        /// Host snapshot clock at send (ms), for client clock-offset estimation.
        host_time: f64,
    },

    /// Client reply to a ping.
    Pong {
        /// Echoed ping sequence.
        seq: u32,
        /// Echoed send time.
        sent_at: f64,
    },

    /// Host is leaving; the session ends.
    HostQuit,
}

impl ControlMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Wrap in a text frame.
    pub fn to_frame(&self) -> Result<Frame, ProtocolError> {
        self.to_json()
            .map(Frame::Text)
            .map_err(|e| ProtocolError::InvalidControl(e.to_string()))
    }

    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ControlMessage::JoinRequest { .. } => "join_request",
            ControlMessage::JoinAccept { .. } => "join_accept",
            ControlMessage::Roster { .. } => "roster",
            ControlMessage::RoundStart { .. } => "round_start",
            ControlMessage::RoundEnd { .. } => "round_end",
            ControlMessage::FullSync { .. } => "full_sync",
            ControlMessage::GameEvent(_) => "game_event",
            ControlMessage::Chat { .. } => "chat",
            ControlMessage::Ping { .. } => "ping",
            ControlMessage::Pong { .. } => "pong",
            ControlMessage::HostQuit => "host_quit",
        }
    }
}

/// One identity map entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    /// Assigned slot.
    pub slot: SlotId,
    /// Participant identity.
    pub participant: ParticipantId,
    /// Display name.
    pub name: String,
}

/// One participant's score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEntry {
    /// Scoring slot.
    pub slot: SlotId,
    /// Total this round.
    pub score: u32,
}

/// Round modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundMode {
    /// Free movement, no shared object.
    #[default]
    Arena,
    /// A ball is simulated and carried in every snapshot.
    Soccer,
    /// One participant carries a hot object and can pass it.
    HotPotato,
}

impl RoundMode {
    /// Whether snapshots in this mode carry a ball block.
    pub fn has_ball(self) -> bool {
        matches!(self, RoundMode::Soccer)
    }
}

/// Discrete gameplay events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEvent {
    /// Score changed.
    Score {
        /// Scoring slot.
        slot: SlotId,
        /// New total.
        score: u32,
    },

    /// Entity spawned for a new member.
    Spawn {
        /// Owner slot.
        slot: SlotId,
        /// Spawn position.
        x: f32,
        /// Spawn position.
        y: f32,
    },

    /// Entity respawned.
    Respawn {
        /// Owner slot.
        slot: SlotId,
        /// Respawn position.
        x: f32,
        /// Respawn position.
        y: f32,
    },

    /// Emote shown.
    Emote {
        /// Emoting slot.
        slot: SlotId,
        /// Emote table index.
        emote: u16,
    },

    /// Decoy placed.
    DecoySpawned {
        /// Owner slot.
        slot: SlotId,
        /// Decoy position.
        x: f32,
        /// Decoy position.
        y: f32,
    },

    /// Carried object changed hands.
    ObjectPassed {
        /// Previous carrier.
        from: SlotId,
        /// New carrier.
        to: SlotId,
    },

    /// Member left the session.
    PlayerLeft {
        /// Slot of the leaver (never reused).
        slot: SlotId,
    },
}

// =============================================================================
// INBOUND DISPATCH
// =============================================================================

/// Every message a participant can receive, decoded once.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// World snapshot (host -> client).
    Snapshot(WorldSnapshot),
    /// Input command (client -> host).
    Input(InputCommand),
    /// Control message (either direction).
    Control(ControlMessage),
}

/// Boundary decode errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProtocolError {
    /// Binary frame failed to decode.
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Text frame is not a valid control message.
    #[error("Invalid control message: {0}")]
    InvalidControl(String),
}

/// Decode a transport frame into an [`Inbound`] message.
pub fn decode_frame(frame: &Frame) -> Result<Inbound, ProtocolError> {
    match frame {
        Frame::Binary(data) => match codec::peek_packet_type(data)? {
            PacketKind::Snapshot => Ok(Inbound::Snapshot(codec::decode_snapshot(data)?)),
            PacketKind::Input => Ok(Inbound::Input(codec::decode_input(data)?)),
        },
        Frame::Text(text) => ControlMessage::from_json(text)
            .map(Inbound::Control)
            .map_err(|e| ProtocolError::InvalidControl(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::message::InputAction;

    #[test]
    fn test_control_json_roundtrip() {
        let messages = vec![
            ControlMessage::JoinRequest {
                name: "ana".to_string(),
                client_version: crate::VERSION.to_string(),
            },
            ControlMessage::JoinAccept {
                session_id: Uuid::new_v4(),
                participant: Uuid::new_v4(),
                slot: 2,
            },
            ControlMessage::Roster {
                entries: vec![RosterEntry {
                    slot: 0,
                    participant: Uuid::new_v4(),
                    name: "host".to_string(),
                }],
            },
            ControlMessage::RoundStart { round: 1, seed: 12345, mode: RoundMode::Soccer },
            ControlMessage::RoundEnd { round: 1, winner: None },
            ControlMessage::FullSync {
                round: 3,
                mode: RoundMode::HotPotato,
                scores: vec![ScoreEntry { slot: 2, score: 4 }],
                carrier: Some(2),
                round_elapsed_ms: 1250.0,
            },
            ControlMessage::GameEvent(GameEvent::ObjectPassed { from: 1, to: 2 }),
            ControlMessage::Chat { slot: 1, text: "gg".to_string() },
            ControlMessage::Ping { seq: 4, sent_at: 1000.0, host_time: 1000.0 },
            ControlMessage::Pong { seq: 4, sent_at: 1000.0 },
            ControlMessage::HostQuit,
        ];

        for msg in messages {
            let json = msg.to_json().unwrap();
            assert_eq!(ControlMessage::from_json(&json).unwrap(), msg);
        }
    }

    #[test]
    fn test_control_tagging() {
        let json = ControlMessage::RoundStart { round: 2, seed: 7, mode: RoundMode::HotPotato }
            .to_json()
            .unwrap();
        assert!(json.contains("\"type\":\"round_start\""));
        assert!(json.contains("\"mode\":\"hot_potato\""));

        let json = ControlMessage::GameEvent(GameEvent::PlayerLeft { slot: 3 }).to_json().unwrap();
        assert!(json.contains("\"event\":\"player_left\""));
    }

    #[test]
    fn test_round_mode_ball() {
        assert!(RoundMode::Soccer.has_ball());
        assert!(!RoundMode::Arena.has_ball());
        assert!(!RoundMode::HotPotato.has_ball());
    }

    #[test]
    fn test_decode_frame_routes_by_kind() {
        let cmd = InputCommand {
            sequence: 9,
            action: InputAction::movement(1.0, 0.0),
            timestamp: 5.0,
        };
        let inbound = decode_frame(&Frame::Binary(codec::encode_input(&cmd))).unwrap();
        assert_eq!(inbound, Inbound::Input(cmd));

        let snapshot = WorldSnapshot::default();
        let bytes = codec::encode_snapshot(&snapshot, 3).unwrap();
        match decode_frame(&Frame::Binary(bytes)).unwrap() {
            Inbound::Snapshot(s) => assert_eq!(s.sequence_ack, 3),
            other => panic!("Wrong message: {other:?}"),
        }

        let frame = ControlMessage::HostQuit.to_frame().unwrap();
        assert_eq!(decode_frame(&frame).unwrap(), Inbound::Control(ControlMessage::HostQuit));
    }

    #[test]
    fn test_decode_frame_errors() {
        assert_eq!(
            decode_frame(&Frame::Binary(vec![])),
            Err(ProtocolError::Codec(CodecError::EmptyPacket))
        );
        assert!(matches!(
            decode_frame(&Frame::Binary(vec![0x01, 3])),
            Err(ProtocolError::Codec(CodecError::TruncatedPacket { .. }))
        ));
        assert!(matches!(
            decode_frame(&Frame::Text("{\"type\":\"nope\"}".to_string())),
            Err(ProtocolError::InvalidControl(_))
        ));
    }
}
