//! Network Layer
//!
//! Wire formats, control protocol and the transport boundary.
//! Nothing here knows about prediction or authority; it only moves bytes.

pub mod codec;
pub mod message;
pub mod protocol;
pub mod schema;
pub mod transport;
pub mod watchdog;
pub mod ws;

pub use codec::{
    decode_input, decode_snapshot, encode_input, encode_snapshot, peek_packet_type,
    CodecError, PacketKind,
};
pub use message::{
    AuxAction, BallState, EntityState, InputAction, InputCommand, SlotId, WorldSnapshot,
    HOST_SLOT,
};
pub use protocol::{
    decode_frame, ControlMessage, GameEvent, Inbound, ParticipantId, ProtocolError,
    RosterEntry, RoundMode, ScoreEntry,
};
pub use transport::{ChannelTransport, Frame, LinkConditioner, Transport, TransportError};
pub use watchdog::Watchdog;
