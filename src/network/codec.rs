//! Wire Codec
//!
//! Pure functions converting world snapshots and input commands to and from
//! their fixed binary layouts (see `schema`). Decoders validate the length
//! implied by the header before reading anything, so a short buffer is an
//! error rather than an out-of-bounds read.
//!
//! Snapshot layout:
//!
//! ```text
//! [u8 packetType][u8 entityCount][u32 ackSeq][f64 timestamp]
//! { [u16 slot][f32 x][f32 y][f32 dx][f32 dy][f32 radius][u16 latencyMs] } x entityCount
//! [u8 hasBall] ( [f32 x][f32 y][f32 dx][f32 dy] )?
//! ```

use bytes::Buf;

use crate::core::vec2::Vec2;
use crate::network::message::{
    AuxAction, BallState, EntityState, InputAction, InputCommand, WorldSnapshot,
};
use crate::network::schema::{
    InputRecord, SnapshotHeader, PACKET_INPUT, PACKET_SNAPSHOT,
};

/// Maximum entities in one snapshot (u8 count field).
pub const MAX_ENTITIES: usize = u8::MAX as usize;

/// Size of the ball presence byte.
const BALL_FLAG_SIZE: usize = 1;

/// Codec errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CodecError {
    /// Buffer shorter than the layout requires.
    #[error("Truncated packet: expected {expected} bytes, got {actual}")]
    TruncatedPacket {
        /// Bytes the header implies.
        expected: usize,
        /// Bytes received.
        actual: usize,
    },

    /// Zero-length buffer.
    #[error("Empty packet")]
    EmptyPacket,

    /// Leading byte is not a known packet type.
    #[error("Unknown packet type 0x{0:02x}")]
    UnknownPacketType(u8),

    /// Known packet type, but not the one being decoded.
    #[error("Unexpected packet type 0x{found:02x}, expected 0x{expected:02x}")]
    UnexpectedPacketType {
        /// Type the decoder handles.
        expected: u8,
        /// Type found in the buffer.
        found: u8,
    },

    /// Ball presence byte other than 0 or 1.
    #[error("Invalid ball flag {0}")]
    InvalidBallFlag(u8),

    /// Input flags with unknown bits set.
    #[error("Invalid input flags 0x{0:02x}")]
    InvalidFlags(u8),

    /// Unknown auxiliary action tag.
    #[error("Invalid aux action tag {0}")]
    InvalidAuxTag(u8),

    /// Snapshot has more entities than the count field can carry.
    #[error("Too many entities: {0} (max {MAX_ENTITIES})")]
    TooManyEntities(usize),
}

/// Kind of a binary packet, from its leading byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    /// World snapshot (host -> client).
    Snapshot,
    /// Input command (client -> host).
    Input,
}

/// Classify a binary packet without decoding it.
pub fn peek_packet_type(data: &[u8]) -> Result<PacketKind, CodecError> {
    match data.first() {
        None => Err(CodecError::EmptyPacket),
        Some(&PACKET_SNAPSHOT) => Ok(PacketKind::Snapshot),
        Some(&PACKET_INPUT) => Ok(PacketKind::Input),
        Some(&other) => Err(CodecError::UnknownPacketType(other)),
    }
}

/// Encoded length of a snapshot with `entity_count` entities.
pub fn snapshot_len(entity_count: usize, has_ball: bool) -> usize {
    SnapshotHeader::WIRE_SIZE
        + entity_count * EntityState::WIRE_SIZE
        + BALL_FLAG_SIZE
        + if has_ball { BallState::WIRE_SIZE } else { 0 }
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Encode a snapshot for one recipient.
///
/// `recipient_ack` is written in place of `snapshot.sequence_ack`, so a single
/// captured snapshot can be encoded once per recipient.
pub fn encode_snapshot(
    snapshot: &WorldSnapshot,
    recipient_ack: u32,
) -> Result<Vec<u8>, CodecError> {
    let count = snapshot.entities.len();
    if count > MAX_ENTITIES {
        return Err(CodecError::TooManyEntities(count));
    }

    let mut buf = Vec::with_capacity(snapshot_len(count, snapshot.ball.is_some()));

    SnapshotHeader {
        packet_type: PACKET_SNAPSHOT,
        entity_count: count as u8,
        ack_seq: recipient_ack,
        timestamp: snapshot.timestamp,
    }
    .write_to(&mut buf);

    for entity in &snapshot.entities {
        entity.write_to(&mut buf);
    }

    match &snapshot.ball {
        Some(ball) => {
            buf.push(1);
            ball.write_to(&mut buf);
        }
        None => buf.push(0),
    }

    Ok(buf)
}

/// Decode a snapshot.
///
/// Trailing bytes after the layout are ignored.
pub fn decode_snapshot(data: &[u8]) -> Result<WorldSnapshot, CodecError> {
    expect_type(data, PACKET_SNAPSHOT)?;
    require(data, SnapshotHeader::WIRE_SIZE)?;

    let mut cursor = data;
    let header = SnapshotHeader::read_from(&mut cursor);
    let count = header.entity_count as usize;

    // Everything up to and including the ball flag
    require(data, snapshot_len(count, false))?;

    let mut entities = Vec::with_capacity(count);
    for _ in 0..count {
        entities.push(EntityState::read_from(&mut cursor));
    }

    let ball = match cursor.get_u8() {
        0 => None,
        1 => {
            require(data, snapshot_len(count, true))?;
            Some(BallState::read_from(&mut cursor))
        }
        flag => return Err(CodecError::InvalidBallFlag(flag)),
    };

    Ok(WorldSnapshot {
        sequence_ack: header.ack_seq,
        timestamp: header.timestamp,
        entities,
        ball,
    })
}

// =============================================================================
// INPUT
// =============================================================================

/// Encode an input command (always `InputRecord::WIRE_SIZE` bytes).
pub fn encode_input(cmd: &InputCommand) -> Vec<u8> {
    let action = &cmd.action;
    let mut flags = 0;
    if action.direction.is_some() {
        flags |= InputRecord::FLAG_DIRECTION;
    }
    if action.dash {
        flags |= InputRecord::FLAG_DASH;
    }
    let direction = action.direction.unwrap_or(Vec2::ZERO);

    let mut buf = Vec::with_capacity(InputRecord::WIRE_SIZE);
    InputRecord {
        packet_type: PACKET_INPUT,
        sequence: cmd.sequence,
        flags,
        dir_x: direction.x,
        dir_y: direction.y,
        cursor_x: action.cursor.x,
        cursor_y: action.cursor.y,
        timestamp: cmd.timestamp,
        aux_tag: action.aux.tag(),
        aux_payload: action.aux.payload(),
    }
    .write_to(&mut buf);
    buf
}

/// Decode an input command.
pub fn decode_input(data: &[u8]) -> Result<InputCommand, CodecError> {
    expect_type(data, PACKET_INPUT)?;
    require(data, InputRecord::WIRE_SIZE)?;

    let mut cursor = data;
    let record = InputRecord::read_from(&mut cursor);

    if record.flags & !InputRecord::KNOWN_FLAGS != 0 {
        return Err(CodecError::InvalidFlags(record.flags));
    }
    let aux = AuxAction::from_wire(record.aux_tag, record.aux_payload)
        .ok_or(CodecError::InvalidAuxTag(record.aux_tag))?;

    let direction = (record.flags & InputRecord::FLAG_DIRECTION != 0)
        .then(|| Vec2::new(record.dir_x, record.dir_y));

    Ok(InputCommand {
        sequence: record.sequence,
        action: InputAction {
            direction,
            dash: record.flags & InputRecord::FLAG_DASH != 0,
            aux,
            cursor: Vec2::new(record.cursor_x, record.cursor_y),
        },
        timestamp: record.timestamp,
    })
}

// =============================================================================
// HELPERS
// =============================================================================

fn expect_type(data: &[u8], expected: u8) -> Result<(), CodecError> {
    let kind = peek_packet_type(data)?;
    let found = match kind {
        PacketKind::Snapshot => PACKET_SNAPSHOT,
        PacketKind::Input => PACKET_INPUT,
    };
    if found == expected {
        Ok(())
    } else {
        Err(CodecError::UnexpectedPacketType { expected, found })
    }
}

#[inline]
fn require(data: &[u8], expected: usize) -> Result<(), CodecError> {
    if data.len() < expected {
        Err(CodecError::TruncatedPacket {
            expected,
            actual: data.len(),
        })
    } else {
        Ok(())
    }
}
