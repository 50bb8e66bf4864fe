//! Wire Schema
//!
//! Binary records are declared once as an ordered field list with fixed-width
//! types. `wire_record!` generates the struct, its byte size, the encoder and
//! the decoder from that list, so layout and code cannot drift apart.
//!
//! All fields are little-endian with no padding.

use bytes::{Buf, BufMut};

/// A fixed-width little-endian wire field.
pub trait WireField: Copy {
    /// Encoded width in bytes.
    const WIDTH: usize;

    /// Append the field to `buf`.
    fn put<B: BufMut>(self, buf: &mut B);

    /// Read the field from `buf`.
    ///
    /// The caller must have checked that `buf.remaining() >= WIDTH`.
    fn get<B: Buf>(buf: &mut B) -> Self;
}

macro_rules! impl_wire_field {
    ($ty:ty, $width:expr, $put:ident, $get:ident) => {
        impl WireField for $ty {
            const WIDTH: usize = $width;

            #[inline]
            fn put<B: BufMut>(self, buf: &mut B) {
                buf.$put(self);
            }

            #[inline]
            fn get<B: Buf>(buf: &mut B) -> Self {
                buf.$get()
            }
        }
    };
}

impl_wire_field!(u8, 1, put_u8, get_u8);
impl_wire_field!(u16, 2, put_u16_le, get_u16_le);
impl_wire_field!(u32, 4, put_u32_le, get_u32_le);
impl_wire_field!(f32, 4, put_f32_le, get_f32_le);
impl_wire_field!(f64, 8, put_f64_le, get_f64_le);

/// Declare a fixed-layout wire record.
///
/// Generates, in field order:
/// - `WIRE_SIZE`: sum of field widths
/// - `FIELDS`: `(name, width)` pairs, for diagnostics and layout tests
/// - `write_to(&self, &mut impl BufMut)`
/// - `read_from(&mut impl Buf) -> Self` (caller checks `remaining()` first)
macro_rules! wire_record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$fmeta:meta])*
                $fvis:vis $field:ident : $ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[$fmeta])*
                $fvis $field: $ty,
            )*
        }

        impl $name {
            /// Encoded size of this record in bytes.
            pub const WIRE_SIZE: usize =
                0 $( + <$ty as $crate::network::schema::WireField>::WIDTH )*;

            /// Field names and widths in wire order.
            pub const FIELDS: &'static [(&'static str, usize)] = &[
                $( (stringify!($field), <$ty as $crate::network::schema::WireField>::WIDTH), )*
            ];

            /// Append this record to `buf` in wire order.
            #[inline]
            pub fn write_to<B: ::bytes::BufMut>(&self, buf: &mut B) {
                $( $crate::network::schema::WireField::put(self.$field, buf); )*
            }

            /// Read a record from `buf`.
            ///
            /// The caller must have checked `buf.remaining() >= Self::WIRE_SIZE`.
            #[inline]
            pub fn read_from<B: ::bytes::Buf>(buf: &mut B) -> Self {
                Self {
                    $( $field: <$ty as $crate::network::schema::WireField>::get(buf), )*
                }
            }
        }
    };
}

pub(crate) use wire_record;

// =============================================================================
// PACKET RECORDS
// =============================================================================

/// Packet type byte for world snapshots.
pub const PACKET_SNAPSHOT: u8 = 0x01;

/// Packet type byte for input commands.
pub const PACKET_INPUT: u8 = 0x02;

wire_record! {
    /// Fixed header at the start of every snapshot packet.
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct SnapshotHeader {
        /// Always `PACKET_SNAPSHOT`.
        pub packet_type: u8,
        /// Number of entity records that follow.
        pub entity_count: u8,
        /// Last input sequence applied for the addressee.
        pub ack_seq: u32,
        /// Host wall clock at encode time (ms).
        pub timestamp: f64,
    }
}

wire_record! {
    /// Fixed-size input command packet.
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct InputRecord {
        /// Always `PACKET_INPUT`.
        pub packet_type: u8,
        /// Sender sequence number.
        pub sequence: u32,
        /// Bit 0: direction present. Bit 1: dash requested.
        pub flags: u8,
        /// Direction X (0 when absent).
        pub dir_x: f32,
        /// Direction Y (0 when absent).
        pub dir_y: f32,
        /// Aim reference X.
        pub cursor_x: f32,
        /// Aim reference Y.
        pub cursor_y: f32,
        /// Capture time (ms), diagnostics only.
        pub timestamp: f64,
        /// Auxiliary action tag.
        pub aux_tag: u8,
        /// Auxiliary payload (emote id), 0 otherwise.
        pub aux_payload: u16,
    }
}

impl InputRecord {
    /// Direction present flag.
    pub const FLAG_DIRECTION: u8 = 0x01;
    /// Dash requested flag.
    pub const FLAG_DASH: u8 = 0x02;
    /// Bits that carry meaning; the rest must be zero.
    pub const KNOWN_FLAGS: u8 = Self::FLAG_DIRECTION | Self::FLAG_DASH;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_widths() {
        assert_eq!(<u8 as WireField>::WIDTH, 1);
        assert_eq!(<u16 as WireField>::WIDTH, 2);
        assert_eq!(<u32 as WireField>::WIDTH, 4);
        assert_eq!(<f32 as WireField>::WIDTH, 4);
        assert_eq!(<f64 as WireField>::WIDTH, 8);
    }

    #[test]
    fn test_header_layout() {
        assert_eq!(SnapshotHeader::WIRE_SIZE, 14);
        let names: Vec<_> = SnapshotHeader::FIELDS.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, ["packet_type", "entity_count", "ack_seq", "timestamp"]);
    }

    #[test]
    fn test_input_layout() {
        assert_eq!(InputRecord::WIRE_SIZE, 33);
    }

    #[test]
    fn test_header_little_endian() {
        let header = SnapshotHeader {
            packet_type: PACKET_SNAPSHOT,
            entity_count: 2,
            ack_seq: 0x0403_0201,
            timestamp: 1.0,
        };
        let mut buf = Vec::new();
        header.write_to(&mut buf);

        assert_eq!(buf.len(), SnapshotHeader::WIRE_SIZE);
        assert_eq!(&buf[..6], &[0x01, 0x02, 0x01, 0x02, 0x03, 0x04]);
        assert_eq!(&buf[6..], &1.0f64.to_le_bytes());

        let mut slice = &buf[..];
        assert_eq!(SnapshotHeader::read_from(&mut slice), header);
        assert!(slice.is_empty());
    }
}
