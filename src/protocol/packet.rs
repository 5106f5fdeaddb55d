//! Packet header.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Largest payload a single packet can carry.
///
/// Payloads of this size or more would have to be split across several
/// packets, which this crate does not do.
pub const MAX_PAYLOAD_LEN: usize = 0xFF_FFFF;

/// 4-byte packet header: 3-byte little-endian payload length and a sequence id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct PacketHeader {
    length: [u8; 3],
    /// Sequence number of this packet within the current command exchange
    pub sequence_id: u8,
}

impl PacketHeader {
    /// Size of the header on the wire.
    pub const SIZE: usize = 4;

    /// Create a header for a payload of `length` bytes.
    pub fn new(length: usize, sequence_id: u8) -> Self {
        let bytes = (length as u32).to_le_bytes();
        Self {
            length: [bytes[0], bytes[1], bytes[2]],
            sequence_id,
        }
    }

    /// Payload length announced by this header.
    pub fn length(&self) -> usize {
        u32::from_le_bytes([self.length[0], self.length[1], self.length[2], 0]) as usize
    }
}
