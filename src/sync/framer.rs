//! Packet framing over a [`Channel`].

use zerocopy::{FromBytes, IntoBytes};

use crate::channel::Channel;
use crate::error::{Error, Result};
use crate::protocol::packet::{MAX_PAYLOAD_LEN, PacketHeader};

/// Splits a channel into sequence-numbered packets.
///
/// The sequence number is shared by reads and writes within one command
/// exchange and wraps modulo 256.
pub struct Framer {
    channel: Box<dyn Channel>,
    sequence: u8,
}

impl Framer {
    pub fn new(channel: Box<dyn Channel>) -> Self {
        Self {
            channel,
            sequence: 0,
        }
    }

    /// Start a new command exchange.
    pub fn reset_sequence(&mut self) {
        self.sequence = 0;
    }

    /// Sequence number expected for the next packet.
    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    pub fn is_open(&self) -> bool {
        self.channel.is_open()
    }

    /// Read one packet payload into `buf`.
    pub fn read_packet(&mut self, buf: &mut Vec<u8>) -> Result<()> {
        let mut header_bytes = [0u8; PacketHeader::SIZE];
        self.channel.read_exact(&mut header_bytes)?;
        let header = PacketHeader::read_from_bytes(&header_bytes)
            .map_err(|_| Error::Protocol("Invalid packet header".into()))?;

        if header.sequence_id != self.sequence {
            return Err(Error::Protocol(format!(
                "Packet out of sequence: expected {}, got {}",
                self.sequence, header.sequence_id
            )));
        }

        buf.clear();
        buf.resize(header.length(), 0);
        self.channel.read_exact(buf)?;
        self.sequence = self.sequence.wrapping_add(1);
        Ok(())
    }

    /// Write a packet built with a reserved 4-byte header.
    ///
    /// Fills in the payload length and the current sequence number.
    pub fn write_packet(&mut self, packet: &mut [u8]) -> Result<()> {
        if packet.len() < PacketHeader::SIZE {
            return Err(Error::Protocol("Packet is missing its header".into()));
        }
        let payload_len = packet.len() - PacketHeader::SIZE;
        if payload_len >= MAX_PAYLOAD_LEN {
            return Err(Error::Unsupported(format!(
                "Payload of {payload_len} bytes needs multi-packet framing"
            )));
        }

        let header = PacketHeader::new(payload_len, self.sequence);
        packet[..PacketHeader::SIZE].copy_from_slice(header.as_bytes());
        self.channel.write_all(packet)?;
        self.channel.flush()?;
        self.sequence = self.sequence.wrapping_add(1);
        Ok(())
    }
}
