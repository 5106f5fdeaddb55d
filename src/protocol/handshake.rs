//! Initial handshake and authentication packets.
//!
//! Password scramble (secure connection authentication):
//! ```text
//! SHA1(password) XOR SHA1(scramble + SHA1(SHA1(password)))
//! ```

use sha1::{Digest, Sha1};

use crate::error::{Error, Result};
use crate::protocol::codec::{PacketBuilder, read_bytes, read_cstr, read_cstring, read_u8, read_u16, read_u32};
use crate::protocol::types::{CapabilityFlags, StatusFlags};

/// Max packet size announced to the server in the auth packet.
pub const MAX_PACKET_SIZE: u32 = 0x00FF_FFFF;

/// Minimum length of the second scramble segment.
const MIN_SCRAMBLE_PART2_LEN: usize = 12;

/// Server greeting (initial handshake packet, protocol version 10).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeting {
    pub protocol_version: u8,
    pub server_version: String,
    pub thread_id: u32,
    pub capabilities: CapabilityFlags,
    pub charset: u8,
    pub status: StatusFlags,
    /// Both scramble segments concatenated.
    pub scramble: Vec<u8>,
}

impl Greeting {
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let (protocol_version, data) = read_u8(payload)?;
        if protocol_version == 0xFF {
            let err = crate::protocol::response::parse_err(payload)?;
            return Err(Error::Server(err));
        }
        if protocol_version != 10 {
            return Err(Error::Unsupported(format!(
                "Handshake protocol version {protocol_version}"
            )));
        }
        let (server_version, data) = read_cstr(data)?;
        let (thread_id, data) = read_u32(data)?;
        let (scramble_part1, data) = read_bytes(data, 8)?;
        let (filler, data) = read_u8(data)?;
        if filler != 0 {
            return Err(Error::Protocol(format!(
                "Greeting filler byte is 0x{filler:02X}, expected 0"
            )));
        }
        let (caps_lower, data) = read_u16(data)?;
        let (charset, data) = read_u8(data)?;
        let (status, data) = read_u16(data)?;
        let (caps_upper, data) = read_u16(data)?;
        // Nominal scramble length, not trusted.
        let (_, data) = read_u8(data)?;
        let (_, data) = read_bytes(data, 10)?;
        let (scramble_part2, _plugin_name) = read_cstring(data)?;
        if scramble_part2.len() < MIN_SCRAMBLE_PART2_LEN {
            return Err(Error::Protocol(format!(
                "Greeting scramble too short: {} < {}",
                scramble_part2.len(),
                MIN_SCRAMBLE_PART2_LEN
            )));
        }

        let mut scramble = Vec::with_capacity(scramble_part1.len() + scramble_part2.len());
        scramble.extend_from_slice(scramble_part1);
        scramble.extend_from_slice(scramble_part2);

        Ok(Self {
            protocol_version,
            server_version: server_version.to_string(),
            thread_id,
            capabilities: CapabilityFlags::new(u32::from(caps_lower) | (u32::from(caps_upper) << 16)),
            charset,
            status: StatusFlags::new(status),
            scramble,
        })
    }
}

/// Compute the authentication token for `password` against `scramble`.
///
/// Returns an empty token for an empty password.
pub fn scramble_password(password: &[u8], scramble: &[u8]) -> Vec<u8> {
    if password.is_empty() {
        return Vec::new();
    }

    let stage1: [u8; 20] = Sha1::digest(password).into();
    let stage2: [u8; 20] = Sha1::digest(stage1).into();

    let mut hasher = Sha1::new();
    hasher.update(scramble);
    hasher.update(stage2);
    let mut token: [u8; 20] = hasher.finalize().into();

    for (byte, mask) in token.iter_mut().zip(stage1.iter()) {
        *byte ^= mask;
    }
    token.to_vec()
}

/// Auth packet fields.
#[derive(Debug, Clone, Copy)]
pub struct HandshakeResponse<'a> {
    pub capabilities: CapabilityFlags,
    pub charset: u8,
    pub user: &'a str,
    pub token: &'a [u8],
    pub database: &'a str,
}

/// Write the auth packet (handshake response, protocol 4.1).
pub fn write_handshake_response(buf: &mut Vec<u8>, response: &HandshakeResponse<'_>) -> Result<()> {
    let token_len = u8::try_from(response.token.len())
        .map_err(|_| Error::Auth("Authentication token longer than 255 bytes".into()))?;

    let mut packet = PacketBuilder::new(buf);
    packet.write_u32(response.capabilities.0);
    packet.write_u32(MAX_PACKET_SIZE);
    packet.write_u8(response.charset);
    packet.write_bytes(&[0u8; 23]);
    packet.write_cstring(response.user.as_bytes());
    packet.write_u8(token_len);
    packet.write_bytes(response.token);
    packet.write_cstring(response.database.as_bytes());
    Ok(())
}
