//! OK, ERR and EOF packets.

use crate::error::{Error, Result, ServerError};
use crate::protocol::codec::{read_bytes, read_lenenc_int, read_u8, read_u16};
use crate::protocol::types::StatusFlags;

/// First payload byte of an OK packet.
pub const OK_HEADER: u8 = 0x00;
/// First payload byte of an ERR packet.
pub const ERR_HEADER: u8 = 0xFF;
/// First payload byte of an EOF packet.
pub const EOF_HEADER: u8 = 0xFE;

/// Returns true if the payload is an EOF marker packet.
///
/// A row or length-encoded integer can also start with 0xFE, but only when
/// the payload is at least 9 bytes long.
#[inline]
pub fn is_eof(payload: &[u8]) -> bool {
    payload.first() == Some(&EOF_HEADER) && payload.len() < 9
}

/// Returns true if the payload is an ERR packet.
#[inline]
pub fn is_err(payload: &[u8]) -> bool {
    payload.first() == Some(&ERR_HEADER)
}

/// Decoded OK packet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OkPacket {
    pub affected_rows: u64,
    pub last_insert_id: u64,
    pub status: StatusFlags,
    pub warnings: u16,
    pub info: String,
}

impl OkPacket {
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let (header, data) = read_u8(payload)?;
        if header != OK_HEADER {
            return Err(Error::Protocol(format!(
                "Expected OK packet, got header 0x{header:02X}"
            )));
        }
        let (affected_rows, data) = read_lenenc_int(data)?;
        let (last_insert_id, data) = read_lenenc_int(data)?;
        let (status, data) = read_u16(data)?;
        let (warnings, data) = read_u16(data)?;
        Ok(Self {
            affected_rows,
            last_insert_id,
            status: StatusFlags::new(status),
            warnings,
            info: String::from_utf8_lossy(data).into_owned(),
        })
    }
}

/// Decoded EOF packet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EofPacket {
    pub warnings: u16,
    pub status: StatusFlags,
}

impl EofPacket {
    pub fn parse(payload: &[u8]) -> Result<Self> {
        if !is_eof(payload) {
            return Err(Error::Protocol("Expected EOF packet".into()));
        }
        // A bare 0xFE is accepted from pre-4.1 style servers.
        if payload.len() < 5 {
            return Ok(Self::default());
        }
        let (warnings, data) = read_u16(&payload[1..])?;
        let (status, _) = read_u16(data)?;
        Ok(Self {
            warnings,
            status: StatusFlags::new(status),
        })
    }
}

/// Parse an ERR packet into a server error.
pub fn parse_err(payload: &[u8]) -> Result<ServerError> {
    let (header, data) = read_u8(payload)?;
    if header != ERR_HEADER {
        return Err(Error::Protocol(format!(
            "Expected ERR packet, got header 0x{header:02X}"
        )));
    }
    let (code, data) = read_u16(data)?;
    let (sql_state, data) = if data.first() == Some(&b'#') {
        let (state, rest) = read_bytes(&data[1..], 5)?;
        (Some(String::from_utf8_lossy(state).into_owned()), rest)
    } else {
        (None, data)
    };
    Ok(ServerError {
        code,
        sql_state,
        message: String::from_utf8_lossy(data).into_owned(),
    })
}

/// Response to a command that may carry a result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// No result set follows.
    Ok(OkPacket),
    /// A result set with this many columns follows.
    ResultSet { column_count: u64 },
}

impl Response {
    /// Decode the first packet of a command response.
    ///
    /// ERR packets become `Error::Server`.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        match payload.first() {
            Some(&OK_HEADER) => OkPacket::parse(payload).map(Response::Ok),
            Some(&ERR_HEADER) => Err(Error::Server(parse_err(payload)?)),
            Some(_) => {
                let (column_count, rest) = read_lenenc_int(payload)?;
                if !rest.is_empty() || column_count == 0 {
                    return Err(Error::Protocol(format!(
                        "Malformed result set header ({} bytes)",
                        payload.len()
                    )));
                }
                Ok(Response::ResultSet { column_count })
            }
            None => Err(Error::Protocol("Empty response packet".into())),
        }
    }
}

/// Decode a packet that must be OK or ERR.
pub fn parse_ok_or_err(payload: &[u8]) -> Result<OkPacket> {
    match payload.first() {
        Some(&ERR_HEADER) => Err(Error::Server(parse_err(payload)?)),
        _ => OkPacket::parse(payload),
    }
}
