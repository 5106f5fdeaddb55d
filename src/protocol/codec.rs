//! MySQL wire protocol encoding and decoding primitives.
//!
//! MySQL uses little-endian for all integers.

use zerocopy::FromBytes;
use zerocopy::byteorder::little_endian::{U16 as U16LE, U32 as U32LE, U64 as U64LE};

use crate::error::{Error, Result};

/// Marker byte for a NULL column value in text rows.
pub const LENENC_NULL: u8 = 0xFB;

/// Read 1-byte unsigned integer.
#[inline]
pub fn read_u8(data: &[u8]) -> Result<(u8, &[u8])> {
    match data.split_first() {
        Some((&value, rest)) => Ok((value, rest)),
        None => Err(Error::Protocol("read_u8: empty buffer".into())),
    }
}

/// Read 2-byte little-endian unsigned integer.
#[inline]
pub fn read_u16(data: &[u8]) -> Result<(u16, &[u8])> {
    let (value, rest) = U16LE::read_from_prefix(data).map_err(|_| {
        Error::Protocol(format!("read_u16: buffer too short: {} < 2", data.len()))
    })?;
    Ok((value.get(), rest))
}

/// Read 3-byte little-endian unsigned integer.
#[inline]
pub fn read_u24(data: &[u8]) -> Result<(u32, &[u8])> {
    if data.len() < 3 {
        return Err(Error::Protocol(format!(
            "read_u24: buffer too short: {} < 3",
            data.len()
        )));
    }
    let value = u32::from_le_bytes([data[0], data[1], data[2], 0]);
    Ok((value, &data[3..]))
}

/// Read 4-byte little-endian unsigned integer.
#[inline]
pub fn read_u32(data: &[u8]) -> Result<(u32, &[u8])> {
    let (value, rest) = U32LE::read_from_prefix(data).map_err(|_| {
        Error::Protocol(format!("read_u32: buffer too short: {} < 4", data.len()))
    })?;
    Ok((value.get(), rest))
}

/// Read 8-byte little-endian unsigned integer.
#[inline]
pub fn read_u64(data: &[u8]) -> Result<(u64, &[u8])> {
    let (value, rest) = U64LE::read_from_prefix(data).map_err(|_| {
        Error::Protocol(format!("read_u64: buffer too short: {} < 8", data.len()))
    })?;
    Ok((value.get(), rest))
}

/// Read fixed-length bytes.
#[inline]
pub fn read_bytes(data: &[u8], len: usize) -> Result<(&[u8], &[u8])> {
    if data.len() < len {
        return Err(Error::Protocol(format!(
            "read_bytes: buffer too short: {} < {}",
            data.len(),
            len
        )));
    }
    Ok(data.split_at(len))
}

/// Read null-terminated string.
/// Returns the string bytes (without the null terminator) and remaining data.
#[inline]
pub fn read_cstring(data: &[u8]) -> Result<(&[u8], &[u8])> {
    match memchr::memchr(0, data) {
        Some(pos) => Ok((&data[..pos], &data[pos + 1..])),
        None => Err(Error::Protocol(
            "read_cstring: no null terminator found".into(),
        )),
    }
}

/// Read null-terminated string as &str.
#[inline]
pub fn read_cstr(data: &[u8]) -> Result<(&str, &[u8])> {
    let (bytes, rest) = read_cstring(data)?;
    let s = simdutf8::compat::from_utf8(bytes)
        .map_err(|e| Error::Protocol(format!("read_cstr: invalid UTF-8: {e}")))?;
    Ok((s, rest))
}

/// Read a length-encoded integer.
///
/// - `0x00..=0xFA`: the byte is the value
/// - `0xFC` / `0xFD` / `0xFE`: 2 / 3 / 8 little-endian bytes follow
///
/// `0xFB` (NULL) and `0xFF` are rejected; use [`read_lenenc_bytes_or_null`]
/// where NULL is allowed.
pub fn read_lenenc_int(data: &[u8]) -> Result<(u64, &[u8])> {
    let (first, rest) = read_u8(data)?;
    match first {
        0x00..=0xFA => Ok((u64::from(first), rest)),
        0xFC => read_u16(rest).map(|(v, rest)| (u64::from(v), rest)),
        0xFD => read_u24(rest).map(|(v, rest)| (u64::from(v), rest)),
        0xFE => read_u64(rest),
        _ => Err(Error::Protocol(format!(
            "read_lenenc_int: invalid prefix 0x{first:02X}"
        ))),
    }
}

/// Read a length-encoded byte string.
pub fn read_lenenc_bytes(data: &[u8]) -> Result<(&[u8], &[u8])> {
    let (len, rest) = read_lenenc_int(data)?;
    let len = usize::try_from(len)
        .map_err(|_| Error::Protocol(format!("read_lenenc_bytes: length {len} too large")))?;
    read_bytes(rest, len)
}

/// Read a length-encoded byte string that may be the NULL marker.
pub fn read_lenenc_bytes_or_null(data: &[u8]) -> Result<(Option<&[u8]>, &[u8])> {
    if data.first() == Some(&LENENC_NULL) {
        return Ok((None, &data[1..]));
    }
    let (bytes, rest) = read_lenenc_bytes(data)?;
    Ok((Some(bytes), rest))
}

/// Read a length-encoded string as &str.
pub fn read_lenenc_str(data: &[u8]) -> Result<(&str, &[u8])> {
    let (bytes, rest) = read_lenenc_bytes(data)?;
    let s = simdutf8::compat::from_utf8(bytes)
        .map_err(|e| Error::Protocol(format!("read_lenenc_str: invalid UTF-8: {e}")))?;
    Ok((s, rest))
}

/// Write 1-byte unsigned integer.
#[inline]
pub fn write_u8(out: &mut Vec<u8>, value: u8) {
    out.push(value);
}

/// Write 2-byte little-endian unsigned integer.
#[inline]
pub fn write_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Write 4-byte little-endian unsigned integer.
#[inline]
pub fn write_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Write 8-byte little-endian unsigned integer.
#[inline]
pub fn write_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Write raw bytes.
#[inline]
pub fn write_bytes(out: &mut Vec<u8>, data: &[u8]) {
    out.extend_from_slice(data);
}

/// Write null-terminated string.
#[inline]
pub fn write_cstring(out: &mut Vec<u8>, s: &[u8]) {
    out.extend_from_slice(s);
    out.push(0);
}

/// Write a length-encoded integer.
pub fn write_lenenc_int(out: &mut Vec<u8>, value: u64) {
    if value < 0xFB {
        out.push(value as u8);
    } else if value < 0x1_0000 {
        out.push(0xFC);
        write_u16(out, value as u16);
    } else if value < 0x100_0000 {
        out.push(0xFD);
        out.extend_from_slice(&(value as u32).to_le_bytes()[..3]);
    } else {
        out.push(0xFE);
        write_u64(out, value);
    }
}

/// Write a length-encoded byte string.
pub fn write_lenenc_bytes(out: &mut Vec<u8>, data: &[u8]) {
    write_lenenc_int(out, data.len() as u64);
    out.extend_from_slice(data);
}

/// Packet builder that reserves the 4-byte header.
///
/// The framer fills in the payload length and the sequence number when the
/// packet is sent.
pub struct PacketBuilder<'a> {
    buf: &'a mut Vec<u8>,
}

impl<'a> PacketBuilder<'a> {
    /// Start a new packet, clearing the buffer.
    pub fn new(buf: &'a mut Vec<u8>) -> Self {
        buf.clear();
        buf.extend_from_slice(&[0, 0, 0, 0]);
        Self { buf }
    }

    /// Start a command packet.
    pub fn command(buf: &'a mut Vec<u8>, command: super::types::CommandByte) -> Self {
        let mut builder = Self::new(buf);
        builder.write_u8(command as u8);
        builder
    }

    /// Get mutable access to the underlying buffer.
    pub fn buf(&mut self) -> &mut Vec<u8> {
        self.buf
    }

    pub fn write_u8(&mut self, value: u8) {
        write_u8(self.buf, value);
    }

    pub fn write_u16(&mut self, value: u16) {
        write_u16(self.buf, value);
    }

    pub fn write_u32(&mut self, value: u32) {
        write_u32(self.buf, value);
    }

    pub fn write_bytes(&mut self, data: &[u8]) {
        write_bytes(self.buf, data);
    }

    pub fn write_cstring(&mut self, s: &[u8]) {
        write_cstring(self.buf, s);
    }

    pub fn write_lenenc_bytes(&mut self, data: &[u8]) {
        write_lenenc_bytes(self.buf, data);
    }
}
