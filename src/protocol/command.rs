//! Command packets.
//!
//! Every builder writes a complete packet (with a reserved header) into
//! `buf`; the framer fills in the length and sequence number.

use zerocopy::byteorder::little_endian::{U16 as U16LE, U32 as U32LE};
use zerocopy::{FromBytes, Immutable, KnownLayout};

use crate::error::{Error, Result};
use crate::protocol::codec::PacketBuilder;
use crate::protocol::response::{ERR_HEADER, OK_HEADER, parse_err};
use crate::protocol::types::CommandByte;
use crate::value::Param;

/// Flag byte sent after a parameter type when the value is unsigned.
pub const PARAM_UNSIGNED_FLAG: u8 = 0x80;

/// STMT_EXECUTE flags: no cursor.
const CURSOR_TYPE_NO_CURSOR: u8 = 0x00;

/// Write a command packet whose argument is raw bytes (QUERY, INIT_DB, ...).
pub fn write_command(buf: &mut Vec<u8>, command: CommandByte, argument: &[u8]) {
    let mut packet = PacketBuilder::command(buf, command);
    packet.write_bytes(argument);
}

/// Write STMT_PREPARE.
pub fn write_prepare(buf: &mut Vec<u8>, sql: &str) {
    write_command(buf, CommandByte::StmtPrepare, sql.as_bytes());
}

/// Write STMT_CLOSE. The server sends no response.
pub fn write_stmt_close(buf: &mut Vec<u8>, statement_id: u32) {
    let mut packet = PacketBuilder::command(buf, CommandByte::StmtClose);
    packet.write_u32(statement_id);
}

/// Write one STMT_SEND_LONG_DATA chunk. The server sends no response.
pub fn write_long_data(buf: &mut Vec<u8>, statement_id: u32, param_index: u16, chunk: &[u8]) {
    let mut packet = PacketBuilder::command(buf, CommandByte::StmtSendLongData);
    packet.write_u32(statement_id);
    packet.write_u16(param_index);
    packet.write_bytes(chunk);
}

/// Write STMT_EXECUTE.
///
/// ```text
/// statement_id: 4  flags: 1  iteration_count: 4
/// if params:
///   null_bitmap: (n + 7) / 8
///   new_params_bound: 1 (always 1)
///   per param: type: 1, flag: 1 (0x80 if unsigned)
///   per non-NULL, non-long-data param: value
/// ```
pub fn write_execute(buf: &mut Vec<u8>, statement_id: u32, params: &[Param]) -> Result<()> {
    let mut packet = PacketBuilder::command(buf, CommandByte::StmtExecute);
    packet.write_u32(statement_id);
    packet.write_u8(CURSOR_TYPE_NO_CURSOR);
    packet.write_u32(1);

    if params.is_empty() {
        return Ok(());
    }

    let mut null_bitmap = vec![0u8; params.len().div_ceil(8)];
    for (idx, param) in params.iter().enumerate() {
        if param.is_null() {
            null_bitmap[idx / 8] |= 1 << (idx % 8);
        }
    }
    packet.write_bytes(&null_bitmap);
    packet.write_u8(1);

    for param in params {
        packet.write_u8(param.wire_type() as u8);
        packet.write_u8(if param.value().is_unsigned() {
            PARAM_UNSIGNED_FLAG
        } else {
            0
        });
    }

    for param in params {
        if param.is_long_data() || param.is_null() {
            continue;
        }
        param.value().encode(param.wire_type(), packet.buf())?;
    }
    Ok(())
}

/// Fixed part of a successful STMT_PREPARE response (after the 0x00 status byte).
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
#[repr(C)]
struct StmtPrepareOkRaw {
    statement_id: U32LE,
    num_columns: U16LE,
    num_params: U16LE,
    reserved: u8,
    warning_count: U16LE,
}

/// Decoded STMT_PREPARE response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StmtPrepareOk {
    pub statement_id: u32,
    pub num_columns: u16,
    pub num_params: u16,
    pub warning_count: u16,
}

impl StmtPrepareOk {
    /// Parse the first STMT_PREPARE response packet.
    ///
    /// An ERR packet becomes `Error::Server`.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        match payload.first() {
            Some(&OK_HEADER) => {}
            Some(&ERR_HEADER) => return Err(Error::Server(parse_err(payload)?)),
            Some(&other) => {
                return Err(Error::Protocol(format!(
                    "Unexpected STMT_PREPARE response header 0x{other:02X}"
                )));
            }
            None => return Err(Error::Protocol("Empty STMT_PREPARE response".into())),
        }
        let (raw, _) = StmtPrepareOkRaw::ref_from_prefix(&payload[1..])?;
        Ok(Self {
            statement_id: raw.statement_id.get(),
            num_columns: raw.num_columns.get(),
            num_params: raw.num_params.get(),
            warning_count: raw.warning_count.get(),
        })
    }
}
