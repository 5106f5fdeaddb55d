//! Column definition packets.

use zerocopy::byteorder::little_endian::{U16 as U16LE, U32 as U32LE};
use zerocopy::{FromBytes, Immutable, KnownLayout};

use crate::error::{Error, Result};
use crate::protocol::codec::{read_lenenc_int, read_lenenc_str};
use crate::protocol::types::{BINARY_CHARSET, ColumnFlags, ColumnType};

/// Fixed-length tail of a column definition (after the 0x0C length prefix).
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct ColumnDefinitionTail {
    pub charset: U16LE,
    pub column_length: U32LE,
    pub column_type: u8,
    pub flags: U16LE,
    pub decimals: u8,
    pub reserved: [u8; 2],
}

/// Column metadata for a parameter or a result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescription {
    pub schema: String,
    pub table: String,
    pub org_table: String,
    pub name: String,
    pub org_name: String,
    pub charset: u16,
    pub column_length: u32,
    pub column_type: ColumnType,
    pub flags: ColumnFlags,
    pub decimals: u8,
}

impl FieldDescription {
    /// Parse a protocol 4.1 column definition packet.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let (_catalog, data) = read_lenenc_str(payload)?;
        let (schema, data) = read_lenenc_str(data)?;
        let (table, data) = read_lenenc_str(data)?;
        let (org_table, data) = read_lenenc_str(data)?;
        let (name, data) = read_lenenc_str(data)?;
        let (org_name, data) = read_lenenc_str(data)?;
        let (fixed_len, data) = read_lenenc_int(data)?;
        if fixed_len != 0x0C {
            return Err(Error::Protocol(format!(
                "Column definition fixed-length block is {fixed_len}, expected 12"
            )));
        }
        let (tail, _) = ColumnDefinitionTail::ref_from_prefix(data)?;
        let column_type = ColumnType::from_u8(tail.column_type).ok_or_else(|| {
            Error::Protocol(format!("Unknown column type 0x{:02X}", tail.column_type))
        })?;

        Ok(Self {
            schema: schema.to_string(),
            table: table.to_string(),
            org_table: org_table.to_string(),
            name: name.to_string(),
            org_name: org_name.to_string(),
            charset: tail.charset.get(),
            column_length: tail.column_length.get(),
            column_type,
            flags: ColumnFlags::new(tail.flags.get()),
            decimals: tail.decimals,
        })
    }

    pub fn is_unsigned(&self) -> bool {
        self.flags.is_unsigned()
    }

    /// Returns true if string values of this column are raw bytes.
    pub fn is_binary(&self) -> bool {
        self.charset == BINARY_CHARSET
    }
}
