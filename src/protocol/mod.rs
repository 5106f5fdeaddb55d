//! MySQL wire protocol implementation.
//!
//! This module contains the low-level protocol encoding and decoding.
//!
//! # Structure
//!
//! - `codec`: integer, length-encoded and null-terminated primitives
//! - `packet`: the 4-byte packet header
//! - `handshake`: server greeting, password scramble and auth packet
//! - `response`: OK, ERR and EOF packets
//! - `column`: column definitions
//! - `row`: text and binary row decoding
//! - `command`: command packets (query, prepared statements, long data)
//! - `types`: command bytes, capability/status/column flags, column types

pub mod codec;
pub mod column;
pub mod command;
pub mod handshake;
pub mod packet;
pub mod response;
pub mod row;
pub mod types;

pub use column::FieldDescription;
pub use response::{EofPacket, OkPacket, Response};
pub use types::{CapabilityFlags, ColumnFlags, ColumnType, CommandByte, StatusFlags};
