//! Parameter and column values.
//!
//! [`Value`] is the closed set of values this crate can send as a prepared
//! statement parameter or decode from a row. Each variant has a natural wire
//! type; [`Param`] can override it or stream the value as long data instead.

use std::io::Read;

use crate::error::{Error, Result};
use crate::protocol::codec::{write_lenenc_bytes, write_u16, write_u32};
use crate::protocol::types::ColumnType;

/// Calendar date with optional time of day (DATE, DATETIME, TIMESTAMP).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub microsecond: u32,
}

impl DateTime {
    pub fn date(year: u16, month: u8, day: u8) -> Self {
        Self {
            year,
            month,
            day,
            ..Self::default()
        }
    }
}

/// Signed time interval (TIME).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Time {
    pub negative: bool,
    pub days: u32,
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    pub microseconds: u32,
}

/// A single parameter or column value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float(f32),
    Double(f64),
    Bytes(Vec<u8>),
    Str(String),
    DateTime(DateTime),
    Time(Time),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The wire type this value encodes to when the caller gives none.
    pub fn natural_type(&self) -> ColumnType {
        match self {
            Value::Null => ColumnType::MYSQL_TYPE_NULL,
            Value::Bool(_) => ColumnType::MYSQL_TYPE_BIT,
            Value::Int8(_) | Value::UInt8(_) => ColumnType::MYSQL_TYPE_TINY,
            Value::Int16(_) | Value::UInt16(_) => ColumnType::MYSQL_TYPE_SHORT,
            Value::Int32(_) | Value::UInt32(_) => ColumnType::MYSQL_TYPE_LONG,
            Value::Int64(_) | Value::UInt64(_) => ColumnType::MYSQL_TYPE_LONGLONG,
            Value::Float(_) => ColumnType::MYSQL_TYPE_FLOAT,
            Value::Double(_) => ColumnType::MYSQL_TYPE_DOUBLE,
            Value::Bytes(_) => ColumnType::MYSQL_TYPE_BLOB,
            Value::Str(_) => ColumnType::MYSQL_TYPE_VAR_STRING,
            Value::DateTime(_) => ColumnType::MYSQL_TYPE_DATETIME,
            Value::Time(_) => ColumnType::MYSQL_TYPE_TIME,
        }
    }

    /// Returns true for the unsigned integer variants.
    pub fn is_unsigned(&self) -> bool {
        matches!(
            self,
            Value::UInt8(_) | Value::UInt16(_) | Value::UInt32(_) | Value::UInt64(_)
        )
    }

    fn as_i128(&self) -> Option<i128> {
        match *self {
            Value::Bool(v) => Some(i128::from(v)),
            Value::Int8(v) => Some(i128::from(v)),
            Value::Int16(v) => Some(i128::from(v)),
            Value::Int32(v) => Some(i128::from(v)),
            Value::Int64(v) => Some(i128::from(v)),
            Value::UInt8(v) => Some(i128::from(v)),
            Value::UInt16(v) => Some(i128::from(v)),
            Value::UInt32(v) => Some(i128::from(v)),
            Value::UInt64(v) => Some(i128::from(v)),
            _ => None,
        }
    }

    /// Encode this value in the binary protocol format of `target`.
    ///
    /// NULL writes nothing: it is carried by the null bitmap.
    pub fn encode(&self, target: ColumnType, buf: &mut Vec<u8>) -> Result<()> {
        use ColumnType::*;

        if self.is_null() {
            return Ok(());
        }

        match (self, target) {
            (Value::Bool(v), MYSQL_TYPE_BIT) => {
                buf.push(1);
                buf.push(if *v { b'1' } else { b'0' });
            }
            (Value::Float(v), MYSQL_TYPE_FLOAT) => buf.extend_from_slice(&v.to_le_bytes()),
            (Value::Float(v), MYSQL_TYPE_DOUBLE) => {
                buf.extend_from_slice(&f64::from(*v).to_le_bytes())
            }
            (Value::Double(v), MYSQL_TYPE_DOUBLE) => buf.extend_from_slice(&v.to_le_bytes()),
            (Value::Bytes(v), ty) if ty.is_length_encoded() => write_lenenc_bytes(buf, v),
            (Value::Str(v), ty) if ty.is_length_encoded() => write_lenenc_bytes(buf, v.as_bytes()),
            (Value::DateTime(v), ty) if ty.is_date() => encode_datetime(v, buf),
            (Value::Time(v), MYSQL_TYPE_TIME) => encode_time(v, buf),
            (_, MYSQL_TYPE_TINY | MYSQL_TYPE_SHORT | MYSQL_TYPE_INT24 | MYSQL_TYPE_LONG
                | MYSQL_TYPE_LONGLONG | MYSQL_TYPE_YEAR) => {
                let v = self.as_i128().ok_or_else(|| self.mismatch(target))?;
                encode_integer(v, target, self.is_unsigned(), buf)?;
            }
            _ => return Err(self.mismatch(target)),
        }
        Ok(())
    }

    fn mismatch(&self, target: ColumnType) -> Error {
        Error::Binding(format!(
            "cannot encode {:?} as {:?}",
            self.natural_type(),
            target
        ))
    }
}

fn encode_integer(v: i128, target: ColumnType, unsigned: bool, buf: &mut Vec<u8>) -> Result<()> {
    let width = match target {
        ColumnType::MYSQL_TYPE_TINY => 1,
        ColumnType::MYSQL_TYPE_SHORT | ColumnType::MYSQL_TYPE_YEAR => 2,
        ColumnType::MYSQL_TYPE_INT24 | ColumnType::MYSQL_TYPE_LONG => 4,
        _ => 8,
    };
    let bits = width * 8;
    let (min, max) = if unsigned {
        (0i128, (1i128 << bits) - 1)
    } else {
        (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1)
    };
    if v < min || v > max {
        return Err(Error::Binding(format!(
            "integer {v} out of range for {target:?}"
        )));
    }
    // Two's complement truncation keeps the low `width` bytes.
    buf.extend_from_slice(&(v as u64).to_le_bytes()[..width]);
    Ok(())
}

fn encode_datetime(v: &DateTime, buf: &mut Vec<u8>) {
    let has_time = v.hour != 0 || v.minute != 0 || v.second != 0 || v.microsecond != 0;
    let len: u8 = if v.microsecond != 0 {
        11
    } else if has_time {
        7
    } else if v.year != 0 || v.month != 0 || v.day != 0 {
        4
    } else {
        0
    };
    buf.push(len);
    if len >= 4 {
        write_u16(buf, v.year);
        buf.push(v.month);
        buf.push(v.day);
    }
    if len >= 7 {
        buf.push(v.hour);
        buf.push(v.minute);
        buf.push(v.second);
    }
    if len == 11 {
        write_u32(buf, v.microsecond);
    }
}

fn encode_time(v: &Time, buf: &mut Vec<u8>) {
    let is_zero = v.days == 0 && v.hours == 0 && v.minutes == 0 && v.seconds == 0;
    let len: u8 = if v.microseconds != 0 {
        12
    } else if !is_zero {
        8
    } else {
        0
    };
    buf.push(len);
    if len >= 8 {
        buf.push(u8::from(v.negative));
        write_u32(buf, v.days);
        buf.push(v.hours);
        buf.push(v.minutes);
        buf.push(v.seconds);
    }
    if len == 12 {
        write_u32(buf, v.microseconds);
    }
}

macro_rules! impl_from_value {
    ($($ty:ty => $variant:ident),+ $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v.into())
                }
            }
        )+
    };
}

impl_from_value!(
    bool => Bool,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    f32 => Float,
    f64 => Double,
    Vec<u8> => Bytes,
    &[u8] => Bytes,
    String => Str,
    &str => Str,
    DateTime => DateTime,
    Time => Time,
);

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Largest long-data parameter accepted by default (the LONGBLOB limit).
pub const DEFAULT_MAX_LONG_DATA_LEN: u64 = u32::MAX as u64;

/// Producer of long-data chunks.
///
/// `fill_chunk` writes up to `buf.len()` bytes and returns how many it wrote.
/// Returning fewer than `buf.len()` bytes (including zero) marks the final
/// chunk.
///
/// # Errors
///
/// A source that keeps returning full chunks is cut off with
/// [`Error::Binding`] once the parameter exceeds its maximum length
/// (see [`Param::with_max_len`]).
pub trait ChunkSource {
    fn fill_chunk(&mut self, buf: &mut [u8]) -> Result<usize>;
}

impl<F> ChunkSource for F
where
    F: FnMut(&mut [u8]) -> Result<usize>,
{
    fn fill_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        self(buf)
    }
}

/// Adapts any [`Read`] into a [`ChunkSource`].
///
/// Short reads are retried until the chunk is full or the reader is at EOF,
/// so only the last chunk can be short.
pub struct ReaderSource<R>(pub R);

impl<R: Read> ChunkSource for ReaderSource<R> {
    fn fill_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.0.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(Error::Binding(format!("long data source failed: {e}"))),
            }
        }
        Ok(filled)
    }
}

/// Streaming specialization of a parameter.
pub struct LongData {
    pub(crate) chunk_size: usize,
    pub(crate) max_len: u64,
    pub(crate) source: Box<dyn ChunkSource>,
}

impl std::fmt::Debug for LongData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LongData")
            .field("chunk_size", &self.chunk_size)
            .field("max_len", &self.max_len)
            .finish_non_exhaustive()
    }
}

/// One bound parameter of a prepared statement execution.
#[derive(Debug, Default)]
pub struct Param {
    pub(crate) value: Value,
    pub(crate) wire_type: Option<ColumnType>,
    pub(crate) long_data: Option<LongData>,
}

impl Param {
    /// Parameter sent inline with its natural wire type.
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }

    /// Parameter sent as `chunk_size`-byte long-data chunks pulled from `source`.
    ///
    /// The wire type defaults to BLOB.
    pub fn long_data(chunk_size: usize, source: impl ChunkSource + 'static) -> Self {
        Self {
            value: Value::Null,
            wire_type: None,
            long_data: Some(LongData {
                chunk_size,
                max_len: DEFAULT_MAX_LONG_DATA_LEN,
                source: Box::new(source),
            }),
        }
    }

    /// Cap the total length of a long-data parameter.
    ///
    /// No effect on inline parameters.
    pub fn with_max_len(mut self, max_len: u64) -> Self {
        if let Some(long_data) = self.long_data.as_mut() {
            long_data.max_len = max_len;
        }
        self
    }

    /// Override the wire type.
    pub fn with_type(mut self, wire_type: ColumnType) -> Self {
        self.wire_type = Some(wire_type);
        self
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn is_long_data(&self) -> bool {
        self.long_data.is_some()
    }

    /// Wire type sent in the execute packet.
    pub fn wire_type(&self) -> ColumnType {
        match (self.wire_type, &self.long_data) {
            (Some(ty), _) => ty,
            (None, Some(_)) => ColumnType::MYSQL_TYPE_BLOB,
            (None, None) => self.value.natural_type(),
        }
    }

    /// Returns true if the null bitmap bit is set for this parameter.
    pub fn is_null(&self) -> bool {
        self.long_data.is_none() && self.value.is_null()
    }
}

impl From<Value> for Param {
    fn from(value: Value) -> Self {
        Param::new(value)
    }
}
