//! Text and binary result row decoding.

use crate::error::{Error, Result};
use crate::protocol::codec::{
    read_bytes, read_lenenc_bytes, read_lenenc_bytes_or_null, read_u8, read_u16, read_u32,
    read_u64,
};
use crate::protocol::column::FieldDescription;
use crate::protocol::types::ColumnType;
use crate::value::{DateTime, Time, Value};

/// First payload byte of a binary protocol row.
pub const BINARY_ROW_HEADER: u8 = 0x00;

/// Bit offset of the first column in a binary row's null bitmap.
const BINARY_NULL_BITMAP_OFFSET: usize = 2;

/// Decode a text protocol row: one length-encoded string per column.
pub fn decode_text_row(payload: &[u8], columns: &[FieldDescription]) -> Result<Vec<Value>> {
    let mut values = Vec::with_capacity(columns.len());
    let mut data = payload;
    for _ in columns {
        let (value, rest) = read_lenenc_bytes_or_null(data)?;
        values.push(value.map_or(Value::Null, |v| Value::Bytes(v.to_vec())));
        data = rest;
    }
    if !data.is_empty() {
        return Err(Error::Protocol(format!(
            "{} trailing bytes after text row",
            data.len()
        )));
    }
    Ok(values)
}

/// Decode a binary protocol row.
///
/// Layout: 0x00 header, null bitmap of `(columns + 9) / 8` bytes with the
/// first two bits reserved, then one value per non-NULL column.
pub fn decode_binary_row(payload: &[u8], columns: &[FieldDescription]) -> Result<Vec<Value>> {
    let (header, data) = read_u8(payload)?;
    if header != BINARY_ROW_HEADER {
        return Err(Error::Protocol(format!(
            "Binary row header is 0x{header:02X}, expected 0x00"
        )));
    }
    let bitmap_len = (columns.len() + 7 + BINARY_NULL_BITMAP_OFFSET) / 8;
    let (null_bitmap, mut data) = read_bytes(data, bitmap_len)?;

    let mut values = Vec::with_capacity(columns.len());
    for (idx, column) in columns.iter().enumerate() {
        let bit = idx + BINARY_NULL_BITMAP_OFFSET;
        if null_bitmap[bit / 8] & (1 << (bit % 8)) != 0 {
            values.push(Value::Null);
            continue;
        }
        let (value, rest) = decode_binary_value(data, column)?;
        values.push(value);
        data = rest;
    }
    if !data.is_empty() {
        return Err(Error::Protocol(format!(
            "{} trailing bytes after binary row",
            data.len()
        )));
    }
    Ok(values)
}

fn decode_binary_value<'a>(data: &'a [u8], column: &FieldDescription) -> Result<(Value, &'a [u8])> {
    use ColumnType::*;

    let unsigned = column.is_unsigned();
    match column.column_type {
        MYSQL_TYPE_NULL => Ok((Value::Null, data)),
        MYSQL_TYPE_TINY => {
            let (v, rest) = read_u8(data)?;
            let value = if unsigned {
                Value::UInt8(v)
            } else {
                Value::Int8(v as i8)
            };
            Ok((value, rest))
        }
        MYSQL_TYPE_SHORT | MYSQL_TYPE_YEAR => {
            let (v, rest) = read_u16(data)?;
            let value = if unsigned {
                Value::UInt16(v)
            } else {
                Value::Int16(v as i16)
            };
            Ok((value, rest))
        }
        MYSQL_TYPE_LONG | MYSQL_TYPE_INT24 => {
            let (v, rest) = read_u32(data)?;
            let value = if unsigned {
                Value::UInt32(v)
            } else {
                Value::Int32(v as i32)
            };
            Ok((value, rest))
        }
        MYSQL_TYPE_LONGLONG => {
            let (v, rest) = read_u64(data)?;
            let value = if unsigned {
                Value::UInt64(v)
            } else {
                Value::Int64(v as i64)
            };
            Ok((value, rest))
        }
        MYSQL_TYPE_FLOAT => {
            let (v, rest) = read_u32(data)?;
            Ok((Value::Float(f32::from_bits(v)), rest))
        }
        MYSQL_TYPE_DOUBLE => {
            let (v, rest) = read_u64(data)?;
            Ok((Value::Double(f64::from_bits(v)), rest))
        }
        MYSQL_TYPE_DATE | MYSQL_TYPE_DATETIME | MYSQL_TYPE_TIMESTAMP | MYSQL_TYPE_NEWDATE => {
            decode_datetime(data)
        }
        MYSQL_TYPE_TIME => decode_time(data),
        MYSQL_TYPE_DECIMAL | MYSQL_TYPE_NEWDECIMAL => {
            let (bytes, rest) = read_lenenc_bytes(data)?;
            Ok((string_or_bytes(bytes, true), rest))
        }
        _ => {
            let (bytes, rest) = read_lenenc_bytes(data)?;
            Ok((string_or_bytes(bytes, !column.is_binary()), rest))
        }
    }
}

fn string_or_bytes(bytes: &[u8], textual: bool) -> Value {
    match simdutf8::basic::from_utf8(bytes) {
        Ok(s) if textual => Value::Str(s.to_string()),
        _ => Value::Bytes(bytes.to_vec()),
    }
}

fn decode_datetime(data: &[u8]) -> Result<(Value, &[u8])> {
    let (len, data) = read_u8(data)?;
    let (body, rest) = read_bytes(data, len as usize)?;
    let mut dt = DateTime::default();
    match len {
        0 => {}
        4 | 7 | 11 => {
            let (year, body) = read_u16(body)?;
            dt.year = year;
            dt.month = body[0];
            dt.day = body[1];
            if len >= 7 {
                dt.hour = body[2];
                dt.minute = body[3];
                dt.second = body[4];
            }
            if len == 11 {
                let (micros, _) = read_u32(&body[5..])?;
                dt.microsecond = micros;
            }
        }
        _ => {
            return Err(Error::Protocol(format!(
                "Invalid binary date length {len}"
            )));
        }
    }
    Ok((Value::DateTime(dt), rest))
}

fn decode_time(data: &[u8]) -> Result<(Value, &[u8])> {
    let (len, data) = read_u8(data)?;
    let (body, rest) = read_bytes(data, len as usize)?;
    let mut time = Time::default();
    match len {
        0 => {}
        8 | 12 => {
            time.negative = body[0] != 0;
            let (days, body) = read_u32(&body[1..])?;
            time.days = days;
            time.hours = body[0];
            time.minutes = body[1];
            time.seconds = body[2];
            if len == 12 {
                let (micros, _) = read_u32(&body[3..])?;
                time.microseconds = micros;
            }
        }
        _ => {
            return Err(Error::Protocol(format!(
                "Invalid binary time length {len}"
            )));
        }
    }
    Ok((Value::Time(time), rest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::column::tests::column_payload;
    use crate::protocol::types::{BINARY_CHARSET, ColumnFlags};

    fn column(ty: ColumnType, flags: u16, charset: u16) -> FieldDescription {
        FieldDescription::parse(&column_payload("c", ty, flags, charset)).unwrap()
    }

    #[test]
    fn test_text_row() {
        let cols = vec![
            column(ColumnType::MYSQL_TYPE_LONG, 0, 33),
            column(ColumnType::MYSQL_TYPE_VAR_STRING, 0, 33),
        ];
        let row = decode_text_row(&[0xFB, 0x02, b'h', b'i'], &cols).unwrap();
        assert_eq!(row, vec![Value::Null, Value::Bytes(b"hi".to_vec())]);

        assert!(decode_text_row(&[0x01, b'1', 0xFF], &cols[..1]).is_err());
    }

    #[test]
    fn test_binary_row_with_nulls() {
        let cols = vec![
            column(ColumnType::MYSQL_TYPE_LONG, 0, BINARY_CHARSET),
            column(ColumnType::MYSQL_TYPE_TINY, ColumnFlags::UNSIGNED_FLAG, BINARY_CHARSET),
            column(ColumnType::MYSQL_TYPE_VAR_STRING, 0, 33),
        ];
        // Column 0 is NULL: bit 2 of the bitmap.
        let payload = [0x00, 0b0000_0100, 0xFF, 0x02, b'o', b'k'];
        let row = decode_binary_row(&payload, &cols).unwrap();
        assert_eq!(
            row,
            vec![Value::Null, Value::UInt8(255), Value::Str("ok".into())]
        );
    }

    #[test]
    fn test_binary_signedness_and_floats() {
        let cols = vec![
            column(ColumnType::MYSQL_TYPE_SHORT, 0, BINARY_CHARSET),
            column(ColumnType::MYSQL_TYPE_LONGLONG, ColumnFlags::UNSIGNED_FLAG, BINARY_CHARSET),
            column(ColumnType::MYSQL_TYPE_DOUBLE, 0, BINARY_CHARSET),
        ];
        let mut payload = vec![0x00, 0x00];
        payload.extend_from_slice(&(-2i16).to_le_bytes());
        payload.extend_from_slice(&u64::MAX.to_le_bytes());
        payload.extend_from_slice(&1.5f64.to_le_bytes());
        let row = decode_binary_row(&payload, &cols).unwrap();
        assert_eq!(
            row,
            vec![Value::Int16(-2), Value::UInt64(u64::MAX), Value::Double(1.5)]
        );
    }

    #[test]
    fn test_binary_blob_stays_bytes() {
        let cols = vec![column(ColumnType::MYSQL_TYPE_BLOB, 0, BINARY_CHARSET)];
        let row = decode_binary_row(&[0x00, 0x00, 0x02, b'a', b'b'], &cols).unwrap();
        assert_eq!(row, vec![Value::Bytes(b"ab".to_vec())]);
    }

    #[test]
    fn test_binary_datetime_and_time() {
        let cols = vec![
            column(ColumnType::MYSQL_TYPE_DATETIME, 0, BINARY_CHARSET),
            column(ColumnType::MYSQL_TYPE_TIME, 0, BINARY_CHARSET),
        ];
        let mut payload = vec![0x00, 0x00, 7];
        payload.extend_from_slice(&2024u16.to_le_bytes());
        payload.extend_from_slice(&[2, 29, 13, 5, 59]);
        payload.extend_from_slice(&[8, 1]);
        payload.extend_from_slice(&3u32.to_le_bytes());
        payload.extend_from_slice(&[4, 5, 6]);
        let row = decode_binary_row(&payload, &cols).unwrap();
        assert_eq!(
            row[0],
            Value::DateTime(DateTime {
                year: 2024,
                month: 2,
                day: 29,
                hour: 13,
                minute: 5,
                second: 59,
                microsecond: 0,
            })
        );
        assert_eq!(
            row[1],
            Value::Time(Time {
                negative: true,
                days: 3,
                hours: 4,
                minutes: 5,
                seconds: 6,
                microseconds: 0,
            })
        );
    }

    #[test]
    fn test_binary_row_bad_header() {
        let cols = vec![column(ColumnType::MYSQL_TYPE_TINY, 0, BINARY_CHARSET)];
        assert!(matches!(
            decode_binary_row(&[0x01, 0x00, 0x05], &cols),
            Err(Error::Protocol(_))
        ));
    }
}
