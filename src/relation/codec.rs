//! Row codec
//!
//! Encoding and decoding of rows to record bytes.
//!
//! ## Wire Format
//! Columns are concatenated in schema order:
//! - INT:  4 bytes, little-endian i32
//! - TEXT: 2 bytes little-endian length + that many raw bytes
//!
//! No column names, type tags or terminators are stored; the schema is
//! required to decode a record.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{HeapError, Result};

use super::{Column, DataType, Schema, Value, ValueDict};

/// Size of an encoded INT
pub const INT_SIZE: usize = 4;

/// Size of a TEXT length prefix
pub const TEXT_LEN_SIZE: usize = 2;

// =============================================================================
// Encoding
// =============================================================================

/// Encode `row` in schema column order
///
/// Every schema column must be present in `row`; extra keys are ignored.
pub fn marshal(schema: &Schema, row: &ValueDict) -> Result<Bytes> {
    let mut buf = BytesMut::with_capacity(encoded_len_hint(schema, row));

    for column in schema.columns() {
        let value = row
            .get(&column.name)
            .ok_or_else(|| HeapError::MissingColumn(column.name.clone()))?;

        match (column.data_type, value) {
            (DataType::Int, Value::Int(n)) => buf.put_i32_le(*n),
            (DataType::Text, Value::Text(s)) => {
                let len = u16::try_from(s.len()).map_err(|_| HeapError::ValueTooLarge {
                    column: column.name.clone(),
                    size: s.len(),
                })?;
                buf.put_u16_le(len);
                buf.put_slice(s.as_bytes());
            }
            (DataType::Boolean, _) => return Err(unsupported(column)),
            (expected, value) => {
                return Err(HeapError::TypeMismatch {
                    column: column.name.clone(),
                    expected: expected.to_string(),
                    found: value.data_type().to_string(),
                })
            }
        }
    }

    Ok(buf.freeze())
}

fn encoded_len_hint(schema: &Schema, row: &ValueDict) -> usize {
    schema
        .columns()
        .iter()
        .map(|column| match row.get(&column.name) {
            Some(Value::Text(s)) => TEXT_LEN_SIZE + s.len(),
            _ => INT_SIZE,
        })
        .sum()
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode a record produced by [`marshal`] with the same schema
pub fn unmarshal(schema: &Schema, data: &[u8]) -> Result<ValueDict> {
    let mut buf = data;
    let mut row = ValueDict::new();

    for column in schema.columns() {
        let value = match column.data_type {
            DataType::Int => {
                need(buf, INT_SIZE, column)?;
                Value::Int(buf.get_i32_le())
            }
            DataType::Text => {
                need(buf, TEXT_LEN_SIZE, column)?;
                let len = buf.get_u16_le() as usize;
                need(buf, len, column)?;
                let text = buf.copy_to_bytes(len);
                let text = String::from_utf8(text.to_vec()).map_err(|e| {
                    HeapError::Corruption(format!("column {} is not valid text: {}", column.name, e))
                })?;
                Value::Text(text)
            }
            DataType::Boolean => return Err(unsupported(column)),
        };
        row.insert(column.name.clone(), value);
    }

    if buf.has_remaining() {
        return Err(HeapError::Corruption(format!(
            "{} trailing bytes after last column",
            buf.remaining()
        )));
    }

    Ok(row)
}

fn need(buf: &[u8], len: usize, column: &Column) -> Result<()> {
    if buf.len() < len {
        return Err(HeapError::Corruption(format!(
            "record truncated in column {}: need {} bytes, {} left",
            column.name,
            len,
            buf.len()
        )));
    }
    Ok(())
}

fn unsupported(column: &Column) -> HeapError {
    HeapError::UnsupportedColumnType {
        column: column.name.clone(),
        data_type: column.data_type.to_string(),
    }
}
