//! Wire-level field primitives.
//!
//! # Format
//!
//! Every message is a flat list of fields. A field is encoded as:
//!
//! - 4 bytes field number (big-endian u32)
//! - 4 bytes payload length (big-endian u32)
//! - payload bytes
//!
//! Scalars use fixed-width big-endian payloads (`i32`/`i64`/`f64`), bools
//! one byte, strings raw UTF-8, and nested messages their own field list.
//! Repeated fields repeat the field number. Because every field is
//! length-delimited, a decoder can skip or preserve fields it does not
//! recognize without understanding them.

use serde::{Deserialize, Serialize};

use crate::error::{DecodeError, EncodeError};

/// A field whose number is not part of the current schema, kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawField {
    /// The field number found on the wire.
    pub field_no: u32,
    /// The untouched payload bytes.
    pub payload: Vec<u8>,
}

/// Unrecognized fields of a decoded message, preserved for
/// re-serialization.
///
/// A plan built locally always has an empty set. Decoding a message from
/// a newer producer fills it, and encoding appends the raw fields after
/// the known ones, so the foreign fields survive a round trip through an
/// older consumer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnknownFields(Vec<RawField>);

impl UnknownFields {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Returns true if no unknown fields were seen.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of preserved fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Records a field for later re-serialization.
    pub fn push(&mut self, field: RawField) {
        self.0.push(field);
    }

    /// Iterates the preserved fields in the order they were seen.
    pub fn iter(&self) -> impl Iterator<Item = &RawField> {
        self.0.iter()
    }
}

/// Header size of one field: number + length.
const FIELD_HEADER_LEN: usize = 8;

/// Appends a field with an already-built payload.
pub(crate) fn put_field(
    buf: &mut Vec<u8>,
    field_no: u32,
    payload: &[u8],
) -> Result<(), EncodeError> {
    let len = u32::try_from(payload.len())
        .map_err(|_| EncodeError::TooLong { what: "field payload", len: payload.len() })?;
    buf.extend_from_slice(&field_no.to_be_bytes());
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(payload);
    Ok(())
}

/// Appends a nested-message field, writing the payload through a closure
/// and backpatching the length afterwards.
pub(crate) fn put_message<F>(buf: &mut Vec<u8>, field_no: u32, write: F) -> Result<(), EncodeError>
where
    F: FnOnce(&mut Vec<u8>) -> Result<(), EncodeError>,
{
    buf.extend_from_slice(&field_no.to_be_bytes());
    let len_pos = buf.len();
    buf.extend_from_slice(&[0u8; 4]);
    write(buf)?;
    let len = buf.len() - len_pos - 4;
    let len = u32::try_from(len).map_err(|_| EncodeError::TooLong { what: "message", len })?;
    buf[len_pos..len_pos + 4].copy_from_slice(&len.to_be_bytes());
    Ok(())
}

pub(crate) fn put_i32(buf: &mut Vec<u8>, field_no: u32, value: i32) -> Result<(), EncodeError> {
    put_field(buf, field_no, &value.to_be_bytes())
}

pub(crate) fn put_i64(buf: &mut Vec<u8>, field_no: u32, value: i64) -> Result<(), EncodeError> {
    put_field(buf, field_no, &value.to_be_bytes())
}

pub(crate) fn put_f64(buf: &mut Vec<u8>, field_no: u32, value: f64) -> Result<(), EncodeError> {
    put_field(buf, field_no, &value.to_be_bytes())
}

pub(crate) fn put_bool(buf: &mut Vec<u8>, field_no: u32, value: bool) -> Result<(), EncodeError> {
    put_field(buf, field_no, &[u8::from(value)])
}

pub(crate) fn put_str(buf: &mut Vec<u8>, field_no: u32, value: &str) -> Result<(), EncodeError> {
    put_field(buf, field_no, value.as_bytes())
}

/// Appends every preserved unknown field, verbatim.
pub(crate) fn put_unknown(buf: &mut Vec<u8>, unknown: &UnknownFields) -> Result<(), EncodeError> {
    for raw in unknown.iter() {
        put_field(buf, raw.field_no, &raw.payload)?;
    }
    Ok(())
}

/// Iterates the fields of one message payload.
pub(crate) struct FieldReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    pub(crate) const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Returns the next `(field_no, payload)` pair, or `None` at the end
    /// of the message.
    pub(crate) fn next_field(&mut self) -> Result<Option<(u32, &'a [u8])>, DecodeError> {
        if self.pos == self.buf.len() {
            return Ok(None);
        }
        if self.buf.len() - self.pos < FIELD_HEADER_LEN {
            return Err(DecodeError::UnexpectedEof);
        }
        let field_no = read_u32(&self.buf[self.pos..self.pos + 4]);
        let len = read_u32(&self.buf[self.pos + 4..self.pos + 8]) as usize;
        let start = self.pos + FIELD_HEADER_LEN;
        if self.buf.len() - start < len {
            return Err(DecodeError::UnexpectedEof);
        }
        self.pos = start + len;
        Ok(Some((field_no, &self.buf[start..start + len])))
    }
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut array = [0u8; 4];
    array.copy_from_slice(bytes);
    u32::from_be_bytes(array)
}

pub(crate) fn get_i32(payload: &[u8]) -> Result<i32, DecodeError> {
    let array: [u8; 4] = payload
        .try_into()
        .map_err(|_| DecodeError::WrongFieldSize { expected: 4, actual: payload.len() })?;
    Ok(i32::from_be_bytes(array))
}

pub(crate) fn get_i64(payload: &[u8]) -> Result<i64, DecodeError> {
    let array: [u8; 8] = payload
        .try_into()
        .map_err(|_| DecodeError::WrongFieldSize { expected: 8, actual: payload.len() })?;
    Ok(i64::from_be_bytes(array))
}

pub(crate) fn get_f64(payload: &[u8]) -> Result<f64, DecodeError> {
    let array: [u8; 8] = payload
        .try_into()
        .map_err(|_| DecodeError::WrongFieldSize { expected: 8, actual: payload.len() })?;
    Ok(f64::from_be_bytes(array))
}

pub(crate) fn get_bool(payload: &[u8]) -> Result<bool, DecodeError> {
    if payload.len() != 1 {
        return Err(DecodeError::WrongFieldSize { expected: 1, actual: payload.len() });
    }
    Ok(payload[0] != 0)
}

pub(crate) fn get_str(payload: &[u8]) -> Result<String, DecodeError> {
    Ok(String::from_utf8(payload.to_vec())?)
}
