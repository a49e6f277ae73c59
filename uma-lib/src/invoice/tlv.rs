//! Byte-level tag-length-value primitives for the invoice codec.
//!
//! Records are `[tag: 1 byte][length: 1 byte][value bytes]`. Integers travel
//! big-endian in a signed container whose width is fixed per field by the
//! invoice schema; the decoder dispatches on the encoded length (1/2/4/8)
//! and range-checks into the schema type. Values longer than 255 bytes
//! cannot be represented and are a hard encode error.

use crate::{Result, UmaError};

/// Fixed integer container widths the schema can assign to a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum IntWidth {
    W1,
    W2,
    W4,
    W8,
}

impl IntWidth {
    fn fits(self, value: i64) -> bool {
        match self {
            Self::W1 => i8::try_from(value).is_ok(),
            Self::W2 => i16::try_from(value).is_ok(),
            Self::W4 => i32::try_from(value).is_ok(),
            Self::W8 => true,
        }
    }
}

/// Appends records to a growing TLV stream.
pub(crate) struct TlvWriter {
    buf: Vec<u8>,
}

impl TlvWriter {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn put_bytes(&mut self, tag: u8, value: &[u8]) -> Result<()> {
        let len = u8::try_from(value.len()).map_err(|_| {
            UmaError::Codec(format!(
                "tlv: value for tag {tag} is {} bytes, limit is 255",
                value.len()
            ))
        })?;
        self.buf.push(tag);
        self.buf.push(len);
        self.buf.extend_from_slice(value);
        Ok(())
    }

    pub fn put_str(&mut self, tag: u8, value: &str) -> Result<()> {
        self.put_bytes(tag, value.as_bytes())
    }

    pub fn put_bool(&mut self, tag: u8, value: bool) -> Result<()> {
        self.put_bytes(tag, &[u8::from(value)])
    }

    pub fn put_int(&mut self, tag: u8, value: i64, width: IntWidth) -> Result<()> {
        if !width.fits(value) {
            return Err(UmaError::Codec(format!(
                "tlv: value {value} for tag {tag} does not fit its {width:?} container"
            )));
        }
        match width {
            IntWidth::W1 => self.put_bytes(tag, &(value as i8).to_be_bytes()),
            IntWidth::W2 => self.put_bytes(tag, &(value as i16).to_be_bytes()),
            IntWidth::W4 => self.put_bytes(tag, &(value as i32).to_be_bytes()),
            IntWidth::W8 => self.put_bytes(tag, &value.to_be_bytes()),
        }
    }

    pub fn put_f64(&mut self, tag: u8, value: f64) -> Result<()> {
        self.put_bytes(tag, &value.to_be_bytes())
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Walks a TLV stream record by record. Unrecognized tags are the caller's
/// to skip; truncated streams are a hard error.
pub(crate) struct TlvReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> TlvReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn next_record(&mut self) -> Result<Option<(u8, &'a [u8])>> {
        if self.pos == self.bytes.len() {
            return Ok(None);
        }
        if self.bytes.len() - self.pos < 2 {
            return Err(UmaError::Codec("tlv: truncated record header".to_string()));
        }
        let tag = self.bytes[self.pos];
        let len = self.bytes[self.pos + 1] as usize;
        self.pos += 2;
        if self.bytes.len() - self.pos < len {
            return Err(UmaError::Codec(format!(
                "tlv: value for tag {tag} exceeds buffer"
            )));
        }
        let value = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(Some((tag, value)))
    }
}

/// Decodes a signed integer, dispatching on the encoded width.
pub(crate) fn decode_int(tag: u8, value: &[u8]) -> Result<i64> {
    match value.len() {
        1 => Ok(i8::from_be_bytes([value[0]]) as i64),
        2 => Ok(i16::from_be_bytes([value[0], value[1]]) as i64),
        4 => Ok(i32::from_be_bytes([value[0], value[1], value[2], value[3]]) as i64),
        8 => {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(value);
            Ok(i64::from_be_bytes(bytes))
        }
        other => Err(UmaError::Codec(format!(
            "tlv: tag {tag} has invalid integer width {other}"
        ))),
    }
}

/// Decodes an IEEE-754 value (4-byte single or 8-byte double).
pub(crate) fn decode_f64(tag: u8, value: &[u8]) -> Result<f64> {
    match value.len() {
        4 => Ok(f32::from_be_bytes([value[0], value[1], value[2], value[3]]) as f64),
        8 => {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(value);
            Ok(f64::from_be_bytes(bytes))
        }
        other => Err(UmaError::Codec(format!(
            "tlv: tag {tag} has invalid float width {other}"
        ))),
    }
}

pub(crate) fn decode_bool(tag: u8, value: &[u8]) -> Result<bool> {
    match value {
        [0] => Ok(false),
        [1] => Ok(true),
        _ => Err(UmaError::Codec(format!(
            "tlv: tag {tag} is not a boolean"
        ))),
    }
}

pub(crate) fn decode_str(tag: u8, value: &[u8]) -> Result<String> {
    String::from_utf8(value.to_vec())
        .map_err(|_| UmaError::Codec(format!("tlv: tag {tag} is not UTF-8")))
}
