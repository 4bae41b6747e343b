//! Field codec: typed, length-prefixed values.
//!
//! A field is encoded as `type ‖ length ‖ value`, all integers big-endian.
//! Two header widths exist:
//!
//! - **short**: `u16` type, `u32` length (6 byte header), used by the ledger
//! - **long**: `u16` type, `u64` length (10 byte header)
//!
//! Decoding never copies: every decoded [`Field`] holds a [`Bytes`] slice of
//! the source buffer. A truncated header or a length running past the end of
//! the range is a [`CodecError`], never an out-of-bounds read.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CodecError, CoreError};

/// A field type tag.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldType(pub u16);

impl FieldType {
    // Certificate envelope (0x0001 - 0x000F)
    pub const VERSION: Self = Self(0x0001);
    pub const TIMESTAMP: Self = Self(0x0002);
    pub const CRYPTO_SUITE: Self = Self(0x0003);
    pub const CERTIFICATE_TYPE: Self = Self(0x0004);
    pub const SIGNER_ID: Self = Self(0x0005);
    pub const SIGNATURE: Self = Self(0x0006);
    /// Expected signer, checked against `SIGNER_ID` during attestation.
    pub const AUTHOR_ID: Self = Self(0x0007);
    /// Nested predecessor certificate, attested recursively.
    pub const CHAIN_CERTIFICATE: Self = Self(0x0008);

    // Blocks (0x0010 - 0x001F)
    pub const BLOCK_ID: Self = Self(0x0010);
    pub const PREVIOUS_BLOCK_ID: Self = Self(0x0011);
    pub const PREVIOUS_BLOCK_HASH: Self = Self(0x0012);
    pub const BLOCK_HEIGHT: Self = Self(0x0013);
    pub const WRAPPED_TRANSACTION: Self = Self(0x0014);

    // Transactions (0x0020 - 0x002F)
    pub const TRANSACTION_ID: Self = Self(0x0020);
    pub const PREVIOUS_TRANSACTION_ID: Self = Self(0x0021);
    pub const ARTIFACT_ID: Self = Self(0x0022);

    /// First type available to applications.
    pub const APPLICATION_MIN: Self = Self(0x0400);

    /// Raw tag value.
    pub const fn to_u16(self) -> u16 {
        self.0
    }

    /// Whether this tag is in the application range.
    pub fn is_application(self) -> bool {
        self.0 >= Self::APPLICATION_MIN.0
    }

    fn name(self) -> Option<&'static str> {
        Some(match self {
            Self::VERSION => "VERSION",
            Self::TIMESTAMP => "TIMESTAMP",
            Self::CRYPTO_SUITE => "CRYPTO_SUITE",
            Self::CERTIFICATE_TYPE => "CERTIFICATE_TYPE",
            Self::SIGNER_ID => "SIGNER_ID",
            Self::SIGNATURE => "SIGNATURE",
            Self::AUTHOR_ID => "AUTHOR_ID",
            Self::CHAIN_CERTIFICATE => "CHAIN_CERTIFICATE",
            Self::BLOCK_ID => "BLOCK_ID",
            Self::PREVIOUS_BLOCK_ID => "PREVIOUS_BLOCK_ID",
            Self::PREVIOUS_BLOCK_HASH => "PREVIOUS_BLOCK_HASH",
            Self::BLOCK_HEIGHT => "BLOCK_HEIGHT",
            Self::WRAPPED_TRANSACTION => "WRAPPED_TRANSACTION",
            Self::TRANSACTION_ID => "TRANSACTION_ID",
            Self::PREVIOUS_TRANSACTION_ID => "PREVIOUS_TRANSACTION_ID",
            Self::ARTIFACT_ID => "ARTIFACT_ID",
            _ => return None,
        })
    }
}

impl fmt::Debug for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "FieldType::{}", name),
            None => write!(f, "FieldType({:#06x})", self.0),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{:#06x}", self.0),
        }
    }
}

impl From<u16> for FieldType {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

/// Header width of an encoded field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeaderWidth {
    /// `u16` type, `u32` length.
    #[default]
    Short,
    /// `u16` type, `u64` length.
    Long,
}

impl HeaderWidth {
    /// Encoded header size in bytes.
    pub const fn header_len(self) -> usize {
        match self {
            HeaderWidth::Short => SHORT_HEADER_LEN,
            HeaderWidth::Long => LONG_HEADER_LEN,
        }
    }

    /// Largest value length this width can express.
    pub const fn max_value_len(self) -> u64 {
        match self {
            HeaderWidth::Short => u32::MAX as u64,
            HeaderWidth::Long => u64::MAX,
        }
    }
}

/// Header size of the short form.
pub const SHORT_HEADER_LEN: usize = 6;

/// Header size of the long form.
pub const LONG_HEADER_LEN: usize = 10;

/// Encoded size of a short-form field carrying `value_len` bytes.
pub const fn encoded_len(value_len: usize) -> usize {
    SHORT_HEADER_LEN + value_len
}

/// A decoded field: a zero-copy view into its source buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// The type tag.
    pub field_type: FieldType,
    /// The value bytes.
    pub value: Bytes,
    /// Offset of the field header in the source buffer.
    pub offset: usize,
    /// Offset immediately after the value.
    pub end: usize,
}

impl Field {
    /// Interpret the value as a big-endian `u16`.
    pub fn as_u16(&self) -> Result<u16, CoreError> {
        let bytes: [u8; 2] = self.fixed()?;
        Ok(u16::from_be_bytes(bytes))
    }

    /// Interpret the value as a big-endian `u64`.
    pub fn as_u64(&self) -> Result<u64, CoreError> {
        let bytes: [u8; 8] = self.fixed()?;
        Ok(u64::from_be_bytes(bytes))
    }

    /// Interpret the value as a fixed-size array.
    pub fn fixed<const N: usize>(&self) -> Result<[u8; N], CoreError> {
        self.value
            .as_ref()
            .try_into()
            .map_err(|_| CoreError::InvalidFieldLength {
                field: self.field_type,
                expected: N,
                actual: self.value.len(),
            })
    }
}

/// Append a short-form field to `buf`.
pub fn encode_field(buf: &mut Vec<u8>, field_type: FieldType, value: &[u8]) -> Result<(), CodecError> {
    encode_field_with(buf, HeaderWidth::Short, field_type, value)
}

/// Append a field with the given header width to `buf`.
pub fn encode_field_with(
    buf: &mut Vec<u8>,
    width: HeaderWidth,
    field_type: FieldType,
    value: &[u8],
) -> Result<(), CodecError> {
    if value.len() as u64 > width.max_value_len() {
        return Err(CodecError::ValueTooLarge(value.len()));
    }

    buf.extend_from_slice(&field_type.0.to_be_bytes());
    match width {
        HeaderWidth::Short => buf.extend_from_slice(&(value.len() as u32).to_be_bytes()),
        HeaderWidth::Long => buf.extend_from_slice(&(value.len() as u64).to_be_bytes()),
    }
    buf.extend_from_slice(value);
    Ok(())
}

/// Decode the short-form field starting at `offset`, bounded by `end`.
pub fn decode_field(buf: &Bytes, offset: usize, end: usize) -> Result<Field, CodecError> {
    decode_field_with(buf, HeaderWidth::Short, offset, end)
}

/// Decode the field starting at `offset`, bounded by `end`.
pub fn decode_field_with(
    buf: &Bytes,
    width: HeaderWidth,
    offset: usize,
    end: usize,
) -> Result<Field, CodecError> {
    let end = end.min(buf.len());
    let remaining = end.saturating_sub(offset);
    let header_len = width.header_len();

    if remaining < header_len {
        return Err(CodecError::TruncatedHeader {
            offset,
            remaining,
            needed: header_len,
        });
    }

    let header = &buf[offset..offset + header_len];
    let field_type = FieldType(u16::from_be_bytes([header[0], header[1]]));
    let declared = match width {
        HeaderWidth::Short => u32::from_be_bytes([header[2], header[3], header[4], header[5]]) as u64,
        HeaderWidth::Long => u64::from_be_bytes([
            header[2], header[3], header[4], header[5], header[6], header[7], header[8], header[9],
        ]),
    };

    let value_start = offset + header_len;
    let available = end - value_start;
    if declared > available as u64 {
        return Err(CodecError::LengthOverflow {
            offset,
            declared,
            remaining: available,
        });
    }

    let value_end = value_start + declared as usize;
    Ok(Field {
        field_type,
        value: buf.slice(value_start..value_end),
        offset,
        end: value_end,
    })
}

/// Iterator over the fields in `[start, end)` of a buffer.
///
/// Yields an error once and then stops if the range is malformed.
pub struct FieldIter {
    buf: Bytes,
    width: HeaderWidth,
    offset: usize,
    end: usize,
    failed: bool,
}

impl FieldIter {
    /// Iterate short-form fields over `buf[..end]`.
    pub fn new(buf: Bytes, end: usize) -> Self {
        Self::with_width(buf, HeaderWidth::Short, 0, end)
    }

    /// Iterate fields of the given width over `buf[start..end]`.
    pub fn with_width(buf: Bytes, width: HeaderWidth, start: usize, end: usize) -> Self {
        let end = end.min(buf.len());
        Self {
            buf,
            width,
            offset: start,
            end,
            failed: false,
        }
    }
}

impl Iterator for FieldIter {
    type Item = Result<Field, CodecError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.end {
            return None;
        }

        match decode_field_with(&self.buf, self.width, self.offset, self.end) {
            Ok(field) => {
                self.offset = field.end;
                Some(Ok(field))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Find the first field of `field_type` in `buf[..end]`.
pub fn find_first(buf: &Bytes, end: usize, field_type: FieldType) -> Result<Option<Field>, CodecError> {
    for field in FieldIter::new(buf.clone(), end) {
        let field = field?;
        if field.field_type == field_type {
            return Ok(Some(field));
        }
    }
    Ok(None)
}

/// Find every field of `field_type` in `buf[..end]`, in order.
pub fn find_all(buf: &Bytes, end: usize, field_type: FieldType) -> Result<Vec<Field>, CodecError> {
    let mut found = Vec::new();
    for field in FieldIter::new(buf.clone(), end) {
        let field = field?;
        if field.field_type == field_type {
            found.push(field);
        }
    }
    Ok(found)
}
