//! Certificate: an immutable, optionally signed sequence of fields.
//!
//! A certificate is a view over shared bytes. Before attestation every byte
//! is reachable by field lookups; after attestation the visible size shrinks
//! to the end of the signature field so unsigned trailing bytes can never be
//! mistaken for signed content.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::{CryptoContext, Digest};
use crate::error::{CodecError, CoreError};
use crate::field::{find_all, find_first, Field, FieldIter, FieldType};
use crate::types::EntityId;

/// Current certificate schema version.
pub const CERTIFICATE_VERSION: u16 = 1;

/// Certificate type tag carried in the `CERTIFICATE_TYPE` field.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CertificateType(pub u16);

impl CertificateType {
    /// A ledger block.
    pub const BLOCK: Self = Self(0x0001);

    /// First type available to ledger transactions.
    pub const TRANSACTION_MIN: Self = Self(0x0100);

    /// Raw tag value.
    pub const fn to_u16(self) -> u16 {
        self.0
    }

    /// Whether this type denotes a ledger transaction.
    pub fn is_transaction(self) -> bool {
        self.0 >= Self::TRANSACTION_MIN.0
    }
}

impl fmt::Debug for CertificateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CertificateType({:#06x})", self.0)
    }
}

/// The signed prefix of a certificate and the signature covering it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRegion {
    /// Every byte preceding the signature field.
    pub message: Bytes,
    /// The signature field itself.
    pub signature: Field,
}

/// An immutable certificate.
#[derive(Clone, PartialEq, Eq)]
pub struct Certificate {
    bytes: Bytes,
    visible_size: usize,
}

impl Certificate {
    /// Wrap raw bytes without validating them.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        let visible_size = bytes.len();
        Self {
            bytes,
            visible_size,
        }
    }

    /// Wrap raw bytes, checking that they decode as a sequence of fields.
    pub fn parse(bytes: impl Into<Bytes>) -> Result<Self, CodecError> {
        let certificate = Self::from_bytes(bytes);
        for field in certificate.fields() {
            field?;
        }
        Ok(certificate)
    }

    /// All raw bytes, including any unsigned trailer.
    pub fn raw_bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// The bytes within the visible size.
    pub fn visible_bytes(&self) -> Bytes {
        self.bytes.slice(..self.visible_size)
    }

    /// Total size in bytes.
    pub fn raw_size(&self) -> usize {
        self.bytes.len()
    }

    /// Number of bytes reachable by field lookups.
    pub fn visible_size(&self) -> usize {
        self.visible_size
    }

    /// Narrow the visible range. Never grows it.
    pub(crate) fn restrict_visible_size(&mut self, size: usize) {
        self.visible_size = self.visible_size.min(size);
    }

    /// Iterate the visible fields.
    pub fn fields(&self) -> FieldIter {
        FieldIter::new(self.bytes.clone(), self.visible_size)
    }

    /// First visible field of the given type.
    pub fn field(&self, field_type: FieldType) -> Result<Option<Field>, CodecError> {
        find_first(&self.bytes, self.visible_size, field_type)
    }

    /// Every visible field of the given type, in order.
    pub fn fields_of(&self, field_type: FieldType) -> Result<Vec<Field>, CodecError> {
        find_all(&self.bytes, self.visible_size, field_type)
    }

    /// First visible field of the given type, or `MissingField`.
    pub fn require(&self, field_type: FieldType) -> Result<Field, CoreError> {
        self.field(field_type)?
            .ok_or(CoreError::MissingField(field_type))
    }

    /// The `CERTIFICATE_TYPE` field, if present.
    pub fn certificate_type(&self) -> Result<Option<CertificateType>, CoreError> {
        match self.field(FieldType::CERTIFICATE_TYPE)? {
            Some(field) => Ok(Some(CertificateType(field.as_u16()?))),
            None => Ok(None),
        }
    }

    /// The `SIGNER_ID` field, if present.
    pub fn signer_id(&self) -> Result<Option<EntityId>, CoreError> {
        match self.field(FieldType::SIGNER_ID)? {
            Some(field) => Ok(Some(EntityId::from_field(FieldType::SIGNER_ID, &field.value)?)),
            None => Ok(None),
        }
    }

    /// A nested certificate carried as a field value.
    pub fn nested(field: &Field) -> Certificate {
        Certificate::from_bytes(field.value.clone())
    }

    /// The first visible signature field and the bytes it covers.
    pub fn signed_region(&self) -> Result<Option<SignedRegion>, CodecError> {
        Ok(self.field(FieldType::SIGNATURE)?.map(|signature| SignedRegion {
            message: self.bytes.slice(..signature.offset),
            signature,
        }))
    }

    /// Digest of the visible bytes.
    pub fn digest(&self, crypto: &CryptoContext) -> Digest {
        crypto.digest(&self.bytes[..self.visible_size])
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("raw_size", &self.bytes.len())
            .field("visible_size", &self.visible_size)
            .finish()
    }
}

impl AsRef<[u8]> for Certificate {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::encode_field;

    fn raw(fields: &[(FieldType, &[u8])]) -> Vec<u8> {
        let mut buf = Vec::new();
        for (t, v) in fields {
            encode_field(&mut buf, *t, v).unwrap();
        }
        buf
    }

    #[test]
    fn test_parse_rejects_trailing_garbage() {
        let mut bytes = raw(&[(FieldType::VERSION, &[0, 1])]);
        bytes.push(0xff);
        assert!(Certificate::parse(bytes).is_err());
    }

    #[test]
    fn test_typed_getters() {
        let signer = EntityId::from_bytes([7; 16]);
        let bytes = raw(&[
            (FieldType::CERTIFICATE_TYPE, &0x0101u16.to_be_bytes()),
            (FieldType::SIGNER_ID, signer.as_bytes()),
        ]);
        let cert = Certificate::parse(bytes).unwrap();

        assert_eq!(cert.certificate_type().unwrap(), Some(CertificateType(0x0101)));
        assert!(cert.certificate_type().unwrap().unwrap().is_transaction());
        assert_eq!(cert.signer_id().unwrap(), Some(signer));
    }

    #[test]
    fn test_require_missing_field() {
        let cert = Certificate::parse(raw(&[(FieldType::VERSION, &[0, 1])])).unwrap();
        assert_eq!(
            cert.require(FieldType::BLOCK_ID).unwrap_err(),
            CoreError::MissingField(FieldType::BLOCK_ID)
        );
    }

    #[test]
    fn test_restrict_visible_size_hides_tail() {
        let head = raw(&[(FieldType::VERSION, &[0, 1])]);
        let mut bytes = head.clone();
        bytes.extend(raw(&[(FieldType::BLOCK_ID, &[9; 16])]));

        let mut cert = Certificate::parse(bytes).unwrap();
        assert!(cert.field(FieldType::BLOCK_ID).unwrap().is_some());

        cert.restrict_visible_size(head.len());
        assert_eq!(cert.visible_size(), head.len());
        assert!(cert.field(FieldType::BLOCK_ID).unwrap().is_none());
        assert_eq!(cert.visible_bytes().len(), head.len());

        // Cannot be widened again.
        cert.restrict_visible_size(usize::MAX);
        assert_eq!(cert.visible_size(), head.len());
    }

    #[test]
    fn test_signed_region_covers_prefix() {
        let prefix = raw(&[(FieldType::VERSION, &[0, 1]), (FieldType::SIGNER_ID, &[3; 16])]);
        let mut bytes = prefix.clone();
        bytes.extend(raw(&[(FieldType::SIGNATURE, &[5; 64])]));

        let cert = Certificate::parse(bytes).unwrap();
        let region = cert.signed_region().unwrap().unwrap();
        assert_eq!(region.message.as_ref(), prefix.as_slice());
        assert_eq!(region.signature.end, cert.raw_size());

        let unsigned = Certificate::parse(prefix).unwrap();
        assert!(unsigned.signed_region().unwrap().is_none());
    }
}
