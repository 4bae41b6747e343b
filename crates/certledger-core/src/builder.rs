//! Certificate builder.
//!
//! Fields are appended in call order and serialized only when the builder is
//! consumed by [`CertificateBuilder::emit`] or [`CertificateBuilder::sign`].

use bytes::Bytes;

use crate::certificate::{Certificate, CertificateType};
use crate::crypto::CryptoContext;
use crate::error::CoreError;
use crate::field::{encode_field, encoded_len, FieldType};
use crate::types::ID_LEN;

/// Builder for certificates.
#[derive(Debug, Clone, Default)]
pub struct CertificateBuilder {
    fields: Vec<(FieldType, Bytes)>,
}

impl CertificateBuilder {
    /// Start an empty certificate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with room for `n` fields.
    pub fn with_capacity(n: usize) -> Self {
        Self {
            fields: Vec::with_capacity(n),
        }
    }

    /// Append a field. Types may repeat.
    pub fn add_field(&mut self, field_type: FieldType, value: impl Into<Bytes>) -> &mut Self {
        self.fields.push((field_type, value.into()));
        self
    }

    /// Append a big-endian `u16`.
    pub fn add_u16(&mut self, field_type: FieldType, value: u16) -> &mut Self {
        self.add_field(field_type, value.to_be_bytes().to_vec())
    }

    /// Append a big-endian `u64`.
    pub fn add_u64(&mut self, field_type: FieldType, value: u64) -> &mut Self {
        self.add_field(field_type, value.to_be_bytes().to_vec())
    }

    /// Append a 16-byte identifier.
    pub fn add_id(&mut self, field_type: FieldType, id: impl AsRef<[u8]>) -> &mut Self {
        self.add_field(field_type, Bytes::copy_from_slice(id.as_ref()))
    }

    /// Append the `CERTIFICATE_TYPE` field.
    pub fn add_certificate_type(&mut self, certificate_type: CertificateType) -> &mut Self {
        self.add_u16(FieldType::CERTIFICATE_TYPE, certificate_type.to_u16())
    }

    /// Embed another certificate as the value of a field.
    pub fn add_certificate(&mut self, field_type: FieldType, certificate: &Certificate) -> &mut Self {
        self.add_field(field_type, certificate.visible_bytes())
    }

    /// Number of fields added so far.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no fields were added.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Serialized size of the fields added so far.
    pub fn encoded_size(&self) -> usize {
        self.fields.iter().map(|(_, v)| encoded_len(v.len())).sum()
    }

    /// Serialize the fields into an unsigned certificate.
    pub fn emit(self) -> Result<Certificate, CoreError> {
        if self.fields.is_empty() {
            return Err(CoreError::EmptyCertificate);
        }
        let expected = self.encoded_size();
        let buf = self.serialize(expected)?;
        Ok(Certificate::from_bytes(buf))
    }

    /// Append `SIGNER_ID` and `SIGNATURE` and serialize.
    ///
    /// The signature covers every byte preceding the signature field,
    /// including the signer-id field.
    pub fn sign(
        mut self,
        crypto: &CryptoContext,
        signer_id: &[u8],
        private_key: &[u8],
    ) -> Result<Certificate, CoreError> {
        if signer_id.len() != ID_LEN {
            return Err(CoreError::InvalidSignerId(signer_id.len()));
        }
        if self.fields.is_empty() {
            return Err(CoreError::EmptyCertificate);
        }

        self.add_field(FieldType::SIGNER_ID, Bytes::copy_from_slice(signer_id));
        let signature_len = crypto.signature_len();
        let message_len = self.encoded_size();
        let expected = message_len + encoded_len(signature_len);

        let mut buf = self.serialize(message_len)?;
        buf.reserve_exact(encoded_len(signature_len));

        let signature = crypto.sign(private_key, &buf)?;
        encode_field(&mut buf, FieldType::SIGNATURE, &signature)?;
        if buf.len() != expected {
            return Err(CoreError::SizeMismatch {
                expected,
                actual: buf.len(),
            });
        }

        Ok(Certificate::from_bytes(buf))
    }

    fn serialize(&self, expected: usize) -> Result<Vec<u8>, CoreError> {
        let mut buf = Vec::with_capacity(expected);
        for (field_type, value) in &self.fields {
            encode_field(&mut buf, *field_type, value)?;
        }
        if buf.len() != expected {
            return Err(CoreError::SizeMismatch {
                expected,
                actual: buf.len(),
            });
        }
        Ok(buf)
    }
}
