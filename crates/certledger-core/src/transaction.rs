//! Ledger transactions: certificates that move an artifact forward.

use bytes::Bytes;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::builder::CertificateBuilder;
use crate::certificate::{Certificate, CertificateType, CERTIFICATE_VERSION};
use crate::crypto::CryptoContext;
use crate::error::{AttestError, CoreError};
use crate::field::FieldType;
use crate::types::{ArtifactId, EntityId, TransactionId};

/// Typed view over a transaction certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerTransaction {
    pub certificate: Certificate,
    pub certificate_type: CertificateType,
    pub transaction_id: TransactionId,
    pub artifact_id: ArtifactId,
    /// NIL when the transaction starts a new artifact.
    pub previous_transaction_id: TransactionId,
}

impl LedgerTransaction {
    /// Extract the ledger fields from a certificate.
    ///
    /// Only structure is checked here; signatures are the attestor's job.
    pub fn parse(certificate: Certificate) -> Result<Self, AttestError> {
        let certificate_type = certificate
            .certificate_type()?
            .ok_or(AttestError::MissingTransactionType)?;

        let transaction_id = certificate.require(FieldType::TRANSACTION_ID)?;
        let transaction_id = TransactionId::from_field(FieldType::TRANSACTION_ID, &transaction_id.value)?;

        let artifact_id = match certificate.field(FieldType::ARTIFACT_ID)? {
            Some(field) => ArtifactId::from_field(FieldType::ARTIFACT_ID, &field.value)?,
            None => return Err(AttestError::MissingArtifactId),
        };

        let previous_transaction_id = match certificate.field(FieldType::PREVIOUS_TRANSACTION_ID)? {
            Some(field) => TransactionId::from_field(FieldType::PREVIOUS_TRANSACTION_ID, &field.value)?,
            None => TransactionId::NIL,
        };

        Ok(Self {
            certificate,
            certificate_type,
            transaction_id,
            artifact_id,
            previous_transaction_id,
        })
    }

    /// Whether this transaction creates its artifact.
    pub fn is_genesis(&self) -> bool {
        self.previous_transaction_id.is_nil()
    }
}

/// Builder for transaction certificates.
///
/// Fields are laid out as version, timestamp, suite, type, transaction id,
/// artifact id, previous transaction id (when set), author, chain
/// certificate, then application fields in insertion order.
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    certificate_type: CertificateType,
    artifact_id: ArtifactId,
    transaction_id: TransactionId,
    previous: TransactionId,
    timestamp: Option<u64>,
    author: Option<EntityId>,
    chain: Option<Bytes>,
    fields: Vec<(FieldType, Bytes)>,
}

impl TransactionBuilder {
    /// A new transaction against `artifact_id` with a random transaction id.
    pub fn new(certificate_type: CertificateType, artifact_id: ArtifactId) -> Self {
        Self {
            certificate_type,
            artifact_id,
            transaction_id: TransactionId::generate(),
            previous: TransactionId::NIL,
            timestamp: None,
            author: None,
            chain: None,
            fields: Vec::new(),
        }
    }

    pub fn transaction_id(mut self, id: TransactionId) -> Self {
        self.transaction_id = id;
        self
    }

    /// The artifact's latest transaction this one extends.
    pub fn previous(mut self, id: TransactionId) -> Self {
        self.previous = id;
        self
    }

    /// Milliseconds since the Unix epoch. Defaults to now.
    pub fn timestamp(mut self, millis: u64) -> Self {
        self.timestamp = Some(millis);
        self
    }

    pub fn author(mut self, author: EntityId) -> Self {
        self.author = Some(author);
        self
    }

    /// Embed a predecessor certificate for chain-of-custody attestation.
    pub fn chain(mut self, certificate: &Certificate) -> Self {
        self.chain = Some(certificate.visible_bytes());
        self
    }

    /// Add an application field.
    pub fn field(mut self, field_type: FieldType, value: impl Into<Bytes>) -> Self {
        self.fields.push((field_type, value.into()));
        self
    }

    /// The id the built transaction will carry.
    pub fn id(&self) -> TransactionId {
        self.transaction_id
    }

    fn into_builder(self, crypto: &CryptoContext) -> CertificateBuilder {
        let mut builder = CertificateBuilder::with_capacity(self.fields.len() + 11);
        builder
            .add_u16(FieldType::VERSION, CERTIFICATE_VERSION)
            .add_u64(FieldType::TIMESTAMP, self.timestamp.unwrap_or_else(now_millis))
            .add_u16(FieldType::CRYPTO_SUITE, crypto.suite_id())
            .add_certificate_type(self.certificate_type)
            .add_id(FieldType::TRANSACTION_ID, self.transaction_id)
            .add_id(FieldType::ARTIFACT_ID, self.artifact_id);
        if !self.previous.is_nil() {
            builder.add_id(FieldType::PREVIOUS_TRANSACTION_ID, self.previous);
        }
        if let Some(author) = self.author {
            builder.add_id(FieldType::AUTHOR_ID, author);
        }
        if let Some(chain) = self.chain {
            builder.add_field(FieldType::CHAIN_CERTIFICATE, chain);
        }
        for (field_type, value) in self.fields {
            builder.add_field(field_type, value);
        }
        builder
    }

    /// Sign the transaction.
    pub fn sign(
        self,
        crypto: &CryptoContext,
        signer: &EntityId,
        private_key: &[u8],
    ) -> Result<Certificate, CoreError> {
        self.into_builder(crypto)
            .sign(crypto, signer.as_bytes(), private_key)
    }
}

/// Wall-clock milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
