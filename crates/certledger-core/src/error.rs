//! Error types for the certificate ledger core.

use thiserror::Error;

use crate::field::FieldType;
use crate::types::{ArtifactId, EntityId, TransactionId};

/// Errors raised while encoding or decoding a field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("truncated field header at offset {offset}: {remaining} bytes remain, {needed} needed")]
    TruncatedHeader {
        offset: usize,
        remaining: usize,
        needed: usize,
    },

    #[error("field at offset {offset} declares {declared} bytes but only {remaining} remain")]
    LengthOverflow {
        offset: usize,
        declared: u64,
        remaining: usize,
    },

    #[error("field value of {0} bytes exceeds the header length width")]
    ValueTooLarge(usize),
}

/// Errors from the crypto suite.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("invalid private key")]
    InvalidPrivateKey,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("encryption error: {0}")]
    Encryption(String),

    #[error("decryption error: {0}")]
    Decryption(String),
}

/// Structural errors: malformed certificates and builder misuse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("cannot emit empty certificate")]
    EmptyCertificate,

    #[error("signer id must be 16 bytes, got {0}")]
    InvalidSignerId(usize),

    #[error("emitted certificate is {actual} bytes, precomputed size was {expected}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("missing field {0}")]
    MissingField(FieldType),

    #[error("field {field} must be {expected} bytes, got {actual}")]
    InvalidFieldLength {
        field: FieldType,
        expected: usize,
        actual: usize,
    },
}

/// Failures reported by resolver capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolverError {
    #[error("unknown entity {entity} at height {height}")]
    UnknownEntity { entity: EntityId, height: u64 },

    #[error("missing signing certificate for entity {0}")]
    MissingSigningCertificate(EntityId),

    #[error("resolver backend failure: {0}")]
    Backend(String),
}

/// Attestation failures.
///
/// Structural problems surface as [`AttestError::Structural`]; everything
/// else is a trust failure the caller can apply policy to.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttestError {
    #[error("structural error: {0}")]
    Structural(#[from] CoreError),

    #[error("certificate has no signer id")]
    MissingSignerId,

    #[error("certificate has no signature")]
    MissingSignature,

    #[error("certificate has no transaction type")]
    MissingTransactionType,

    #[error("certificate has no artifact id")]
    MissingArtifactId,

    #[error(transparent)]
    Resolver(#[from] ResolverError),

    #[error("signer {0} has no signing key")]
    SignerMissingSigningKey(EntityId),

    #[error("certificate declares author {declared} but was signed by {signer}")]
    SignerUuidMismatch { declared: EntityId, signer: EntityId },

    #[error("signature verification failed")]
    SignatureMismatch,

    #[error("chain attestation failed at depth {depth}: {source}")]
    ChainAttestationFailure {
        depth: usize,
        #[source]
        source: Box<AttestError>,
    },

    #[error("certificate chain exceeds maximum depth of {0}")]
    ChainTooDeep(usize),

    #[error("artifact {artifact} expects previous transaction {expected}, certificate declares {declared}")]
    ArtifactStateConflict {
        artifact: ArtifactId,
        expected: TransactionId,
        declared: TransactionId,
    },

    #[error("no contract for certificate type {certificate_type:#06x}")]
    MissingContract {
        certificate_type: u16,
        artifact: Option<ArtifactId>,
    },

    #[error("contract verification failed: {0}")]
    ContractVerificationFailure(String),
}

impl AttestError {
    /// Follow chain-attestation wrappers down to the originating failure.
    pub fn root_cause(&self) -> &AttestError {
        let mut current = self;
        while let AttestError::ChainAttestationFailure { source, .. } = current {
            current = source;
        }
        current
    }

    /// True for malformed input, false for trust failures.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            AttestError::Structural(_)
                | AttestError::MissingSignerId
                | AttestError::MissingSignature
                | AttestError::MissingTransactionType
                | AttestError::MissingArtifactId
        )
    }
}

impl From<CodecError> for AttestError {
    fn from(e: CodecError) -> Self {
        AttestError::Structural(CoreError::Codec(e))
    }
}
