//! Attestation: deciding whether a certificate is trustworthy.
//!
//! Attestation is ordered and short-circuiting. The first failing check
//! determines the error. Nothing here performs I/O directly; keys, artifact
//! state and contracts all come from the [`Resolvers`] the caller supplies.

use crate::certificate::Certificate;
use crate::crypto::CryptoContext;
use crate::error::{AttestError, ResolverError};
use crate::field::FieldType;
use crate::resolver::{ArtifactStateResolver, ContractResolver, EntityResolver};
use crate::types::{ArtifactId, EntityId, TransactionId};

/// Maximum nesting of `CHAIN_CERTIFICATE` fields.
pub const MAX_CHAIN_DEPTH: usize = 8;

/// Parameters for a single attestation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttestOptions {
    /// Ledger height at which signer keys are resolved.
    pub height: u64,
    /// Whether to run the contract for the certificate's type.
    pub validate_contract: bool,
}

impl AttestOptions {
    pub fn at_height(height: u64) -> Self {
        Self {
            height,
            validate_contract: false,
        }
    }

    pub fn with_contract(mut self, validate_contract: bool) -> Self {
        self.validate_contract = validate_contract;
        self
    }
}

/// Outcome of a successful attestation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attestation {
    /// The entity whose key verified the signature.
    pub signer: EntityId,
    /// Visible size after attestation: the offset just past the signature.
    pub visible_size: usize,
    /// Number of nested chain certificates that were attested.
    pub chain_depth: usize,
}

/// The capabilities an attestation draws on.
#[derive(Clone, Copy)]
pub struct Resolvers<'a> {
    pub entities: &'a dyn EntityResolver,
    pub artifacts: &'a dyn ArtifactStateResolver,
    pub contracts: &'a dyn ContractResolver,
}

/// Attests certificates against a crypto context and a set of resolvers.
#[derive(Clone, Copy)]
pub struct Attestor<'a> {
    crypto: &'a CryptoContext,
    resolvers: Resolvers<'a>,
}

impl<'a> Attestor<'a> {
    pub fn new(crypto: &'a CryptoContext, resolvers: Resolvers<'a>) -> Self {
        Self { crypto, resolvers }
    }

    /// Attest a certificate.
    ///
    /// On success the certificate's visible size is narrowed to the end of
    /// its signature field. On failure the certificate is left untouched.
    pub fn attest(
        &self,
        certificate: &mut Certificate,
        options: AttestOptions,
    ) -> Result<Attestation, AttestError> {
        let attestation = self.attest_at(certificate, options, 0)?;
        certificate.restrict_visible_size(attestation.visible_size);
        Ok(attestation)
    }

    fn attest_at(
        &self,
        certificate: &Certificate,
        options: AttestOptions,
        depth: usize,
    ) -> Result<Attestation, AttestError> {
        // 1. Signer id
        let signer_field = certificate
            .field(FieldType::SIGNER_ID)?
            .ok_or(AttestError::MissingSignerId)?;
        let signer = EntityId::from_field(FieldType::SIGNER_ID, &signer_field.value)?;

        // 2. Signature
        let region = certificate
            .signed_region()?
            .ok_or(AttestError::MissingSignature)?;

        // 3. Signer keys
        let keys = self
            .resolvers
            .entities
            .resolve_entity_keys(&signer, options.height)?;
        if keys.public_signing_key.is_empty() {
            return Err(AttestError::SignerMissingSigningKey(signer));
        }

        // Everything below reads only the signed bytes.
        let visible_size = region.signature.end;
        let mut signed = certificate.clone();
        signed.restrict_visible_size(visible_size);

        // 4. Declared author
        if let Some(author) = signed.field(FieldType::AUTHOR_ID)? {
            let declared = EntityId::from_field(FieldType::AUTHOR_ID, &author.value)?;
            if declared != signer {
                return Err(AttestError::SignerUuidMismatch { declared, signer });
            }
        }

        // 5. Signature over the preceding bytes, which must include the signer id
        if signer_field.end > region.signature.offset
            || !self.crypto.verify(
                &keys.public_signing_key,
                &region.signature.value,
                &region.message,
            )
        {
            return Err(AttestError::SignatureMismatch);
        }

        // 6. Chain of custody
        let mut chain_depth = 0;
        if let Some(chain) = signed.field(FieldType::CHAIN_CERTIFICATE)? {
            if depth >= MAX_CHAIN_DEPTH {
                return Err(AttestError::ChainTooDeep(MAX_CHAIN_DEPTH));
            }
            let nested = Certificate::nested(&chain);
            match self.attest_at(&nested, options, depth + 1) {
                Ok(inner) => chain_depth = inner.chain_depth + 1,
                Err(e @ AttestError::Resolver(ResolverError::MissingSigningCertificate(_))) => {
                    return Err(e)
                }
                Err(e) => {
                    return Err(AttestError::ChainAttestationFailure {
                        depth: depth + 1,
                        source: Box::new(e),
                    })
                }
            }
        }

        // 7. Artifact linkage, only for the outermost certificate; nested
        // predecessors necessarily point at older state.
        let artifact = match signed.field(FieldType::ARTIFACT_ID)? {
            Some(field) => Some(ArtifactId::from_field(FieldType::ARTIFACT_ID, &field.value)?),
            None => None,
        };
        if depth == 0 {
            if let Some(artifact) = artifact {
                let declared = match signed.field(FieldType::PREVIOUS_TRANSACTION_ID)? {
                    Some(field) => {
                        TransactionId::from_field(FieldType::PREVIOUS_TRANSACTION_ID, &field.value)?
                    }
                    None => TransactionId::NIL,
                };
                let expected = self
                    .resolvers
                    .artifacts
                    .resolve_artifact_state(&artifact)?
                    .unwrap_or(TransactionId::NIL);
                if declared != expected {
                    return Err(AttestError::ArtifactStateConflict {
                        artifact,
                        expected,
                        declared,
                    });
                }
            }
        }

        // 8. Contract
        if options.validate_contract {
            let certificate_type = signed
                .certificate_type()?
                .ok_or(AttestError::MissingTransactionType)?;
            let contract = self
                .resolvers
                .contracts
                .resolve_contract(certificate_type, artifact.as_ref())
                .ok_or(AttestError::MissingContract {
                    certificate_type: certificate_type.to_u16(),
                    artifact,
                })?;
            contract
                .verify(&signed)
                .map_err(AttestError::ContractVerificationFailure)?;
        }

        // 9. Done
        Ok(Attestation {
            signer,
            visible_size,
            chain_depth,
        })
    }
}
