//! Proptest generators for property-based testing.

use bytes::Bytes;
use proptest::prelude::*;

use certledger_core::{
    ArtifactId, Certificate, CertificateType, CryptoContext, EntityId, FieldType, Keypair,
    TransactionBuilder, TransactionId,
};

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a random EntityId.
pub fn entity_id() -> impl Strategy<Value = EntityId> {
    any::<[u8; 16]>().prop_map(EntityId::from_bytes)
}

/// Generate a random ArtifactId.
pub fn artifact_id() -> impl Strategy<Value = ArtifactId> {
    any::<[u8; 16]>().prop_map(ArtifactId::from_bytes)
}

/// Generate a random TransactionId.
pub fn transaction_id() -> impl Strategy<Value = TransactionId> {
    any::<[u8; 16]>().prop_map(TransactionId::from_bytes)
}

/// Generate a transaction certificate type.
pub fn transaction_type() -> impl Strategy<Value = CertificateType> {
    (CertificateType::TRANSACTION_MIN.0..=u16::MAX).prop_map(CertificateType)
}

/// Generate an application field type.
pub fn application_field_type() -> impl Strategy<Value = FieldType> {
    (FieldType::APPLICATION_MIN.0..=u16::MAX).prop_map(FieldType)
}

/// Generate a field value of specified max length.
pub fn field_value(max_len: usize) -> impl Strategy<Value = Bytes> {
    prop::collection::vec(any::<u8>(), 0..=max_len).prop_map(Bytes::from)
}

/// Generate a list of application fields.
pub fn application_fields(max_fields: usize) -> impl Strategy<Value = Vec<(FieldType, Bytes)>> {
    prop::collection::vec((application_field_type(), field_value(256)), 0..=max_fields)
}

/// Parameters for generating a signed transaction.
#[derive(Debug, Clone)]
pub struct TransactionParams {
    pub keypair: Keypair,
    pub signer: EntityId,
    pub certificate_type: CertificateType,
    pub transaction_id: TransactionId,
    pub artifact_id: ArtifactId,
    pub previous: Option<TransactionId>,
    pub timestamp: u64,
    pub fields: Vec<(FieldType, Bytes)>,
}

impl Arbitrary for TransactionParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            keypair(),
            entity_id(),
            transaction_type(),
            transaction_id(),
            artifact_id(),
            proptest::option::of(transaction_id()),
            0u64..=1_700_000_000_000u64,
            application_fields(8),
        )
            .prop_map(
                |(keypair, signer, certificate_type, transaction_id, artifact_id, previous, timestamp, fields)| {
                    TransactionParams {
                        keypair,
                        signer,
                        certificate_type,
                        transaction_id,
                        artifact_id,
                        previous,
                        timestamp,
                        fields,
                    }
                },
            )
            .boxed()
    }
}

/// Generate a signed transaction certificate from parameters.
pub fn transaction_from_params(params: &TransactionParams) -> Certificate {
    let mut builder = TransactionBuilder::new(params.certificate_type, params.artifact_id)
        .transaction_id(params.transaction_id)
        .timestamp(params.timestamp);

    if let Some(previous) = params.previous {
        builder = builder.previous(previous);
    }
    for (field_type, value) in &params.fields {
        builder = builder.field(*field_type, value.clone());
    }

    builder
        .sign(
            &CryptoContext::default(),
            &params.signer,
            &params.keypair.private_key(),
        )
        .expect("sign generated transaction")
}

#[cfg(test)]
mod tests {
    use super::*;
    use certledger_core::{
        AttestError, AttestOptions, Attestor, EntityKeys, LedgerTransaction, NoArtifactState,
        NoContracts, Resolvers, StaticEntityResolver,
    };

    fn resolver_for(params: &TransactionParams) -> StaticEntityResolver {
        let resolver = StaticEntityResolver::new();
        resolver.register(
            params.signer,
            EntityKeys::new(Bytes::new(), params.keypair.public_key().to_vec()),
        );
        resolver
    }

    fn attest(
        entities: &StaticEntityResolver,
        certificate: &mut Certificate,
    ) -> Result<certledger_core::Attestation, AttestError> {
        let ctx = CryptoContext::default();
        Attestor::new(
            &ctx,
            Resolvers {
                entities,
                artifacts: &NoArtifactState,
                contracts: &NoContracts,
            },
        )
        .attest(certificate, AttestOptions::default())
    }

    proptest! {
        #[test]
        fn test_transaction_fields_survive(params: TransactionParams) {
            let tx = LedgerTransaction::parse(transaction_from_params(&params)).unwrap();

            prop_assert_eq!(tx.transaction_id, params.transaction_id);
            prop_assert_eq!(tx.artifact_id, params.artifact_id);
            prop_assert_eq!(tx.certificate_type, params.certificate_type);
            prop_assert_eq!(
                tx.previous_transaction_id,
                params.previous.filter(|p| !p.is_nil()).unwrap_or(TransactionId::NIL)
            );
        }

        #[test]
        fn test_signed_transaction_attests(mut params in any::<TransactionParams>()) {
            // A fresh artifact has no predecessor to extend.
            params.previous = None;
            let entities = resolver_for(&params);
            let mut cert = transaction_from_params(&params);
            let size = cert.raw_size();

            let attestation = attest(&entities, &mut cert).unwrap();
            prop_assert_eq!(attestation.signer, params.signer);
            prop_assert_eq!(attestation.visible_size, size);
        }

        #[test]
        fn test_flipped_byte_never_attests(
            mut params in any::<TransactionParams>(),
            index in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            params.previous = None;
            let entities = resolver_for(&params);
            let cert = transaction_from_params(&params);
            let signed_len = cert.signed_region().unwrap().unwrap().message.len();

            let mut bytes = cert.raw_bytes().to_vec();
            bytes[index.index(signed_len)] ^= 1 << bit;
            let mut tampered = Certificate::from_bytes(bytes);

            prop_assert!(attest(&entities, &mut tampered).is_err());
        }

        #[test]
        fn test_flipped_value_byte_is_signature_mismatch(
            mut params in any::<TransactionParams>(),
            index in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            params.previous = None;
            let entities = resolver_for(&params);
            let cert = transaction_from_params(&params);

            let positions: Vec<usize> = cert
                .fields()
                .map(|field| field.unwrap())
                .filter(|field| {
                    field.field_type != FieldType::SIGNER_ID
                        && field.field_type != FieldType::SIGNATURE
                })
                .flat_map(|field| (field.end - field.value.len())..field.end)
                .collect();

            let mut bytes = cert.raw_bytes().to_vec();
            bytes[positions[index.index(positions.len())]] ^= 1 << bit;
            let mut tampered = Certificate::from_bytes(bytes);

            prop_assert_eq!(
                attest(&entities, &mut tampered),
                Err(AttestError::SignatureMismatch)
            );
        }
    }
}
