//! # Certledger Core
//!
//! Pure primitives for the certificate ledger: the field codec, certificates,
//! and attestation.
//!
//! This crate contains no I/O and no storage. Everything that needs outside
//! knowledge (entity keys, artifact state, contracts) is asked for through
//! the traits in [`resolver`].
//!
//! ## Key Types
//!
//! - [`Certificate`] - An immutable, optionally signed sequence of fields
//! - [`CertificateBuilder`] - Assembles and signs certificates
//! - [`Attestor`] - Decides whether a certificate is trustworthy
//! - [`LedgerTransaction`] - Typed view of a transaction certificate
//!
//! ## Wire Format
//!
//! Fields are `type: u16 BE`, `length: u32 BE`, `value`. See [`field`].

pub mod attest;
pub mod builder;
pub mod certificate;
pub mod crypto;
pub mod error;
pub mod field;
pub mod resolver;
pub mod transaction;
pub mod types;

pub use attest::{AttestOptions, Attestation, Attestor, Resolvers, MAX_CHAIN_DEPTH};
pub use builder::CertificateBuilder;
pub use certificate::{Certificate, CertificateType, SignedRegion, CERTIFICATE_VERSION};
pub use crypto::{
    generate_nonce, AgreementSecret, CryptoContext, CryptoSuite, Digest, Ed25519Blake3Suite, Keypair,
};
pub use error::{AttestError, CodecError, CoreError, CryptoError, ResolverError};
pub use field::{Field, FieldIter, FieldType, HeaderWidth};
pub use resolver::{
    ArtifactStateResolver, Contract, ContractRegistry, ContractResolver, EntityKeys,
    EntityResolver, NoArtifactState, NoContracts, StaticEntityResolver,
};
pub use transaction::{now_millis, LedgerTransaction, TransactionBuilder};
pub use types::{ArtifactId, BlockId, EntityId, TransactionId, ID_LEN};
