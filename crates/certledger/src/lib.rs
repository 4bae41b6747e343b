//! # Certledger
//!
//! An append-only ledger of signed certificates. Transactions are certificates
//! that move an artifact from one state to the next; blocks wrap batches of
//! transactions and are chained by height and by the digest of their
//! predecessor.
//!
//! ## Overview
//!
//! - **Certificates**: Immutable, signed sequences of typed fields
//! - **Attestation**: Signature, chain-of-custody, artifact linkage and contract checks
//! - **Blocks**: Signed, height-indexed, linked forward and backward
//! - **Artifacts**: Each transaction must extend its artifact's latest transaction
//!
//! ## Usage
//!
//! ```rust,no_run
//! use certledger::{Ledger, LedgerConfig};
//! use certledger::core::{CryptoContext, NoContracts, StaticEntityResolver};
//! use certledger::store::{BlockSigner, LedgerStore, SqliteEngine};
//!
//! async fn example() {
//!     let engine = SqliteEngine::open("ledger.db").unwrap();
//!     let store = LedgerStore::new(engine, CryptoContext::default(), BlockSigner::generate());
//!     let ledger = Ledger::new(
//!         store,
//!         StaticEntityResolver::new(),
//!         NoContracts,
//!         LedgerConfig::default(),
//!     );
//!
//!     // let id = ledger.submit(certificate).await.unwrap();
//!     let block = ledger.append_block().await.unwrap();
//!     assert_eq!(block.height, 1);
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `certledger::core` - Codec, certificates, attestation
//! - `certledger::store` - Engines and ledger indexes

pub mod config;
pub mod error;
pub mod ledger;

pub use certledger_core as core;
pub use certledger_store as store;

pub use config::LedgerConfig;
pub use error::{LedgerError, Result};
pub use ledger::{Ledger, SubmissionStatus};

pub use certledger_core::{
    ArtifactId, AttestError, Attestation, BlockId, Certificate, CertificateBuilder,
    CertificateType, EntityId, Keypair, TransactionBuilder, TransactionId,
};
pub use certledger_store::{Artifact, Block, BlockSigner, Transaction};
