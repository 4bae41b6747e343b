//! # Certledger Testkit
//!
//! Testing utilities for the certificate ledger.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: Signing identities, ready-made stores and transactions
//! - **Generators**: Proptest strategies for property-based testing
//!
//! ## Property Testing
//!
//! Use the generators with proptest:
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use certledger_testkit::generators::{transaction_from_params, TransactionParams};
//!
//! proptest! {
//!     #[test]
//!     fn parses(params: TransactionParams) {
//!         let cert = transaction_from_params(&params);
//!         prop_assert!(cert.signed_region().unwrap().is_some());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! Quickly set up test scenarios:
//!
//! ```rust
//! use certledger_testkit::fixtures::TestFixture;
//!
//! let fixture = TestFixture::new();
//! let store = fixture.memory_store();
//! let (_artifact, id, certificate) = fixture.make_genesis(b"initial data");
//! let block = store.append_block(&[certificate]).unwrap();
//! assert_eq!(store.get_transaction_block(&id).unwrap(), Some(block.id));
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{
    multi_party_fixtures, random_payload, registry, TestFixture, PAYLOAD_FIELD,
    TEST_TRANSACTION_TYPE,
};
pub use generators::{transaction_from_params, TransactionParams};
