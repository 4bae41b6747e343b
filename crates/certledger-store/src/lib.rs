//! # Certledger Store
//!
//! Persistence for the certificate ledger. A small transactional key-value
//! abstraction ([`KvEngine`]) sits under the ledger indexes, with SQLite and
//! in-memory implementations.
//!
//! ## Key Types
//!
//! - [`KvEngine`] - Transactional key-value engine
//! - [`SqliteEngine`] - SQLite-based persistent engine
//! - [`MemoryEngine`] - In-memory engine for tests
//! - [`LedgerStore`] - Block, transaction and artifact indexes, and block assembly
//!
//! ## Usage
//!
//! ```rust,no_run
//! use certledger_core::CryptoContext;
//! use certledger_store::{BlockSigner, LedgerStore, SqliteEngine};
//!
//! let engine = SqliteEngine::open("ledger.db").unwrap();
//! let store = LedgerStore::new(engine, CryptoContext::default(), BlockSigner::generate());
//!
//! let root = store.ensure_root().unwrap();
//! assert_eq!(root.height, 0);
//! ```
//!
//! ## Design Notes
//!
//! - **One transaction per operation**: a failed append leaves no trace
//! - **In-place links**: `next_*` pointers are rewritten when a successor lands
//! - **Double-spend protection**: a transaction must extend its artifact's latest transaction

pub mod engine;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod migration;
pub mod records;
pub mod sqlite;

pub use engine::{KvEngine, KvRead, KvWrite, Table};
pub use error::{Result, StoreError};
pub use ledger::{BlockSigner, LedgerStore};
pub use memory::MemoryEngine;
pub use records::{Artifact, Block, Transaction};
pub use sqlite::SqliteEngine;
