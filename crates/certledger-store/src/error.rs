//! Error types for the store module.

use thiserror::Error;

use certledger_core::{ArtifactId, AttestError, BlockId, CoreError, TransactionId};

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Certificate construction failed.
    #[error("certificate error: {0}")]
    Core(#[from] CoreError),

    /// A pending certificate is not a well-formed ledger transaction.
    #[error("invalid transaction: {0}")]
    InvalidTransaction(#[from] AttestError),

    /// The transaction id is already recorded.
    #[error("duplicate transaction {0}")]
    DuplicateTransaction(TransactionId),

    /// The declared previous transaction is not recorded.
    #[error("transaction {transaction} references unknown previous transaction {previous}")]
    MissingPreviousTransaction {
        transaction: TransactionId,
        previous: TransactionId,
    },

    /// The transaction does not extend the artifact's latest transaction.
    #[error("artifact {artifact} is at {expected}, transaction extends {declared}")]
    ArtifactConflict {
        artifact: ArtifactId,
        expected: TransactionId,
        declared: TransactionId,
    },

    /// Block not found.
    #[error("block not found: {0}")]
    BlockNotFound(BlockId),

    /// Transaction not found.
    #[error("transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    /// Invalid data in storage.
    #[error("corrupt {table} record: {reason}")]
    CorruptRecord { table: &'static str, reason: String },

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// A lock guarding engine state was poisoned by a panicking writer.
    #[error("lock poisoned: {0}")]
    Poisoned(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
