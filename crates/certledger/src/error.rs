//! Error types for the ledger facade.

use certledger_core::{AttestError, TransactionId};
use certledger_store::StoreError;
use thiserror::Error;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// The certificate was rejected by attestation or is not a ledger transaction.
    #[error("attestation failed: {0}")]
    Attest(#[from] AttestError),

    /// The transaction is already waiting for the next block.
    #[error("transaction {0} is already pending")]
    DuplicatePending(TransactionId),

    /// The transaction is already recorded in a block.
    #[error("transaction {0} is already recorded")]
    AlreadyRecorded(TransactionId),

    /// The pending queue is at capacity.
    #[error("pending queue is full ({0} transactions)")]
    QueueFull(usize),

    /// A blocking task panicked or was cancelled.
    #[error("blocking task failed: {0}")]
    Blocking(String),
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
