//! Transactional key-value engine: the storage seam under the ledger.
//!
//! Every ledger operation runs inside exactly one engine transaction. A write
//! closure that returns `Ok` commits; one that returns `Err` aborts and none
//! of its writes become visible.

use crate::error::Result;

/// The fixed set of tables the ledger uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    /// `block_id -> Block record`
    Blocks,
    /// `transaction_id -> Transaction record`
    Transactions,
    /// `artifact_id -> Artifact record`
    Artifacts,
    /// `height (u64 BE) -> block_id`
    Heights,
    /// `b"ledger-head" -> Block record`
    Head,
}

impl Table {
    pub const ALL: [Table; 5] = [
        Table::Blocks,
        Table::Transactions,
        Table::Artifacts,
        Table::Heights,
        Table::Head,
    ];

    /// SQL table name.
    pub const fn name(self) -> &'static str {
        match self {
            Table::Blocks => "blocks",
            Table::Transactions => "transactions",
            Table::Artifacts => "artifacts",
            Table::Heights => "heights",
            Table::Head => "head",
        }
    }
}

/// A key-value pair returned by range scans.
pub type Entry = (Vec<u8>, Vec<u8>);

/// Read access inside a transaction.
pub trait KvRead {
    /// Get the value stored under `key`.
    fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Entries with `start <= key < end` (unbounded when `end` is `None`),
    /// ordered by key bytes.
    fn range(&self, table: Table, start: &[u8], end: Option<&[u8]>) -> Result<Vec<Entry>>;
}

/// Write access inside a transaction. Reads observe the transaction's own writes.
pub trait KvWrite: KvRead {
    /// Insert or replace a value.
    fn put(&mut self, table: Table, key: &[u8], value: &[u8]) -> Result<()>;

    /// Remove a key. Returns whether it existed.
    fn delete(&mut self, table: Table, key: &[u8]) -> Result<bool>;
}

/// A transactional key-value engine.
///
/// Readers see either the state before or after a committed write, never a
/// partial one. Writes are serialized by the engine.
pub trait KvEngine: Send + Sync {
    /// Run `f` inside a read transaction.
    fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn KvRead) -> Result<T>;

    /// Run `f` inside a write transaction. `Ok` commits, `Err` aborts.
    fn write<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn KvWrite) -> Result<T>;
}
