//! SQLite implementation of the key-value engine.
//!
//! This is the primary storage backend. It uses rusqlite with bundled SQLite.
//! Writes run under `BEGIN IMMEDIATE` so concurrent writers queue on the
//! database lock instead of failing at commit.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use crate::engine::{Entry, KvEngine, KvRead, KvWrite, Table};
use crate::error::{Result, StoreError};
use crate::migration;

/// SQLite-based engine.
///
/// Thread-safe via internal Mutex. Callers that live on an async runtime
/// should drive it from `spawn_blocking`.
#[derive(Clone)]
pub struct SqliteEngine {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteEngine {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Execute a blocking operation that needs mutable access.
    fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::Poisoned(format!("connection mutex: {}", e)))?;
        f(&mut conn)
    }
}

impl KvEngine for SqliteEngine {
    fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn KvRead) -> Result<T>,
    {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
            let value = f(&SqliteTxn { conn: &tx })?;
            tx.commit()?;
            Ok(value)
        })
    }

    fn write<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn KvWrite) -> Result<T>,
    {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let outcome = f(&mut SqliteTxn { conn: &tx });
            match outcome {
                Ok(value) => {
                    tx.commit()?;
                    Ok(value)
                }
                Err(e) => {
                    if let Err(rollback) = tx.rollback() {
                        tracing::warn!("rollback failed after {}: {}", e, rollback);
                    }
                    Err(e)
                }
            }
        })
    }
}

/// A view over an open SQLite transaction.
struct SqliteTxn<'a> {
    conn: &'a Connection,
}

impl KvRead for SqliteTxn<'_> {
    fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let sql = format!("SELECT value FROM {} WHERE key = ?1", table.name());
        let value = self
            .conn
            .prepare_cached(&sql)?
            .query_row(params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn range(&self, table: Table, start: &[u8], end: Option<&[u8]>) -> Result<Vec<Entry>> {
        let rows = match end {
            Some(end) => {
                let sql = format!(
                    "SELECT key, value FROM {} WHERE key >= ?1 AND key < ?2 ORDER BY key",
                    table.name()
                );
                let mut stmt = self.conn.prepare_cached(&sql)?;
                let rows = stmt
                    .query_map(params![start, end], |row| Ok((row.get(0)?, row.get(1)?)))?
                    .collect::<std::result::Result<Vec<Entry>, _>>()?;
                rows
            }
            None => {
                let sql = format!(
                    "SELECT key, value FROM {} WHERE key >= ?1 ORDER BY key",
                    table.name()
                );
                let mut stmt = self.conn.prepare_cached(&sql)?;
                let rows = stmt
                    .query_map(params![start], |row| Ok((row.get(0)?, row.get(1)?)))?
                    .collect::<std::result::Result<Vec<Entry>, _>>()?;
                rows
            }
        };
        Ok(rows)
    }
}

impl KvWrite for SqliteTxn<'_> {
    fn put(&mut self, table: Table, key: &[u8], value: &[u8]) -> Result<()> {
        let sql = format!(
            "INSERT OR REPLACE INTO {} (key, value) VALUES (?1, ?2)",
            table.name()
        );
        self.conn.prepare_cached(&sql)?.execute(params![key, value])?;
        tracing::debug!(table = table.name(), key = %hex::encode(key), len = value.len(), "put");
        Ok(())
    }

    fn delete(&mut self, table: Table, key: &[u8]) -> Result<bool> {
        let sql = format!("DELETE FROM {} WHERE key = ?1", table.name());
        let changed = self.conn.prepare_cached(&sql)?.execute(params![key])?;
        Ok(changed > 0)
    }
}
