//! In-memory implementation of the key-value engine.
//!
//! This is primarily for testing. It has the same transactional semantics as
//! SQLite but keeps everything in memory with no persistence.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::RwLock;

use crate::engine::{Entry, KvEngine, KvRead, KvWrite, Table};
use crate::error::{Result, StoreError};

type Tables = BTreeMap<Table, BTreeMap<Vec<u8>, Vec<u8>>>;

/// In-memory engine.
///
/// All data is lost when the engine is dropped. Thread-safe via RwLock; a
/// write transaction holds the write lock for its whole duration.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    tables: RwLock<Tables>,
}

impl MemoryEngine {
    /// Create a new empty in-memory engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys stored in a table.
    pub fn len(&self, table: Table) -> Result<usize> {
        let tables = self.tables.read().map_err(poisoned)?;
        Ok(tables.get(&table).map_or(0, BTreeMap::len))
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Poisoned(format!("memory engine: {}", e))
}

fn scan(
    tables: &Tables,
    table: Table,
    start: &[u8],
    end: Option<&[u8]>,
) -> BTreeMap<Vec<u8>, Vec<u8>> {
    let upper = match end {
        Some(end) if end <= start => return BTreeMap::new(),
        Some(end) => Bound::Excluded(end),
        None => Bound::Unbounded,
    };
    tables
        .get(&table)
        .map(|t| {
            t.range::<[u8], _>((Bound::Included(start), upper))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
        .unwrap_or_default()
}

fn in_range(key: &[u8], start: &[u8], end: Option<&[u8]>) -> bool {
    key >= start && end.map_or(true, |end| key < end)
}

impl KvEngine for MemoryEngine {
    fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn KvRead) -> Result<T>,
    {
        let tables = self.tables.read().map_err(poisoned)?;
        f(&MemoryView { tables: &tables })
    }

    fn write<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn KvWrite) -> Result<T>,
    {
        let mut tables = self.tables.write().map_err(poisoned)?;

        let mut txn = MemoryTxn {
            base: &tables,
            overlay: BTreeMap::new(),
        };
        let value = f(&mut txn)?;
        let overlay = txn.overlay;

        for ((table, key), staged) in overlay {
            let entries = tables.entry(table).or_default();
            match staged {
                Some(bytes) => {
                    entries.insert(key, bytes);
                }
                None => {
                    entries.remove(&key);
                }
            }
        }
        Ok(value)
    }
}

/// Read-only view of committed state.
struct MemoryView<'a> {
    tables: &'a Tables,
}

impl KvRead for MemoryView<'_> {
    fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.tables.get(&table).and_then(|t| t.get(key)).cloned())
    }

    fn range(&self, table: Table, start: &[u8], end: Option<&[u8]>) -> Result<Vec<Entry>> {
        Ok(scan(self.tables, table, start, end).into_iter().collect())
    }
}

/// Staged writes over committed state. `None` marks a deletion.
struct MemoryTxn<'a> {
    base: &'a Tables,
    overlay: BTreeMap<(Table, Vec<u8>), Option<Vec<u8>>>,
}

impl KvRead for MemoryTxn<'_> {
    fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(staged) = self.overlay.get(&(table, key.to_vec())) {
            return Ok(staged.clone());
        }
        Ok(self.base.get(&table).and_then(|t| t.get(key)).cloned())
    }

    fn range(&self, table: Table, start: &[u8], end: Option<&[u8]>) -> Result<Vec<Entry>> {
        let mut merged = scan(self.base, table, start, end);
        for ((t, key), value) in &self.overlay {
            if *t != table || !in_range(key, start, end) {
                continue;
            }
            match value {
                Some(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }
        Ok(merged.into_iter().collect())
    }
}

impl KvWrite for MemoryTxn<'_> {
    fn put(&mut self, table: Table, key: &[u8], value: &[u8]) -> Result<()> {
        self.overlay
            .insert((table, key.to_vec()), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&mut self, table: Table, key: &[u8]) -> Result<bool> {
        let existed = self.get(table, key)?.is_some();
        self.overlay.insert((table, key.to_vec()), None);
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_applies_overlay() {
        let engine = MemoryEngine::new();
        engine
            .write(|tx| {
                tx.put(Table::Blocks, b"a", b"1")?;
                tx.put(Table::Blocks, b"b", b"2")?;
                Ok(())
            })
            .unwrap();

        assert_eq!(engine.len(Table::Blocks).unwrap(), 2);
        assert_eq!(
            engine.read(|r| r.get(Table::Blocks, b"b")).unwrap(),
            Some(b"2".to_vec())
        );
    }

    #[test]
    fn test_abort_discards_overlay() {
        let engine = MemoryEngine::new();
        engine.write(|tx| tx.put(Table::Blocks, b"keep", b"1")).unwrap();

        let result: Result<()> = engine.write(|tx| {
            tx.put(Table::Blocks, b"drop", b"2")?;
            tx.delete(Table::Blocks, b"keep")?;
            Err(StoreError::Migration("abort".into()))
        });
        assert!(result.is_err());

        assert_eq!(
            engine.read(|r| r.get(Table::Blocks, b"keep")).unwrap(),
            Some(b"1".to_vec())
        );
        assert_eq!(engine.read(|r| r.get(Table::Blocks, b"drop")).unwrap(), None);
    }

    #[test]
    fn test_txn_reads_own_writes() {
        let engine = MemoryEngine::new();
        engine.write(|tx| tx.put(Table::Heights, b"\x01", b"old")).unwrap();

        engine
            .write(|tx| {
                tx.put(Table::Heights, b"\x00", b"zero")?;
                tx.put(Table::Heights, b"\x01", b"new")?;
                assert!(tx.delete(Table::Heights, b"\x00")?);
                assert_eq!(tx.get(Table::Heights, b"\x01")?, Some(b"new".to_vec()));

                let all = tx.range(Table::Heights, b"", None)?;
                assert_eq!(all, vec![(b"\x01".to_vec(), b"new".to_vec())]);
                Ok(())
            })
            .unwrap();
    }
}
