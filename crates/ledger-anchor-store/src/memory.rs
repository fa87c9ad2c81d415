//! In-memory implementation of the EntryStore trait.
//!
//! Primarily for tests and dry runs. Same semantics as SQLite, no
//! persistence. Amounts and timestamps are kept as supplied rather than
//! converted to text.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use ledger_anchor_core::RawEntry;

use crate::error::{Result, StoreError};
use crate::traits::{prepare_for_insert, require_id, AnchorRecord, EntryStore, InsertResult};

/// In-memory store. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Entries keyed by insertion sequence.
    entries: BTreeMap<u64, RawEntry>,

    /// entry_id -> insertion sequence.
    index: HashMap<String, u64>,

    next_seq: u64,

    anchors: Vec<AnchorRecord>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Internal(format!("lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Internal(format!("lock poisoned: {}", e)))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntryStore for MemoryStore {
    async fn insert_entry(&self, entry: &RawEntry) -> Result<InsertResult> {
        let entry = prepare_for_insert(entry)?;
        let entry_id = entry.id().to_string();
        let mut inner = self.write()?;

        if inner.index.contains_key(&entry_id) {
            return Ok(InsertResult::AlreadyExists);
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.index.insert(entry_id, seq);
        inner.entries.insert(seq, entry);
        Ok(InsertResult::Inserted)
    }

    async fn get_entry(&self, entry_id: &str) -> Result<Option<RawEntry>> {
        let inner = self.read()?;
        Ok(inner
            .index
            .get(entry_id)
            .and_then(|seq| inner.entries.get(seq))
            .cloned())
    }

    async fn update_entry(&self, entry: &RawEntry) -> Result<bool> {
        let entry_id = require_id(entry)?;
        let mut inner = self.write()?;

        let Some(seq) = inner.index.get(entry_id).copied() else {
            return Ok(false);
        };
        if let Some(stored) = inner.entries.get_mut(&seq) {
            let timestamp = entry.timestamp.clone().or_else(|| stored.timestamp.take());
            *stored = RawEntry {
                timestamp,
                ..entry.clone()
            };
        }
        Ok(true)
    }

    async fn delete_entry(&self, entry_id: &str) -> Result<bool> {
        let mut inner = self.write()?;
        match inner.index.remove(entry_id) {
            Some(seq) => {
                inner.entries.remove(&seq);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_entries(&self) -> Result<Vec<RawEntry>> {
        Ok(self.read()?.entries.values().cloned().collect())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.read()?.entries.len())
    }

    async fn record_anchor(&self, record: &AnchorRecord) -> Result<()> {
        self.write()?.anchors.push(record.clone());
        Ok(())
    }

    async fn list_anchors(&self) -> Result<Vec<AnchorRecord>> {
        Ok(self.read()?.anchors.clone())
    }
}
