//! Store trait: the abstract interface for entry persistence and the anchor log.
//!
//! Implementations include SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use ledger_anchor_core::{
    AckToken, CommitmentMode, Digest, DigestAlgorithm, PublicKey, RawEntry, RawTimestamp,
    Signature, SignedBatch,
};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Result of inserting an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertResult {
    /// Entry was inserted.
    Inserted,
    /// An entry with this id already exists; nothing was written.
    AlreadyExists,
}

/// Counts from a bulk insert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub inserted: usize,
    pub already_present: usize,
}

/// One acknowledged submission, as kept in the anchor log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorRecord {
    pub root: Digest,
    pub algorithm: DigestAlgorithm,
    pub mode: CommitmentMode,
    /// Entry ids in batch order.
    pub entry_ids: Vec<String>,
    /// Digests of the canonical entries under `algorithm`, in batch order.
    ///
    /// An entry is anchored only while its current content still has one
    /// of these digests; an update makes it pending again.
    pub entry_digests: Vec<Digest>,
    pub signature: Signature,
    pub public_key: PublicKey,
    pub ack_token: AckToken,
    /// When the acknowledgment was received (Unix ms).
    pub anchored_at: i64,
}

impl AnchorRecord {
    /// Build the log record for an acknowledged batch.
    pub fn from_batch(batch: &SignedBatch, ack_token: AckToken, anchored_at: i64) -> Self {
        Self {
            root: batch.root,
            algorithm: batch.algorithm,
            mode: batch.mode,
            entry_ids: batch.entry_ids(),
            entry_digests: batch.entry_digests(),
            signature: batch.signature,
            public_key: batch.public_key,
            ack_token,
            anchored_at,
        }
    }
}

/// The EntryStore trait: async interface for ledger entries and anchors.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, we use `spawn_blocking` internally to avoid blocking the runtime.
///
/// Entries are returned in insertion order. Updating an entry keeps its
/// position. Amounts and timestamps are stored as text; an entry read back
/// canonicalizes to the same value it was inserted with.
#[async_trait]
pub trait EntryStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Entry Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert an entry.
    ///
    /// A missing timestamp is assigned here (RFC 3339, UTC). A missing or
    /// blank `entry_id` is `InvalidData`.
    async fn insert_entry(&self, entry: &RawEntry) -> Result<InsertResult>;

    /// Get an entry by id.
    async fn get_entry(&self, entry_id: &str) -> Result<Option<RawEntry>>;

    /// Replace an existing entry's fields. Returns `false` if absent.
    async fn update_entry(&self, entry: &RawEntry) -> Result<bool>;

    /// Delete an entry. Returns `false` if absent.
    async fn delete_entry(&self, entry_id: &str) -> Result<bool>;

    /// All entries, in insertion order.
    async fn list_entries(&self) -> Result<Vec<RawEntry>>;

    /// Number of stored entries.
    async fn count(&self) -> Result<usize>;

    // ─────────────────────────────────────────────────────────────────────────
    // Anchor Log
    // ─────────────────────────────────────────────────────────────────────────

    /// Append an anchor record.
    async fn record_anchor(&self, record: &AnchorRecord) -> Result<()>;

    /// All anchor records, oldest first.
    async fn list_anchors(&self) -> Result<Vec<AnchorRecord>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Bulk Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert entries in order, skipping ids already present.
    async fn insert_entries(&self, entries: &[RawEntry]) -> Result<ImportSummary> {
        let mut summary = ImportSummary::default();
        for entry in entries {
            match self.insert_entry(entry).await? {
                InsertResult::Inserted => summary.inserted += 1,
                InsertResult::AlreadyExists => summary.already_present += 1,
            }
        }
        Ok(summary)
    }
}

/// Check the id and fill in a creation timestamp if none was given.
pub(crate) fn prepare_for_insert(entry: &RawEntry) -> Result<RawEntry> {
    let entry_id = require_id(entry)?;
    let mut entry = entry.clone();
    entry.entry_id = Some(entry_id.to_string());
    if entry.timestamp.is_none() {
        entry.timestamp = Some(RawTimestamp::Text(
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        ));
    }
    Ok(entry)
}

/// The entry id, or `InvalidData` when missing or blank.
pub(crate) fn require_id(entry: &RawEntry) -> Result<&str> {
    match entry.entry_id.as_deref() {
        Some(id) if !id.trim().is_empty() => Ok(id),
        _ => Err(StoreError::InvalidData("entry_id is required".into())),
    }
}

/// Current time in Unix milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
