//! SQLite implementation of the EntryStore trait.
//!
//! Uses rusqlite with bundled SQLite, wrapped in async via
//! `tokio::task::spawn_blocking`.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use ledger_anchor_core::{
    AckToken, CommitmentMode, Digest, DigestAlgorithm, PublicKey, RawAmount, RawEntry,
    RawTimestamp, Signature,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{prepare_for_insert, require_id, AnchorRecord, EntryStore, InsertResult};

const ENTRY_COLUMNS: &str =
    "entry_id, account_debit, account_credit, amount, currency, timestamp";

/// SQLite-based store.
///
/// Thread-safe via an internal mutex. Every operation runs on the blocking
/// pool.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a closure against the connection on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Internal(format!("mutex poisoned: {}", e)))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Internal(format!("spawn_blocking failed: {}", e)))?
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawEntry> {
    Ok(RawEntry {
        entry_id: row.get("entry_id")?,
        debit_account: row.get("account_debit")?,
        credit_account: row.get("account_credit")?,
        amount: row.get::<_, Option<String>>("amount")?.map(RawAmount::Text),
        currency: row.get("currency")?,
        timestamp: row
            .get::<_, Option<String>>("timestamp")?
            .map(RawTimestamp::Text),
    })
}

/// Raw column values of an `anchors` row.
struct AnchorRow {
    root: Vec<u8>,
    algorithm: String,
    mode: String,
    entry_ids: Vec<u8>,
    entry_digests: Vec<u8>,
    signature: Vec<u8>,
    public_key: Vec<u8>,
    ack_token: String,
    anchored_at: i64,
}

impl AnchorRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            root: row.get("root")?,
            algorithm: row.get("algorithm")?,
            mode: row.get("mode")?,
            entry_ids: row.get("entry_ids")?,
            entry_digests: row.get("entry_digests")?,
            signature: row.get("signature")?,
            public_key: row.get("public_key")?,
            ack_token: row.get("ack_token")?,
            anchored_at: row.get("anchored_at")?,
        })
    }

    fn into_record(self) -> Result<AnchorRecord> {
        let algorithm = DigestAlgorithm::from_name(&self.algorithm)
            .ok_or_else(|| StoreError::InvalidData(format!("digest algorithm {}", self.algorithm)))?;
        let mode = CommitmentMode::from_name(&self.mode)
            .ok_or_else(|| StoreError::InvalidData(format!("commitment mode {}", self.mode)))?;
        let entry_ids: Vec<String> = ciborium::from_reader(&self.entry_ids[..])
            .map_err(|e| StoreError::Serialization(format!("entry_ids: {}", e)))?;
        let entry_digests = decode_digests(&self.entry_digests)?;
        if entry_digests.len() != entry_ids.len() {
            return Err(StoreError::InvalidData(format!(
                "anchor has {} entry ids but {} digests",
                entry_ids.len(),
                entry_digests.len()
            )));
        }

        Ok(AnchorRecord {
            root: Digest::from_bytes(fixed(self.root, "root")?),
            algorithm,
            mode,
            entry_ids,
            entry_digests,
            signature: Signature::from_bytes(fixed(self.signature, "signature")?),
            public_key: PublicKey::from_bytes(fixed(self.public_key, "public_key")?),
            ack_token: AckToken::new(self.ack_token),
            anchored_at: self.anchored_at,
        })
    }
}

fn fixed<const N: usize>(bytes: Vec<u8>, column: &str) -> Result<[u8; N]> {
    bytes.try_into().map_err(|b: Vec<u8>| {
        StoreError::InvalidData(format!("{}: expected {} bytes, got {}", column, N, b.len()))
    })
}

fn encode_digests(digests: &[Digest]) -> Vec<u8> {
    digests.iter().flat_map(|d| d.as_bytes().iter().copied()).collect()
}

fn decode_digests(bytes: &[u8]) -> Result<Vec<Digest>> {
    if bytes.len() % 32 != 0 {
        return Err(StoreError::InvalidData(format!(
            "entry_digests: {} bytes is not a multiple of 32",
            bytes.len()
        )));
    }
    bytes
        .chunks_exact(32)
        .map(|chunk| fixed(chunk.to_vec(), "entry_digests").map(Digest::from_bytes))
        .collect()
}

fn encode_entry_ids(ids: &[String]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(ids, &mut buf)
        .map_err(|e| StoreError::Serialization(format!("entry_ids: {}", e)))?;
    Ok(buf)
}

#[async_trait]
impl EntryStore for SqliteStore {
    async fn insert_entry(&self, entry: &RawEntry) -> Result<InsertResult> {
        let entry = prepare_for_insert(entry)?;

        self.blocking(move |conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO entries (
                    entry_id, account_debit, account_credit, amount, currency, timestamp
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    entry.entry_id,
                    entry.debit_account,
                    entry.credit_account,
                    entry.amount.as_ref().map(|a| a.to_string()),
                    entry.currency,
                    entry.timestamp.as_ref().map(|t| t.to_string()),
                ],
            )?;

            if changed == 0 {
                debug!(entry_id = entry.id(), "entry already stored");
                return Ok(InsertResult::AlreadyExists);
            }
            Ok(InsertResult::Inserted)
        })
        .await
    }

    async fn get_entry(&self, entry_id: &str) -> Result<Option<RawEntry>> {
        let entry_id = entry_id.to_string();

        self.blocking(move |conn| {
            conn.query_row(
                &format!("SELECT {} FROM entries WHERE entry_id = ?1", ENTRY_COLUMNS),
                params![entry_id],
                row_to_entry,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn update_entry(&self, entry: &RawEntry) -> Result<bool> {
        require_id(entry)?;
        let entry = entry.clone();

        self.blocking(move |conn| {
            let changed = conn.execute(
                "UPDATE entries SET
                    account_debit = ?2, account_credit = ?3, amount = ?4,
                    currency = ?5, timestamp = COALESCE(?6, timestamp)
                 WHERE entry_id = ?1",
                params![
                    entry.entry_id,
                    entry.debit_account,
                    entry.credit_account,
                    entry.amount.as_ref().map(|a| a.to_string()),
                    entry.currency,
                    entry.timestamp.as_ref().map(|t| t.to_string()),
                ],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    async fn delete_entry(&self, entry_id: &str) -> Result<bool> {
        let entry_id = entry_id.to_string();

        self.blocking(move |conn| {
            let changed = conn.execute("DELETE FROM entries WHERE entry_id = ?1", params![entry_id])?;
            Ok(changed > 0)
        })
        .await
    }

    async fn list_entries(&self) -> Result<Vec<RawEntry>> {
        self.blocking(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {} FROM entries ORDER BY seq", ENTRY_COLUMNS))?;
            let entries = stmt
                .query_map([], row_to_entry)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(entries)
        })
        .await
    }

    async fn count(&self) -> Result<usize> {
        self.blocking(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
            Ok(n as usize)
        })
        .await
    }

    async fn record_anchor(&self, record: &AnchorRecord) -> Result<()> {
        let record = record.clone();
        let entry_ids = encode_entry_ids(&record.entry_ids)?;
        let entry_digests = encode_digests(&record.entry_digests);

        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO anchors (
                    root, algorithm, mode, entry_ids, entry_digests, signature,
                    public_key, ack_token, anchored_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    record.root.as_bytes().as_slice(),
                    record.algorithm.as_str(),
                    record.mode.as_str(),
                    entry_ids,
                    entry_digests,
                    record.signature.as_bytes().as_slice(),
                    record.public_key.as_bytes().as_slice(),
                    record.ack_token.as_str(),
                    record.anchored_at,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn list_anchors(&self) -> Result<Vec<AnchorRecord>> {
        self.blocking(|conn| {
            let mut stmt = conn.prepare(
                "SELECT root, algorithm, mode, entry_ids, entry_digests, signature,
                        public_key, ack_token, anchored_at
                 FROM anchors ORDER BY id",
            )?;
            let rows = stmt
                .query_map([], AnchorRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().map(AnchorRow::into_record).collect()
        })
        .await
    }
}
