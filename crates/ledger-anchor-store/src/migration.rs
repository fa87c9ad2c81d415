//! Database schema migrations for SQLite.
//!
//! Versioned: each migration moves the schema from version N to N+1.

use rusqlite::Connection;

use crate::error::{Result, StoreError};
use crate::traits::now_millis;

/// Current schema version.
pub const CURRENT_VERSION: u32 = 2;

/// Initialize or migrate the database schema.
///
/// Idempotent.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {} is newer than supported version {}",
            current, CURRENT_VERSION
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
        }

        tx.commit()?;
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        2 => apply_v2(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: ledger entries.
///
/// Column names follow the ERP export layout. Everything except the id is
/// nullable so that invalid records can be stored and rejected later.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE entries (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,  -- insertion order
            entry_id TEXT NOT NULL UNIQUE,
            account_debit TEXT,
            account_credit TEXT,
            amount TEXT,                            -- as supplied, never a float column
            currency TEXT,
            timestamp TEXT                          -- RFC 3339 or Unix ms as text
        );
        "#,
    )?;
    Ok(())
}

/// Migration v2: anchor log.
fn apply_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE anchors (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            root BLOB NOT NULL,                     -- 32 bytes
            algorithm TEXT NOT NULL,
            mode TEXT NOT NULL,
            entry_ids BLOB NOT NULL,                -- CBOR array of text
            entry_digests BLOB NOT NULL,            -- 32-byte digests, concatenated
            signature BLOB NOT NULL,                -- 64 bytes
            public_key BLOB NOT NULL,               -- 32 bytes
            ack_token TEXT NOT NULL,
            anchored_at INTEGER NOT NULL
        );

        CREATE INDEX idx_anchors_root ON anchors(root);
        "#,
    )?;
    Ok(())
}
