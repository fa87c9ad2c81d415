//! # Ledger Anchor Store
//!
//! Persistence for ledger entries and the anchor log, behind the
//! [`EntryStore`] trait.
//!
//! ## Key Types
//!
//! - [`EntryStore`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`AnchorRecord`] - One acknowledged batch submission
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ledger_anchor_core::RawEntry;
//! use ledger_anchor_store::{EntryStore, InsertResult, SqliteStore};
//!
//! async fn example() {
//!     let store = SqliteStore::open("ledger.db").unwrap();
//!     let entry = RawEntry::new("INV-001", "1001", "4001", "250.00", "USD");
//!     assert_eq!(store.insert_entry(&entry).await.unwrap(), InsertResult::Inserted);
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Ids are unique**: inserting an existing id returns `AlreadyExists`
//!   and leaves the stored entry untouched
//! - **Insertion order**: `list_entries` is the order batches are built in
//! - **Server-side timestamps**: entries without one are stamped on insert

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{now_millis, AnchorRecord, EntryStore, ImportSummary, InsertResult};
