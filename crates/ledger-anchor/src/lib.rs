//! # Ledger Anchor
//!
//! Anchors ledger entries to an external append-only ledger.
//!
//! Entries are validated, canonicalized, grouped into batches, folded into
//! one Merkle root per batch, signed with Ed25519, and handed to an injected
//! [`ChainWriter`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use ledger_anchor::{Anchor, AnchorConfig, MemoryChainWriter, RawEntry};
//!
//! # async fn example() -> ledger_anchor::Result<()> {
//! let config = AnchorConfig::load(Some("anchor.toml".as_ref()))?;
//! let anchor = Anchor::from_config(config)?;
//!
//! let entries = vec![
//!     RawEntry::new("INV-001", "1001", "4001", "100.00", "USD")
//!         .with_timestamp("2025-06-29T12:00:00Z"),
//! ];
//! let commit = anchor.commit(&entries)?;
//!
//! let writer = MemoryChainWriter::new();
//! for outcome in anchor.submit_all(&writer, &commit.batches).await {
//!     println!("batch {}: {:?}", outcome.index, outcome.result);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Crates
//!
//! - `ledger-anchor-core` - validation, canonical encoding, Merkle roots, batches
//! - `ledger-anchor-signer` - key sources and the locking signer
//! - `ledger-anchor-store` - entry persistence and the anchor log
//! - `ledger-anchor-chain` - the chain-writer boundary

pub mod config;
pub mod error;
pub mod pipeline;
pub mod source;

pub use config::{AnchorConfig, RejectPolicy, ENV_PREFIX};
pub use error::{AnchorError, Result};
pub use pipeline::{
    prepare_entries, Anchor, AnchorReport, Commit, Prepared, RecordFailure, RejectReason,
    Rejection, SubmissionOutcome,
};
pub use source::load_entries;

pub use ledger_anchor_chain::{ChainError, ChainWriter, MemoryChainWriter};
pub use ledger_anchor_core::{
    verify_signed_batch, AckToken, CanonicalEntry, CommitmentMode, Digest, DigestAlgorithm,
    EntryLimits, PublicKey, RawEntry, SignedBatch,
};
pub use ledger_anchor_signer::{FileKeySource, KeySource, SeedKeySource, Signer};
pub use ledger_anchor_store::{EntryStore, MemoryStore, SqliteStore};
