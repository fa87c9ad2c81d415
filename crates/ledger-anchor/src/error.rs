//! Error types for the anchoring pipeline.

use ledger_anchor_chain::ChainError;
use ledger_anchor_core::{CoreError, Digest};
use ledger_anchor_signer::SignerError;
use ledger_anchor_store::StoreError;
use std::path::PathBuf;
use thiserror::Error;

use crate::pipeline::Rejection;

/// Errors that can occur during anchoring.
#[derive(Debug, Error)]
pub enum AnchorError {
    /// Core error (batch size, verification, malformed records).
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Signing failed. Nothing from this run was submitted.
    #[error("signer error: {0}")]
    Signer(#[from] SignerError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Submission failed. The signed batch remains valid for resubmission.
    #[error("chain error for batch {index} (root {root}): {source}")]
    Chain {
        index: usize,
        root: Digest,
        #[source]
        source: ChainError,
    },

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    /// Configuration loaded but is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Entries were rejected under the fail-run policy.
    #[error("{} entries rejected", .0.len())]
    Rejected(Vec<Rejection>),

    /// An entry file could not be read or parsed.
    #[error("cannot load entries from {path}: {message}")]
    Source { path: PathBuf, message: String },

    /// A pipeline invariant did not hold.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for anchoring operations.
pub type Result<T> = std::result::Result<T, AnchorError>;
