//! Error types for the signer.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading keys or signing.
///
/// Every variant is fatal for the batch being signed.
#[derive(Debug, Error)]
pub enum SignerError {
    /// Key file could not be read.
    #[error("key unavailable at {path}: {source}")]
    KeyUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Key material was read but is not a usable Ed25519 key.
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    /// Caller passed something that cannot be a commitment.
    #[error("malformed commitment: {0}")]
    MalformedCommitment(&'static str),

    /// A previous signing call panicked while holding the key lock.
    #[error("signer lock poisoned")]
    Poisoned,

    /// I/O error while writing key material.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for signer operations.
pub type Result<T> = std::result::Result<T, SignerError>;
