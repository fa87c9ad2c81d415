//! Error types for chain submission.

use thiserror::Error;

/// Errors that can occur while submitting a signed batch.
///
/// None of these invalidate the batch; it can be submitted again as is.
#[derive(Debug, Error)]
pub enum ChainError {
    /// The external ledger refused the batch.
    #[error("submission rejected: {0}")]
    Rejected(String),

    /// Transport-level failure before an answer was received.
    #[error("transport error: {0}")]
    Transport(String),

    /// No answer within the configured deadline.
    #[error("submission timed out after {0} ms")]
    Timeout(u64),

    /// The batch could not be encoded for the wire.
    #[error("encoding error: {0}")]
    Encoding(String),
}

/// Result type for chain operations.
pub type Result<T> = std::result::Result<T, ChainError>;
