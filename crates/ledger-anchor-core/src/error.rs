//! Error types for the Ledger Anchor core.

use thiserror::Error;

use crate::crypto::Digest;

/// Core errors: malformed calls, key and signature failures, batch shape.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("malformed entry record: {0}")]
    MalformedEntry(String),

    #[error("max batch size must be a positive integer, got {0}")]
    InvalidBatchSize(usize),

    #[error("batch must contain at least one entry")]
    EmptyBatch,

    #[error("merkle root mismatch: expected {expected}, computed {computed}")]
    RootMismatch { expected: Digest, computed: Digest },

    #[error("decoding error: {0}")]
    DecodingError(String),
}

/// Why an entry was rejected by the validator.
///
/// These are expected outcomes for bad business data, not faults.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("amount is not a finite number: {0}")]
    UnparseableAmount(String),

    #[error("amount must be greater than zero, got {0}")]
    NonPositiveAmount(String),

    #[error("debit and credit accounts are the same: {0}")]
    SameDebitCredit(String),

    #[error("{field} too long: {len} characters, max {max}")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
}

/// Canonicalization failures. Always attributable to a single entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CanonicalError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("amount cannot be represented exactly: {0}")]
    InvalidAmount(String),

    #[error("timestamp cannot be parsed: {0}")]
    InvalidTimestamp(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
