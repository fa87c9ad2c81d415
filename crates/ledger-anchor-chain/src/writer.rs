//! The chain-writer boundary.
//!
//! A writer takes a signed batch to an external append-only ledger and
//! returns whatever acknowledgment that ledger gives. Implementations may use
//! RPC, HTTP, or anything else; the pipeline only sees this trait.

use async_trait::async_trait;
use bytes::Bytes;
use ledger_anchor_core::{AckToken, SignedBatch};

use crate::error::{ChainError, Result};

/// Submits signed batches to an external ledger.
///
/// Implementations must be thread-safe (Send + Sync). The caller does not
/// retry and does not interpret the returned token.
#[async_trait]
pub trait ChainWriter: Send + Sync {
    /// Submit one signed batch.
    async fn submit(&self, batch: &SignedBatch) -> Result<AckToken>;
}

/// Encode a signed batch as the JSON wire payload.
pub fn encode_submission(batch: &SignedBatch) -> Result<Bytes> {
    serde_json::to_vec(batch)
        .map(Bytes::from)
        .map_err(|e| ChainError::Encoding(e.to_string()))
}

/// Decode a wire payload back into a signed batch.
pub fn decode_submission(payload: &[u8]) -> Result<SignedBatch> {
    serde_json::from_slice(payload).map_err(|e| ChainError::Encoding(e.to_string()))
}

/// An in-memory writer for dry runs and tests.
///
/// Checks each batch the way the ledger program would, records accepted
/// payloads, and returns deterministic tokens.
pub mod memory {
    use super::*;
    use ledger_anchor_core::{check_limits, verify_signed_batch, EntryLimits};
    use tokio::sync::RwLock;
    use tracing::{info, warn};

    /// One accepted submission.
    #[derive(Debug, Clone)]
    pub struct Submission {
        pub token: AckToken,
        pub payload: Bytes,
    }

    impl Submission {
        /// Decode the recorded payload.
        pub fn batch(&self) -> Result<SignedBatch> {
            decode_submission(&self.payload)
        }
    }

    /// In-memory chain writer.
    ///
    /// Tokens have the form `mem-tx-<first 16 hex chars of root>-<n>`,
    /// where `n` counts accepted submissions from 1.
    pub struct MemoryChainWriter {
        limits: Option<EntryLimits>,
        submissions: RwLock<Vec<Submission>>,
    }

    impl MemoryChainWriter {
        /// Accept any batch whose signature verifies.
        pub fn new() -> Self {
            Self {
                limits: None,
                submissions: RwLock::new(Vec::new()),
            }
        }

        /// Additionally enforce field and batch-size limits.
        pub fn with_limits(limits: EntryLimits) -> Self {
            Self {
                limits: Some(limits),
                submissions: RwLock::new(Vec::new()),
            }
        }

        /// All accepted submissions, in order.
        pub async fn submissions(&self) -> Vec<Submission> {
            self.submissions.read().await.clone()
        }

        pub async fn len(&self) -> usize {
            self.submissions.read().await.len()
        }

        pub async fn is_empty(&self) -> bool {
            self.submissions.read().await.is_empty()
        }

        fn check(&self, batch: &SignedBatch) -> Result<()> {
            verify_signed_batch(batch).map_err(|e| ChainError::Rejected(e.to_string()))?;

            if let Some(limits) = &self.limits {
                if batch.len() > limits.max_batch_entries {
                    return Err(ChainError::Rejected(format!(
                        "batch has {} entries, max {}",
                        batch.len(),
                        limits.max_batch_entries
                    )));
                }
                for entry in &batch.entries {
                    check_limits(entry, limits).map_err(|e| {
                        ChainError::Rejected(format!("entry {}: {}", entry.entry_id, e))
                    })?;
                }
            }
            Ok(())
        }
    }

    impl Default for MemoryChainWriter {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl ChainWriter for MemoryChainWriter {
        async fn submit(&self, batch: &SignedBatch) -> Result<AckToken> {
            if let Err(e) = self.check(batch) {
                warn!(batch = batch.index, root = %batch.root, error = %e, "memory writer rejected batch");
                return Err(e);
            }

            let payload = encode_submission(batch)?;
            let mut submissions = self.submissions.write().await;
            let token = AckToken::new(format!(
                "mem-tx-{}-{}",
                &batch.root.to_hex()[..16],
                submissions.len() + 1
            ));
            submissions.push(Submission {
                token: token.clone(),
                payload,
            });

            info!(batch = batch.index, root = %batch.root, %token, "memory writer accepted batch");
            Ok(token)
        }
    }
}
