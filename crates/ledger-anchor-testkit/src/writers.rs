//! Chain writers that misbehave on purpose.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use ledger_anchor_chain::{ChainError, ChainWriter, MemoryChainWriter, Result};
use ledger_anchor_core::{AckToken, SignedBatch};

/// Fails the first `failures` submissions with a transport error, then
/// delegates to a [`MemoryChainWriter`].
pub struct FlakyChainWriter {
    remaining_failures: AtomicUsize,
    attempts: AtomicUsize,
    inner: MemoryChainWriter,
}

impl FlakyChainWriter {
    pub fn new(failures: usize) -> Self {
        Self {
            remaining_failures: AtomicUsize::new(failures),
            attempts: AtomicUsize::new(0),
            inner: MemoryChainWriter::new(),
        }
    }

    /// Submissions seen, successful or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// The writer that receives submissions once failures run out.
    pub fn inner(&self) -> &MemoryChainWriter {
        &self.inner
    }
}

#[async_trait]
impl ChainWriter for FlakyChainWriter {
    async fn submit(&self, batch: &SignedBatch) -> Result<AckToken> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failed = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(ChainError::Transport("connection reset".into()));
        }
        self.inner.submit(batch).await
    }
}

/// Sleeps before every submission.
pub struct SlowChainWriter {
    delay: Duration,
    inner: MemoryChainWriter,
}

impl SlowChainWriter {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            inner: MemoryChainWriter::new(),
        }
    }

    pub fn inner(&self) -> &MemoryChainWriter {
        &self.inner
    }
}

#[async_trait]
impl ChainWriter for SlowChainWriter {
    async fn submit(&self, batch: &SignedBatch) -> Result<AckToken> {
        tokio::time::sleep(self.delay).await;
        self.inner.submit(batch).await
    }
}

/// Rejects every batch.
#[derive(Debug, Default)]
pub struct RejectingChainWriter;

#[async_trait]
impl ChainWriter for RejectingChainWriter {
    async fn submit(&self, _batch: &SignedBatch) -> Result<AckToken> {
        Err(ChainError::Rejected("ledger program refused the batch".into()))
    }
}
