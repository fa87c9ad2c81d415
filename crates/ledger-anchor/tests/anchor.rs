//! End-to-end anchoring: entries in, signed batches out, submitted to a
//! chain writer and recorded in the store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use ledger_anchor::{
    verify_signed_batch, Anchor, AnchorConfig, AnchorError, ChainError, CommitmentMode,
    DigestAlgorithm, EntryLimits, EntryStore, MemoryChainWriter, MemoryStore, RejectPolicy,
    SeedKeySource, SqliteStore,
};
use ledger_anchor_core::{entry_digest, hash_pair, RawAmount, RawEntry};
use ledger_anchor_store::{AnchorRecord, InsertResult, StoreError};
use ledger_anchor_testkit::fixtures::{canonical, test_public_key, test_signer};
use ledger_anchor_testkit::{
    entry_a, entry_b, entry_c, sample_entries, FlakyChainWriter, RejectingChainWriter,
    SlowChainWriter,
};

fn anchor(config: AnchorConfig) -> Anchor<SeedKeySource> {
    Anchor::new(config, test_signer()).unwrap()
}

// =============================================================================
// Commit
// =============================================================================

#[test]
fn test_two_entries_end_to_end() {
    let anchor = anchor(AnchorConfig::default());
    let commit = anchor.commit(&[entry_a(), entry_b()]).unwrap();

    assert_eq!(commit.batches.len(), 1);
    let batch = &commit.batches[0];

    let entries = canonical(&[entry_a(), entry_b()]);
    let alg = DigestAlgorithm::Sha256;
    let expected = hash_pair(&entry_digest(&entries[0], alg), &entry_digest(&entries[1], alg), alg);
    assert_eq!(batch.root, expected);

    assert_eq!(batch.public_key, test_public_key());
    test_public_key()
        .verify(batch.root.as_bytes(), &batch.signature)
        .unwrap();
}

#[test]
fn test_three_entries_carry_odd_node() {
    let anchor = anchor(AnchorConfig::default());
    let commit = anchor.commit(&[entry_a(), entry_b(), entry_c()]).unwrap();

    let entries = canonical(&[entry_a(), entry_b(), entry_c()]);
    let alg = DigestAlgorithm::Sha256;
    let d: Vec<_> = entries.iter().map(|e| entry_digest(e, alg)).collect();
    let expected = hash_pair(&hash_pair(&d[0], &d[1], alg), &d[2], alg);
    assert_eq!(commit.batches[0].root, expected);
}

#[test]
fn test_order_changes_root() {
    let anchor = anchor(AnchorConfig::default());
    let forward = anchor.commit(&[entry_a(), entry_b()]).unwrap();
    let reverse = anchor.commit(&[entry_b(), entry_a()]).unwrap();
    assert_ne!(forward.batches[0].root, reverse.batches[0].root);
}

#[test]
fn test_batching_25_entries() {
    let anchor = anchor(AnchorConfig::default());
    let commit = anchor.commit(&sample_entries(25)).unwrap();

    let sizes: Vec<usize> = commit.batches.iter().map(|b| b.len()).collect();
    assert_eq!(sizes, vec![10, 10, 5]);

    let ids: Vec<String> = commit.batches.iter().flat_map(|b| b.entry_ids()).collect();
    let expected: Vec<String> = (0..25).map(|i| format!("E{:04}", i)).collect();
    assert_eq!(ids, expected);

    for batch in &commit.batches {
        verify_signed_batch(batch).unwrap();
    }
}

#[test]
fn test_skip_policy_drops_and_reports() {
    let anchor = anchor(AnchorConfig::default());

    let mut same_accounts = entry_b();
    same_accounts.credit_account = same_accounts.debit_account.clone();
    let mut no_id = entry_c();
    no_id.entry_id = None;

    let commit = anchor
        .commit(&[entry_a(), same_accounts, no_id, entry_c()])
        .unwrap();

    assert_eq!(commit.batches.len(), 1);
    assert_eq!(commit.batches[0].entry_ids(), vec!["A", "C"]);

    let positions: Vec<usize> = commit.rejections.iter().map(|r| r.position).collect();
    assert_eq!(positions, vec![1, 2]);
    assert_eq!(commit.rejections[0].entry_id, "B");
    assert_eq!(commit.rejections[1].entry_id, "");
}

#[test]
fn test_fail_run_policy_aborts() {
    let anchor = anchor(AnchorConfig::default().with_reject_policy(RejectPolicy::FailRun));

    let mut zero = entry_b();
    zero.amount = Some(0i64.into());

    match anchor.commit(&[entry_a(), zero]) {
        Err(AnchorError::Rejected(rejections)) => assert_eq!(rejections[0].position, 1),
        other => panic!("expected rejection, got {:?}", other.map(|c| c.batches.len())),
    }

    assert!(anchor.commit(&[entry_a(), entry_b()]).is_ok());
}

#[test]
fn test_on_chain_limits() {
    let anchor = anchor(AnchorConfig::default().with_limits(EntryLimits::on_chain()));

    let long_id = RawEntry::new("X".repeat(33), "1001", "4001", "1.00", "USD")
        .with_timestamp("2025-06-29");
    let commit = anchor.commit(&[entry_a(), long_id]).unwrap();

    assert_eq!(commit.batches[0].entry_ids(), vec!["A"]);
    assert_eq!(commit.rejections.len(), 1);
}

#[test]
fn test_full_batch_commitment_signature() {
    let anchor = anchor(AnchorConfig::default().with_commitment(CommitmentMode::FullBatch));
    let commit = anchor.commit(&[entry_a(), entry_b(), entry_c()]).unwrap();
    let batch = &commit.batches[0];

    verify_signed_batch(batch).unwrap();
    assert!(test_public_key()
        .verify(batch.root.as_bytes(), &batch.signature)
        .is_err());
}

#[test]
fn test_blake3_changes_root_not_structure() {
    let sha = anchor(AnchorConfig::default()).commit(&sample_entries(12)).unwrap();
    let blake = anchor(AnchorConfig::default().with_digest(DigestAlgorithm::Blake3))
        .commit(&sample_entries(12))
        .unwrap();

    assert_eq!(sha.batches.len(), blake.batches.len());
    for (a, b) in sha.batches.iter().zip(&blake.batches) {
        assert_ne!(a.root, b.root);
        assert_eq!(b.algorithm, DigestAlgorithm::Blake3);
        verify_signed_batch(b).unwrap();
    }
}

#[test]
fn test_tampered_batch_fails_verification() {
    let anchor = anchor(AnchorConfig::default());
    let mut batch = anchor.commit(&[entry_a(), entry_b()]).unwrap().batches.remove(0);

    batch.entries[1].amount += rust_decimal::Decimal::ONE;
    assert!(verify_signed_batch(&batch).is_err());
}

// =============================================================================
// Submission
// =============================================================================

#[tokio::test]
async fn test_submit_to_memory_writer() {
    let anchor = anchor(AnchorConfig::default());
    let commit = anchor.commit(&sample_entries(15)).unwrap();
    let writer = MemoryChainWriter::new();

    let outcomes = anchor.submit_all(&writer, &commit.batches).await;
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| o.is_ok()));

    let submissions = writer.submissions().await;
    assert_eq!(submissions[0].batch().unwrap(), commit.batches[0]);
    assert_eq!(submissions[1].batch().unwrap(), commit.batches[1]);
}

#[tokio::test]
async fn test_failed_submission_can_be_retried() {
    let anchor = anchor(AnchorConfig::default());
    let batch = anchor.commit(&[entry_a(), entry_b()]).unwrap().batches.remove(0);
    let writer = FlakyChainWriter::new(1);

    match anchor.submit(&writer, &batch).await {
        Err(AnchorError::Chain { index, root, source }) => {
            assert_eq!(index, 0);
            assert_eq!(root, batch.root);
            assert!(matches!(source, ChainError::Transport(_)));
        }
        other => panic!("expected chain error, got {:?}", other),
    }

    let token = anchor.submit(&writer, &batch).await.unwrap();
    assert!(token.as_str().starts_with("mem-tx-"));
    assert_eq!(writer.attempts(), 2);
    assert_eq!(writer.inner().submissions().await[0].batch().unwrap(), batch);
}

#[tokio::test]
async fn test_one_failure_does_not_stop_the_rest() {
    let anchor = anchor(AnchorConfig::default());
    let commit = anchor.commit(&sample_entries(30)).unwrap();
    let writer = FlakyChainWriter::new(1);

    let outcomes = anchor.submit_all(&writer, &commit.batches).await;
    let ok: Vec<bool> = outcomes.iter().map(|o| o.is_ok()).collect();
    assert_eq!(ok, vec![false, true, true]);
}

#[tokio::test]
async fn test_submission_timeout() {
    let anchor = anchor(AnchorConfig::default().with_submit_timeout_ms(20));
    let batch = anchor.commit(&[entry_a()]).unwrap().batches.remove(0);
    let writer = SlowChainWriter::new(Duration::from_millis(500));

    match anchor.submit(&writer, &batch).await {
        Err(AnchorError::Chain {
            source: ChainError::Timeout(ms),
            ..
        }) => assert_eq!(ms, 20),
        other => panic!("expected timeout, got {:?}", other),
    }
    assert!(writer.inner().is_empty().await);
}

#[tokio::test]
async fn test_writer_enforcing_limits_rejects_oversized_batch() {
    let anchor = anchor(AnchorConfig::default().with_max_batch_size(12));
    let commit = anchor.commit(&sample_entries(12)).unwrap();
    let writer = MemoryChainWriter::with_limits(EntryLimits::on_chain());

    let outcomes = anchor.submit_all(&writer, &commit.batches).await;
    assert!(matches!(
        outcomes[0].result,
        Err(AnchorError::Chain {
            source: ChainError::Rejected(_),
            ..
        })
    ));
}

// =============================================================================
// Store
// =============================================================================

async fn anchor_store_round<S: EntryStore>(store: &S) {
    let anchor = anchor(AnchorConfig::default());
    let writer = MemoryChainWriter::new();

    let summary = store.insert_entries(&sample_entries(12)).await.unwrap();
    assert_eq!(summary.inserted, 12);

    let report = anchor.anchor_store(store, &writer).await.unwrap();
    assert_eq!(report.entries_pending, 12);
    assert_eq!(report.anchored.len(), 2);
    assert_eq!(report.failed().count(), 0);

    let anchors = store.list_anchors().await.unwrap();
    assert_eq!(anchors.len(), 2);
    assert_eq!(anchors[0].entry_ids.len(), 10);
    assert_eq!(anchors[1].entry_ids, vec!["E0010", "E0011"]);
    assert_eq!(anchors[0].public_key, test_public_key());

    // Nothing new: nothing pending.
    let again = anchor.anchor_store(store, &writer).await.unwrap();
    assert_eq!(again.entries_pending, 0);
    assert!(again.outcomes.is_empty());

    // Only the new entry is anchored next time.
    store.insert_entry(&entry_a()).await.unwrap();
    let next = anchor.anchor_store(store, &writer).await.unwrap();
    assert_eq!(next.entries_pending, 1);
    assert_eq!(next.anchored[0].entry_ids, vec!["A"]);
    assert_eq!(writer.len().await, 3);
}

#[tokio::test]
async fn test_anchor_memory_store() {
    anchor_store_round(&MemoryStore::new()).await;
}

#[tokio::test]
async fn test_anchor_sqlite_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(dir.path().join("ledger.db")).unwrap();
    anchor_store_round(&store).await;
}

#[tokio::test]
async fn test_rejected_batches_stay_pending() {
    let anchor = anchor(AnchorConfig::default());
    let store = MemoryStore::new();
    store.insert_entries(&sample_entries(3)).await.unwrap();

    let report = anchor
        .anchor_store(&store, &RejectingChainWriter)
        .await
        .unwrap();
    assert_eq!(report.failed().count(), 1);
    assert!(report.anchored.is_empty());
    assert!(store.list_anchors().await.unwrap().is_empty());

    let retry = anchor
        .anchor_store(&store, &MemoryChainWriter::new())
        .await
        .unwrap();
    assert_eq!(retry.entries_pending, 3);
    assert_eq!(retry.anchored.len(), 1);
}

#[tokio::test]
async fn test_store_assigns_missing_timestamps() {
    let anchor = anchor(AnchorConfig::default());
    let store = MemoryStore::new();
    store
        .insert_entry(&RawEntry::new("NO-TS", "1001", "4001", "5.00", "USD"))
        .await
        .unwrap();

    let report = anchor
        .anchor_store(&store, &MemoryChainWriter::new())
        .await
        .unwrap();
    assert!(report.rejections.is_empty());
    assert_eq!(report.anchored.len(), 1);
}

async fn updated_entry_round<S: EntryStore>(store: &S) {
    let anchor = anchor(AnchorConfig::default());
    let writer = MemoryChainWriter::new();

    store.insert_entry(&entry_a()).await.unwrap();
    let first = anchor.anchor_store(store, &writer).await.unwrap();
    assert_eq!(first.entries_pending, 1);
    assert_eq!(first.anchored.len(), 1);

    let mut changed = entry_a();
    changed.amount = Some(RawAmount::Text("999.00".into()));
    assert!(store.update_entry(&changed).await.unwrap());

    let second = anchor.anchor_store(store, &writer).await.unwrap();
    assert_eq!(second.entries_pending, 1);
    assert_eq!(second.anchored.len(), 1);
    assert_eq!(second.anchored[0].entry_ids, vec!["A"]);
    assert_ne!(second.anchored[0].entry_digests, first.anchored[0].entry_digests);

    // Reverting to anchored content needs no new commitment.
    assert!(store.update_entry(&entry_a()).await.unwrap());
    let third = anchor.anchor_store(store, &writer).await.unwrap();
    assert_eq!(third.entries_pending, 0);
    assert_eq!(writer.len().await, 2);
}

#[tokio::test]
async fn test_updated_entry_is_anchored_again_memory() {
    updated_entry_round(&MemoryStore::new()).await;
}

#[tokio::test]
async fn test_updated_entry_is_anchored_again_sqlite() {
    updated_entry_round(&SqliteStore::open_memory().unwrap()).await;
}

#[tokio::test]
async fn test_anchored_under_other_digest_stays_anchored() {
    let store = MemoryStore::new();
    store.insert_entries(&sample_entries(3)).await.unwrap();

    let sha = anchor(AnchorConfig::default());
    sha.anchor_store(&store, &MemoryChainWriter::new()).await.unwrap();

    // Entries already anchored under SHA-256 count as anchored for any run.
    let blake = anchor(AnchorConfig::default().with_digest(DigestAlgorithm::Blake3));
    let report = blake
        .anchor_store(&store, &MemoryChainWriter::new())
        .await
        .unwrap();
    assert_eq!(report.entries_pending, 0);
}

#[tokio::test]
async fn test_dry_run_records_nothing() {
    let anchor = anchor(AnchorConfig::default());
    let store = MemoryStore::new();
    store.insert_entries(&sample_entries(3)).await.unwrap();

    let dry = anchor
        .dry_run_store(&store, &MemoryChainWriter::new())
        .await
        .unwrap();
    assert_eq!(dry.entries_pending, 3);
    assert_eq!(dry.outcomes.len(), 1);
    assert!(dry.outcomes[0].is_ok());
    assert!(dry.anchored.is_empty());
    assert!(store.list_anchors().await.unwrap().is_empty());

    let real = anchor
        .anchor_store(&store, &MemoryChainWriter::new())
        .await
        .unwrap();
    assert_eq!(real.entries_pending, 3);
    assert_eq!(real.anchored.len(), 1);
}

/// Memory store whose anchor log refuses the first `failures` writes.
struct FlakyLogStore {
    inner: MemoryStore,
    failures: AtomicUsize,
}

#[async_trait]
impl EntryStore for FlakyLogStore {
    async fn insert_entry(&self, entry: &RawEntry) -> ledger_anchor_store::Result<InsertResult> {
        self.inner.insert_entry(entry).await
    }

    async fn get_entry(&self, entry_id: &str) -> ledger_anchor_store::Result<Option<RawEntry>> {
        self.inner.get_entry(entry_id).await
    }

    async fn update_entry(&self, entry: &RawEntry) -> ledger_anchor_store::Result<bool> {
        self.inner.update_entry(entry).await
    }

    async fn delete_entry(&self, entry_id: &str) -> ledger_anchor_store::Result<bool> {
        self.inner.delete_entry(entry_id).await
    }

    async fn list_entries(&self) -> ledger_anchor_store::Result<Vec<RawEntry>> {
        self.inner.list_entries().await
    }

    async fn count(&self) -> ledger_anchor_store::Result<usize> {
        self.inner.count().await
    }

    async fn record_anchor(&self, record: &AnchorRecord) -> ledger_anchor_store::Result<()> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::Internal("disk full".into()));
        }
        self.inner.record_anchor(record).await
    }

    async fn list_anchors(&self) -> ledger_anchor_store::Result<Vec<AnchorRecord>> {
        self.inner.list_anchors().await
    }
}

#[tokio::test]
async fn test_record_failure_keeps_remaining_outcomes() {
    let anchor = anchor(AnchorConfig::default());
    let store = FlakyLogStore {
        inner: MemoryStore::new(),
        failures: AtomicUsize::new(1),
    };
    store.insert_entries(&sample_entries(12)).await.unwrap();

    let report = anchor
        .anchor_store(&store, &MemoryChainWriter::new())
        .await
        .unwrap();
    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.failed().count(), 0);
    assert_eq!(report.anchored.len(), 1);
    assert_eq!(report.anchored[0].entry_ids, vec!["E0010", "E0011"]);

    assert_eq!(report.unrecorded.len(), 1);
    let unrecorded = &report.unrecorded[0];
    assert_eq!(unrecorded.index, 0);
    assert_eq!(unrecorded.root, report.outcomes[0].root);
    assert!(matches!(unrecorded.error, StoreError::Internal(_)));

    // Writing the carried record completes the log.
    store.record_anchor(&unrecorded.record).await.unwrap();
    let next = anchor
        .anchor_store(&store, &MemoryChainWriter::new())
        .await
        .unwrap();
    assert_eq!(next.entries_pending, 0);
}

#[tokio::test]
async fn test_store_rejections_use_store_positions() {
    let store = MemoryStore::new();
    store.insert_entries(&sample_entries(3)).await.unwrap();
    anchor(AnchorConfig::default())
        .anchor_store(&store, &MemoryChainWriter::new())
        .await
        .unwrap();

    let mut bad = entry_b();
    bad.entry_id = Some("BAD".into());
    bad.credit_account = bad.debit_account.clone();
    store.insert_entries(&[entry_b(), bad]).await.unwrap();

    let report = anchor(AnchorConfig::default())
        .anchor_store(&store, &MemoryChainWriter::new())
        .await
        .unwrap();
    assert_eq!(report.entries_pending, 2);
    assert_eq!(report.rejections.len(), 1);
    assert_eq!(report.rejections[0].entry_id, "BAD");
    assert_eq!(report.rejections[0].position, 4);

    let strict = anchor(AnchorConfig::default().with_reject_policy(RejectPolicy::FailRun));
    match strict.anchor_store(&store, &MemoryChainWriter::new()).await {
        Err(AnchorError::Rejected(rejections)) => assert_eq!(rejections[0].position, 4),
        other => panic!("expected rejection, got {:?}", other.map(|r| r.entries_pending)),
    }
}
