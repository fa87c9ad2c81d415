//! The anchoring pipeline.
//!
//! `prepare` validates and canonicalizes, `seal` batches, hashes and signs,
//! `submit` hands sealed batches to a chain writer. `commit`,
//! `anchor_store` and `dry_run_store` chain these together.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use ledger_anchor_chain::{ChainError, ChainWriter};
use ledger_anchor_core::{
    canonicalize, check_limits, chunk, commitment_bytes, entry_digest, merkle_root, validate_entry,
    AckToken, CanonicalEntry, CanonicalError, Digest, DigestAlgorithm, EntryLimits, PublicKey,
    RawEntry, SignedBatch, ValidationError,
};
use ledger_anchor_signer::{FileKeySource, KeySource, Signer};
use ledger_anchor_store::{now_millis, AnchorRecord, EntryStore, StoreError};

use crate::config::{AnchorConfig, RejectPolicy};
use crate::error::{AnchorError, Result};

/// Why an entry was left out of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum RejectReason {
    Invalid(#[serde(serialize_with = "as_display")] ValidationError),
    Unrepresentable(#[serde(serialize_with = "as_display")] CanonicalError),
}

fn as_display<T: fmt::Display, S: serde::Serializer>(
    value: &T,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Invalid(e) => write!(f, "{}", e),
            RejectReason::Unrepresentable(e) => write!(f, "{}", e),
        }
    }
}

/// A rejected entry and where it was in the input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    /// Zero-based index in the input sequence; for store runs, in the
    /// store's insertion order.
    pub position: usize,
    /// The entry id as given, possibly empty.
    pub entry_id: String,
    pub reason: RejectReason,
}

/// Output of [`Anchor::prepare`].
#[derive(Debug, Clone, Default)]
pub struct Prepared {
    /// Accepted entries, in input order.
    pub entries: Vec<CanonicalEntry>,
    pub rejections: Vec<Rejection>,
}

/// Output of [`Anchor::commit`].
#[derive(Debug, Clone, Default)]
pub struct Commit {
    pub batches: Vec<SignedBatch>,
    pub rejections: Vec<Rejection>,
}

/// The result of submitting one batch.
#[derive(Debug)]
pub struct SubmissionOutcome {
    pub index: usize,
    pub root: Digest,
    pub result: Result<AckToken>,
}

impl SubmissionOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// An acknowledged batch whose anchor record could not be written.
///
/// Until `record` is written, the next run will submit these entries again.
#[derive(Debug)]
pub struct RecordFailure {
    pub index: usize,
    pub root: Digest,
    pub record: AnchorRecord,
    pub error: StoreError,
}

/// Summary of an [`Anchor::anchor_store`] run.
#[derive(Debug, Default)]
pub struct AnchorReport {
    /// Entries in the store that had not been anchored yet.
    pub entries_pending: usize,
    pub rejections: Vec<Rejection>,
    pub outcomes: Vec<SubmissionOutcome>,
    /// Log records written for acknowledged batches.
    pub anchored: Vec<AnchorRecord>,
    pub unrecorded: Vec<RecordFailure>,
}

impl AnchorReport {
    pub fn failed(&self) -> impl Iterator<Item = &SubmissionOutcome> {
        self.outcomes.iter().filter(|o| !o.is_ok())
    }
}

/// The pipeline: one configuration, one signer.
pub struct Anchor<K: KeySource> {
    config: AnchorConfig,
    signer: Signer<K>,
}

/// Validate and canonicalize entries, in parallel.
///
/// Never fails: every entry is either accepted or reported as a
/// [`Rejection`]. Accepted entries keep their input order. Limits, when
/// given, are checked after validation.
pub fn prepare_entries(entries: &[RawEntry], limits: Option<&EntryLimits>) -> Prepared {
    let results: Vec<std::result::Result<CanonicalEntry, Rejection>> = entries
        .par_iter()
        .enumerate()
        .map(|(position, raw)| {
            prepare_one(raw, limits).map_err(|reason| Rejection {
                position,
                entry_id: raw.id().to_string(),
                reason,
            })
        })
        .collect();

    let mut prepared = Prepared::default();
    for result in results {
        match result {
            Ok(entry) => prepared.entries.push(entry),
            Err(rejection) => {
                warn!(
                    position = rejection.position,
                    entry_id = %rejection.entry_id,
                    reason = %rejection.reason,
                    "entry rejected"
                );
                prepared.rejections.push(rejection);
            }
        }
    }
    prepared
}

impl Anchor<FileKeySource> {
    /// Build a pipeline signing with the key at `config.key_path`.
    pub fn from_config(config: AnchorConfig) -> Result<Self> {
        let key_path = config
            .key_path
            .clone()
            .ok_or_else(|| AnchorError::InvalidConfig("key_path is not set".into()))?;
        let signer = Signer::new(FileKeySource::new(key_path))?;
        Self::new(config, signer)
    }
}

impl<K: KeySource> Anchor<K> {
    /// Create a pipeline. The configuration is validated here.
    pub fn new(config: AnchorConfig, signer: Signer<K>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, signer })
    }

    pub fn config(&self) -> &AnchorConfig {
        &self.config
    }

    /// Public key batches are signed under.
    pub fn public_key(&self) -> PublicKey {
        self.signer.public_key()
    }

    /// Validate and canonicalize entries with this pipeline's limits.
    pub fn prepare(&self, entries: &[RawEntry]) -> Prepared {
        prepare_entries(entries, self.config.limits.as_ref())
    }

    /// Batch, hash and sign canonical entries.
    ///
    /// Roots are computed in parallel; signing is sequential through the
    /// signer's lock. Any signing failure aborts the whole call, so either
    /// every batch is signed or none is returned.
    pub fn seal(&self, entries: &[CanonicalEntry]) -> Result<Vec<SignedBatch>> {
        let algorithm = self.config.digest;
        let mode = self.config.commitment;
        let batches = chunk(entries, self.config.max_batch_size)?;

        let roots: Vec<Option<Digest>> = batches
            .par_iter()
            .map(|batch| merkle_root(batch, algorithm))
            .collect();

        let public_key = self.signer.public_key();
        let mut sealed = Vec::with_capacity(batches.len());
        for (index, (batch, root)) in batches.into_iter().zip(roots).enumerate() {
            let root = root.ok_or_else(|| {
                AnchorError::Internal(format!("batch {} produced no merkle root", index))
            })?;
            let entries = batch.into_inner();
            let signature = self.signer.sign(&commitment_bytes(mode, &root, &entries))?;
            debug!(batch = index, entries = entries.len(), %root, "batch sealed");

            sealed.push(SignedBatch {
                index,
                algorithm,
                mode,
                entries,
                root,
                signature,
                public_key,
            });
        }
        Ok(sealed)
    }

    /// Prepare and seal.
    ///
    /// Under [`RejectPolicy::FailRun`] any rejection aborts before hashing.
    #[instrument(skip_all, fields(entries = entries.len()))]
    pub fn commit(&self, entries: &[RawEntry]) -> Result<Commit> {
        let prepared = self.prepare(entries);

        if self.config.reject_policy == RejectPolicy::FailRun && !prepared.rejections.is_empty() {
            warn!(rejected = prepared.rejections.len(), "run aborted by reject policy");
            return Err(AnchorError::Rejected(prepared.rejections));
        }

        let batches = self.seal(&prepared.entries)?;
        info!(
            accepted = prepared.entries.len(),
            rejected = prepared.rejections.len(),
            batches = batches.len(),
            "entries committed"
        );
        Ok(Commit {
            batches,
            rejections: prepared.rejections,
        })
    }

    /// Submit one signed batch, honouring the configured timeout.
    ///
    /// The batch is borrowed, so a failed or timed-out submission leaves it
    /// intact for another attempt.
    pub async fn submit<W>(&self, writer: &W, batch: &SignedBatch) -> Result<AckToken>
    where
        W: ChainWriter + ?Sized,
    {
        let result = match self.config.submit_timeout_ms {
            Some(ms) => tokio::time::timeout(Duration::from_millis(ms), writer.submit(batch))
                .await
                .unwrap_or(Err(ChainError::Timeout(ms))),
            None => writer.submit(batch).await,
        };

        match result {
            Ok(token) => {
                info!(batch = batch.index, root = %batch.root, %token, "batch submitted");
                Ok(token)
            }
            Err(source) => {
                warn!(batch = batch.index, root = %batch.root, error = %source, "submission failed");
                Err(AnchorError::Chain {
                    index: batch.index,
                    root: batch.root,
                    source,
                })
            }
        }
    }

    /// Submit batches in order. One failure does not stop the rest.
    pub async fn submit_all<W>(&self, writer: &W, batches: &[SignedBatch]) -> Vec<SubmissionOutcome>
    where
        W: ChainWriter + ?Sized,
    {
        let mut outcomes = Vec::with_capacity(batches.len());
        for batch in batches {
            outcomes.push(SubmissionOutcome {
                index: batch.index,
                root: batch.root,
                result: self.submit(writer, batch).await,
            });
        }
        outcomes
    }

    /// Anchor every stored entry whose current content is not in the anchor
    /// log.
    ///
    /// Entries are read in insertion order. An entry counts as anchored
    /// while its canonical digest matches one recorded for an acknowledged
    /// batch, so an entry updated after anchoring is committed again. Each
    /// acknowledged batch is recorded; failed batches are reported and their
    /// entries stay pending for the next run. Rejection positions index the
    /// store's insertion order.
    pub async fn anchor_store<S, W>(&self, store: &S, writer: &W) -> Result<AnchorReport>
    where
        S: EntryStore + ?Sized,
        W: ChainWriter + ?Sized,
    {
        self.run_store(store, writer, true).await
    }

    /// [`Anchor::anchor_store`] without writing to the anchor log.
    ///
    /// For writers whose acknowledgments are not real anchors, such as
    /// [`ledger_anchor_chain::MemoryChainWriter`]. The report's `anchored`
    /// list is always empty.
    pub async fn dry_run_store<S, W>(&self, store: &S, writer: &W) -> Result<AnchorReport>
    where
        S: EntryStore + ?Sized,
        W: ChainWriter + ?Sized,
    {
        self.run_store(store, writer, false).await
    }

    #[instrument(skip(self, store, writer))]
    async fn run_store<S, W>(&self, store: &S, writer: &W, write_log: bool) -> Result<AnchorReport>
    where
        S: EntryStore + ?Sized,
        W: ChainWriter + ?Sized,
    {
        let log = AnchoredDigests::from_records(&store.list_anchors().await?);

        let (positions, pending): (Vec<usize>, Vec<RawEntry>) = store
            .list_entries()
            .await?
            .into_iter()
            .enumerate()
            .filter(|(_, entry)| !log.contains(entry))
            .unzip();

        info!(pending = pending.len(), "anchoring stored entries");
        let commit = match self.commit(&pending) {
            Ok(commit) => commit,
            Err(AnchorError::Rejected(mut rejections)) => {
                to_store_positions(&mut rejections, &positions);
                return Err(AnchorError::Rejected(rejections));
            }
            Err(e) => return Err(e),
        };
        let mut rejections = commit.rejections;
        to_store_positions(&mut rejections, &positions);

        let outcomes = self.submit_all(writer, &commit.batches).await;

        let mut anchored = Vec::new();
        let mut unrecorded = Vec::new();
        if write_log {
            for (batch, outcome) in commit.batches.iter().zip(&outcomes) {
                let Ok(token) = &outcome.result else {
                    continue;
                };
                let record = AnchorRecord::from_batch(batch, token.clone(), now_millis());
                match store.record_anchor(&record).await {
                    Ok(()) => anchored.push(record),
                    Err(error) => {
                        warn!(batch = batch.index, root = %batch.root, %error, "anchor record not written");
                        unrecorded.push(RecordFailure {
                            index: batch.index,
                            root: batch.root,
                            record,
                            error,
                        });
                    }
                }
            }
        }

        Ok(AnchorReport {
            entries_pending: pending.len(),
            rejections,
            outcomes,
            anchored,
            unrecorded,
        })
    }
}

/// Entry digests from the anchor log, keyed by algorithm.
struct AnchoredDigests {
    algorithms: Vec<DigestAlgorithm>,
    digests: HashSet<(DigestAlgorithm, Digest)>,
}

impl AnchoredDigests {
    fn from_records(records: &[AnchorRecord]) -> Self {
        let mut algorithms = Vec::new();
        let mut digests = HashSet::new();
        for record in records {
            if !algorithms.contains(&record.algorithm) {
                algorithms.push(record.algorithm);
            }
            digests.extend(record.entry_digests.iter().map(|d| (record.algorithm, *d)));
        }
        Self {
            algorithms,
            digests,
        }
    }

    /// Whether the entry's current content was anchored under any algorithm
    /// in the log. Entries that do not canonicalize never were.
    fn contains(&self, entry: &RawEntry) -> bool {
        if self.digests.is_empty() {
            return false;
        }
        match canonicalize(entry) {
            Ok(canonical) => self.algorithms.iter().any(|&algorithm| {
                self.digests
                    .contains(&(algorithm, entry_digest(&canonical, algorithm)))
            }),
            Err(_) => false,
        }
    }
}

fn to_store_positions(rejections: &mut [Rejection], positions: &[usize]) {
    for rejection in rejections {
        if let Some(&position) = positions.get(rejection.position) {
            rejection.position = position;
        }
    }
}

fn prepare_one(
    raw: &RawEntry,
    limits: Option<&EntryLimits>,
) -> std::result::Result<CanonicalEntry, RejectReason> {
    validate_entry(raw).map_err(RejectReason::Invalid)?;
    let entry = canonicalize(raw).map_err(RejectReason::Unrepresentable)?;
    if let Some(limits) = limits {
        check_limits(&entry, limits).map_err(RejectReason::Invalid)?;
    }
    Ok(entry)
}

impl<K: KeySource> fmt::Debug for Anchor<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Anchor")
            .field("config", &self.config)
            .field("signer", &self.signer)
            .finish()
    }
}
