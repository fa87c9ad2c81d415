//! # Ledger Anchor Core
//!
//! Pure primitives for anchoring ledger entries: validation, canonical
//! encoding, digests, Merkle roots, batching, and signed commitments.
//!
//! This crate contains no I/O, no storage, no networking. Every function is
//! deterministic: the same entries in the same order always produce the same
//! bytes, the same root, and (with Ed25519) the same signature.
//!
//! ## Pipeline
//!
//! - [`validate_entry`] - reject invalid business data
//! - [`canonicalize`] - normalize a [`RawEntry`] into a [`CanonicalEntry`]
//! - [`chunk`] - split into [`Batch`]es of at most `max_batch_size`
//! - [`merkle_root`] - fold a batch into one [`Digest`]
//! - [`SignedBatch`] - root plus detached [`Signature`], checked with
//!   [`verify_signed_batch`]
//!
//! ## Canonicalization
//!
//! Entries are encoded using deterministic CBOR. See [`canonical`] module.

pub mod batch;
pub mod canonical;
pub mod commitment;
pub mod crypto;
pub mod entry;
pub mod error;
pub mod merkle;
pub mod validation;

pub use batch::{chunk, Batch, DEFAULT_MAX_BATCH_SIZE};
pub use canonical::{
    canonical_batch_bytes, canonical_entry_bytes, canonicalize, decode_canonical_entry,
    parse_amount, parse_timestamp,
};
pub use commitment::{
    commitment_bytes, verify_signed_batch, AckToken, CommitmentMode, SignedBatch,
};
pub use crypto::{sign, verify, Digest, DigestAlgorithm, Keypair, PublicKey, Signature};
pub use entry::{CanonicalEntry, RawAmount, RawEntry, RawTimestamp};
pub use error::{CanonicalError, CoreError, ValidationError};
pub use merkle::{entry_digest, hash_pair, merkle_root, merkle_root_from_digests};
pub use validation::{check_limits, is_valid, validate_entry, EntryLimits};
