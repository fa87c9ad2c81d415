//! # Ledger Anchor Testkit
//!
//! Testing utilities for Ledger Anchor.
//!
//! ## Overview
//!
//! - **Fixtures**: a known signing key and sample entries
//! - **Golden vectors**: canonical bytes, digests, roots and signatures that
//!   every implementation must reproduce
//! - **Generators**: proptest strategies for entries
//! - **Writers**: chain writers that fail, stall, or reject on purpose
//!
//! ## Golden Vectors
//!
//! ```rust
//! use ledger_anchor_core::{canonicalize, entry_digest, DigestAlgorithm};
//! use ledger_anchor_testkit::vectors::entry_vectors;
//!
//! for v in entry_vectors() {
//!     let entry = canonicalize(&v.entry).unwrap();
//!     assert_eq!(entry_digest(&entry, DigestAlgorithm::Sha256).to_hex(), v.digest_hex);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use ledger_anchor_testkit::generators::raw_entry;
//!
//! proptest! {
//!     #[test]
//!     fn generated_entries_validate(raw in raw_entry()) {
//!         prop_assert!(ledger_anchor_core::is_valid(&raw));
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;
pub mod writers;

pub use fixtures::{
    entry_a, entry_b, entry_c, sample_entries, test_keypair, test_public_key, test_signer,
    TEST_SEED,
};
pub use writers::{FlakyChainWriter, RejectingChainWriter, SlowChainWriter};
