//! Golden test vectors for deterministic verification.
//!
//! Canonical bytes, digests, roots and signatures for the fixture entries,
//! computed independently of this codebase. Any implementation of the
//! anchoring format must reproduce them byte for byte.

use ledger_anchor_core::{CommitmentMode, DigestAlgorithm, RawEntry};

use crate::fixtures::{entry_a, entry_b, entry_c, TEST_SEED};

/// The expected encoding of one entry.
#[derive(Debug, Clone)]
pub struct EntryVector {
    pub name: &'static str,
    pub entry: RawEntry,
    /// Deterministic CBOR, hex.
    pub canonical_hex: &'static str,
    /// SHA-256 of the canonical bytes, hex.
    pub digest_hex: &'static str,
}

/// The expected root and signature of one batch.
#[derive(Debug, Clone)]
pub struct BatchVector {
    pub name: &'static str,
    pub entries: Vec<RawEntry>,
    pub algorithm: DigestAlgorithm,
    pub mode: CommitmentMode,
    pub seed: [u8; 32],
    /// Root, hex.
    pub root_hex: &'static str,
    /// Ed25519 signature over the commitment, hex.
    pub signature_hex: &'static str,
}

pub const ENTRY_A_CANONICAL: &str = "a7617601656465626974643130303166616d6f756e74633130306663726564697464343030316863757272656e63796355534468656e7472795f696461416974696d657374616d701b00000197bb8efe00";
pub const ENTRY_B_CANONICAL: &str = "a7617601656465626974643230303166616d6f756e74653235302e356663726564697464313030316863757272656e63796345555268656e7472795f696461426974696d657374616d701b00000197bb8fe860";
pub const ENTRY_C_CANONICAL: &str = "a7617601656465626974643130303166616d6f756e7464302e30316663726564697464323030316863757272656e63796355534468656e7472795f696461436974696d657374616d701b00000197bb90d2c0";

pub const DIGEST_A: &str = "38bc9d129ceb3c7fbcc69f07777ffc7baa4ef128ae721b5247ce3e173ac6bdf2";
pub const DIGEST_B: &str = "d9c64276136e79831f72ec5106e2fa90d64b9cfc7959d0eb0a97cc8b8d8e97e7";
pub const DIGEST_C: &str = "10d5c82704b35b7c0adaa406af7ddf2875cbfddebc3251313800d2c5fe184e24";

/// `SHA-256(DIGEST_A || DIGEST_B)`.
pub const ROOT_AB: &str = "9b2bc977213554424654dec4e984c101de3556d6f300e63665ac677c5669a5a2";
/// `SHA-256(ROOT_AB || DIGEST_C)`; C is carried up one level unpaired.
pub const ROOT_ABC: &str = "926fd8eeca2c6630815929bd5f27612426f74fce79bbbd5e4fa9d2fa271e3f87";

/// CBOR array of the A and B entry maps: the full-batch commitment.
pub const FULL_BATCH_AB: &str = "82a7617601656465626974643130303166616d6f756e74633130306663726564697464343030316863757272656e63796355534468656e7472795f696461416974696d657374616d701b00000197bb8efe00a7617601656465626974643230303166616d6f756e74653235302e356663726564697464313030316863757272656e63796345555268656e7472795f696461426974696d657374616d701b00000197bb8fe860";

/// Per-entry vectors.
pub fn entry_vectors() -> Vec<EntryVector> {
    vec![
        EntryVector {
            name: "integral amount, RFC 3339 timestamp",
            entry: entry_a(),
            canonical_hex: ENTRY_A_CANONICAL,
            digest_hex: DIGEST_A,
        },
        EntryVector {
            name: "trailing zero, lowercase currency, millisecond timestamp",
            entry: entry_b(),
            canonical_hex: ENTRY_B_CANONICAL,
            digest_hex: DIGEST_B,
        },
        EntryVector {
            name: "sub-unit amount, naive timestamp",
            entry: entry_c(),
            canonical_hex: ENTRY_C_CANONICAL,
            digest_hex: DIGEST_C,
        },
    ]
}

/// Batch vectors, all signed with the test key.
pub fn batch_vectors() -> Vec<BatchVector> {
    vec![
        BatchVector {
            name: "two entries, merkle root commitment",
            entries: vec![entry_a(), entry_b()],
            algorithm: DigestAlgorithm::Sha256,
            mode: CommitmentMode::MerkleRoot,
            seed: TEST_SEED,
            root_hex: ROOT_AB,
            signature_hex: "7d91cd7a811801f8b80c77107b004befdfb438da8a4e9b17522375c52a075262b8495f75fcec62b37b56e54edc9cdc4b163282d81762b7c0c662d319ae18b400",
        },
        BatchVector {
            name: "three entries, odd node carried",
            entries: vec![entry_a(), entry_b(), entry_c()],
            algorithm: DigestAlgorithm::Sha256,
            mode: CommitmentMode::MerkleRoot,
            seed: TEST_SEED,
            root_hex: ROOT_ABC,
            signature_hex: "2e42f1770c946b1d68082ed61b46ec8e3754fa12fb07e7160c9527c0450efce147d58d742d15fe0c18e93d7c66a8c5eb8547783bb4a53f1d60843b82a9c30001",
        },
        BatchVector {
            name: "two entries, full batch commitment",
            entries: vec![entry_a(), entry_b()],
            algorithm: DigestAlgorithm::Sha256,
            mode: CommitmentMode::FullBatch,
            seed: TEST_SEED,
            root_hex: ROOT_AB,
            signature_hex: "b864c100f147ecbe1c996b2a5048cbbbbc5e36a38ae2128d8896a5ff5e3e5d1910a7ec0dd3fe8c8aca1543d2433bcba248d521155c21708f80d3bed27fc5fc0f",
        },
    ]
}
