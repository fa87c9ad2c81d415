//! Signed batches: what gets handed to the chain writer, and how an
//! independent party checks it.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::batch::Batch;
use crate::canonical::canonical_batch_bytes;
use crate::crypto::{verify, Digest, DigestAlgorithm, Keypair, PublicKey, Signature};
use crate::entry::CanonicalEntry;
use crate::error::{CoreError, Result};
use crate::merkle::{entry_digest, merkle_root};

/// What the signature covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitmentMode {
    /// The 32 raw bytes of the Merkle root.
    #[default]
    MerkleRoot,
    /// The canonical CBOR encoding of the whole batch.
    FullBatch,
}

impl CommitmentMode {
    pub fn as_str(self) -> &'static str {
        match self {
            CommitmentMode::MerkleRoot => "merkle_root",
            CommitmentMode::FullBatch => "full_batch",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "merkle_root" => Some(CommitmentMode::MerkleRoot),
            "full_batch" => Some(CommitmentMode::FullBatch),
            _ => None,
        }
    }
}

/// The exact bytes signed for a batch.
pub fn commitment_bytes(mode: CommitmentMode, root: &Digest, entries: &[CanonicalEntry]) -> Vec<u8> {
    match mode {
        CommitmentMode::MerkleRoot => root.as_bytes().to_vec(),
        CommitmentMode::FullBatch => canonical_batch_bytes(entries),
    }
}

/// A batch together with its root and detached signature.
///
/// Everything a verifier needs is carried inline. The value is never
/// mutated after signing, so a failed submission can be retried as is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedBatch {
    /// Position of the batch within its run, from zero.
    pub index: usize,
    pub algorithm: DigestAlgorithm,
    pub mode: CommitmentMode,
    pub entries: Vec<CanonicalEntry>,
    pub root: Digest,
    pub signature: Signature,
    pub public_key: PublicKey,
}

impl SignedBatch {
    /// Hash and sign a batch with an in-memory keypair.
    pub fn sign(
        index: usize,
        batch: Batch<CanonicalEntry>,
        algorithm: DigestAlgorithm,
        mode: CommitmentMode,
        keypair: &Keypair,
    ) -> Result<Self> {
        let entries = batch.into_inner();
        let root = merkle_root(&entries, algorithm).ok_or(CoreError::EmptyBatch)?;
        let signature = keypair.sign(&commitment_bytes(mode, &root, &entries));
        Ok(Self {
            index,
            algorithm,
            mode,
            entries,
            root,
            signature,
            public_key: keypair.public_key(),
        })
    }

    /// The bytes the signature covers.
    pub fn commitment(&self) -> Vec<u8> {
        commitment_bytes(self.mode, &self.root, &self.entries)
    }

    /// Entry ids in batch order.
    pub fn entry_ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.entry_id.clone()).collect()
    }

    /// Per-entry digests under the batch's algorithm, in batch order.
    pub fn entry_digests(&self) -> Vec<Digest> {
        self.entries
            .iter()
            .map(|e| entry_digest(e, self.algorithm))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Check a signed batch from scratch.
///
/// Recomputes every entry digest and the root with the batch's algorithm,
/// compares against the stated root, rebuilds the commitment for the
/// batch's mode, and verifies the signature against the stated key.
pub fn verify_signed_batch(batch: &SignedBatch) -> Result<()> {
    let computed = merkle_root(&batch.entries, batch.algorithm).ok_or(CoreError::EmptyBatch)?;
    if computed != batch.root {
        return Err(CoreError::RootMismatch {
            expected: batch.root,
            computed,
        });
    }
    verify(&batch.signature, &batch.commitment(), &batch.public_key)
}

/// Opaque acknowledgment returned by a chain writer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AckToken(String);

impl AckToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AckToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::chunk;
    use rust_decimal::Decimal;

    fn entries(n: usize) -> Vec<CanonicalEntry> {
        (0..n)
            .map(|i| CanonicalEntry {
                entry_id: format!("E{}", i),
                debit_account: "1001".into(),
                credit_account: "4001".into(),
                amount: Decimal::new(1250 + i as i64, 2).normalize(),
                currency: "EUR".into(),
                timestamp: 1736870400000 + i as i64,
            })
            .collect()
    }

    fn signed(mode: CommitmentMode) -> SignedBatch {
        let keypair = Keypair::from_seed(&[0x42; 32]);
        let batch = chunk(&entries(3), 10).unwrap().remove(0);
        SignedBatch::sign(0, batch, DigestAlgorithm::Sha256, mode, &keypair).unwrap()
    }

    #[test]
    fn test_signed_batch_verifies() {
        for mode in [CommitmentMode::MerkleRoot, CommitmentMode::FullBatch] {
            let batch = signed(mode);
            verify_signed_batch(&batch).expect("fresh batch should verify");
        }
    }

    #[test]
    fn test_merkle_mode_signs_root_bytes() {
        let batch = signed(CommitmentMode::MerkleRoot);
        assert_eq!(batch.commitment(), batch.root.as_bytes().to_vec());
        verify(&batch.signature, batch.root.as_bytes(), &batch.public_key).unwrap();
    }

    #[test]
    fn test_tampered_entry_detected() {
        let mut batch = signed(CommitmentMode::MerkleRoot);
        batch.entries[1].amount = Decimal::new(999_999, 2);
        assert!(matches!(
            verify_signed_batch(&batch),
            Err(CoreError::RootMismatch { .. })
        ));
    }

    #[test]
    fn test_tampered_root_and_signature_detected() {
        let mut batch = signed(CommitmentMode::MerkleRoot);
        batch.signature.0[10] ^= 0x01;
        assert!(matches!(
            verify_signed_batch(&batch),
            Err(CoreError::InvalidSignature)
        ));

        let other = Keypair::from_seed(&[0x43; 32]);
        let mut batch = signed(CommitmentMode::FullBatch);
        batch.public_key = other.public_key();
        assert!(verify_signed_batch(&batch).is_err());
    }

    #[test]
    fn test_entry_digests_fold_to_root() {
        let batch = signed(CommitmentMode::MerkleRoot);
        let digests = batch.entry_digests();
        assert_eq!(digests.len(), 3);
        assert_eq!(
            crate::merkle::merkle_root_from_digests(&digests, batch.algorithm),
            Some(batch.root)
        );
    }

    #[test]
    fn test_empty_batch_does_not_verify() {
        let mut batch = signed(CommitmentMode::MerkleRoot);
        batch.entries.clear();
        assert!(matches!(verify_signed_batch(&batch), Err(CoreError::EmptyBatch)));
    }

    #[test]
    fn test_json_roundtrip_keeps_verifiability() {
        let batch = signed(CommitmentMode::FullBatch);
        let json = serde_json::to_string(&batch).unwrap();
        assert!(json.contains("\"mode\":\"full_batch\""));
        assert!(json.contains("\"algorithm\":\"sha256\""));
        assert!(json.contains("\"amount\":\"12.5\""));

        let back: SignedBatch = serde_json::from_str(&json).unwrap();
        assert_eq!(back, batch);
        verify_signed_batch(&back).unwrap();
    }
}
