//! Entry digests and the Merkle fold.
//!
//! Leaves are digests of canonical entry bytes. Each level pairs adjacent
//! nodes as `H(left || right)`; an unpaired trailing node is carried to the
//! next level unchanged. For `[d1, d2, d3]` the root is `H(H(d1 || d2) || d3)`.
//!
//! Node hashing has no leaf/interior domain separation. Roots produced by
//! earlier anchoring runs depend on this exact rule.

use crate::canonical::canonical_entry_bytes;
use crate::crypto::{Digest, DigestAlgorithm};
use crate::entry::CanonicalEntry;

/// Digest of one canonical entry.
pub fn entry_digest(entry: &CanonicalEntry, algorithm: DigestAlgorithm) -> Digest {
    algorithm.hash(&canonical_entry_bytes(entry))
}

/// Digest of two concatenated digests.
pub fn hash_pair(left: &Digest, right: &Digest, algorithm: DigestAlgorithm) -> Digest {
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(left.as_bytes());
    buf[32..].copy_from_slice(right.as_bytes());
    algorithm.hash(&buf)
}

/// Merkle root of an ordered entry sequence. `None` when empty.
pub fn merkle_root(entries: &[CanonicalEntry], algorithm: DigestAlgorithm) -> Option<Digest> {
    let leaves: Vec<Digest> = entries.iter().map(|e| entry_digest(e, algorithm)).collect();
    merkle_root_from_digests(&leaves, algorithm)
}

/// Merkle root over precomputed leaf digests. `None` when empty.
pub fn merkle_root_from_digests(leaves: &[Digest], algorithm: DigestAlgorithm) -> Option<Digest> {
    let mut level = leaves.to_vec();
    if level.is_empty() {
        return None;
    }

    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| match pair {
                [left, right] => hash_pair(left, right, algorithm),
                carried => carried[0],
            })
            .collect();
    }

    level.pop()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    fn entry(id: &str, amount: i64) -> CanonicalEntry {
        CanonicalEntry {
            entry_id: id.into(),
            debit_account: "1001".into(),
            credit_account: "4001".into(),
            amount: Decimal::from(amount),
            currency: "USD".into(),
            timestamp: 1736870400000,
        }
    }

    const ALG: DigestAlgorithm = DigestAlgorithm::Sha256;

    #[test]
    fn test_empty_has_no_root() {
        assert_eq!(merkle_root(&[], ALG), None);
        assert_eq!(merkle_root_from_digests(&[], ALG), None);
    }

    #[test]
    fn test_single_entry_root_is_its_digest() {
        let e = entry("A", 1);
        assert_eq!(merkle_root(&[e.clone()], ALG), Some(entry_digest(&e, ALG)));
    }

    #[test]
    fn test_two_entries() {
        let (a, b) = (entry("A", 1), entry("B", 2));
        let expected = hash_pair(&entry_digest(&a, ALG), &entry_digest(&b, ALG), ALG);
        assert_eq!(merkle_root(&[a, b], ALG), Some(expected));
    }

    #[test]
    fn test_odd_trailing_node_is_carried() {
        let entries = [entry("e1", 1), entry("e2", 2), entry("e3", 3)];
        let d: Vec<Digest> = entries.iter().map(|e| entry_digest(e, ALG)).collect();
        let expected = hash_pair(&hash_pair(&d[0], &d[1], ALG), &d[2], ALG);
        assert_eq!(merkle_root(&entries, ALG), Some(expected));
    }

    #[test]
    fn test_five_leaves_carry_twice() {
        let d: Vec<Digest> = (0u8..5).map(|i| Digest::from_bytes([i; 32])).collect();
        let h = |l: &Digest, r: &Digest| hash_pair(l, r, ALG);
        // [d0 d1 d2 d3 d4] -> [h01 h23 d4] -> [h0123 d4] -> root
        let expected = h(&h(&h(&d[0], &d[1]), &h(&d[2], &d[3])), &d[4]);
        assert_eq!(merkle_root_from_digests(&d, ALG), Some(expected));
    }

    #[test]
    fn test_order_is_significant() {
        let (a, b) = (entry("A", 1), entry("B", 2));
        assert_ne!(
            merkle_root(&[a.clone(), b.clone()], ALG),
            merkle_root(&[b, a], ALG)
        );
    }

    #[test]
    fn test_algorithm_changes_root() {
        let entries = [entry("A", 1), entry("B", 2)];
        assert_ne!(
            merkle_root(&entries, DigestAlgorithm::Sha256),
            merkle_root(&entries, DigestAlgorithm::Blake3)
        );
    }

    #[test]
    fn test_pair_hash_is_concatenation() {
        let left = Digest::from_bytes([0x01; 32]);
        let right = Digest::from_bytes([0x02; 32]);
        let mut concat = vec![0x01u8; 32];
        concat.extend_from_slice(&[0x02; 32]);
        assert_eq!(hash_pair(&left, &right, ALG), ALG.hash(&concat));
    }

    proptest! {
        #[test]
        fn prop_root_is_deterministic(amounts in prop::collection::vec(1i64..1_000_000, 1..40)) {
            let entries: Vec<_> = amounts
                .iter()
                .enumerate()
                .map(|(i, a)| entry(&format!("E{}", i), *a))
                .collect();
            prop_assert_eq!(merkle_root(&entries, ALG), merkle_root(&entries.clone(), ALG));
        }

        #[test]
        fn prop_swapping_distinct_neighbours_changes_root(n in 2usize..30, i in 0usize..29) {
            let i = i % (n - 1);
            let entries: Vec<_> = (0..n).map(|k| entry(&format!("E{}", k), k as i64 + 1)).collect();
            let mut swapped = entries.clone();
            swapped.swap(i, i + 1);
            prop_assert_ne!(merkle_root(&entries, ALG), merkle_root(&swapped, ALG));
        }
    }
}
