//! Test fixtures and helpers.
//!
//! A known signing key and a few fixed entries with hand-checkable
//! canonical forms.

use ledger_anchor_core::{canonicalize, CanonicalEntry, Keypair, PublicKey, RawEntry};
use ledger_anchor_signer::{SeedKeySource, Signer};

/// Seed of the test signing key.
pub const TEST_SEED: [u8; 32] = [0x42; 32];

/// Public key derived from [`TEST_SEED`], hex.
pub const TEST_PUBLIC_KEY_HEX: &str =
    "2152f8d19b791d24453242e15f2eab6cb7cffa7b6a5ed30097960e069881db12";

/// 2025-06-29T12:00:00Z in Unix milliseconds.
pub const BASE_TIMESTAMP_MS: i64 = 1_751_198_400_000;

pub fn test_keypair() -> Keypair {
    Keypair::from_seed(&TEST_SEED)
}

pub fn test_public_key() -> PublicKey {
    test_keypair().public_key()
}

pub fn test_key_source() -> SeedKeySource {
    SeedKeySource::new(TEST_SEED)
}

/// A signer over the test key.
pub fn test_signer() -> Signer<SeedKeySource> {
    match Signer::new(test_key_source()) {
        Ok(signer) => signer,
        Err(e) => panic!("in-memory test key failed to load: {}", e),
    }
}

/// Entry A: 100.00 USD from 1001 to 4001, RFC 3339 timestamp.
pub fn entry_a() -> RawEntry {
    RawEntry::new("A", "1001", "4001", "100.00", "USD").with_timestamp("2025-06-29T12:00:00Z")
}

/// Entry B: 250.50 EUR from 2001 to 1001, lowercase currency, millisecond timestamp.
pub fn entry_b() -> RawEntry {
    RawEntry::new("B", "2001", "1001", "250.50", "eur").with_timestamp(BASE_TIMESTAMP_MS + 60_000)
}

/// Entry C: 0.01 USD from 1001 to 2001, naive timestamp.
pub fn entry_c() -> RawEntry {
    RawEntry::new("C", "1001", "2001", "0.01", "USD").with_timestamp("2025-06-29 12:02:00")
}

/// `n` valid entries with ids `E0000`, `E0001`, ... one second apart.
pub fn sample_entries(n: usize) -> Vec<RawEntry> {
    (0..n)
        .map(|i| {
            let (debit, credit) = if i % 2 == 0 { ("1001", "4001") } else { ("2001", "1001") };
            RawEntry::new(
                format!("E{:04}", i),
                debit,
                credit,
                format!("{}.{:02}", 10 + i, i % 100),
                "USD",
            )
            .with_timestamp(BASE_TIMESTAMP_MS + (i as i64) * 1_000)
        })
        .collect()
}

/// Canonical forms of `entries`, panicking on the first invalid one.
pub fn canonical(entries: &[RawEntry]) -> Vec<CanonicalEntry> {
    entries
        .iter()
        .map(|raw| match canonicalize(raw) {
            Ok(entry) => entry,
            Err(e) => panic!("fixture entry {:?} is not canonicalizable: {}", raw.entry_id, e),
        })
        .collect()
}
