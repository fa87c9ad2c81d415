//! Proptest generators for property-based testing.

use proptest::prelude::*;
use rust_decimal::Decimal;

use ledger_anchor_core::{CanonicalEntry, DigestAlgorithm, RawEntry};

/// An account code such as `1001` or `4001-AR`.
pub fn account() -> impl Strategy<Value = String> {
    "[1-9][0-9]{3}(-[A-Z]{2})?".prop_map(String::from)
}

/// An entry id.
pub fn entry_id() -> impl Strategy<Value = String> {
    "[A-Z]{2,4}-[0-9]{1,6}".prop_map(String::from)
}

/// A three-letter currency code.
pub fn currency() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("USD".to_string()),
        Just("EUR".to_string()),
        Just("GBP".to_string()),
        "[A-Z]{3}".prop_map(String::from),
    ]
}

/// A positive amount with up to four decimal places, normalized.
pub fn amount() -> impl Strategy<Value = Decimal> {
    (1i64..=10_000_000_000i64, 0u32..=4u32).prop_map(|(mantissa, scale)| {
        Decimal::new(mantissa, scale).normalize()
    })
}

/// A timestamp between 2000 and 2100, in milliseconds.
pub fn timestamp_ms() -> impl Strategy<Value = i64> {
    946_684_800_000i64..=4_102_444_800_000i64
}

pub fn digest_algorithm() -> impl Strategy<Value = DigestAlgorithm> {
    prop_oneof![Just(DigestAlgorithm::Sha256), Just(DigestAlgorithm::Blake3)]
}

/// A canonical entry with distinct debit and credit accounts.
pub fn canonical_entry() -> impl Strategy<Value = CanonicalEntry> {
    (entry_id(), account(), account(), amount(), currency(), timestamp_ms())
        .prop_filter("accounts must differ", |(_, debit, credit, ..)| debit != credit)
        .prop_map(
            |(entry_id, debit_account, credit_account, amount, currency, timestamp)| {
                CanonicalEntry {
                    entry_id,
                    debit_account,
                    credit_account,
                    amount,
                    currency,
                    timestamp,
                }
            },
        )
}

/// A batch of 1 to `max` canonical entries.
pub fn canonical_entries(max: usize) -> impl Strategy<Value = Vec<CanonicalEntry>> {
    prop::collection::vec(canonical_entry(), 1..=max.max(1))
}

/// A valid raw entry, in one of the input shapes callers send: numeric or
/// text amounts, millisecond or RFC 3339 timestamps.
pub fn raw_entry() -> impl Strategy<Value = RawEntry> {
    (canonical_entry(), any::<bool>(), any::<bool>()).prop_map(
        |(entry, text_amount, rfc3339)| {
            let mut raw = RawEntry::new(
                entry.entry_id.clone(),
                entry.debit_account.clone(),
                entry.credit_account.clone(),
                entry.amount,
                entry.currency.to_ascii_lowercase(),
            );
            if !text_amount {
                if let Ok(units) = i64::try_from(entry.amount) {
                    if Decimal::from(units) == entry.amount {
                        raw.amount = Some(units.into());
                    }
                }
            }
            if rfc3339 {
                match entry.timestamp_rfc3339() {
                    Some(ts) => raw.with_timestamp(ts.as_str()),
                    None => raw.with_timestamp(entry.timestamp),
                }
            } else {
                raw.with_timestamp(entry.timestamp)
            }
        },
    )
}

/// A raw entry broken in exactly one way.
pub fn invalid_raw_entry() -> impl Strategy<Value = RawEntry> {
    (raw_entry(), 0u8..5u8).prop_map(|(mut raw, defect)| {
        match defect {
            0 => raw.entry_id = Some("  ".into()),
            1 => raw.credit_account = raw.debit_account.clone(),
            2 => raw.amount = Some(0i64.into()),
            3 => raw.amount = Some("-5.00".into()),
            _ => raw.debit_account = None,
        }
        raw
    })
}
