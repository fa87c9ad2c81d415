//! Canonical form and deterministic CBOR encoding of ledger entries.
//!
//! Two steps, both pure:
//!
//! 1. [`canonicalize`] normalizes a [`RawEntry`]: the amount becomes an exact
//!    normalized decimal, the timestamp becomes Unix milliseconds (UTC), the
//!    currency is trimmed and uppercased.
//! 2. [`canonical_entry_bytes`] encodes the canonical entry as RFC 8949
//!    Core Deterministic CBOR:
//!    - map keys are text, sorted by their encoded bytes
//!    - integers use the smallest valid encoding
//!    - definite lengths only
//!    - no floats (the amount is a decimal string)
//!
//! **This byte layout is frozen.** Every digest, Merkle root and signature
//! depends on it; changing it makes every previously anchored batch
//! unverifiable.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use ciborium::value::Value;
use rust_decimal::Decimal;

use crate::entry::{CanonicalEntry, RawAmount, RawEntry, RawTimestamp};
use crate::error::{CanonicalError, CoreError};

/// Version of the canonical encoding, written under key `v`.
pub const CANONICAL_VERSION: u64 = 1;

/// CBOR map key names.
mod keys {
    pub const VERSION: &str = "v";
    pub const DEBIT: &str = "debit";
    pub const AMOUNT: &str = "amount";
    pub const CREDIT: &str = "credit";
    pub const CURRENCY: &str = "currency";
    pub const ENTRY_ID: &str = "entry_id";
    pub const TIMESTAMP: &str = "timestamp";
}

/// Naive date-time layouts, interpreted as UTC.
const NAIVE_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse an amount into an exact, normalized decimal.
///
/// Text must be a plain decimal: an optional sign, digits, at most one
/// point. Floats go through their shortest round-trip decimal text, so `12.5`
/// and `"12.50"` yield the same value. Non-finite floats, exponent notation,
/// digit separators and values needing rounding are rejected.
pub fn parse_amount(raw: &RawAmount) -> Result<Decimal, CanonicalError> {
    let value = match raw {
        RawAmount::Integer(i) => Decimal::from(*i),
        RawAmount::Float(f) => {
            if !f.is_finite() {
                return Err(CanonicalError::InvalidAmount(f.to_string()));
            }
            parse_decimal_text(&f.to_string())?
        }
        RawAmount::Text(s) => parse_decimal_text(s)?,
    };
    Ok(value.normalize())
}

fn parse_decimal_text(text: &str) -> Result<Decimal, CanonicalError> {
    let trimmed = text.trim();
    if !is_plain_decimal(trimmed) {
        return Err(CanonicalError::InvalidAmount(text.to_string()));
    }
    Decimal::from_str_exact(trimmed).map_err(|_| CanonicalError::InvalidAmount(text.to_string()))
}

fn is_plain_decimal(text: &str) -> bool {
    let unsigned = text.strip_prefix(|c| c == '+' || c == '-').unwrap_or(text);
    let (int, frac) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    !(int.is_empty() && frac.is_empty())
        && int.bytes().chain(frac.bytes()).all(|b| b.is_ascii_digit())
}

/// Parse a timestamp into Unix milliseconds (UTC).
///
/// Text made only of digits, with an optional leading `-`, is taken as
/// milliseconds. Sub-millisecond digits are truncated.
pub fn parse_timestamp(raw: &RawTimestamp) -> Result<i64, CanonicalError> {
    match raw {
        RawTimestamp::Millis(ms) => Ok(*ms),
        RawTimestamp::Text(s) => parse_timestamp_text(s),
    }
}

fn parse_timestamp_text(text: &str) -> Result<i64, CanonicalError> {
    let invalid = || CanonicalError::InvalidTimestamp(text.to_string());
    let s = text.trim();
    if s.is_empty() {
        return Err(invalid());
    }

    let digits = s.strip_prefix('-').unwrap_or(s);
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        return s.parse::<i64>().map_err(|_| invalid());
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.timestamp_millis());
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(Utc.from_utc_datetime(&naive).timestamp_millis());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let midnight = date.and_hms_opt(0, 0, 0).ok_or_else(invalid)?;
        return Ok(Utc.from_utc_datetime(&midnight).timestamp_millis());
    }

    Err(invalid())
}

fn required<'a>(value: &'a Option<String>, field: &'static str) -> Result<&'a str, CanonicalError> {
    match value.as_deref() {
        Some(s) if !s.trim().is_empty() => Ok(s),
        _ => Err(CanonicalError::MissingField(field)),
    }
}

/// Map a raw entry to its canonical form.
///
/// Fails explicitly on missing identifiers, a missing currency, or an
/// amount/timestamp that cannot be parsed. Never coerces.
pub fn canonicalize(entry: &RawEntry) -> Result<CanonicalEntry, CanonicalError> {
    let entry_id = required(&entry.entry_id, "entry_id")?;
    let debit_account = required(&entry.debit_account, "debit_account")?;
    let credit_account = required(&entry.credit_account, "credit_account")?;
    let currency = required(&entry.currency, "currency")?;

    let amount = entry
        .amount
        .as_ref()
        .ok_or(CanonicalError::MissingField("amount"))
        .and_then(parse_amount)?;

    let timestamp = entry
        .timestamp
        .as_ref()
        .ok_or(CanonicalError::MissingField("timestamp"))
        .and_then(parse_timestamp)?;

    Ok(CanonicalEntry {
        entry_id: entry_id.to_string(),
        debit_account: debit_account.to_string(),
        credit_account: credit_account.to_string(),
        amount,
        currency: currency.trim().to_ascii_uppercase(),
        timestamp,
    })
}

/// Encode a canonical entry to deterministic CBOR bytes.
///
/// This is the exact input of the per-entry digest.
pub fn canonical_entry_bytes(entry: &CanonicalEntry) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_entry_to(&mut buf, entry);
    buf
}

/// Encode a whole batch as a CBOR array of entry maps, in batch order.
///
/// Used as the commitment in whole-batch signing mode.
pub fn canonical_batch_bytes(entries: &[CanonicalEntry]) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_uint(&mut buf, 4, entries.len() as u64);
    for entry in entries {
        encode_entry_to(&mut buf, entry);
    }
    buf
}

/// Encode one entry map into `buf`.
fn encode_entry_to(buf: &mut Vec<u8>, entry: &CanonicalEntry) {
    let amount = entry.amount.normalize().to_string();
    let fields: [(&str, Field<'_>); 7] = [
        (keys::VERSION, Field::Int(CANONICAL_VERSION as i64)),
        (keys::ENTRY_ID, Field::Text(&entry.entry_id)),
        (keys::DEBIT, Field::Text(&entry.debit_account)),
        (keys::CREDIT, Field::Text(&entry.credit_account)),
        (keys::AMOUNT, Field::Text(&amount)),
        (keys::CURRENCY, Field::Text(&entry.currency)),
        (keys::TIMESTAMP, Field::Int(entry.timestamp)),
    ];
    encode_map_canonical(buf, &fields);
}

/// A value inside an entry map. Only what the layout needs.
enum Field<'a> {
    Int(i64),
    Text(&'a str),
}

fn encode_field(buf: &mut Vec<u8>, field: &Field<'_>) {
    match field {
        Field::Int(i) => encode_integer(buf, *i),
        Field::Text(s) => encode_text(buf, s),
    }
}

/// Encode a CBOR integer (major types 0 and 1).
fn encode_integer(buf: &mut Vec<u8>, n: i64) {
    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        // CBOR encodes -1 as 0, -2 as 1, etc.
        encode_uint(buf, 1, (-1 - n) as u64);
    }
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

/// Encode a text string (major type 3).
fn encode_text(buf: &mut Vec<u8>, s: &str) {
    encode_uint(buf, 3, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

/// Encode a map canonically (major type 5).
///
/// Keys are sorted by their encoded byte comparison, which for text keys
/// means shorter keys first, then bytewise.
fn encode_map_canonical(buf: &mut Vec<u8>, fields: &[(&str, Field<'_>)]) {
    let mut encoded: Vec<(Vec<u8>, &Field<'_>)> = fields
        .iter()
        .map(|(k, v)| {
            let mut key_buf = Vec::with_capacity(k.len() + 1);
            encode_text(&mut key_buf, k);
            (key_buf, v)
        })
        .collect();

    encoded.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, encoded.len() as u64);
    for (key_bytes, value) in encoded {
        buf.extend_from_slice(&key_bytes);
        encode_field(buf, value);
    }
}

/// Decode canonical entry bytes back into a [`CanonicalEntry`].
///
/// Verifiers that receive canonical encodings instead of entries use this.
/// The input must re-encode to exactly the same bytes.
pub fn decode_canonical_entry(bytes: &[u8]) -> Result<CanonicalEntry, CoreError> {
    let value: Value =
        ciborium::from_reader(bytes).map_err(|e| CoreError::DecodingError(e.to_string()))?;

    let map = match &value {
        Value::Map(m) => m,
        _ => return Err(CoreError::DecodingError("expected map".into())),
    };

    let get = |key: &str| -> Option<&Value> {
        map.iter()
            .find(|(k, _)| matches!(k, Value::Text(s) if s == key))
            .map(|(_, v)| v)
    };

    let text = |key: &str| -> Result<String, CoreError> {
        match get(key) {
            Some(Value::Text(s)) => Ok(s.clone()),
            _ => Err(CoreError::DecodingError(format!("invalid {}", key))),
        }
    };

    let int = |key: &str| -> Result<i64, CoreError> {
        match get(key) {
            Some(Value::Integer(i)) => {
                i64::try_from(*i).map_err(|_| CoreError::DecodingError(format!("invalid {}", key)))
            }
            _ => Err(CoreError::DecodingError(format!("invalid {}", key))),
        }
    };

    let version = int(keys::VERSION)?;
    if version != CANONICAL_VERSION as i64 {
        return Err(CoreError::DecodingError(format!(
            "unsupported canonical version: {}",
            version
        )));
    }

    let amount_text = text(keys::AMOUNT)?;
    let amount = Decimal::from_str_exact(&amount_text)
        .map_err(|_| CoreError::DecodingError(format!("invalid amount: {}", amount_text)))?;

    let entry = CanonicalEntry {
        entry_id: text(keys::ENTRY_ID)?,
        debit_account: text(keys::DEBIT)?,
        credit_account: text(keys::CREDIT)?,
        amount,
        currency: text(keys::CURRENCY)?,
        timestamp: int(keys::TIMESTAMP)?,
    };

    if canonical_entry_bytes(&entry) != bytes {
        return Err(CoreError::DecodingError("non-canonical encoding".into()));
    }

    Ok(entry)
}
