//! Ledger entries: the raw record as stored, and its canonical form.
//!
//! A [`RawEntry`] is whatever the persistence layer holds. Fields may be
//! missing, amounts may be numbers or numeric strings, and timestamps may be
//! in several formats. A [`CanonicalEntry`] is the single normalized form the
//! hasher accepts; see [`crate::canonical`].

use chrono::{SecondsFormat, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::error::CoreError;

/// An amount as supplied by the caller.
///
/// Decoding never produces `Float`: a JSON number that is not an `i64` is
/// kept as its exact source text, so `0.1`, `1e5` and integers beyond `i64`
/// reach [`crate::canonical::parse_amount`] unrounded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RawAmount {
    /// A JSON integer.
    Integer(i64),
    /// A floating-point value supplied from Rust.
    Float(f64),
    /// A numeric string such as `"100.50"`, or the text of a JSON number.
    Text(String),
}

/// Wire shapes accepted for an amount.
#[derive(Deserialize)]
#[serde(untagged)]
enum AmountRepr {
    Integer(i64),
    Number(serde_json::Number),
    Text(String),
}

impl<'de> Deserialize<'de> for RawAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match AmountRepr::deserialize(deserializer)? {
            AmountRepr::Integer(i) => RawAmount::Integer(i),
            AmountRepr::Number(n) => RawAmount::Text(n.to_string()),
            AmountRepr::Text(s) => RawAmount::Text(s),
        })
    }
}

impl fmt::Display for RawAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawAmount::Integer(i) => write!(f, "{}", i),
            RawAmount::Float(x) => write!(f, "{}", x),
            RawAmount::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RawAmount {
    fn from(value: i64) -> Self {
        RawAmount::Integer(value)
    }
}

impl From<f64> for RawAmount {
    fn from(value: f64) -> Self {
        RawAmount::Float(value)
    }
}

impl From<&str> for RawAmount {
    fn from(value: &str) -> Self {
        RawAmount::Text(value.to_string())
    }
}

impl From<String> for RawAmount {
    fn from(value: String) -> Self {
        RawAmount::Text(value)
    }
}

impl From<Decimal> for RawAmount {
    fn from(value: Decimal) -> Self {
        RawAmount::Text(value.to_string())
    }
}

/// A timestamp as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    /// Unix milliseconds.
    Millis(i64),
    /// RFC 3339, naive date-time (UTC), bare date, or all-digit milliseconds.
    Text(String),
}

impl fmt::Display for RawTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawTimestamp::Millis(ms) => write!(f, "{}", ms),
            RawTimestamp::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RawTimestamp {
    fn from(value: i64) -> Self {
        RawTimestamp::Millis(value)
    }
}

impl From<&str> for RawTimestamp {
    fn from(value: &str) -> Self {
        RawTimestamp::Text(value.to_string())
    }
}

/// One double-entry bookkeeping record, as held by the persistence layer.
///
/// Field names follow the ledger table; `account_debit`/`account_credit`
/// (and the short `debit`/`credit`) are accepted as aliases.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEntry {
    #[serde(default)]
    pub entry_id: Option<String>,

    #[serde(default, alias = "account_debit", alias = "debit")]
    pub debit_account: Option<String>,

    #[serde(default, alias = "account_credit", alias = "credit")]
    pub credit_account: Option<String>,

    #[serde(default)]
    pub amount: Option<RawAmount>,

    #[serde(default)]
    pub currency: Option<String>,

    #[serde(default)]
    pub timestamp: Option<RawTimestamp>,
}

impl RawEntry {
    /// Build an entry with every field but the timestamp.
    pub fn new(
        entry_id: impl Into<String>,
        debit_account: impl Into<String>,
        credit_account: impl Into<String>,
        amount: impl Into<RawAmount>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            entry_id: Some(entry_id.into()),
            debit_account: Some(debit_account.into()),
            credit_account: Some(credit_account.into()),
            amount: Some(amount.into()),
            currency: Some(currency.into()),
            timestamp: None,
        }
    }

    /// Set the timestamp.
    pub fn with_timestamp(mut self, timestamp: impl Into<RawTimestamp>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    /// Decode a single JSON record.
    ///
    /// A record whose fields have the wrong JSON types (for example a boolean
    /// amount) is a malformed call, not an invalid entry.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        serde_json::from_str(json).map_err(|e| CoreError::MalformedEntry(e.to_string()))
    }

    /// Decode a single record from a JSON value.
    pub fn from_json_value(value: serde_json::Value) -> Result<Self, CoreError> {
        serde_json::from_value(value).map_err(|e| CoreError::MalformedEntry(e.to_string()))
    }

    /// The entry id, or `""` when absent.
    pub fn id(&self) -> &str {
        self.entry_id.as_deref().unwrap_or_default()
    }
}

/// The canonical form of an entry: exact amount, millisecond UTC timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanonicalEntry {
    pub entry_id: String,
    pub debit_account: String,
    pub credit_account: String,
    /// Normalized: no trailing fractional zeros.
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    /// Trimmed, ASCII uppercase.
    pub currency: String,
    /// Unix milliseconds, UTC.
    pub timestamp: i64,
}

impl CanonicalEntry {
    /// Timestamp as an RFC 3339 string with millisecond precision.
    pub fn timestamp_rfc3339(&self) -> Option<String> {
        Utc.timestamp_millis_opt(self.timestamp)
            .single()
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_entry_accepts_table_field_names() {
        let entry = RawEntry::from_json(
            r#"{"entry_id":"test123","account_debit":"1001","account_credit":"4001",
                "amount":9999,"currency":"USD","timestamp":"2025-06-29T12:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(entry.id(), "test123");
        assert_eq!(entry.debit_account.as_deref(), Some("1001"));
        assert_eq!(entry.credit_account.as_deref(), Some("4001"));
        assert_eq!(entry.amount, Some(RawAmount::Integer(9999)));
        assert_eq!(
            entry.timestamp,
            Some(RawTimestamp::Text("2025-06-29T12:00:00Z".into()))
        );
    }

    #[test]
    fn test_raw_amount_variants() {
        let entry = RawEntry::from_json(r#"{"amount":"100.50"}"#).unwrap();
        assert_eq!(entry.amount, Some(RawAmount::Text("100.50".into())));

        let entry = RawEntry::from_json(r#"{"amount":12.5}"#).unwrap();
        assert_eq!(entry.amount, Some(RawAmount::Text("12.5".into())));

        assert_eq!(RawAmount::from(format!("{}.{:02}", 7, 5)), RawAmount::Text("7.05".into()));

        let entry = RawEntry::from_json(r#"{"amount":null,"timestamp":1736870400000}"#).unwrap();
        assert_eq!(entry.amount, None);
        assert_eq!(entry.timestamp, Some(RawTimestamp::Millis(1736870400000)));
    }

    #[test]
    fn test_json_numbers_keep_their_text() {
        let entry = RawEntry::from_json(r#"{"amount":9223372036854775809}"#).unwrap();
        assert_eq!(entry.amount, Some(RawAmount::Text("9223372036854775809".into())));

        let entry = RawEntry::from_json(r#"{"amount":0.12345678901234567890123}"#).unwrap();
        assert_eq!(
            entry.amount,
            Some(RawAmount::Text("0.12345678901234567890123".into()))
        );

        let entry = RawEntry::from_json(r#"{"amount":1e5}"#).unwrap();
        assert_eq!(entry.amount, Some(RawAmount::Text("1e5".into())));

        let value = serde_json::json!({ "amount": 9223372036854775809u64 });
        let entry = RawEntry::from_json_value(value).unwrap();
        assert_eq!(entry.amount, Some(RawAmount::Text("9223372036854775809".into())));
    }

    #[test]
    fn test_wrong_json_types_are_malformed() {
        let result = RawEntry::from_json(r#"{"entry_id":"A","amount":true}"#);
        assert!(matches!(result, Err(CoreError::MalformedEntry(_))));

        let result = RawEntry::from_json(r#"{"entry_id":42}"#);
        assert!(matches!(result, Err(CoreError::MalformedEntry(_))));

        let result = RawEntry::from_json_value(serde_json::json!([1, 2, 3]));
        assert!(matches!(result, Err(CoreError::MalformedEntry(_))));
    }

    #[test]
    fn test_canonical_timestamp_rfc3339() {
        let entry = CanonicalEntry {
            entry_id: "A".into(),
            debit_account: "1001".into(),
            credit_account: "4001".into(),
            amount: Decimal::from(100),
            currency: "USD".into(),
            timestamp: 1751198400000,
        };
        assert_eq!(
            entry.timestamp_rfc3339().as_deref(),
            Some("2025-06-29T12:00:00.000Z")
        );
    }
}
