//! Entry validation: structural and business-rule checks.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::canonical::parse_amount;
use crate::entry::{CanonicalEntry, RawEntry};
use crate::error::ValidationError;

/// Validate a raw entry.
///
/// Checks, in order, stopping at the first failure:
/// - `entry_id`, `debit_account`, `credit_account` present and non-blank
/// - `amount` present, parseable, and greater than zero
/// - debit and credit accounts differ
///
/// Uniqueness is not checked; that belongs to the store.
pub fn validate_entry(entry: &RawEntry) -> Result<(), ValidationError> {
    // 1. Identifiers
    non_blank(&entry.entry_id, "entry_id")?;
    let debit = non_blank(&entry.debit_account, "debit_account")?;
    let credit = non_blank(&entry.credit_account, "credit_account")?;

    // 2. Amount
    let raw_amount = entry
        .amount
        .as_ref()
        .ok_or(ValidationError::MissingField("amount"))?;
    let amount = parse_amount(raw_amount)
        .map_err(|_| ValidationError::UnparseableAmount(raw_amount.to_string()))?;
    if amount <= Decimal::ZERO {
        return Err(ValidationError::NonPositiveAmount(raw_amount.to_string()));
    }

    // 3. Accounts
    if debit == credit {
        return Err(ValidationError::SameDebitCredit(debit.to_string()));
    }

    Ok(())
}

/// Boolean form of [`validate_entry`].
pub fn is_valid(entry: &RawEntry) -> bool {
    validate_entry(entry).is_ok()
}

fn non_blank<'a>(
    value: &'a Option<String>,
    field: &'static str,
) -> Result<&'a str, ValidationError> {
    match value.as_deref() {
        Some(s) if !s.trim().is_empty() => Ok(s),
        _ => Err(ValidationError::MissingField(field)),
    }
}

/// Field-length and batch-size limits imposed by the external ledger.
///
/// Lengths are counted in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryLimits {
    pub max_entry_id_len: usize,
    pub max_account_len: usize,
    pub max_currency_len: usize,
    pub max_batch_entries: usize,
}

impl EntryLimits {
    /// The limits enforced by the on-chain ledger program.
    pub const fn on_chain() -> Self {
        Self {
            max_entry_id_len: 32,
            max_account_len: 16,
            max_currency_len: 8,
            max_batch_entries: 10,
        }
    }
}

impl Default for EntryLimits {
    fn default() -> Self {
        Self::on_chain()
    }
}

/// Check a canonical entry against external field limits.
///
/// Applied after [`validate_entry`], so emptiness has already been ruled out.
pub fn check_limits(entry: &CanonicalEntry, limits: &EntryLimits) -> Result<(), ValidationError> {
    check_len("entry_id", &entry.entry_id, limits.max_entry_id_len)?;
    check_len("debit_account", &entry.debit_account, limits.max_account_len)?;
    check_len("credit_account", &entry.credit_account, limits.max_account_len)?;
    check_len("currency", &entry.currency, limits.max_currency_len)?;
    Ok(())
}

fn check_len(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if len > max {
        return Err(ValidationError::FieldTooLong { field, len, max });
    }
    Ok(())
}
