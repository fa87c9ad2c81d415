//! Reading raw entries from export files.
//!
//! JSON files hold an array of entry objects. CSV files have a header row
//! naming the columns; `account_debit`/`debit_account` and
//! `account_credit`/`credit_account` are both accepted.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use ledger_anchor_core::{RawAmount, RawEntry, RawTimestamp};
use serde::Deserialize;
use tracing::debug;

use crate::error::{AnchorError, Result};

/// Load entries from `path`, choosing the format by extension.
///
/// `.csv` is read as CSV; anything else is read as a JSON array.
pub fn load_entries(path: &Path) -> Result<Vec<RawEntry>> {
    let source_error = |message: String| AnchorError::Source {
        path: path.to_path_buf(),
        message,
    };

    let is_csv = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

    let entries = if is_csv {
        let file = File::open(path).map_err(|e| source_error(e.to_string()))?;
        parse_csv_entries(file)
    } else {
        let text = std::fs::read_to_string(path).map_err(|e| source_error(e.to_string()))?;
        parse_json_entries(&text)
    }
    .map_err(source_error)?;

    debug!(path = %path.display(), entries = entries.len(), "entries loaded");
    Ok(entries)
}

/// Parse a JSON array of entry objects.
pub fn parse_json_entries(text: &str) -> std::result::Result<Vec<RawEntry>, String> {
    let values: Vec<serde_json::Value> =
        serde_json::from_str(text).map_err(|e| format!("expected a JSON array of entries: {}", e))?;

    values
        .into_iter()
        .enumerate()
        .map(|(position, value)| {
            RawEntry::from_json_value(value).map_err(|e| format!("record {}: {}", position, e))
        })
        .collect()
}

/// One CSV row. Every cell is text; empty cells are absent fields.
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(default)]
    entry_id: Option<String>,
    #[serde(default, alias = "debit_account")]
    account_debit: Option<String>,
    #[serde(default, alias = "credit_account")]
    account_credit: Option<String>,
    #[serde(default)]
    amount: Option<String>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
}

impl From<CsvRow> for RawEntry {
    fn from(row: CsvRow) -> Self {
        let present = |cell: Option<String>| cell.filter(|s| !s.is_empty());
        RawEntry {
            entry_id: present(row.entry_id),
            debit_account: present(row.account_debit),
            credit_account: present(row.account_credit),
            amount: present(row.amount).map(RawAmount::Text),
            currency: present(row.currency),
            timestamp: present(row.timestamp).map(RawTimestamp::Text),
        }
    }
}

/// Parse CSV with a header row.
pub fn parse_csv_entries<R: Read>(reader: R) -> std::result::Result<Vec<RawEntry>, String> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    reader
        .deserialize::<CsvRow>()
        .enumerate()
        .map(|(position, row)| {
            row.map(RawEntry::from)
                .map_err(|e| format!("row {}: {}", position, e))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_json_entries() {
        let entries = parse_json_entries(
            r#"[
                {"entry_id": "A", "account_debit": "1001", "account_credit": "4001",
                 "amount": 100, "currency": "USD", "timestamp": "2025-06-29T12:00:00Z"},
                {"entry_id": "B", "debit_account": "1001", "credit_account": "4001",
                 "amount": "250.00", "currency": "usd"}
            ]"#,
        )
        .unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].debit_account.as_deref(), Some("1001"));
        assert_eq!(entries[0].amount, Some(RawAmount::Integer(100)));
        assert_eq!(entries[1].amount, Some(RawAmount::Text("250.00".into())));
        assert_eq!(entries[1].timestamp, None);
    }

    #[test]
    fn test_json_amounts_keep_source_text() {
        let entries = parse_json_entries(
            r#"[{"amount": 12.50}, {"amount": 9223372036854775809}, {"amount": 0.1000000000000000055511151231}]"#,
        )
        .unwrap();

        assert_eq!(entries[0].amount, Some(RawAmount::Text("12.50".into())));
        assert_eq!(entries[1].amount, Some(RawAmount::Text("9223372036854775809".into())));
        assert_eq!(
            entries[2].amount,
            Some(RawAmount::Text("0.1000000000000000055511151231".into()))
        );
    }

    #[test]
    fn test_json_errors_name_the_record() {
        let err = parse_json_entries(r#"[{"entry_id": "A"}, {"amount": true}]"#).unwrap_err();
        assert!(err.starts_with("record 1:"), "{}", err);

        assert!(parse_json_entries(r#"{"entry_id": "A"}"#).is_err());
    }

    #[test]
    fn test_csv_entries() {
        let data = "\
entry_id,account_debit,account_credit,amount,currency,timestamp
A, 1001 ,4001,100.00,USD,2025-06-29 12:00:00
B,1001,4001,7.25,EUR,
";
        let entries = parse_csv_entries(data.as_bytes()).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].debit_account.as_deref(), Some("1001"));
        assert_eq!(entries[0].amount, Some(RawAmount::Text("100.00".into())));
        assert_eq!(
            entries[0].timestamp,
            Some(RawTimestamp::Text("2025-06-29 12:00:00".into()))
        );
        assert_eq!(entries[1].timestamp, None);
    }

    #[test]
    fn test_csv_alternate_headers_and_missing_columns() {
        let data = "entry_id,debit_account,credit_account,amount\nA,1001,4001,5\n";
        let entries = parse_csv_entries(data.as_bytes()).unwrap();
        assert_eq!(entries[0].credit_account.as_deref(), Some("4001"));
        assert_eq!(entries[0].currency, None);
    }

    #[test]
    fn test_load_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let csv_path = dir.path().join("export.csv");
        let mut file = File::create(&csv_path).unwrap();
        writeln!(file, "entry_id,account_debit,account_credit,amount,currency").unwrap();
        writeln!(file, "A,1001,4001,1,USD").unwrap();
        assert_eq!(load_entries(&csv_path).unwrap().len(), 1);

        let json_path = dir.path().join("export.json");
        std::fs::write(&json_path, r#"[{"entry_id": "A"}, {"entry_id": "B"}]"#).unwrap();
        assert_eq!(load_entries(&json_path).unwrap().len(), 2);

        let missing = dir.path().join("missing.json");
        assert!(matches!(
            load_entries(&missing),
            Err(AnchorError::Source { .. })
        ));
    }
}
