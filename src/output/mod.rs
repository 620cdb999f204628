mod collector;
mod store;

use chrono::{DateTime, SecondsFormat};
use color_eyre::eyre::Result;

use crate::scan::TransactionRecord;

pub use collector::Collector;
pub use store::CsvStore;

pub const HEADER: [&str; 5] = ["Transaction Hash", "From", "To", "Value", "Timestamp"];

/// Append-only tabular storage for matched transactions
///
/// Owned by the collector alone. Rows are kept in the order they are written.
pub trait ResultStore: Send {
    fn write_row(&mut self, fields: &[&str]) -> Result<()>;

    /// Persists everything written so far
    fn flush(&mut self) -> Result<()>;
}

/// Serialized form of a [`TransactionRecord`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRow {
    pub hash: String,
    pub from: String,
    pub to: String,
    pub value: String,

    /// RFC-3339, UTC
    pub timestamp: String,
}

impl ResultRow {
    pub fn fields(&self) -> [&str; 5] {
        [
            self.hash.as_str(),
            self.from.as_str(),
            self.to.as_str(),
            self.value.as_str(),
            self.timestamp.as_str(),
        ]
    }
}

impl From<TransactionRecord> for ResultRow {
    fn from(record: TransactionRecord) -> Self {
        Self {
            timestamp: format_timestamp(record.block_timestamp),
            hash: record.hash,
            from: record.from,
            to: record.to,
            value: record.value,
        }
    }
}

/// Unix seconds as RFC-3339 in UTC, e.g. `2023-11-14T22:13:20Z`
///
/// Timestamps beyond what a date can represent are kept as the raw number.
pub fn format_timestamp(secs: u64) -> String {
    i64::try_from(secs)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| secs.to_string())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(0, "1970-01-01T00:00:00Z")]
    #[case(1_700_000_000, "2023-11-14T22:13:20Z")]
    #[case(1_700_000_036, "2023-11-14T22:13:56Z")]
    #[case(u64::MAX, "18446744073709551615")]
    fn test_format_timestamp(#[case] secs: u64, #[case] expected: &str) {
        assert_eq!(format_timestamp(secs), expected);
    }

    #[test]
    fn test_row_from_record() {
        let record = TransactionRecord {
            hash: "0xabc".to_owned(),
            from: "0x01".to_owned(),
            to: "".to_owned(),
            value: "42".to_owned(),
            block_timestamp: 0,
        };

        let row = ResultRow::from(record);

        assert_eq!(row.fields(), ["0xabc", "0x01", "", "42", "1970-01-01T00:00:00Z"]);
    }
}
