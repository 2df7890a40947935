//! Human-facing journal entry numbers.

use chrono::{Datelike, NaiveDate};

/// Formats `{prefix}-{YYYY}/{MM}/{NNNNNN}` from the entry date and a ledger sequence.
///
/// The sequence is global, so numbers stay unique across months.
#[must_use]
pub fn entry_number(prefix: &str, entry_date: NaiveDate, sequence: i64) -> String {
    format!(
        "{prefix}-{:04}/{:02}/{sequence:06}",
        entry_date.year(),
        entry_date.month()
    )
}

/// Number of the reversal that voids `original`.
#[must_use]
pub fn reversal_number(original: &str) -> String {
    format!("REV-{original}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_number_format() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        assert_eq!(entry_number("JE", date, 42), "JE-2026/03/000042");
        assert_eq!(entry_number("GL", date, 1_234_567), "GL-2026/03/1234567");
    }

    #[test]
    fn test_reversal_number() {
        assert_eq!(reversal_number("JE-2026/03/000042"), "REV-JE-2026/03/000042");
    }
}
