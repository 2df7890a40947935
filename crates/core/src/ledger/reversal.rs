//! Reversing entries for voided journal entries.

use chrono::{DateTime, NaiveDate, Utc};
use saldo_shared::types::{JournalEntryId, JournalLineId};

use super::entry::{EntryStatus, JournalEntry, JournalLine, NewJournalEntry};
use super::numbering::reversal_number;
use super::types::IdempotencyKey;

/// Parameters of a reversal beyond the original entry.
#[derive(Debug, Clone)]
pub struct ReversalInput<'a> {
    /// The entry being voided.
    pub original: &'a JournalEntry,
    /// Sequence drawn for the reversal.
    pub sequence: i64,
    /// Accounting date of the reversal.
    pub entry_date: NaiveDate,
    /// Why the original is voided.
    pub reason: &'a str,
    /// Posting timestamp of the reversal.
    pub posted_at: DateTime<Utc>,
}

/// Stateless service for creating reversing entries.
pub struct ReversalService;

impl ReversalService {
    /// Create the reversing entry by swapping debits and credits.
    ///
    /// For each original line:
    /// - Debits become credits
    /// - Credits become debits
    /// - Account and line order are preserved
    /// - Memo is prefixed with "Reversal: "
    #[must_use]
    pub fn create_reversing_entry(input: &ReversalInput<'_>) -> NewJournalEntry {
        let id = JournalEntryId::new();
        let lines = input
            .original
            .lines
            .iter()
            .map(|line| JournalLine {
                id: JournalLineId::new(),
                entry_id: id,
                account_id: line.account_id,
                line_number: line.line_number,
                debit: line.credit,
                credit: line.debit,
                description: Some(format!(
                    "Reversal: {}",
                    line.description.clone().unwrap_or_default()
                )),
            })
            .collect();

        NewJournalEntry {
            id,
            entry_number: reversal_number(&input.original.entry_number),
            sequence: input.sequence,
            entry_date: input.entry_date,
            description: format!(
                "Reversal of {}. Reason: {}",
                input.original.entry_number, input.reason
            ),
            key: IdempotencyKey::reversal_of(input.original.id),
            status: EntryStatus::Posted,
            posted_at: Some(input.posted_at),
            reverses: Some(input.original.id),
            lines,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use saldo_shared::types::AccountId;

    fn original() -> JournalEntry {
        let id = JournalEntryId::new();
        let line = |n: u32, debit: Decimal, credit: Decimal, memo: &str| JournalLine {
            id: JournalLineId::new(),
            entry_id: id,
            account_id: AccountId::new(),
            line_number: n,
            debit,
            credit,
            description: Some(memo.to_string()),
        };
        JournalEntry {
            id,
            entry_number: "JE-2026/10/000007".into(),
            sequence: 7,
            entry_date: NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
            description: "Office supplies".into(),
            key: IdempotencyKey::new("purchase", "PO-9", "invoice"),
            status: EntryStatus::Posted,
            total_debit: dec!(100),
            total_credit: dec!(100),
            posted_at: Some(Utc::now()),
            created_at: Utc::now(),
            reverses: None,
            reversed_by: None,
            void_reason: None,
            lines: vec![
                line(1, dec!(100), Decimal::ZERO, "Supplies"),
                line(2, Decimal::ZERO, dec!(100), "Cash payment"),
            ],
        }
    }

    #[test]
    fn test_create_reversing_entry() {
        let original = original();
        let reversal = ReversalService::create_reversing_entry(&ReversalInput {
            original: &original,
            sequence: 8,
            entry_date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            reason: "Duplicate entry",
            posted_at: Utc::now(),
        });

        assert_eq!(reversal.entry_number, "REV-JE-2026/10/000007");
        assert_eq!(reversal.reverses, Some(original.id));
        assert_eq!(reversal.key, IdempotencyKey::reversal_of(original.id));
        assert_eq!(reversal.status, EntryStatus::Posted);
        assert_eq!(
            reversal.description,
            "Reversal of JE-2026/10/000007. Reason: Duplicate entry"
        );

        // First line was debit, should become credit
        assert_eq!(reversal.lines[0].credit, dec!(100));
        assert_eq!(reversal.lines[0].debit, Decimal::ZERO);
        assert_eq!(reversal.lines[0].account_id, original.lines[0].account_id);
        assert_eq!(
            reversal.lines[0].description.as_deref(),
            Some("Reversal: Supplies")
        );

        // Second line was credit, should become debit
        assert_eq!(reversal.lines[1].debit, dec!(100));
        assert!(reversal.lines.iter().all(|l| l.entry_id == reversal.id));
        assert!(reversal.totals().unwrap().is_balanced());
    }
}
