//! Property-based tests for journal line validation.
//!
//! - Balanced line sets are always accepted and report their totals.
//! - Perturbing one side of a balanced set is always rejected as unbalanced.

use proptest::prelude::*;
use rust_decimal::Decimal;
use saldo_shared::types::{AccountId, JournalEntryId, JournalLineId};

use super::entry::JournalLine;
use super::error::LedgerError;
use super::validation::validate_lines;

/// Strategy to generate a valid positive amount (0.01 to 1,000,000.00).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

fn make_line(debit: Decimal, credit: Decimal) -> JournalLine {
    JournalLine {
        id: JournalLineId::new(),
        entry_id: JournalEntryId::new(),
        account_id: AccountId::new(),
        line_number: 1,
        debit,
        credit,
        description: None,
    }
}

/// Debit lines from `amounts` balanced by a single credit line.
fn balanced_lines(amounts: &[Decimal]) -> Vec<JournalLine> {
    let total: Decimal = amounts.iter().copied().sum();
    let mut lines: Vec<JournalLine> = amounts
        .iter()
        .map(|amount| make_line(*amount, Decimal::ZERO))
        .collect();
    lines.push(make_line(Decimal::ZERO, total));
    lines
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Any set of debits balanced by one credit passes validation.
    #[test]
    fn prop_balanced_lines_accepted(amounts in prop::collection::vec(positive_amount(), 1..10)) {
        let lines = balanced_lines(&amounts);
        let totals = validate_lines(&lines, 2).unwrap();
        let expected: Decimal = amounts.iter().copied().sum();
        prop_assert_eq!(totals.debit, expected);
        prop_assert_eq!(totals.credit, expected);
    }

    /// Adding any positive amount to one side breaks the balance.
    #[test]
    fn prop_perturbed_lines_rejected(
        amounts in prop::collection::vec(positive_amount(), 1..10),
        extra in positive_amount(),
    ) {
        let mut lines = balanced_lines(&amounts);
        lines[0].debit += extra;
        let result = validate_lines(&lines, 2);
        prop_assert!(
            matches!(result, Err(LedgerError::UnbalancedEntry { .. })),
            "expected UnbalancedEntry, got {:?}",
            result
        );
    }
}
