//! Journal integrity: every counted entry balances and matches its lines.

use futures::TryStreamExt;
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::ledger::{EntryTotals, EntryTotalsCheck, LedgerError, LedgerStore};
use crate::projection::ConsistencyWarning;

/// Result of [`check_journal_integrity`].
#[derive(Debug, Clone, Default)]
pub struct JournalIntegrityReport {
    /// Counted entries re-summed.
    pub entries_checked: usize,
    /// Sum of every counted line debit.
    pub total_debit: Decimal,
    /// Sum of every counted line credit.
    pub total_credit: Decimal,
    /// Unbalanced entries, stored totals that drifted, and a ledger-wide
    /// imbalance if any.
    pub warnings: Vec<ConsistencyWarning>,
    /// Set when cancellation stopped the scan early.
    pub interrupted: bool,
}

impl JournalIntegrityReport {
    /// True when the full scan found nothing.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        !self.interrupted && self.warnings.is_empty()
    }

    fn record(&mut self, check: EntryTotalsCheck) -> Result<(), LedgerError> {
        let totals = EntryTotals {
            debit: self.total_debit,
            credit: self.total_credit,
        }
        .checked_add(check.lines.debit, check.lines.credit)?;
        self.entries_checked += 1;
        self.total_debit = totals.debit;
        self.total_credit = totals.credit;

        if check.stored != check.lines {
            self.warnings.push(ConsistencyWarning::EntryTotalsDrift {
                entry_id: check.entry_id,
                entry_number: check.entry_number.clone(),
                stored_debit: check.stored.debit,
                stored_credit: check.stored.credit,
                line_debit: check.lines.debit,
                line_credit: check.lines.credit,
            });
        }
        if !check.lines.is_balanced() {
            self.warnings.push(ConsistencyWarning::UnbalancedEntry {
                entry_id: check.entry_id,
                entry_number: check.entry_number,
                debit: check.lines.debit,
                credit: check.lines.credit,
            });
        }
        Ok(())
    }
}

/// Re-sums the lines of every `POSTED` and `VOID` entry.
///
/// Entries whose lines do not balance, or whose stored totals differ from
/// their lines, are reported along with the ledger-wide trial balance.
/// Nothing is corrected. Cancellation is checked between entries.
///
/// # Errors
///
/// Returns storage errors from the ledger, or `AmountOverflow` if the
/// ledger-wide sums leave the `Decimal` range.
pub async fn check_journal_integrity<L>(
    ledger: &L,
    cancel: &CancellationToken,
) -> Result<JournalIntegrityReport, LedgerError>
where
    L: LedgerStore + ?Sized,
{
    let mut report = JournalIntegrityReport::default();
    let mut checks = ledger.entry_totals();
    while let Some(check) = checks.try_next().await? {
        if cancel.is_cancelled() {
            report.interrupted = true;
            info!(entries = report.entries_checked, "Journal integrity check interrupted");
            return Ok(report);
        }
        report.record(check)?;
    }

    let trial = EntryTotals {
        debit: report.total_debit,
        credit: report.total_credit,
    };
    if !trial.is_balanced() {
        report.warnings.push(ConsistencyWarning::TrialBalanceDrift {
            debit: trial.debit,
            credit: trial.credit,
        });
    }
    for warning in &report.warnings {
        warning.log();
    }

    info!(
        entries = report.entries_checked,
        debit = %report.total_debit,
        credit = %report.total_credit,
        issues = report.warnings.len(),
        "Checked journal integrity"
    );
    Ok(report)
}
