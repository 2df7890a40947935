//! Projected account balances.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use saldo_shared::types::{AccountId, JournalEntryId};
use serde::{Deserialize, Serialize};

use crate::account::{AccountClass, NormalBalance};
use crate::ledger::{EntryTotals, LedgerError};

/// Materialized balance of one account.
///
/// `balance` is signed by the account's normal side: an asset with more
/// credits than debits is negative. Never written by anything but the
/// [`BalanceProjector`](super::BalanceProjector).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalance {
    /// The account ID.
    pub account_id: AccountId,
    /// Total debit amount.
    pub debit_total: Decimal,
    /// Total credit amount.
    pub credit_total: Decimal,
    /// Net balance (calculated based on account class).
    pub balance: Decimal,
    /// Last entry folded into this figure, in projection order.
    pub last_entry_id: Option<JournalEntryId>,
    /// When the figure was computed.
    pub projected_at: DateTime<Utc>,
}

impl AccountBalance {
    /// Balance of an account with no counted lines.
    #[must_use]
    pub fn zero(account_id: AccountId, projected_at: DateTime<Utc>) -> Self {
        Self {
            account_id,
            debit_total: Decimal::ZERO,
            credit_total: Decimal::ZERO,
            balance: Decimal::ZERO,
            last_entry_id: None,
            projected_at,
        }
    }

    /// Balance from debit and credit sums.
    #[must_use]
    pub fn from_totals(
        account_id: AccountId,
        class: AccountClass,
        debit_total: Decimal,
        credit_total: Decimal,
        last_entry_id: Option<JournalEntryId>,
        projected_at: DateTime<Utc>,
    ) -> Self {
        Self {
            account_id,
            debit_total,
            credit_total,
            balance: class.normal_sign() * (debit_total - credit_total),
            last_entry_id,
            projected_at,
        }
    }

    /// Report-facing amount: credit-normal balances are shown as magnitudes.
    #[must_use]
    pub fn display_amount(&self, class: AccountClass) -> Decimal {
        match class.normal_balance() {
            NormalBalance::Debit => self.balance,
            NormalBalance::Credit => self.balance.abs(),
        }
    }

    /// Compares the figures, ignoring when they were computed.
    #[must_use]
    pub fn same_figures(&self, other: &Self) -> bool {
        self.account_id == other.account_id
            && self.debit_total == other.debit_total
            && self.credit_total == other.credit_total
            && self.balance == other.balance
    }
}

/// Folds child balances into their header.
///
/// `balance(header) = Σ balance(child)` and the debit and credit totals are
/// summed the same way. Children of another class are added as stored, so a
/// mixed header is the literal sum of what its children report.
///
/// # Errors
///
/// Returns `AmountOverflow` if a sum leaves the decimal range.
pub fn rollup<'a>(
    header_id: AccountId,
    children: impl IntoIterator<Item = &'a AccountBalance>,
    projected_at: DateTime<Utc>,
) -> Result<AccountBalance, LedgerError> {
    let mut totals = EntryTotals::default();
    let mut balance = Decimal::ZERO;
    let mut last_entry_id = None;
    for child in children {
        totals = totals.checked_add(child.debit_total, child.credit_total)?;
        balance = balance
            .checked_add(child.balance)
            .ok_or(LedgerError::AmountOverflow)?;
        last_entry_id = last_entry_id.max(child.last_entry_id);
    }
    Ok(AccountBalance {
        account_id: header_id,
        debit_total: totals.debit,
        credit_total: totals.credit,
        balance,
        last_entry_id,
        projected_at,
    })
}
