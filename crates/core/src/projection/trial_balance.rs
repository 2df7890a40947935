//! Trial balance over projected leaf balances.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use saldo_shared::types::AccountId;
use serde::Serialize;

use super::balance::AccountBalance;
use crate::account::{AccountClass, AccountDirectory};
use crate::ledger::{EntryTotals, LedgerError};

/// One leaf account in the trial balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrialBalanceLine {
    /// Account ID.
    pub account_id: AccountId,
    /// Account code.
    pub code: String,
    /// Account name.
    pub name: String,
    /// Account class.
    pub class: AccountClass,
    /// Net debit, zero when the account nets to credit.
    pub debit: Decimal,
    /// Net credit, zero when the account nets to debit.
    pub credit: Decimal,
}

/// Leaf balances netted into debit and credit columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrialBalance {
    /// Non-zero leaves ordered by code.
    pub lines: Vec<TrialBalanceLine>,
    /// Debit column total.
    pub total_debit: Decimal,
    /// Credit column total.
    pub total_credit: Decimal,
}

impl TrialBalance {
    /// Builds the trial balance from projected balances.
    ///
    /// Headers are skipped: they only restate their leaves.
    ///
    /// # Errors
    ///
    /// Returns `AmountOverflow` if a column total leaves the `Decimal` range.
    pub fn build<D>(directory: &D, balances: &[AccountBalance]) -> Result<Self, LedgerError>
    where
        D: AccountDirectory + ?Sized,
    {
        let mut trial = Self::default();
        for balance in balances {
            let Some(account) = directory.get(balance.account_id) else {
                continue;
            };
            if account.is_header {
                continue;
            }
            let net = balance
                .debit_total
                .checked_sub(balance.credit_total)
                .ok_or(LedgerError::AmountOverflow)?;
            if net.is_zero() {
                continue;
            }
            let (debit, credit) = if net > Decimal::ZERO {
                (net, Decimal::ZERO)
            } else {
                (Decimal::ZERO, -net)
            };
            let totals = EntryTotals {
                debit: trial.total_debit,
                credit: trial.total_credit,
            }
            .checked_add(debit, credit)?;
            trial.total_debit = totals.debit;
            trial.total_credit = totals.credit;
            trial.lines.push(TrialBalanceLine {
                account_id: account.id,
                code: account.code.clone(),
                name: account.name.clone(),
                class: account.class,
                debit,
                credit,
            });
        }
        trial.lines.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(trial)
    }

    /// Debit and credit columns summed per account class.
    ///
    /// # Errors
    ///
    /// Returns `AmountOverflow` if a class total leaves the `Decimal` range.
    pub fn class_totals(&self) -> Result<BTreeMap<AccountClass, EntryTotals>, LedgerError> {
        let mut totals: BTreeMap<AccountClass, EntryTotals> = BTreeMap::new();
        for line in &self.lines {
            let class = totals.entry(line.class).or_default();
            *class = class.checked_add(line.debit, line.credit)?;
        }
        Ok(totals)
    }

    /// Whether the columns agree.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.total_debit == self.total_credit
    }
}
