//! Persistence seam for projected balances.

use std::future::Future;

use saldo_shared::types::AccountId;

use super::balance::AccountBalance;
use crate::ledger::LedgerError;

/// Read access to projected balances, for mirrors and reports.
pub trait BalanceReader: Send + Sync {
    /// Balance of one account, `None` if never projected.
    fn get(
        &self,
        account_id: AccountId,
    ) -> impl Future<Output = Result<Option<AccountBalance>, LedgerError>> + Send;

    /// Every projected balance.
    fn all(&self) -> impl Future<Output = Result<Vec<AccountBalance>, LedgerError>> + Send;
}

/// Write access, held only by the [`BalanceProjector`](super::BalanceProjector).
pub trait BalanceStore: BalanceReader {
    /// Replaces the balance of `balance.account_id`.
    fn put(&self, balance: AccountBalance) -> impl Future<Output = Result<(), LedgerError>> + Send;
}
