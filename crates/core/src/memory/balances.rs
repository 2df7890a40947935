use std::collections::HashMap;

use saldo_shared::types::AccountId;
use tokio::sync::RwLock;

use crate::ledger::LedgerError;
use crate::projection::{AccountBalance, BalanceReader, BalanceStore};

/// Projected balances held in memory.
#[derive(Debug, Default)]
pub struct MemoryBalanceStore {
    balances: RwLock<HashMap<AccountId, AccountBalance>>,
}

impl MemoryBalanceStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl BalanceReader for MemoryBalanceStore {
    async fn get(&self, account_id: AccountId) -> Result<Option<AccountBalance>, LedgerError> {
        Ok(self.balances.read().await.get(&account_id).cloned())
    }

    async fn all(&self) -> Result<Vec<AccountBalance>, LedgerError> {
        let mut balances: Vec<AccountBalance> = self.balances.read().await.values().cloned().collect();
        balances.sort_by_key(|balance| balance.account_id);
        Ok(balances)
    }
}

impl BalanceStore for MemoryBalanceStore {
    async fn put(&self, balance: AccountBalance) -> Result<(), LedgerError> {
        self.balances.write().await.insert(balance.account_id, balance);
        Ok(())
    }
}
