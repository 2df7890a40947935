use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use saldo_shared::types::{AccountId, CashBankId};
use tokio::sync::RwLock;

use crate::mirror::{CashBank, CashBankStore, MirrorError};

/// Cash/bank registers held in memory.
#[derive(Debug, Default)]
pub struct MemoryCashBankStore {
    registers: RwLock<HashMap<CashBankId, CashBank>>,
}

impl MemoryCashBankStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a register as given, without the link check.
    pub async fn insert(&self, register: CashBank) {
        self.registers.write().await.insert(register.id, register);
    }
}

impl CashBankStore for MemoryCashBankStore {
    async fn find(&self, id: CashBankId) -> Result<Option<CashBank>, MirrorError> {
        Ok(self.registers.read().await.get(&id).cloned())
    }

    async fn find_by_account(&self, account_id: AccountId) -> Result<Option<CashBank>, MirrorError> {
        Ok(self
            .registers
            .read()
            .await
            .values()
            .find(|register| register.account_id == Some(account_id))
            .cloned())
    }

    async fn linked(&self) -> Result<Vec<CashBank>, MirrorError> {
        let mut linked: Vec<CashBank> = self
            .registers
            .read()
            .await
            .values()
            .filter(|register| register.account_id.is_some())
            .cloned()
            .collect();
        linked.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(linked)
    }

    async fn set_account(&self, id: CashBankId, account_id: AccountId) -> Result<CashBank, MirrorError> {
        let mut registers = self.registers.write().await;
        if !registers.contains_key(&id) {
            return Err(MirrorError::RegisterNotFound(id));
        }
        if let Some(existing) = registers
            .values()
            .find(|register| register.id != id && register.account_id == Some(account_id))
        {
            return Err(MirrorError::AccountAlreadyMirrored {
                account_id,
                existing: existing.id,
            });
        }
        let register = registers.get_mut(&id).ok_or(MirrorError::RegisterNotFound(id))?;
        register.account_id = Some(account_id);
        Ok(register.clone())
    }

    async fn write_balance(
        &self,
        id: CashBankId,
        balance: Decimal,
        synced_at: DateTime<Utc>,
    ) -> Result<CashBank, MirrorError> {
        let mut registers = self.registers.write().await;
        let register = registers.get_mut(&id).ok_or(MirrorError::RegisterNotFound(id))?;
        register.balance = balance;
        register.balance_synced_at = Some(synced_at);
        Ok(register.clone())
    }
}
