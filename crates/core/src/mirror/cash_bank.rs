//! Cash and bank registers mirrored from ASSET accounts.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use saldo_shared::types::{AccountId, CashBankId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::adapter::{MirrorAdapter, MirrorBalance, MirrorCheck, MirrorError};
use crate::account::{AccountClass, AccountDirectory};
use crate::projection::BalanceReader;

/// Mirror kind name.
pub const CASH_BANK_KIND: &str = "cash_bank";

/// A cash drawer or bank account register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashBank {
    /// Register ID.
    pub id: CashBankId,
    /// Register code.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Backing ASSET account, once linked.
    pub account_id: Option<AccountId>,
    /// Mirrored balance.
    pub balance: Decimal,
    /// When `balance` was last copied.
    pub balance_synced_at: Option<DateTime<Utc>>,
}

impl CashBank {
    /// Creates an unlinked register.
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: CashBankId::new(),
            code: code.into(),
            name: name.into(),
            account_id: None,
            balance: Decimal::ZERO,
            balance_synced_at: None,
        }
    }

    fn mirror_balance(&self, account_id: AccountId) -> MirrorBalance {
        MirrorBalance {
            kind: CASH_BANK_KIND,
            mirror_id: self.id.into_inner(),
            account_id,
            balance: self.balance,
            synced_at: self.balance_synced_at,
        }
    }
}

/// Persistence for cash/bank registers.
///
/// At most one register is linked to a given account.
pub trait CashBankStore: Send + Sync {
    /// Finds a register by ID.
    fn find(&self, id: CashBankId) -> impl Future<Output = Result<Option<CashBank>, MirrorError>> + Send;

    /// Finds the register linked to an account.
    fn find_by_account(
        &self,
        account_id: AccountId,
    ) -> impl Future<Output = Result<Option<CashBank>, MirrorError>> + Send;

    /// Every linked register.
    fn linked(&self) -> impl Future<Output = Result<Vec<CashBank>, MirrorError>> + Send;

    /// Links a register to an account.
    ///
    /// Fails with `AccountAlreadyMirrored` when a different register holds
    /// the account. The check and the write are one atomic step.
    fn set_account(
        &self,
        id: CashBankId,
        account_id: AccountId,
    ) -> impl Future<Output = Result<CashBank, MirrorError>> + Send;

    /// Stores a mirrored balance.
    fn write_balance(
        &self,
        id: CashBankId,
        balance: Decimal,
        synced_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<CashBank, MirrorError>> + Send;
}

/// Keeps cash/bank registers equal to their account's projected balance.
pub struct CashBankMirror<D, S, B> {
    directory: Arc<D>,
    registers: Arc<S>,
    balances: Arc<B>,
}

impl<D, S, B> CashBankMirror<D, S, B>
where
    D: AccountDirectory,
    S: CashBankStore,
    B: BalanceReader,
{
    /// Creates the mirror.
    #[must_use]
    pub fn new(directory: Arc<D>, registers: Arc<S>, balances: Arc<B>) -> Self {
        Self {
            directory,
            registers,
            balances,
        }
    }

    /// Links a register to an account and copies the current balance.
    ///
    /// The account must be an active ASSET leaf with a projected balance.
    ///
    /// # Errors
    ///
    /// Returns `InvalidLink`, `AccountAlreadyMirrored`, `RegisterNotFound`,
    /// `BalanceMissing` or storage errors.
    pub async fn link(&self, cash_bank_id: CashBankId, account_code: &str) -> Result<MirrorBalance, MirrorError> {
        let account = self.directory.lookup(account_code)?;
        if account.class != AccountClass::Asset || account.is_header {
            return Err(MirrorError::InvalidLink {
                code: account.code.clone(),
            });
        }
        self.registers
            .find(cash_bank_id)
            .await?
            .ok_or(MirrorError::RegisterNotFound(cash_bank_id))?;

        let balance = self.ledger_balance(account.id).await?;
        self.registers.set_account(cash_bank_id, account.id).await?;
        let register = self
            .registers
            .write_balance(cash_bank_id, balance, Utc::now())
            .await?;
        info!(register = %register.code, account = %account.code, %balance, "Linked cash/bank register");
        Ok(register.mirror_balance(account.id))
    }

    /// Registers whose balance differs from the projection.
    ///
    /// # Errors
    ///
    /// Returns storage errors.
    pub async fn discrepancies(&self) -> Result<Vec<MirrorCheck>, MirrorError> {
        let mut drifted = Vec::new();
        for register in self.registers.linked().await? {
            let Some(account_id) = register.account_id else {
                continue;
            };
            let check = MirrorCheck {
                ledger_balance: self.ledger_balance(account_id).await?,
                mirror: register.mirror_balance(account_id),
            };
            if !check.is_consistent() {
                drifted.push(check);
            }
        }
        Ok(drifted)
    }

    async fn ledger_balance(&self, account_id: AccountId) -> Result<Decimal, MirrorError> {
        self.balances
            .get(account_id)
            .await?
            .map(|balance| balance.balance)
            .ok_or(MirrorError::BalanceMissing(account_id))
    }

    async fn register_for(&self, account_id: AccountId) -> Result<CashBank, MirrorError> {
        self.registers
            .find_by_account(account_id)
            .await?
            .ok_or(MirrorError::NotMirrored {
                kind: CASH_BANK_KIND,
                account_id,
            })
    }
}

#[async_trait]
impl<D, S, B> MirrorAdapter for CashBankMirror<D, S, B>
where
    D: AccountDirectory + 'static,
    S: CashBankStore + 'static,
    B: BalanceReader + 'static,
{
    fn kind(&self) -> &'static str {
        CASH_BANK_KIND
    }

    async fn is_mirrored(&self, account_id: AccountId) -> Result<bool, MirrorError> {
        Ok(self.registers.find_by_account(account_id).await?.is_some())
    }

    async fn mirrored_accounts(&self) -> Result<Vec<AccountId>, MirrorError> {
        Ok(self
            .registers
            .linked()
            .await?
            .into_iter()
            .filter_map(|register| register.account_id)
            .collect())
    }

    async fn refresh(&self, account_id: AccountId) -> Result<MirrorBalance, MirrorError> {
        let register = self.register_for(account_id).await?;
        let balance = self.ledger_balance(account_id).await?;
        let register = self
            .registers
            .write_balance(register.id, balance, Utc::now())
            .await?;
        debug!(register = %register.code, %balance, "Refreshed cash/bank mirror");
        Ok(register.mirror_balance(account_id))
    }

    async fn inspect(&self, account_id: AccountId) -> Result<MirrorCheck, MirrorError> {
        let register = self.register_for(account_id).await?;
        Ok(MirrorCheck {
            ledger_balance: self.ledger_balance(account_id).await?,
            mirror: register.mirror_balance(account_id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{Harness, payment, sale};

    #[tokio::test]
    async fn test_link_refuses_second_register_for_account() {
        let h = Harness::new().await;
        let spare = CashBank::new("CASH-02", "Spare till");
        h.registers.insert(spare.clone()).await;

        let err = h.mirror.link(spare.id, "1101").await.unwrap_err();

        assert!(matches!(
            err,
            MirrorError::AccountAlreadyMirrored { account_id, existing }
                if account_id == h.id("1101") && existing == h.cash_register
        ));
        let spare = h.registers.find(spare.id).await.unwrap().unwrap();
        assert_eq!(spare.account_id, None);

        h.engine.post(sale("INV-001")).await.unwrap();
        h.engine.post(payment("INV-001")).await.unwrap();
        assert!(h.mirror.discrepancies().await.unwrap().is_empty());
        assert!(h.mirror.validate(h.id("1101")).await.unwrap());
    }

    #[tokio::test]
    async fn test_link_requires_asset_leaf() {
        let h = Harness::new().await;
        let register = CashBank::new("CASH-03", "Wrong account");
        h.registers.insert(register.clone()).await;

        for code in ["1100", "4101"] {
            let err = h.mirror.link(register.id, code).await.unwrap_err();
            assert!(matches!(err, MirrorError::InvalidLink { .. }), "{code}: {err}");
        }
        assert!(matches!(
            h.mirror.link(register.id, "1102").await,
            Err(MirrorError::BalanceMissing(_))
        ));
    }
}
