//! Projected balances stored in `account_balances`.

use chrono::Utc;
use saldo_core::ledger::LedgerError;
use saldo_core::projection::{AccountBalance, BalanceReader, BalanceStore};
use saldo_shared::types::{AccountId, JournalEntryId};
use sea_orm::sea_query::OnConflict;
use sea_orm::{DatabaseConnection, EntityTrait, QueryOrder, Set};

use super::storage_err;
use crate::entities::account_balances;

impl From<account_balances::Model> for AccountBalance {
    fn from(model: account_balances::Model) -> Self {
        Self {
            account_id: AccountId::from_uuid(model.account_id),
            debit_total: model.debit_total,
            credit_total: model.credit_total,
            balance: model.balance,
            last_entry_id: model.last_entry_id.map(JournalEntryId::from_uuid),
            projected_at: model.projected_at.with_timezone(&Utc),
        }
    }
}

/// Balance projection table.
///
/// Each row is a full recompute, so a plain upsert is safe: concurrent
/// writers for the same account store equal figures.
#[derive(Debug, Clone)]
pub struct PgBalanceStore {
    db: DatabaseConnection,
}

impl PgBalanceStore {
    /// Creates a new balance store.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

impl BalanceReader for PgBalanceStore {
    async fn get(&self, account_id: AccountId) -> Result<Option<AccountBalance>, LedgerError> {
        let model = account_balances::Entity::find_by_id(account_id.into_inner())
            .one(&self.db)
            .await
            .map_err(storage_err)?;
        Ok(model.map(AccountBalance::from))
    }

    async fn all(&self) -> Result<Vec<AccountBalance>, LedgerError> {
        let models = account_balances::Entity::find()
            .order_by_asc(account_balances::Column::AccountId)
            .all(&self.db)
            .await
            .map_err(storage_err)?;
        Ok(models.into_iter().map(AccountBalance::from).collect())
    }
}

impl BalanceStore for PgBalanceStore {
    async fn put(&self, balance: AccountBalance) -> Result<(), LedgerError> {
        let model = account_balances::ActiveModel {
            account_id: Set(balance.account_id.into_inner()),
            debit_total: Set(balance.debit_total),
            credit_total: Set(balance.credit_total),
            balance: Set(balance.balance),
            last_entry_id: Set(balance.last_entry_id.map(JournalEntryId::into_inner)),
            projected_at: Set(balance.projected_at.into()),
        };
        account_balances::Entity::insert(model)
            .on_conflict(
                OnConflict::column(account_balances::Column::AccountId)
                    .update_columns([
                        account_balances::Column::DebitTotal,
                        account_balances::Column::CreditTotal,
                        account_balances::Column::Balance,
                        account_balances::Column::LastEntryId,
                        account_balances::Column::ProjectedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(storage_err)?;
        Ok(())
    }
}
