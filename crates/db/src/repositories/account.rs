//! Account repository for chart of accounts database operations.

use chrono::Utc;
use saldo_core::account::{Account, ChartOfAccounts};
use saldo_core::ledger::LedgerError;
use saldo_shared::types::AccountId;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tracing::info;

use super::{storage_err, violates};
use crate::entities::accounts;

impl From<accounts::Model> for Account {
    fn from(model: accounts::Model) -> Self {
        Self {
            id: AccountId::from_uuid(model.id),
            code: model.code,
            name: model.name,
            class: model.class.into(),
            is_header: model.is_header,
            is_active: model.is_active,
            parent_id: model.parent_id.map(AccountId::from_uuid),
        }
    }
}

/// Account repository for the chart of accounts.
#[derive(Debug, Clone)]
pub struct AccountRepository {
    db: DatabaseConnection,
}

impl AccountRepository {
    /// Creates a new account repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Every account ordered by code.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(&self) -> Result<Vec<Account>, LedgerError> {
        let accounts = accounts::Entity::find()
            .order_by_asc(accounts::Column::Code)
            .all(&self.db)
            .await
            .map_err(storage_err)?;
        Ok(accounts.into_iter().map(Account::from).collect())
    }

    /// Loads the whole chart into memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or two rows share a code.
    pub async fn load_chart(&self) -> Result<ChartOfAccounts, LedgerError> {
        let chart = ChartOfAccounts::new(self.list().await?)?;
        info!(accounts = chart.len(), "Loaded chart of accounts");
        Ok(chart)
    }

    /// Finds an account by code, active or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_code(&self, code: &str) -> Result<Option<Account>, LedgerError> {
        let account = accounts::Entity::find()
            .filter(accounts::Column::Code.eq(code))
            .one(&self.db)
            .await
            .map_err(storage_err)?;
        Ok(account.map(Account::from))
    }

    /// Inserts an account.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateAccountCode` if the code is taken, or a storage error.
    pub async fn create(&self, account: &Account) -> Result<Account, LedgerError> {
        let now = Utc::now().into();
        let model = accounts::ActiveModel {
            id: Set(account.id.into_inner()),
            code: Set(account.code.clone()),
            name: Set(account.name.clone()),
            class: Set(account.class.into()),
            is_header: Set(account.is_header),
            is_active: Set(account.is_active),
            parent_id: Set(account.parent_id.map(AccountId::into_inner)),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let created = model.insert(&self.db).await.map_err(|err| {
            if violates(&err, "uq_accounts_code") {
                LedgerError::DuplicateAccountCode(account.code.clone())
            } else {
                storage_err(err)
            }
        })?;
        Ok(created.into())
    }

    /// Retires an account. Its lines keep counting; new postings are refused.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` or a storage error.
    pub async fn deactivate(&self, account_id: AccountId) -> Result<Account, LedgerError> {
        let account = accounts::Entity::find_by_id(account_id.into_inner())
            .one(&self.db)
            .await
            .map_err(storage_err)?
            .ok_or(LedgerError::AccountNotFound(account_id))?;

        let mut active: accounts::ActiveModel = account.into();
        active.is_active = Set(false);
        active.updated_at = Set(Utc::now().into());
        let updated = active.update(&self.db).await.map_err(storage_err)?;
        info!(account = %updated.code, "Deactivated account");
        Ok(updated.into())
    }
}
