//! Cash/bank registers stored in `cash_banks`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use saldo_core::mirror::{CashBank, CashBankStore, MirrorError};
use saldo_shared::types::{AccountId, CashBankId};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};

use super::{mirror_err, violates};
use crate::entities::cash_banks;

impl From<cash_banks::Model> for CashBank {
    fn from(model: cash_banks::Model) -> Self {
        Self {
            id: CashBankId::from_uuid(model.id),
            code: model.code,
            name: model.name,
            account_id: model.account_id.map(AccountId::from_uuid),
            balance: model.balance,
            balance_synced_at: model.balance_synced_at.map(|at| at.with_timezone(&Utc)),
        }
    }
}

/// Cash/bank register repository.
#[derive(Debug, Clone)]
pub struct CashBankRepository {
    db: DatabaseConnection,
}

impl CashBankRepository {
    /// Creates a new register repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Inserts an unlinked register.
    ///
    /// # Errors
    ///
    /// Returns an error if the code is taken or the insert fails.
    pub async fn create(&self, register: &CashBank) -> Result<CashBank, MirrorError> {
        let model = cash_banks::ActiveModel {
            id: Set(register.id.into_inner()),
            code: Set(register.code.clone()),
            name: Set(register.name.clone()),
            account_id: Set(register.account_id.map(AccountId::into_inner)),
            balance: Set(register.balance),
            balance_synced_at: Set(register.balance_synced_at.map(Into::into)),
            created_at: Set(Utc::now().into()),
        };
        Ok(model.insert(&self.db).await.map_err(mirror_err)?.into())
    }

    async fn model(&self, id: CashBankId) -> Result<cash_banks::Model, MirrorError> {
        cash_banks::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(mirror_err)?
            .ok_or(MirrorError::RegisterNotFound(id))
    }
}

impl CashBankStore for CashBankRepository {
    async fn find(&self, id: CashBankId) -> Result<Option<CashBank>, MirrorError> {
        let model = cash_banks::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(mirror_err)?;
        Ok(model.map(CashBank::from))
    }

    async fn find_by_account(&self, account_id: AccountId) -> Result<Option<CashBank>, MirrorError> {
        let model = cash_banks::Entity::find()
            .filter(cash_banks::Column::AccountId.eq(account_id.into_inner()))
            .one(&self.db)
            .await
            .map_err(mirror_err)?;
        Ok(model.map(CashBank::from))
    }

    async fn linked(&self) -> Result<Vec<CashBank>, MirrorError> {
        let models = cash_banks::Entity::find()
            .filter(cash_banks::Column::AccountId.is_not_null())
            .order_by_asc(cash_banks::Column::Code)
            .all(&self.db)
            .await
            .map_err(mirror_err)?;
        Ok(models.into_iter().map(CashBank::from).collect())
    }

    async fn set_account(&self, id: CashBankId, account_id: AccountId) -> Result<CashBank, MirrorError> {
        let mut active: cash_banks::ActiveModel = self.model(id).await?.into();
        active.account_id = Set(Some(account_id.into_inner()));
        match active.update(&self.db).await {
            Ok(updated) => Ok(updated.into()),
            Err(err) if violates(&err, "uq_cash_banks_account") => {
                let holder = self.find_by_account(account_id).await?;
                Err(holder.map_or_else(
                    || mirror_err(err),
                    |existing| MirrorError::AccountAlreadyMirrored {
                        account_id,
                        existing: existing.id,
                    },
                ))
            }
            Err(err) => Err(mirror_err(err)),
        }
    }

    async fn write_balance(
        &self,
        id: CashBankId,
        balance: Decimal,
        synced_at: DateTime<Utc>,
    ) -> Result<CashBank, MirrorError> {
        let mut active: cash_banks::ActiveModel = self.model(id).await?.into();
        active.balance = Set(balance);
        active.balance_synced_at = Set(Some(synced_at.into()));
        Ok(active.update(&self.db).await.map_err(mirror_err)?.into())
    }
}
