//! Accounting periods stored in `accounting_periods`.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use saldo_core::fiscal::{self, AccountingPeriod, PeriodCalendar, PeriodError};
use saldo_core::ledger::LedgerError;
use saldo_shared::types::AccountingPeriodId;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use tracing::info;

use super::storage_err;
use crate::entities::{accounting_periods, sea_orm_active_enums::PeriodStatus};

impl From<accounting_periods::Model> for AccountingPeriod {
    fn from(model: accounting_periods::Model) -> Self {
        Self {
            id: AccountingPeriodId::from_uuid(model.id),
            name: model.name,
            start_date: model.start_date,
            end_date: model.end_date,
            status: model.status.into(),
        }
    }
}

/// Accounting period repository.
#[derive(Debug, Clone)]
pub struct PeriodRepository {
    db: DatabaseConnection,
}

impl PeriodRepository {
    /// Creates a new period repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Inserts a period as given.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDateRange` or storage errors.
    pub async fn create(&self, period: &AccountingPeriod) -> Result<AccountingPeriod, PeriodError> {
        if period.start_date > period.end_date {
            return Err(PeriodError::InvalidDateRange {
                start: period.start_date,
                end: period.end_date,
            });
        }
        let closed_at = (!period.is_open()).then(|| Utc::now().into());
        let model = accounting_periods::ActiveModel {
            id: Set(period.id.into_inner()),
            name: Set(period.name.clone()),
            start_date: Set(period.start_date),
            end_date: Set(period.end_date),
            status: Set(period.status.into()),
            closed_at: Set(closed_at),
            created_at: Set(Utc::now().into()),
        };
        let model = model.insert(&self.db).await.map_err(storage_err)?;
        Ok(model.into())
    }

    /// Moves a period to `status`. The row is locked so concurrent changes
    /// apply one after the other.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `InvalidStatusTransition` or storage errors.
    pub async fn set_status(
        &self,
        id: AccountingPeriodId,
        status: fiscal::PeriodStatus,
    ) -> Result<AccountingPeriod, PeriodError> {
        let txn = self.db.begin().await.map_err(storage_err)?;
        let model = accounting_periods::Entity::find_by_id(id.into_inner())
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(storage_err)?
            .ok_or(PeriodError::NotFound(id))?;

        let current: fiscal::PeriodStatus = model.status.into();
        if !current.can_transition_to(status) {
            return Err(PeriodError::InvalidStatusTransition {
                from: current,
                to: status,
            });
        }

        let mut active: accounting_periods::ActiveModel = model.into();
        active.status = Set(PeriodStatus::from(status));
        if status != fiscal::PeriodStatus::Open {
            active.closed_at = Set(Some(Utc::now().into()));
        } else {
            active.closed_at = Set(None);
        }
        let updated = active.update(&txn).await.map_err(storage_err)?;
        txn.commit().await.map_err(storage_err)?;

        info!(period = %updated.name, ?status, "Changed accounting period status");
        Ok(updated.into())
    }
}

#[async_trait]
impl PeriodCalendar for PeriodRepository {
    async fn periods_covering(&self, date: NaiveDate) -> Result<Vec<AccountingPeriod>, LedgerError> {
        let models = accounting_periods::Entity::find()
            .filter(accounting_periods::Column::StartDate.lte(date))
            .filter(accounting_periods::Column::EndDate.gte(date))
            .order_by_asc(accounting_periods::Column::StartDate)
            .all(&self.db)
            .await
            .map_err(storage_err)?;
        Ok(models.into_iter().map(AccountingPeriod::from).collect())
    }
}
