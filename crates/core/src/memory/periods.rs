use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use saldo_shared::types::AccountingPeriodId;
use tokio::sync::RwLock;
use tracing::info;

use crate::fiscal::{AccountingPeriod, PeriodCalendar, PeriodError, PeriodStatus};
use crate::ledger::LedgerError;

/// Accounting periods held in memory. Empty means every date is open.
#[derive(Debug, Default)]
pub struct MemoryPeriodCalendar {
    periods: RwLock<HashMap<AccountingPeriodId, AccountingPeriod>>,
}

impl MemoryPeriodCalendar {
    /// Creates a calendar with no periods.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a period.
    pub async fn insert(&self, period: AccountingPeriod) {
        self.periods.write().await.insert(period.id, period);
    }

    /// Moves a period to `status`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or `InvalidStatusTransition`.
    pub async fn set_status(
        &self,
        id: AccountingPeriodId,
        status: PeriodStatus,
    ) -> Result<AccountingPeriod, PeriodError> {
        let mut periods = self.periods.write().await;
        let period = periods.get_mut(&id).ok_or(PeriodError::NotFound(id))?;
        if !period.status.can_transition_to(status) {
            return Err(PeriodError::InvalidStatusTransition {
                from: period.status,
                to: status,
            });
        }
        period.status = status;
        info!(period = %period.name, ?status, "Changed accounting period status");
        Ok(period.clone())
    }
}

#[async_trait]
impl PeriodCalendar for MemoryPeriodCalendar {
    async fn periods_covering(&self, date: NaiveDate) -> Result<Vec<AccountingPeriod>, LedgerError> {
        let mut covering: Vec<AccountingPeriod> = self
            .periods
            .read()
            .await
            .values()
            .filter(|period| period.contains_date(date))
            .cloned()
            .collect();
        covering.sort_by_key(|period| period.start_date);
        Ok(covering)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, month, day).unwrap()
    }

    #[tokio::test]
    async fn test_close_reopen_and_lock() {
        let calendar = MemoryPeriodCalendar::new();
        let september = AccountingPeriod::new("September 2026", day(9, 1), day(9, 30)).unwrap();
        let id = september.id;
        calendar.insert(september).await;

        let closed = calendar.set_status(id, PeriodStatus::Closed).await.unwrap();
        assert!(!closed.is_open());
        calendar.set_status(id, PeriodStatus::Open).await.unwrap();
        calendar.set_status(id, PeriodStatus::Closed).await.unwrap();
        calendar.set_status(id, PeriodStatus::Locked).await.unwrap();

        assert!(matches!(
            calendar.set_status(id, PeriodStatus::Open).await,
            Err(PeriodError::InvalidStatusTransition { from: PeriodStatus::Locked, .. })
        ));
        assert!(matches!(
            calendar.set_status(AccountingPeriodId::new(), PeriodStatus::Closed).await,
            Err(PeriodError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_covering_periods() {
        let calendar = MemoryPeriodCalendar::new();
        calendar
            .insert(AccountingPeriod::new("September 2026", day(9, 1), day(9, 30)).unwrap())
            .await;
        calendar
            .insert(AccountingPeriod::new("Q3 2026", day(7, 1), day(9, 30)).unwrap())
            .await;

        let names: Vec<String> = calendar
            .periods_covering(day(9, 30))
            .await
            .unwrap()
            .into_iter()
            .map(|period| period.name)
            .collect();
        assert_eq!(names, vec!["Q3 2026", "September 2026"]);
        assert!(calendar.periods_covering(day(10, 1)).await.unwrap().is_empty());
    }
}
