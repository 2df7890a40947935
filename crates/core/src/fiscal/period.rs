//! Accounting period types.

use async_trait::async_trait;
use chrono::NaiveDate;
use saldo_shared::types::AccountingPeriodId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ledger::LedgerError;

/// Status of an accounting period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PeriodStatus {
    /// Entries may be dated inside the period.
    Open,
    /// Closed for new entries; may be reopened.
    Closed,
    /// Closed for good.
    Locked,
}

impl PeriodStatus {
    /// Whether a period may move from `self` to `next`.
    ///
    /// `OPEN -> CLOSED -> LOCKED`, and `CLOSED -> OPEN` to reopen.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Open, Self::Closed) | (Self::Closed, Self::Open | Self::Locked)
        )
    }
}

/// Errors raised when maintaining periods.
#[derive(Debug, Clone, Error)]
pub enum PeriodError {
    /// Start date after end date.
    #[error("Period start {start} is after its end {end}")]
    InvalidDateRange {
        /// First day.
        start: NaiveDate,
        /// Last day.
        end: NaiveDate,
    },

    /// Accounting period not found.
    #[error("Accounting period not found: {0}")]
    NotFound(AccountingPeriodId),

    /// Status change not allowed.
    #[error("Invalid status transition from {from:?} to {to:?}")]
    InvalidStatusTransition {
        /// Current status.
        from: PeriodStatus,
        /// Requested status.
        to: PeriodStatus,
    },

    /// Reading or writing periods failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// A dated range of the books with an open/closed status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountingPeriod {
    /// Unique identifier.
    pub id: AccountingPeriodId,
    /// Period name (e.g., "September 2026").
    pub name: String,
    /// First day, inclusive.
    pub start_date: NaiveDate,
    /// Last day, inclusive.
    pub end_date: NaiveDate,
    /// Current status.
    pub status: PeriodStatus,
}

impl AccountingPeriod {
    /// Creates an open period.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDateRange` if `start_date > end_date`.
    pub fn new(
        name: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Self, PeriodError> {
        if start_date > end_date {
            return Err(PeriodError::InvalidDateRange {
                start: start_date,
                end: end_date,
            });
        }
        Ok(Self {
            id: AccountingPeriodId::new(),
            name: name.into(),
            start_date,
            end_date,
            status: PeriodStatus::Open,
        })
    }

    /// Returns true if entries can be dated inside this period.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == PeriodStatus::Open
    }

    /// Returns true if the given date falls within this period.
    #[must_use]
    pub fn contains_date(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }
}

/// Source of the periods the posting engine checks entry dates against.
#[async_trait]
pub trait PeriodCalendar: Send + Sync {
    /// Every period whose range includes `date`, in any status.
    async fn periods_covering(&self, date: NaiveDate) -> Result<Vec<AccountingPeriod>, LedgerError>;
}

/// Rejects `date` if any period covering it is closed or locked.
///
/// Dates outside every known period are accepted.
///
/// # Errors
///
/// Returns `PeriodClosed`, or storage errors from the calendar.
pub async fn ensure_date_open(calendar: &dyn PeriodCalendar, date: NaiveDate) -> Result<(), LedgerError> {
    let covering = calendar.periods_covering(date).await?;
    match covering.into_iter().find(|period| !period.is_open()) {
        Some(period) => Err(LedgerError::PeriodClosed {
            date,
            period: period.name,
        }),
        None => Ok(()),
    }
}
