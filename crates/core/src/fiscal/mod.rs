//! Accounting periods and the closed-period posting guard.

pub mod period;

pub use period::{AccountingPeriod, PeriodCalendar, PeriodError, PeriodStatus, ensure_date_open};
