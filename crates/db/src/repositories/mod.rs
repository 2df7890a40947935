//! Repository abstractions for data access.
//!
//! Each repository implements a `saldo-core` store trait over `SeaORM`,
//! hiding the database from the posting engine and the projector.

pub mod account;
pub mod balance;
pub mod cash_bank;
pub mod ledger;
pub mod period;

pub use account::AccountRepository;
pub use balance::PgBalanceStore;
pub use cash_bank::CashBankRepository;
pub use ledger::PgLedgerStore;
pub use period::PeriodRepository;

use saldo_core::ledger::LedgerError;
use saldo_core::mirror::MirrorError;
use sea_orm::{DbErr, SqlErr};

/// Wraps a database error as a retryable storage failure.
#[allow(clippy::needless_pass_by_value)]
pub(crate) fn storage_err(err: DbErr) -> LedgerError {
    LedgerError::Storage(err.to_string())
}

/// Wraps a database error raised while writing a mirror.
#[allow(clippy::needless_pass_by_value)]
pub(crate) fn mirror_err(err: DbErr) -> MirrorError {
    MirrorError::Write(err.to_string())
}

/// Whether `err` violates the named unique constraint or index.
pub(crate) fn violates(err: &DbErr, constraint: &str) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(message)) if message.contains(constraint))
}
