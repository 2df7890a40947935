//! `SeaORM` active enums mapped to PostgreSQL enum types.

use saldo_core::account;
use saldo_core::fiscal;
use saldo_core::ledger;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// `account_class` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "account_class")]
pub enum AccountClass {
    /// Asset.
    #[sea_orm(string_value = "ASSET")]
    Asset,
    /// Liability.
    #[sea_orm(string_value = "LIABILITY")]
    Liability,
    /// Equity.
    #[sea_orm(string_value = "EQUITY")]
    Equity,
    /// Revenue.
    #[sea_orm(string_value = "REVENUE")]
    Revenue,
    /// Expense.
    #[sea_orm(string_value = "EXPENSE")]
    Expense,
}

impl From<AccountClass> for account::AccountClass {
    fn from(class: AccountClass) -> Self {
        match class {
            AccountClass::Asset => Self::Asset,
            AccountClass::Liability => Self::Liability,
            AccountClass::Equity => Self::Equity,
            AccountClass::Revenue => Self::Revenue,
            AccountClass::Expense => Self::Expense,
        }
    }
}

impl From<account::AccountClass> for AccountClass {
    fn from(class: account::AccountClass) -> Self {
        match class {
            account::AccountClass::Asset => Self::Asset,
            account::AccountClass::Liability => Self::Liability,
            account::AccountClass::Equity => Self::Equity,
            account::AccountClass::Revenue => Self::Revenue,
            account::AccountClass::Expense => Self::Expense,
        }
    }
}

/// `entry_status` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "entry_status")]
pub enum EntryStatus {
    /// Saved, not counted.
    #[sea_orm(string_value = "DRAFT")]
    Draft,
    /// Counted.
    #[sea_orm(string_value = "POSTED")]
    Posted,
    /// Reversed; still counted.
    #[sea_orm(string_value = "VOID")]
    Void,
}

impl EntryStatus {
    /// Statuses whose lines count toward balances.
    pub const COUNTED: [Self; 2] = [Self::Posted, Self::Void];
}

impl From<EntryStatus> for ledger::EntryStatus {
    fn from(status: EntryStatus) -> Self {
        match status {
            EntryStatus::Draft => Self::Draft,
            EntryStatus::Posted => Self::Posted,
            EntryStatus::Void => Self::Void,
        }
    }
}

impl From<ledger::EntryStatus> for EntryStatus {
    fn from(status: ledger::EntryStatus) -> Self {
        match status {
            ledger::EntryStatus::Draft => Self::Draft,
            ledger::EntryStatus::Posted => Self::Posted,
            ledger::EntryStatus::Void => Self::Void,
        }
    }
}

/// `period_status` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "period_status")]
pub enum PeriodStatus {
    /// Accepts entries.
    #[sea_orm(string_value = "OPEN")]
    Open,
    /// Closed; may be reopened.
    #[sea_orm(string_value = "CLOSED")]
    Closed,
    /// Closed for good.
    #[sea_orm(string_value = "LOCKED")]
    Locked,
}

impl From<PeriodStatus> for fiscal::PeriodStatus {
    fn from(status: PeriodStatus) -> Self {
        match status {
            PeriodStatus::Open => Self::Open,
            PeriodStatus::Closed => Self::Closed,
            PeriodStatus::Locked => Self::Locked,
        }
    }
}

impl From<fiscal::PeriodStatus> for PeriodStatus {
    fn from(status: fiscal::PeriodStatus) -> Self {
        match status {
            fiscal::PeriodStatus::Open => Self::Open,
            fiscal::PeriodStatus::Closed => Self::Closed,
            fiscal::PeriodStatus::Locked => Self::Locked,
        }
    }
}
