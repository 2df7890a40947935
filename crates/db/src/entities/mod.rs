//! `SeaORM` entities for the ledger schema.

pub mod account_balances;
pub mod accounting_periods;
pub mod accounts;
pub mod cash_banks;
pub mod journal_entries;
pub mod journal_lines;
pub mod sea_orm_active_enums;
