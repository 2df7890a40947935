//! Operational mirrors of projected balances.

pub mod adapter;
pub mod cash_bank;

pub use adapter::{MirrorAdapter, MirrorBalance, MirrorCheck, MirrorError};
pub use cash_bank::{CASH_BANK_KIND, CashBank, CashBankMirror, CashBankStore};
