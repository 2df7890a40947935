//! In-process store implementations.
//!
//! Used by tests and by embedders that keep the ledger in memory. They honour
//! the same atomicity and uniqueness rules as the PostgreSQL stores.

mod balances;
mod cash_banks;
mod ledger;
mod periods;

pub use balances::MemoryBalanceStore;
pub use cash_banks::MemoryCashBankStore;
pub use ledger::MemoryLedgerStore;
pub use periods::MemoryPeriodCalendar;
