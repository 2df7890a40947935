//! Chart of accounts.
//!
//! The directory is read-only from the ledger's point of view: accounts are
//! created and retired by chart-of-accounts maintenance, and only the balance
//! projector derives figures from them.

pub mod directory;
pub mod hierarchy;
pub mod types;

pub use directory::{AccountDirectory, ChartOfAccounts};
pub use hierarchy::{HierarchyIssue, HierarchyReport, validate_hierarchy};
pub use types::{Account, AccountClass, NormalBalance, UnknownAccountClass};
