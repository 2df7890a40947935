//! Balance projection.
//!
//! Balances are derived state: the journal is authoritative and the
//! [`BalanceProjector`] is the only component that writes an
//! [`AccountBalance`].

pub mod balance;
pub mod consistency;
pub mod projector;
pub mod store;
pub mod trial_balance;

#[cfg(test)]
mod projector_props;
#[cfg(test)]
mod projector_tests;

pub use balance::{AccountBalance, rollup};
pub use consistency::ConsistencyWarning;
pub use projector::{BalanceProjector, ProjectionRun, Rematerialization};
pub use store::{BalanceReader, BalanceStore};
pub use trial_balance::{TrialBalance, TrialBalanceLine};
