//! Posting.
//!
//! [`PostingEngine`] validates proposals against the chart, appends them to the
//! ledger and propagates each commit to projected balances and mirrors.

pub mod engine;
pub mod repair;

#[cfg(test)]
mod tests;

pub use engine::{Disposition, PostOutcome, PostingEngine, PostingRules, VoidOutcome};
pub use repair::{RepairQueue, RepairReason};
