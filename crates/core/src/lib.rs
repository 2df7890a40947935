//! Core ledger logic for Saldo.
//!
//! This crate contains the double-entry posting and balance-consistency engine
//! with ZERO web or database dependencies. Persistence is reached through the
//! store traits in each module; the `db` crate implements them for PostgreSQL
//! and [`memory`] implements them in-process.
//!
//! # Modules
//!
//! - `account` - Chart of accounts directory and hierarchy validation
//! - `fiscal` - Accounting periods and the closed-period guard
//! - `ledger` - Journal entries, lines, validation and the ledger store seam
//! - `posting` - The single posting path (post, draft, void)
//! - `projection` - Balance projection, rollups and consistency warnings
//! - `mirror` - Operational mirrors refreshed from projected balances
//! - `reconcile` - Periodic integrity check and repair sweep

pub mod account;
pub mod fiscal;
pub mod ledger;
pub mod memory;
pub mod mirror;
pub mod posting;
pub mod projection;
pub mod reconcile;

#[cfg(test)]
mod fixtures;
