//! Common types used across the ledger.

pub mod id;

pub use id::*;
