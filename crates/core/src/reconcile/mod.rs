//! Reconciliation.
//!
//! The journal is authoritative. [`check_journal_integrity`] reports damage
//! in the journal itself; [`Reconciler`] rebuilds balances and mirrors from it
//! and clears the posting engine's repair queue.

pub mod integrity;
pub mod reconciler;

pub use integrity::{JournalIntegrityReport, check_journal_integrity};
pub use reconciler::{ReconciliationReport, Reconciler};
