//! Double-entry bookkeeping logic.
//!
//! This module implements the journal itself:
//! - Journal entries and lines (debits and credits)
//! - Idempotency keys and posting proposals
//! - Business rule validation
//! - Entry numbering and reversals
//! - The append-only [`LedgerStore`] seam

pub mod entry;
pub mod error;
pub mod numbering;
pub mod reversal;
pub mod store;
pub mod types;
pub mod validation;

#[cfg(test)]
mod validation_props;

pub use entry::{AccountLine, EntryStatus, EntryTotalsCheck, JournalEntry, JournalLine, NewJournalEntry};
pub use error::{ErrorKind, LedgerError};
pub use reversal::{ReversalInput, ReversalService};
pub use store::{LedgerStore, VoidedEntry};
pub use types::{EntryTotals, IdempotencyKey, JournalEntryProposal, ProposedLine};
