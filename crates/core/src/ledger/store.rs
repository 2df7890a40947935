//! Persistence seam for the append-only journal.

use std::future::Future;

use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use saldo_shared::types::{AccountId, JournalEntryId};

use super::entry::{AccountLine, EntryTotalsCheck, JournalEntry, NewJournalEntry};
use super::error::LedgerError;
use super::types::IdempotencyKey;

/// Both sides of a void, as committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoidedEntry {
    /// The original, now `VOID`.
    pub original: JournalEntry,
    /// The `POSTED` reversal.
    pub reversal: JournalEntry,
}

/// Append-only store of journal entries and lines.
///
/// This trait is implemented by the db crate for PostgreSQL and by
/// [`MemoryLedgerStore`](crate::memory::MemoryLedgerStore) for tests.
/// Every write is atomic: either the entry and all of its lines become
/// visible or nothing does.
pub trait LedgerStore: Send + Sync {
    /// Draws the next value of the ledger-wide entry sequence.
    fn next_sequence(&self) -> impl Future<Output = Result<i64, LedgerError>> + Send;

    /// Appends an entry with its lines.
    ///
    /// The store re-checks that lines balance and, for `POSTED` entries, that
    /// no other `POSTED` entry holds the same key. A collision surfaces as
    /// `DuplicatePosting`, never as a second row.
    fn append(
        &self,
        entry: NewJournalEntry,
    ) -> impl Future<Output = Result<JournalEntry, LedgerError>> + Send;

    /// Finds the `POSTED` entry holding `key`.
    fn find_by_idempotency_key(
        &self,
        key: &IdempotencyKey,
    ) -> impl Future<Output = Result<Option<JournalEntry>, LedgerError>> + Send;

    /// Finds an entry by ID in any status.
    fn find_entry(
        &self,
        id: JournalEntryId,
    ) -> impl Future<Output = Result<Option<JournalEntry>, LedgerError>> + Send;

    /// Moves a `DRAFT` entry to `POSTED` under the same key-uniqueness rule as `append`.
    fn mark_posted(
        &self,
        id: JournalEntryId,
        posted_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<JournalEntry, LedgerError>> + Send;

    /// Marks a `POSTED` entry `VOID` and appends its reversal in one commit.
    fn void(
        &self,
        id: JournalEntryId,
        reason: String,
        reversal: NewJournalEntry,
    ) -> impl Future<Output = Result<VoidedEntry, LedgerError>> + Send;

    /// Lines for one account ordered by `(posted_at, entry_id, line_number)`.
    ///
    /// With `counted_only`, only lines of `POSTED` and `VOID` entries are
    /// yielded. The stream is finite and restartable by calling again.
    fn lines_for_account(
        &self,
        account_id: AccountId,
        counted_only: bool,
    ) -> BoxStream<'_, Result<AccountLine, LedgerError>>;

    /// Stored versus line-derived totals for every counted entry, by sequence.
    fn entry_totals(&self) -> BoxStream<'_, Result<EntryTotalsCheck, LedgerError>>;
}
