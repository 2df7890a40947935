use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use saldo_shared::types::{AccountId, JournalEntryId};
use tokio::sync::RwLock;

use crate::ledger::validation::ensure_balanced;
use crate::ledger::{
    AccountLine, EntryStatus, EntryTotals, EntryTotalsCheck, IdempotencyKey, JournalEntry,
    LedgerError, LedgerStore, NewJournalEntry, VoidedEntry,
};

#[derive(Debug, Default)]
struct LedgerState {
    entries: HashMap<JournalEntryId, JournalEntry>,
    posted_keys: HashMap<IdempotencyKey, JournalEntryId>,
}

impl LedgerState {
    fn claim_key(&self, key: &IdempotencyKey) -> Result<(), LedgerError> {
        if self.posted_keys.contains_key(key) {
            return Err(LedgerError::DuplicatePosting { key: key.clone() });
        }
        Ok(())
    }

    fn insert(&mut self, entry: JournalEntry) {
        if entry.status == EntryStatus::Posted {
            self.posted_keys.insert(entry.key.clone(), entry.id);
        }
        self.entries.insert(entry.id, entry);
    }
}

/// Journal held in memory behind a single lock.
///
/// The lock makes every write atomic: an entry and its lines become visible
/// together, and the key check and insert cannot interleave.
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    state: RwLock<LedgerState>,
    sequence: AtomicI64,
}

impl MemoryLedgerStore {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries in any status.
    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    /// Whether the ledger holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.entries.is_empty()
    }

    /// Every entry ordered by sequence.
    pub async fn entries(&self) -> Vec<JournalEntry> {
        let state = self.state.read().await;
        let mut entries: Vec<JournalEntry> = state.entries.values().cloned().collect();
        entries.sort_by_key(|entry| entry.sequence);
        entries
    }

    /// Stores an entry without any check, to simulate damaged rows.
    #[cfg(test)]
    pub(crate) async fn insert_unchecked(&self, entry: JournalEntry) {
        self.state.write().await.insert(entry);
    }
}

impl LedgerStore for MemoryLedgerStore {
    async fn next_sequence(&self) -> Result<i64, LedgerError> {
        Ok(self.sequence.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn append(&self, entry: NewJournalEntry) -> Result<JournalEntry, LedgerError> {
        if entry.status == EntryStatus::Void {
            return Err(LedgerError::Internal("cannot append a VOID entry".into()));
        }
        ensure_balanced(entry.totals()?)?;

        let mut state = self.state.write().await;
        if state.entries.contains_key(&entry.id) {
            return Err(LedgerError::Internal(format!("entry {} already exists", entry.id)));
        }
        if entry.status == EntryStatus::Posted {
            state.claim_key(&entry.key)?;
        }
        let stored = entry.into_entry(Utc::now())?;
        state.insert(stored.clone());
        Ok(stored)
    }

    async fn find_by_idempotency_key(&self, key: &IdempotencyKey) -> Result<Option<JournalEntry>, LedgerError> {
        let state = self.state.read().await;
        Ok(state
            .posted_keys
            .get(key)
            .and_then(|id| state.entries.get(id))
            .cloned())
    }

    async fn find_entry(&self, id: JournalEntryId) -> Result<Option<JournalEntry>, LedgerError> {
        Ok(self.state.read().await.entries.get(&id).cloned())
    }

    async fn mark_posted(&self, id: JournalEntryId, posted_at: DateTime<Utc>) -> Result<JournalEntry, LedgerError> {
        let mut state = self.state.write().await;
        let entry = state.entries.get(&id).ok_or(LedgerError::EntryNotFound(id))?;
        match entry.status {
            EntryStatus::Draft => {}
            EntryStatus::Posted => return Err(LedgerError::CannotModifyPosted),
            EntryStatus::Void => return Err(LedgerError::CannotModifyVoided),
        }
        ensure_balanced(EntryTotals::of(&entry.lines)?)?;
        state.claim_key(&entry.key)?;

        let mut entry = entry.clone();
        entry.status = EntryStatus::Posted;
        entry.posted_at = Some(posted_at);
        state.insert(entry.clone());
        Ok(entry)
    }

    async fn void(&self, id: JournalEntryId, reason: String, reversal: NewJournalEntry) -> Result<VoidedEntry, LedgerError> {
        ensure_balanced(reversal.totals()?)?;

        let mut state = self.state.write().await;
        let original = state.entries.get(&id).ok_or(LedgerError::EntryNotFound(id))?;
        match original.status {
            EntryStatus::Posted => {}
            EntryStatus::Draft => return Err(LedgerError::CannotVoidDraft),
            EntryStatus::Void => return Err(LedgerError::CannotModifyVoided),
        }
        state.claim_key(&reversal.key)?;

        let mut original = original.clone();
        original.status = EntryStatus::Void;
        original.reversed_by = Some(reversal.id);
        original.void_reason = Some(reason);
        state.posted_keys.remove(&original.key);
        state.entries.insert(original.id, original.clone());

        let reversal = reversal.into_entry(Utc::now())?;
        state.insert(reversal.clone());
        Ok(VoidedEntry { original, reversal })
    }

    fn lines_for_account(&self, account_id: AccountId, counted_only: bool) -> BoxStream<'_, Result<AccountLine, LedgerError>> {
        stream::once(async move {
            let state = self.state.read().await;
            let mut lines: Vec<(u32, AccountLine)> = state
                .entries
                .values()
                .filter(|entry| !counted_only || entry.status.is_counted())
                .flat_map(|entry| {
                    entry
                        .lines
                        .iter()
                        .filter(move |line| line.account_id == account_id)
                        .map(move |line| {
                            (
                                line.line_number,
                                AccountLine {
                                    entry_id: entry.id,
                                    line_id: line.id,
                                    posted_at: entry.posted_at,
                                    debit: line.debit,
                                    credit: line.credit,
                                },
                            )
                        })
                })
                .collect();
            // Drafts have no posting time and sort last.
            lines.sort_by_key(|(number, line)| (line.posted_at.is_none(), line.posted_at, line.entry_id, *number));
            Ok::<_, LedgerError>(stream::iter(lines.into_iter().map(|(_, line)| Ok(line))))
        })
        .try_flatten()
        .boxed()
    }

    fn entry_totals(&self) -> BoxStream<'_, Result<EntryTotalsCheck, LedgerError>> {
        stream::once(async move {
            let state = self.state.read().await;
            let mut checks: Vec<(i64, EntryTotalsCheck)> = state
                .entries
                .values()
                .filter(|entry| entry.status.is_counted())
                .map(|entry| {
                    Ok((
                        entry.sequence,
                        EntryTotalsCheck {
                            entry_id: entry.id,
                            entry_number: entry.entry_number.clone(),
                            stored: entry.totals(),
                            lines: EntryTotals::of(&entry.lines)?,
                        },
                    ))
                })
                .collect::<Result<_, LedgerError>>()?;
            checks.sort_by_key(|(sequence, _)| *sequence);
            Ok::<_, LedgerError>(stream::iter(checks.into_iter().map(|(_, check)| Ok(check))))
        })
        .try_flatten()
        .boxed()
    }
}
