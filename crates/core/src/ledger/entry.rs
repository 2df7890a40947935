//! Journal entries and lines as stored in the ledger.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use saldo_shared::types::{AccountId, JournalEntryId, JournalLineId};
use serde::{Deserialize, Serialize};

use super::error::LedgerError;
use super::types::{EntryTotals, IdempotencyKey};

/// Lifecycle status of a journal entry.
///
/// ```text
/// DRAFT ──post──► POSTED ──void──► VOID
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntryStatus {
    /// Editable, invisible to balances.
    Draft,
    /// Immutable and counted.
    Posted,
    /// Superseded by a reversal. Still counted: the reversal nets it out.
    Void,
}

impl EntryStatus {
    /// Whether lines of entries in this status count toward balances.
    #[must_use]
    pub const fn is_counted(self) -> bool {
        matches!(self, Self::Posted | Self::Void)
    }

    /// Upper-case name as persisted.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Posted => "POSTED",
            Self::Void => "VOID",
        }
    }
}

/// One side of one account movement.
///
/// Exactly one of `debit` and `credit` is non-zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalLine {
    /// Line ID.
    pub id: JournalLineId,
    /// Owning entry.
    pub entry_id: JournalEntryId,
    /// Leaf account moved by this line.
    pub account_id: AccountId,
    /// 1-based position within the entry.
    pub line_number: u32,
    /// Debit amount.
    pub debit: Decimal,
    /// Credit amount.
    pub credit: Decimal,
    /// Optional line memo.
    pub description: Option<String>,
}

impl JournalLine {
    /// Returns the signed amount (positive for debit, negative for credit).
    #[must_use]
    pub fn signed_amount(&self) -> Decimal {
        self.debit - self.credit
    }
}

/// A journal entry with its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Entry ID.
    pub id: JournalEntryId,
    /// Human-facing number, e.g. `JE-2026/10/000042`.
    pub entry_number: String,
    /// Ledger sequence the number was derived from.
    pub sequence: i64,
    /// Accounting date.
    pub entry_date: NaiveDate,
    /// Narrative.
    pub description: String,
    /// Business event this entry records.
    pub key: IdempotencyKey,
    /// Lifecycle status.
    pub status: EntryStatus,
    /// Sum of line debits.
    pub total_debit: Decimal,
    /// Sum of line credits.
    pub total_credit: Decimal,
    /// When the entry became counted. `None` for drafts.
    pub posted_at: Option<DateTime<Utc>>,
    /// When the entry was first written.
    pub created_at: DateTime<Utc>,
    /// Set on reversal entries: the entry they cancel.
    pub reverses: Option<JournalEntryId>,
    /// Set on voided entries: their reversal.
    pub reversed_by: Option<JournalEntryId>,
    /// Why the entry was voided.
    pub void_reason: Option<String>,
    /// Lines ordered by line number.
    pub lines: Vec<JournalLine>,
}

impl JournalEntry {
    /// Stored totals.
    #[must_use]
    pub fn totals(&self) -> EntryTotals {
        EntryTotals {
            debit: self.total_debit,
            credit: self.total_credit,
        }
    }

    /// Whether this entry is the reversal of another.
    #[must_use]
    pub fn is_reversal(&self) -> bool {
        self.reverses.is_some()
    }

    /// Distinct accounts touched, in line order.
    #[must_use]
    pub fn account_ids(&self) -> Vec<AccountId> {
        let mut ids: Vec<AccountId> = Vec::with_capacity(self.lines.len());
        for line in &self.lines {
            if !ids.contains(&line.account_id) {
                ids.push(line.account_id);
            }
        }
        ids
    }
}

/// An entry ready to be appended. The store assigns `created_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewJournalEntry {
    /// Entry ID, also referenced by every line.
    pub id: JournalEntryId,
    /// Formatted entry number.
    pub entry_number: String,
    /// Sequence drawn from the store.
    pub sequence: i64,
    /// Accounting date.
    pub entry_date: NaiveDate,
    /// Narrative.
    pub description: String,
    /// Idempotency key.
    pub key: IdempotencyKey,
    /// `Draft` or `Posted`.
    pub status: EntryStatus,
    /// Set when `status` is `Posted`.
    pub posted_at: Option<DateTime<Utc>>,
    /// Entry cancelled by this one.
    pub reverses: Option<JournalEntryId>,
    /// Lines ordered by line number.
    pub lines: Vec<JournalLine>,
}

impl NewJournalEntry {
    /// Totals recomputed from the lines.
    ///
    /// # Errors
    ///
    /// Returns `AmountOverflow` if a sum leaves the `Decimal` range.
    pub fn totals(&self) -> Result<EntryTotals, LedgerError> {
        EntryTotals::of(&self.lines)
    }

    /// Materializes the stored form.
    ///
    /// # Errors
    ///
    /// Returns `AmountOverflow` if a sum leaves the `Decimal` range.
    pub fn into_entry(self, created_at: DateTime<Utc>) -> Result<JournalEntry, LedgerError> {
        let totals = self.totals()?;
        Ok(JournalEntry {
            id: self.id,
            entry_number: self.entry_number,
            sequence: self.sequence,
            entry_date: self.entry_date,
            description: self.description,
            key: self.key,
            status: self.status,
            total_debit: totals.debit,
            total_credit: totals.credit,
            posted_at: self.posted_at,
            created_at,
            reverses: self.reverses,
            reversed_by: None,
            void_reason: None,
            lines: self.lines,
        })
    }
}

/// A line as seen by the projector, ordered by `(posted_at, entry_id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountLine {
    /// Owning entry.
    pub entry_id: JournalEntryId,
    /// Line ID.
    pub line_id: JournalLineId,
    /// `None` only for draft lines.
    pub posted_at: Option<DateTime<Utc>>,
    /// Debit amount.
    pub debit: Decimal,
    /// Credit amount.
    pub credit: Decimal,
}

/// Stored totals next to the totals recomputed from lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryTotalsCheck {
    /// Entry ID.
    pub entry_id: JournalEntryId,
    /// Entry number.
    pub entry_number: String,
    /// Totals recorded on the entry.
    pub stored: EntryTotals,
    /// Totals summed from the lines.
    pub lines: EntryTotals,
}
