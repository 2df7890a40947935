//! Posting inputs: idempotency keys, proposals and totals.

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use saldo_shared::types::JournalEntryId;
use serde::{Deserialize, Serialize};

use super::entry::JournalLine;
use super::error::LedgerError;

/// Identifies the business event an entry records.
///
/// At most one `POSTED` entry exists per key. `source_type` and `purpose` are
/// upper-cased and trimmed so `"sale"` and `"SALE "` collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdempotencyKey {
    source_type: String,
    source_id: String,
    purpose: String,
}

impl IdempotencyKey {
    /// Source type used for reversal entries.
    pub const REVERSAL_SOURCE: &'static str = "REVERSAL";
    /// Purpose used for reversal entries.
    pub const VOID_PURPOSE: &'static str = "VOID";

    /// Creates a normalized key.
    pub fn new(
        source_type: impl AsRef<str>,
        source_id: impl fmt::Display,
        purpose: impl AsRef<str>,
    ) -> Self {
        Self {
            source_type: source_type.as_ref().trim().to_ascii_uppercase(),
            source_id: source_id.to_string().trim().to_string(),
            purpose: purpose.as_ref().trim().to_ascii_uppercase(),
        }
    }

    /// The key of the reversal that voids `entry_id`.
    #[must_use]
    pub fn reversal_of(entry_id: JournalEntryId) -> Self {
        Self::new(Self::REVERSAL_SOURCE, entry_id, Self::VOID_PURPOSE)
    }

    /// Rejects blank components.
    ///
    /// # Errors
    ///
    /// Returns `InvalidIdempotencyKey` naming the blank component.
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.source_type.is_empty() {
            return Err(LedgerError::InvalidIdempotencyKey("source_type"));
        }
        if self.source_id.is_empty() {
            return Err(LedgerError::InvalidIdempotencyKey("source_id"));
        }
        if self.purpose.is_empty() {
            return Err(LedgerError::InvalidIdempotencyKey("purpose"));
        }
        Ok(())
    }

    /// Source document type.
    #[must_use]
    pub fn source_type(&self) -> &str {
        &self.source_type
    }

    /// Source document ID.
    #[must_use]
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Purpose of the entry within the source document.
    #[must_use]
    pub fn purpose(&self) -> &str {
        &self.purpose
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.source_type, self.source_id, self.purpose)
    }
}

/// Debit and credit sums.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryTotals {
    /// Sum of debits.
    pub debit: Decimal,
    /// Sum of credits.
    pub credit: Decimal,
}

impl EntryTotals {
    /// Sums the lines.
    ///
    /// # Errors
    ///
    /// Returns `AmountOverflow` if either sum leaves the `Decimal` range.
    pub fn of(lines: &[JournalLine]) -> Result<Self, LedgerError> {
        lines
            .iter()
            .try_fold(Self::default(), |acc, line| acc.checked_add(line.debit, line.credit))
    }

    /// Adds one more debit and credit to the sums.
    ///
    /// # Errors
    ///
    /// Returns `AmountOverflow` if either sum leaves the `Decimal` range.
    pub fn checked_add(self, debit: Decimal, credit: Decimal) -> Result<Self, LedgerError> {
        Ok(Self {
            debit: self.debit.checked_add(debit).ok_or(LedgerError::AmountOverflow)?,
            credit: self.credit.checked_add(credit).ok_or(LedgerError::AmountOverflow)?,
        })
    }

    /// Exact equality of the sums.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.debit == self.credit
    }

    /// `debit - credit`.
    #[must_use]
    pub fn difference(&self) -> Decimal {
        self.debit - self.credit
    }
}

/// One line of a proposal, referencing its account by code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedLine {
    /// Account code.
    pub account_code: String,
    /// Debit amount.
    pub debit: Decimal,
    /// Credit amount.
    pub credit: Decimal,
    /// Optional line memo.
    pub description: Option<String>,
}

impl ProposedLine {
    /// A debit line.
    pub fn debit(account_code: impl Into<String>, amount: Decimal) -> Self {
        Self {
            account_code: account_code.into(),
            debit: amount,
            credit: Decimal::ZERO,
            description: None,
        }
    }

    /// A credit line.
    pub fn credit(account_code: impl Into<String>, amount: Decimal) -> Self {
        Self {
            account_code: account_code.into(),
            debit: Decimal::ZERO,
            credit: amount,
            description: None,
        }
    }

    /// Attaches a line memo.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Input to the posting engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntryProposal {
    /// Business event.
    pub key: IdempotencyKey,
    /// Accounting date.
    pub entry_date: NaiveDate,
    /// Narrative.
    pub description: String,
    /// Lines in order.
    pub lines: Vec<ProposedLine>,
}

impl JournalEntryProposal {
    /// Starts a proposal with no lines.
    pub fn new(key: IdempotencyKey, entry_date: NaiveDate, description: impl Into<String>) -> Self {
        Self {
            key,
            entry_date,
            description: description.into(),
            lines: Vec::new(),
        }
    }

    /// Appends a line.
    #[must_use]
    pub fn line(mut self, line: ProposedLine) -> Self {
        self.lines.push(line);
        self
    }

    /// Appends a debit line.
    #[must_use]
    pub fn debit(self, account_code: impl Into<String>, amount: Decimal) -> Self {
        self.line(ProposedLine::debit(account_code, amount))
    }

    /// Appends a credit line.
    #[must_use]
    pub fn credit(self, account_code: impl Into<String>, amount: Decimal) -> Self {
        self.line(ProposedLine::credit(account_code, amount))
    }
}
