//! Drift detected between the journal, the projection and the mirrors.
//!
//! Warnings are reported and logged. Nothing here corrects data: the journal
//! is authoritative and repairs happen by re-projecting from it.

use rust_decimal::Decimal;
use saldo_shared::types::{AccountId, JournalEntryId};
use thiserror::Error;
use uuid::Uuid;

/// A consistency finding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsistencyWarning {
    /// Cached leaf balance differs from the value recomputed from lines.
    #[error("Balance drift on {code}: cached {cached}, recomputed {recomputed}")]
    BalanceDrift {
        /// Account ID.
        account_id: AccountId,
        /// Account code.
        code: String,
        /// Stored balance.
        cached: Decimal,
        /// Balance recomputed from lines.
        recomputed: Decimal,
    },

    /// Stored header balance differs from the rollup of its children.
    #[error("Header rollup drift on {code}: stored {stored}, children sum {children_sum}")]
    HeaderRollupDrift {
        /// Header account ID.
        account_id: AccountId,
        /// Header code.
        code: String,
        /// Stored header balance.
        stored: Decimal,
        /// Rollup of the stored child balances.
        children_sum: Decimal,
    },

    /// A mirror disagrees with the projected balance it copies.
    #[error("{kind} mirror {mirror_id} holds {mirror_balance}, ledger balance is {ledger_balance}")]
    MirrorDrift {
        /// Mirror kind, e.g. `cash_bank`.
        kind: &'static str,
        /// Mirror record ID.
        mirror_id: Uuid,
        /// Mirrored account.
        account_id: AccountId,
        /// Value held by the mirror.
        mirror_balance: Decimal,
        /// Projected balance.
        ledger_balance: Decimal,
    },

    /// A counted entry whose lines do not balance.
    #[error("Entry {entry_number} is unbalanced: debit {debit}, credit {credit}")]
    UnbalancedEntry {
        /// Entry ID.
        entry_id: JournalEntryId,
        /// Entry number.
        entry_number: String,
        /// Sum of line debits.
        debit: Decimal,
        /// Sum of line credits.
        credit: Decimal,
    },

    /// Stored entry totals disagree with the sum of its lines.
    #[error("Entry {entry_number} totals {stored_debit}/{stored_credit} differ from lines {line_debit}/{line_credit}")]
    EntryTotalsDrift {
        /// Entry ID.
        entry_id: JournalEntryId,
        /// Entry number.
        entry_number: String,
        /// Stored total debit.
        stored_debit: Decimal,
        /// Stored total credit.
        stored_credit: Decimal,
        /// Line debit sum.
        line_debit: Decimal,
        /// Line credit sum.
        line_credit: Decimal,
    },

    /// Ledger-wide debits and credits differ.
    #[error("Trial balance is off: debit {debit}, credit {credit}")]
    TrialBalanceDrift {
        /// Sum of all counted debits.
        debit: Decimal,
        /// Sum of all counted credits.
        credit: Decimal,
    },

    /// Projection after a committed post failed; the account is queued for repair.
    #[error("Projection of account {account_id} failed: {reason}")]
    ProjectionFailed {
        /// Account ID.
        account_id: AccountId,
        /// Underlying error.
        reason: String,
    },

    /// A mirror refresh failed; the account is queued for repair.
    #[error("Mirror refresh for account {account_id} failed: {reason}")]
    MirrorRefreshFailed {
        /// Account ID.
        account_id: AccountId,
        /// Underlying error.
        reason: String,
    },
}

impl ConsistencyWarning {
    /// Stable code for log filtering and reports.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::BalanceDrift { .. } => "BALANCE_DRIFT",
            Self::HeaderRollupDrift { .. } => "HEADER_ROLLUP_DRIFT",
            Self::MirrorDrift { .. } => "MIRROR_DRIFT",
            Self::UnbalancedEntry { .. } => "UNBALANCED_ENTRY",
            Self::EntryTotalsDrift { .. } => "ENTRY_TOTALS_DRIFT",
            Self::TrialBalanceDrift { .. } => "TRIAL_BALANCE_DRIFT",
            Self::ProjectionFailed { .. } => "PROJECTION_FAILED",
            Self::MirrorRefreshFailed { .. } => "MIRROR_REFRESH_FAILED",
        }
    }

    /// Emits the warning at `WARN`.
    pub fn log(&self) {
        tracing::warn!(code = self.code(), "{self}");
    }
}
