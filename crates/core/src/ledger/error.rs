//! Ledger error types.
//!
//! Every failure surfaced by the posting path maps onto one [`ErrorKind`] so
//! callers can branch on the category without matching individual variants.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use saldo_shared::types::{AccountId, JournalEntryId};
use thiserror::Error;

use super::types::IdempotencyKey;

/// Error category reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The proposal is malformed.
    Validation,
    /// Debits and credits differ.
    Unbalanced,
    /// An entry with the same idempotency key is already posted.
    Duplicate,
    /// A referenced record does not exist.
    NotFound,
    /// The entry is in a status that does not allow the operation.
    State,
    /// Persistence failed.
    Storage,
}

/// Errors that can occur during ledger operations.
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    // ========== Validation Errors ==========
    /// Entry must have at least 2 lines.
    #[error("Journal entry must have at least 2 lines")]
    InsufficientEntries,

    /// Line amount cannot be zero.
    #[error("Line amount cannot be zero")]
    ZeroAmount,

    /// Line amount cannot be negative.
    #[error("Line amount cannot be negative")]
    NegativeAmount,

    /// Line must specify either debit or credit, not both.
    #[error("Line must specify either debit or credit, not both")]
    InvalidEntryType,

    /// Amount carries more decimal places than the ledger keeps.
    #[error("Amount {amount} exceeds {scale} decimal places")]
    ExcessivePrecision {
        /// The offending amount.
        amount: Decimal,
        /// Configured scale.
        scale: u32,
    },

    /// Amount does not fit the stored column.
    #[error("Amount {amount} exceeds the maximum of {max}")]
    AmountOutOfRange {
        /// The offending amount.
        amount: Decimal,
        /// Largest amount a line may carry.
        max: Decimal,
    },

    /// A running sum left the representable range.
    #[error("Amount sum overflowed")]
    AmountOverflow,

    /// The date falls inside a period that is no longer open.
    #[error("Date {date} falls in closed period {period}")]
    PeriodClosed {
        /// The rejected date.
        date: NaiveDate,
        /// Name of the covering period.
        period: String,
    },

    /// Idempotency key component is blank.
    #[error("Idempotency key {0} cannot be empty")]
    InvalidIdempotencyKey(&'static str),

    /// Void requires a reason.
    #[error("Void reason cannot be empty")]
    EmptyVoidReason,

    /// Account code in a proposal does not exist.
    #[error("Unknown account code: {0}")]
    UnknownAccountCode(String),

    /// Account is retired.
    #[error("Account {0} is inactive")]
    AccountInactive(String),

    /// Header accounts only aggregate their children.
    #[error("Account {0} is a header account and does not allow direct posting")]
    HeaderAccountPosting(String),

    /// Two accounts share one code.
    #[error("Duplicate account code: {0}")]
    DuplicateAccountCode(String),

    // ========== Balance Errors ==========
    /// Entry is not balanced (debits != credits).
    #[error("Journal entry is not balanced. Debit: {debit}, Credit: {credit}")]
    UnbalancedEntry {
        /// Total debit amount.
        debit: Decimal,
        /// Total credit amount.
        credit: Decimal,
    },

    // ========== Duplicate Errors ==========
    /// A posted entry already holds this idempotency key.
    #[error("An entry is already posted for {key}")]
    DuplicatePosting {
        /// The colliding key.
        key: IdempotencyKey,
    },

    // ========== Not Found Errors ==========
    /// Account code does not resolve to an active account.
    #[error("Account not found: {0}")]
    AccountCodeNotFound(String),

    /// Account not found.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// Journal entry not found.
    #[error("Journal entry not found: {0}")]
    EntryNotFound(JournalEntryId),

    // ========== State Errors ==========
    /// Posted entries are immutable.
    #[error("Cannot modify posted journal entry")]
    CannotModifyPosted,

    /// Voided entries are immutable.
    #[error("Cannot modify voided journal entry")]
    CannotModifyVoided,

    /// Drafts are never counted, so there is nothing to void.
    #[error("Cannot void a draft journal entry")]
    CannotVoidDraft,

    /// Reversal entries are voided by posting a new entry, not by voiding.
    #[error("Cannot void reversal entry {0}")]
    CannotVoidReversal(String),

    // ========== Storage Errors ==========
    /// Storage error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Returns the error category.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InsufficientEntries
            | Self::ZeroAmount
            | Self::NegativeAmount
            | Self::InvalidEntryType
            | Self::ExcessivePrecision { .. }
            | Self::AmountOutOfRange { .. }
            | Self::AmountOverflow
            | Self::PeriodClosed { .. }
            | Self::InvalidIdempotencyKey(_)
            | Self::EmptyVoidReason
            | Self::UnknownAccountCode(_)
            | Self::AccountInactive(_)
            | Self::HeaderAccountPosting(_)
            | Self::DuplicateAccountCode(_) => ErrorKind::Validation,
            Self::UnbalancedEntry { .. } => ErrorKind::Unbalanced,
            Self::DuplicatePosting { .. } => ErrorKind::Duplicate,
            Self::AccountCodeNotFound(_) | Self::AccountNotFound(_) | Self::EntryNotFound(_) => {
                ErrorKind::NotFound
            }
            Self::CannotModifyPosted
            | Self::CannotModifyVoided
            | Self::CannotVoidDraft
            | Self::CannotVoidReversal(_) => ErrorKind::State,
            Self::Storage(_) | Self::Internal(_) => ErrorKind::Storage,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InsufficientEntries => "INSUFFICIENT_ENTRIES",
            Self::ZeroAmount => "ZERO_AMOUNT",
            Self::NegativeAmount => "NEGATIVE_AMOUNT",
            Self::InvalidEntryType => "INVALID_ENTRY_TYPE",
            Self::ExcessivePrecision { .. } => "EXCESSIVE_PRECISION",
            Self::AmountOutOfRange { .. } => "AMOUNT_OUT_OF_RANGE",
            Self::AmountOverflow => "AMOUNT_OVERFLOW",
            Self::PeriodClosed { .. } => "PERIOD_CLOSED",
            Self::InvalidIdempotencyKey(_) => "INVALID_IDEMPOTENCY_KEY",
            Self::EmptyVoidReason => "EMPTY_VOID_REASON",
            Self::UnknownAccountCode(_) => "UNKNOWN_ACCOUNT_CODE",
            Self::AccountInactive(_) => "ACCOUNT_INACTIVE",
            Self::HeaderAccountPosting(_) => "HEADER_ACCOUNT_POSTING",
            Self::DuplicateAccountCode(_) => "DUPLICATE_ACCOUNT_CODE",
            Self::UnbalancedEntry { .. } => "UNBALANCED_ENTRY",
            Self::DuplicatePosting { .. } => "DUPLICATE_POSTING",
            Self::AccountCodeNotFound(_) | Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::EntryNotFound(_) => "ENTRY_NOT_FOUND",
            Self::CannotModifyPosted => "CANNOT_MODIFY_POSTED",
            Self::CannotModifyVoided => "CANNOT_MODIFY_VOIDED",
            Self::CannotVoidDraft => "CANNOT_VOID_DRAFT",
            Self::CannotVoidReversal(_) => "CANNOT_VOID_REVERSAL",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self.kind() {
            // 400 Bad Request - validation and state errors
            ErrorKind::Validation | ErrorKind::Unbalanced | ErrorKind::State => 400,
            // 404 Not Found
            ErrorKind::NotFound => 404,
            // 409 Conflict
            ErrorKind::Duplicate => 409,
            // 500 Internal Server Error
            ErrorKind::Storage => 500,
        }
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}
