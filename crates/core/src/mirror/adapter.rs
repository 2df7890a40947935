//! Mirror adapter seam.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use saldo_shared::types::{AccountId, CashBankId};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::ledger::LedgerError;
use crate::projection::ConsistencyWarning;

/// Errors raised by mirror adapters.
#[derive(Debug, Clone, Error)]
pub enum MirrorError {
    /// The account has no mirror of this kind.
    #[error("No {kind} mirror is linked to account {account_id}")]
    NotMirrored {
        /// Mirror kind.
        kind: &'static str,
        /// Account ID.
        account_id: AccountId,
    },

    /// The account has no projected balance to copy yet.
    #[error("Account {0} has no projected balance")]
    BalanceMissing(AccountId),

    /// Cash/bank register not found.
    #[error("Cash/bank register not found: {0}")]
    RegisterNotFound(CashBankId),

    /// Only active ASSET leaves can back a register.
    #[error("Account {code} cannot be mirrored: only active ASSET leaf accounts can be linked")]
    InvalidLink {
        /// Account code.
        code: String,
    },

    /// Another register already mirrors the account.
    #[error("Account {account_id} is already mirrored by register {existing}")]
    AccountAlreadyMirrored {
        /// Account ID.
        account_id: AccountId,
        /// Register holding the link.
        existing: CashBankId,
    },

    /// Writing the mirror failed.
    #[error("Mirror write failed: {0}")]
    Write(String),

    /// Reading ledger state failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// The value a mirror currently holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MirrorBalance {
    /// Mirror kind, e.g. `cash_bank`.
    pub kind: &'static str,
    /// Mirror record ID.
    pub mirror_id: Uuid,
    /// Mirrored account.
    pub account_id: AccountId,
    /// Copied balance.
    pub balance: Decimal,
    /// When the copy was taken.
    pub synced_at: Option<DateTime<Utc>>,
}

/// A mirror next to the projected balance it should equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MirrorCheck {
    /// Current mirror value.
    pub mirror: MirrorBalance,
    /// Projected balance of the account.
    pub ledger_balance: Decimal,
}

impl MirrorCheck {
    /// Whether the mirror equals the projection.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.mirror.balance == self.ledger_balance
    }

    /// Drift warning, if any.
    #[must_use]
    pub fn warning(&self) -> Option<ConsistencyWarning> {
        (!self.is_consistent()).then(|| ConsistencyWarning::MirrorDrift {
            kind: self.mirror.kind,
            mirror_id: self.mirror.mirror_id,
            account_id: self.mirror.account_id,
            mirror_balance: self.mirror.balance,
            ledger_balance: self.ledger_balance,
        })
    }
}

/// A denormalized copy of an account balance kept in an operational table.
///
/// Mirrors only read projected balances; they never derive figures from
/// journal lines. Adapters are registered on the posting engine as trait
/// objects, one per operational table.
#[async_trait]
pub trait MirrorAdapter: Send + Sync {
    /// Short name used in logs and warnings.
    fn kind(&self) -> &'static str;

    /// Whether a mirror of this kind is linked to the account.
    async fn is_mirrored(&self, account_id: AccountId) -> Result<bool, MirrorError>;

    /// Every account with a linked mirror.
    async fn mirrored_accounts(&self) -> Result<Vec<AccountId>, MirrorError>;

    /// Copies the projected balance into the mirror.
    async fn refresh(&self, account_id: AccountId) -> Result<MirrorBalance, MirrorError>;

    /// Reads the mirror and the projected balance without writing.
    async fn inspect(&self, account_id: AccountId) -> Result<MirrorCheck, MirrorError>;

    /// Whether the mirror equals the projected balance.
    async fn validate(&self, account_id: AccountId) -> Result<bool, MirrorError> {
        Ok(self.inspect(account_id).await?.is_consistent())
    }
}
