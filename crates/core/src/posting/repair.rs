//! Accounts whose derived state lagged behind a committed entry.

use std::sync::Arc;

use dashmap::DashMap;
use saldo_shared::types::AccountId;

/// Why an account needs repair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairReason {
    /// Balance projection failed or was deferred.
    Projection(String),
    /// A mirror refresh failed.
    Mirror {
        /// Mirror kind.
        kind: &'static str,
        /// Underlying error.
        reason: String,
    },
}

/// Shared set of accounts awaiting re-projection or mirror refresh.
///
/// Cloning shares the queue. The posting engine records; the reconciler
/// drains after it has re-derived everything from the journal.
#[derive(Debug, Clone, Default)]
pub struct RepairQueue {
    pending: Arc<DashMap<AccountId, RepairReason>>,
}

impl RepairQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an account, replacing any earlier reason.
    pub fn record(&self, account_id: AccountId, reason: RepairReason) {
        self.pending.insert(account_id, reason);
    }

    /// Whether the account is queued.
    #[must_use]
    pub fn contains(&self, account_id: AccountId) -> bool {
        self.pending.contains_key(&account_id)
    }

    /// Number of queued accounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Snapshot of the queue.
    #[must_use]
    pub fn pending(&self) -> Vec<(AccountId, RepairReason)> {
        self.pending
            .iter()
            .map(|item| (*item.key(), item.value().clone()))
            .collect()
    }

    /// Removes the account if it is still queued for `reason`.
    ///
    /// A failure recorded again after the caller's snapshot keeps the
    /// account queued.
    pub fn resolve(&self, account_id: AccountId, reason: &RepairReason) -> bool {
        self.pending
            .remove_if(&account_id, |_, queued| queued == reason)
            .is_some()
    }

    /// Removes and returns every queued account.
    pub fn drain(&self) -> Vec<(AccountId, RepairReason)> {
        let keys: Vec<AccountId> = self.pending.iter().map(|item| *item.key()).collect();
        keys.into_iter()
            .filter_map(|key| self.pending.remove(&key))
            .collect()
    }
}
