//! Read-only access to the chart of accounts.

use std::collections::HashMap;

use saldo_shared::types::AccountId;

use super::types::Account;
use crate::ledger::LedgerError;

/// Lookup contract the posting engine, projector and mirrors rely on.
///
/// Implementations are snapshots: the ledger never mutates the directory.
pub trait AccountDirectory: Send + Sync {
    /// Finds an account by code regardless of status.
    fn find_by_code(&self, code: &str) -> Option<&Account>;

    /// Returns an account by ID regardless of status.
    fn get(&self, id: AccountId) -> Option<&Account>;

    /// Direct children, ordered by code.
    fn children(&self, id: AccountId) -> Vec<&Account>;

    /// Ancestors from the immediate parent up to the root.
    fn ancestors(&self, id: AccountId) -> Vec<&Account>;

    /// Every account, ordered by code.
    fn accounts(&self) -> Vec<&Account>;

    /// Resolves an active account by code.
    ///
    /// # Errors
    ///
    /// Returns `AccountCodeNotFound` when the code is unknown or retired.
    fn lookup(&self, code: &str) -> Result<&Account, LedgerError> {
        self.find_by_code(code)
            .filter(|account| account.is_active)
            .ok_or_else(|| LedgerError::AccountCodeNotFound(code.to_string()))
    }

    /// Whether `id` is a header account.
    fn is_header(&self, id: AccountId) -> bool {
        self.get(id).is_some_and(|account| account.is_header)
    }

    /// Resolves a code for posting, rejecting headers and retired accounts.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the account cannot take lines.
    fn resolve_postable(&self, code: &str) -> Result<&Account, LedgerError> {
        let account = self
            .find_by_code(code)
            .ok_or_else(|| LedgerError::UnknownAccountCode(code.to_string()))?;
        if account.is_header {
            return Err(LedgerError::HeaderAccountPosting(account.code.clone()));
        }
        if !account.is_active {
            return Err(LedgerError::AccountInactive(account.code.clone()));
        }
        Ok(account)
    }

    /// Number of edges between `id` and its root, 1 for roots.
    fn depth(&self, id: AccountId) -> usize {
        1 + self.ancestors(id).len()
    }
}

/// In-memory chart snapshot, loaded once and shared behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct ChartOfAccounts {
    accounts: HashMap<AccountId, Account>,
    by_code: HashMap<String, AccountId>,
    children: HashMap<AccountId, Vec<AccountId>>,
}

impl ChartOfAccounts {
    /// Builds a snapshot from account records.
    ///
    /// Parents that are missing or cyclic are tolerated here so that
    /// [`validate_hierarchy`](super::validate_hierarchy) can report them.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateAccountCode` when two accounts share a code.
    pub fn new(accounts: impl IntoIterator<Item = Account>) -> Result<Self, LedgerError> {
        let mut chart = Self::default();
        for account in accounts {
            if chart.by_code.contains_key(&account.code) {
                return Err(LedgerError::DuplicateAccountCode(account.code));
            }
            chart.by_code.insert(account.code.clone(), account.id);
            if let Some(parent_id) = account.parent_id {
                chart.children.entry(parent_id).or_default().push(account.id);
            }
            chart.accounts.insert(account.id, account);
        }

        let accounts = &chart.accounts;
        for ids in chart.children.values_mut() {
            ids.sort_by(|a, b| accounts[a].code.cmp(&accounts[b].code));
        }
        Ok(chart)
    }

    /// Number of accounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Whether the chart is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

impl AccountDirectory for ChartOfAccounts {
    fn find_by_code(&self, code: &str) -> Option<&Account> {
        self.by_code.get(code).and_then(|id| self.accounts.get(id))
    }

    fn get(&self, id: AccountId) -> Option<&Account> {
        self.accounts.get(&id)
    }

    fn children(&self, id: AccountId) -> Vec<&Account> {
        self.children
            .get(&id)
            .map(|ids| ids.iter().filter_map(|id| self.accounts.get(id)).collect())
            .unwrap_or_default()
    }

    fn ancestors(&self, id: AccountId) -> Vec<&Account> {
        let mut ancestors = Vec::new();
        let mut current = self.accounts.get(&id).and_then(|account| account.parent_id);
        // A cyclic chart would loop forever; stop after visiting every node once.
        while let Some(parent_id) = current {
            if ancestors.len() >= self.accounts.len() {
                break;
            }
            let Some(parent) = self.accounts.get(&parent_id) else {
                break;
            };
            ancestors.push(parent);
            current = parent.parent_id;
        }
        ancestors
    }

    fn accounts(&self) -> Vec<&Account> {
        let mut accounts: Vec<&Account> = self.accounts.values().collect();
        accounts.sort_by(|a, b| a.code.cmp(&b.code));
        accounts
    }
}
