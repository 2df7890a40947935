//! Structural checks over the chart of accounts.
//!
//! Rollups assume a forest of headers over postable leaves. These checks find
//! the charts that break that assumption before the projector trusts them.

use std::collections::HashSet;

use saldo_shared::types::AccountId;
use serde::Serialize;

use super::directory::AccountDirectory;
use super::types::{Account, AccountClass};

/// One structural problem found in the chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum HierarchyIssue {
    /// Following parents from this account leads back to it.
    CircularReference {
        /// Account code.
        code: String,
    },
    /// The parent ID does not exist.
    OrphanedParent {
        /// Account code.
        code: String,
        /// Missing parent.
        parent_id: AccountId,
    },
    /// A non-header account has children.
    ChildrenUnderLeaf {
        /// Account code.
        code: String,
        /// Number of children.
        children: usize,
    },
    /// Child class differs from the parent class.
    ClassMismatch {
        /// Account code.
        code: String,
        /// Account class.
        class: AccountClass,
        /// Parent code.
        parent_code: String,
        /// Parent class.
        parent_class: AccountClass,
    },
    /// Child code does not extend the parent's code prefix.
    CodePrefixMismatch {
        /// Account code.
        code: String,
        /// Parent code.
        parent_code: String,
    },
    /// A header account has no children to aggregate.
    EmptyHeader {
        /// Account code.
        code: String,
    },
    /// Account sits deeper than the configured maximum.
    TooDeep {
        /// Account code.
        code: String,
        /// Depth, 1 for roots.
        depth: usize,
        /// Configured maximum.
        max_depth: usize,
    },
}

impl HierarchyIssue {
    /// Errors break rollups; the rest are bookkeeping smells.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::CircularReference { .. }
                | Self::OrphanedParent { .. }
                | Self::ChildrenUnderLeaf { .. }
        )
    }

    /// Code of the account the issue is about.
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::CircularReference { code }
            | Self::OrphanedParent { code, .. }
            | Self::ChildrenUnderLeaf { code, .. }
            | Self::ClassMismatch { code, .. }
            | Self::CodePrefixMismatch { code, .. }
            | Self::EmptyHeader { code }
            | Self::TooDeep { code, .. } => code,
        }
    }
}

/// Result of [`validate_hierarchy`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct HierarchyReport {
    /// Number of accounts inspected.
    pub accounts_checked: usize,
    /// Issues in chart order.
    pub issues: Vec<HierarchyIssue>,
}

impl HierarchyReport {
    /// True when no issue breaks rollups.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.issues.iter().any(HierarchyIssue::is_error)
    }

    /// Issues that break rollups.
    pub fn errors(&self) -> impl Iterator<Item = &HierarchyIssue> {
        self.issues.iter().filter(|issue| issue.is_error())
    }

    /// Issues that do not break rollups.
    pub fn warnings(&self) -> impl Iterator<Item = &HierarchyIssue> {
        self.issues.iter().filter(|issue| !issue.is_error())
    }
}

/// Checks the chart for cycles, orphans, misplaced children, class and code
/// mismatches against parents, empty headers and excessive depth.
#[must_use]
pub fn validate_hierarchy<D>(directory: &D, max_depth: usize) -> HierarchyReport
where
    D: AccountDirectory + ?Sized,
{
    let accounts = directory.accounts();
    let mut issues = Vec::new();

    for account in &accounts {
        let children = directory.children(account.id).len();
        if account.is_header && children == 0 {
            issues.push(HierarchyIssue::EmptyHeader {
                code: account.code.clone(),
            });
        }
        if !account.is_header && children > 0 {
            issues.push(HierarchyIssue::ChildrenUnderLeaf {
                code: account.code.clone(),
                children,
            });
        }

        let Some(parent_id) = account.parent_id else {
            continue;
        };
        let Some(parent) = directory.get(parent_id) else {
            issues.push(HierarchyIssue::OrphanedParent {
                code: account.code.clone(),
                parent_id,
            });
            continue;
        };

        if in_cycle(directory, account) {
            issues.push(HierarchyIssue::CircularReference {
                code: account.code.clone(),
            });
            continue;
        }
        if parent.class != account.class {
            issues.push(HierarchyIssue::ClassMismatch {
                code: account.code.clone(),
                class: account.class,
                parent_code: parent.code.clone(),
                parent_class: parent.class,
            });
        }
        if !extends_prefix(&parent.code, &account.code) {
            issues.push(HierarchyIssue::CodePrefixMismatch {
                code: account.code.clone(),
                parent_code: parent.code.clone(),
            });
        }
        let depth = directory.depth(account.id);
        if depth > max_depth {
            issues.push(HierarchyIssue::TooDeep {
                code: account.code.clone(),
                depth,
                max_depth,
            });
        }
    }

    HierarchyReport {
        accounts_checked: accounts.len(),
        issues,
    }
}

fn in_cycle<D>(directory: &D, account: &Account) -> bool
where
    D: AccountDirectory + ?Sized,
{
    let mut seen = HashSet::new();
    let mut current = account.parent_id;
    while let Some(id) = current {
        if id == account.id {
            return true;
        }
        if !seen.insert(id) {
            return false;
        }
        current = directory.get(id).and_then(|parent| parent.parent_id);
    }
    false
}

/// `1100` is the parent prefix of `1101`: trailing zeros are placeholders.
fn extends_prefix(parent_code: &str, code: &str) -> bool {
    let prefix = parent_code.trim_end_matches('0');
    let prefix = if prefix.is_empty() { parent_code } else { prefix };
    code != parent_code && code.starts_with(prefix)
}
