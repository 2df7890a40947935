//! The single writer of projected balances.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use futures::TryStreamExt;
use futures::future::join_all;
use rust_decimal::Decimal;
use saldo_shared::types::AccountId;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::balance::{AccountBalance, rollup};
use super::consistency::ConsistencyWarning;
use super::store::BalanceStore;
use crate::account::{Account, AccountDirectory};
use crate::ledger::{EntryTotals, LedgerError, LedgerStore};

/// Accounts recomputed concurrently during rematerialization.
const REMATERIALIZE_BATCH: usize = 16;

/// Outcome of projecting the accounts touched by one entry.
#[derive(Debug, Default)]
pub struct ProjectionRun {
    /// Balances written, leaves first.
    pub projected: Vec<AccountBalance>,
    /// Accounts whose projection failed.
    pub failed: Vec<(AccountId, LedgerError)>,
    /// Headers skipped because a child failed.
    pub deferred: Vec<AccountId>,
}

impl ProjectionRun {
    /// True when every touched account and ancestor was written.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.deferred.is_empty()
    }
}

/// Outcome of a full rebuild from the journal.
#[derive(Debug, Default)]
pub struct Rematerialization {
    /// Recomputed balances, leaves first then headers bottom-up.
    pub balances: Vec<AccountBalance>,
    /// Cached figures that differed from the recomputed ones.
    pub warnings: Vec<ConsistencyWarning>,
    /// Set when cancellation stopped the rebuild early.
    pub interrupted: bool,
}

/// Derives [`AccountBalance`]s from the journal.
///
/// Every figure is a full recompute: leaves from their counted lines, headers
/// from their children's stored balances. Re-running any projection is
/// therefore idempotent and order-independent.
pub struct BalanceProjector<D, L, B> {
    directory: Arc<D>,
    ledger: Arc<L>,
    balances: Arc<B>,
}

impl<D, L, B> Clone for BalanceProjector<D, L, B> {
    fn clone(&self) -> Self {
        Self {
            directory: Arc::clone(&self.directory),
            ledger: Arc::clone(&self.ledger),
            balances: Arc::clone(&self.balances),
        }
    }
}

impl<D, L, B> BalanceProjector<D, L, B>
where
    D: AccountDirectory,
    L: LedgerStore,
    B: BalanceStore,
{
    /// Creates a projector.
    #[must_use]
    pub fn new(directory: Arc<D>, ledger: Arc<L>, balances: Arc<B>) -> Self {
        Self {
            directory,
            ledger,
            balances,
        }
    }

    /// The chart this projector rolls up against.
    #[must_use]
    pub fn directory(&self) -> &Arc<D> {
        &self.directory
    }

    /// The store this projector writes.
    #[must_use]
    pub fn balances(&self) -> &Arc<B> {
        &self.balances
    }

    /// Recomputes a leaf from its counted lines without writing.
    ///
    /// # Errors
    ///
    /// Returns storage errors from the line stream, or `AmountOverflow`.
    pub async fn compute_leaf(&self, account: &Account) -> Result<AccountBalance, LedgerError> {
        let mut lines = self.ledger.lines_for_account(account.id, true);
        let mut totals = EntryTotals::default();
        let mut last_entry_id = None;
        while let Some(line) = lines.try_next().await? {
            totals = totals.checked_add(line.debit, line.credit)?;
            last_entry_id = Some(line.entry_id);
        }
        Ok(AccountBalance::from_totals(
            account.id,
            account.class,
            totals.debit,
            totals.credit,
            last_entry_id,
            Utc::now(),
        ))
    }

    /// Rolls a header up from its children's stored balances without writing.
    ///
    /// Children never projected count as zero.
    ///
    /// # Errors
    ///
    /// Returns storage errors from the balance store, or `AmountOverflow`.
    pub async fn compute_header(&self, header: &Account) -> Result<AccountBalance, LedgerError> {
        let now = Utc::now();
        let mut children = Vec::new();
        for child in self.directory.children(header.id) {
            let stored = self
                .balances
                .get(child.id)
                .await?
                .unwrap_or_else(|| AccountBalance::zero(child.id, now));
            children.push(stored);
        }
        rollup(header.id, &children, now)
    }

    async fn compute(&self, account: &Account) -> Result<AccountBalance, LedgerError> {
        if account.is_header {
            self.compute_header(account).await
        } else {
            self.compute_leaf(account).await
        }
    }

    /// Recomputes and stores one account.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` for unknown IDs and storage errors.
    pub async fn project_account(&self, account_id: AccountId) -> Result<AccountBalance, LedgerError> {
        let account = self
            .directory
            .get(account_id)
            .ok_or(LedgerError::AccountNotFound(account_id))?;
        let balance = self.compute(account).await?;
        self.balances.put(balance.clone()).await?;
        debug!(account = %account.code, balance = %balance.balance, "Projected account balance");
        Ok(balance)
    }

    /// Re-projects every ancestor of `account_id`, nearest first.
    ///
    /// # Errors
    ///
    /// Stops at the first failing ancestor.
    pub async fn project_ancestors(&self, account_id: AccountId) -> Result<Vec<AccountBalance>, LedgerError> {
        let mut projected = Vec::new();
        for ancestor in self.directory.ancestors(account_id) {
            projected.push(self.project_account(ancestor.id).await?);
        }
        Ok(projected)
    }

    /// Projects touched accounts, then their ancestors level by level.
    ///
    /// Accounts on the same level are independent and run concurrently. A
    /// header is only projected once every child below it succeeded; otherwise
    /// it is deferred so a stale rollup is never written over a good one.
    pub async fn project_accounts(&self, account_ids: &[AccountId]) -> ProjectionRun {
        let mut run = ProjectionRun::default();
        let mut blocked = HashSet::new();

        self.project_level(account_ids, &mut run, &mut blocked).await;

        let mut levels: BTreeMap<Reverse<usize>, Vec<AccountId>> = BTreeMap::new();
        let mut seen = HashSet::new();
        for &id in account_ids {
            for ancestor in self.directory.ancestors(id) {
                if seen.insert(ancestor.id) {
                    levels
                        .entry(Reverse(self.directory.depth(ancestor.id)))
                        .or_default()
                        .push(ancestor.id);
                }
            }
        }

        for headers in levels.into_values() {
            let (ready, waiting): (Vec<AccountId>, Vec<AccountId>) =
                headers.into_iter().partition(|&header| {
                    !self
                        .directory
                        .children(header)
                        .iter()
                        .any(|child| blocked.contains(&child.id))
                });
            for header in waiting {
                blocked.insert(header);
                run.deferred.push(header);
            }
            self.project_level(&ready, &mut run, &mut blocked).await;
        }
        run
    }

    async fn project_level(
        &self,
        account_ids: &[AccountId],
        run: &mut ProjectionRun,
        blocked: &mut HashSet<AccountId>,
    ) {
        let projections: Vec<_> = account_ids
            .iter()
            .map(|&id| async move { (id, self.project_account(id).await) })
            .collect();
        let results = join_all(projections).await;
        for (id, result) in results {
            match result {
                Ok(balance) => run.projected.push(balance),
                Err(err) => {
                    blocked.insert(id);
                    run.failed.push((id, err));
                }
            }
        }
    }

    /// Rebuilds every balance from the journal.
    ///
    /// Leaves are recomputed first, then headers from the deepest level up.
    /// Cached figures that differ from the recomputed ones are reported as
    /// drift and overwritten. Cancellation is honoured between batches; work
    /// already written stays valid because each figure is a full recompute.
    ///
    /// # Errors
    ///
    /// Returns the first storage error.
    pub async fn rematerialize(&self, cancel: &CancellationToken) -> Result<Rematerialization, LedgerError> {
        let (headers, leaves): (Vec<&Account>, Vec<&Account>) = self
            .directory
            .accounts()
            .into_iter()
            .partition(|account| account.is_header);

        let mut levels: BTreeMap<Reverse<usize>, Vec<&Account>> = BTreeMap::new();
        for header in headers {
            levels
                .entry(Reverse(self.directory.depth(header.id)))
                .or_default()
                .push(header);
        }

        let mut outcome = Rematerialization::default();
        let batches: Vec<Vec<&Account>> = leaves
            .chunks(REMATERIALIZE_BATCH)
            .map(<[&Account]>::to_vec)
            .chain(levels.into_values())
            .collect();
        for batch in batches {
            if cancel.is_cancelled() {
                outcome.interrupted = true;
                info!(
                    accounts = outcome.balances.len(),
                    "Rematerialization interrupted"
                );
                return Ok(outcome);
            }
            let rebuilds: Vec<_> = batch.iter().map(|account| self.rematerialize_one(account)).collect();
            let results = join_all(rebuilds).await;
            for result in results {
                let (balance, warning) = result?;
                outcome.balances.push(balance);
                outcome.warnings.extend(warning);
            }
        }

        info!(
            accounts = outcome.balances.len(),
            drift = outcome.warnings.len(),
            "Rematerialized balances"
        );
        Ok(outcome)
    }

    async fn rematerialize_one(
        &self,
        account: &Account,
    ) -> Result<(AccountBalance, Option<ConsistencyWarning>), LedgerError> {
        let recomputed = self.compute(account).await?;
        let warning = match self.balances.get(account.id).await? {
            Some(cached) if !cached.same_figures(&recomputed) => Some(if account.is_header {
                ConsistencyWarning::HeaderRollupDrift {
                    account_id: account.id,
                    code: account.code.clone(),
                    stored: cached.balance,
                    children_sum: recomputed.balance,
                }
            } else {
                ConsistencyWarning::BalanceDrift {
                    account_id: account.id,
                    code: account.code.clone(),
                    cached: cached.balance,
                    recomputed: recomputed.balance,
                }
            }),
            _ => None,
        };
        self.balances.put(recomputed.clone()).await?;
        Ok((recomputed, warning))
    }

    /// Compares every stored header with the live rollup of its children.
    ///
    /// Reports only; nothing is corrected.
    ///
    /// # Errors
    ///
    /// Returns storage errors.
    pub async fn check_rollups(&self) -> Result<Vec<ConsistencyWarning>, LedgerError> {
        let mut warnings = Vec::new();
        let headers: Vec<&Account> = self
            .directory
            .accounts()
            .into_iter()
            .filter(|account| account.is_header)
            .collect();
        for header in headers {
            let live = self.compute_header(header).await?;
            let stored = self
                .balances
                .get(header.id)
                .await?
                .map_or(Decimal::ZERO, |balance| balance.balance);
            if stored != live.balance {
                warnings.push(ConsistencyWarning::HeaderRollupDrift {
                    account_id: header.id,
                    code: header.code.clone(),
                    stored,
                    children_sum: live.balance,
                });
            }
        }
        Ok(warnings)
    }
}
