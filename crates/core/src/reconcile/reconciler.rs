//! Periodic sweep that re-derives balances and mirrors from the journal.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use saldo_shared::types::AccountId;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::integrity::{JournalIntegrityReport, check_journal_integrity};
use crate::account::AccountDirectory;
use crate::ledger::{LedgerError, LedgerStore};
use crate::mirror::{MirrorAdapter, MirrorError};
use crate::posting::{PostingEngine, RepairQueue, RepairReason};
use crate::projection::{BalanceProjector, BalanceStore, ConsistencyWarning};

/// Outcome of one [`Reconciler::reconcile`] pass.
#[derive(Debug, Clone)]
pub struct ReconciliationReport {
    /// When the pass started.
    pub started_at: DateTime<Utc>,
    /// When the pass finished or stopped.
    pub finished_at: DateTime<Utc>,
    /// Journal integrity findings.
    pub integrity: JournalIntegrityReport,
    /// Balances recomputed from the journal.
    pub accounts_rematerialized: usize,
    /// Cached balances that differed before they were overwritten.
    pub balance_warnings: Vec<ConsistencyWarning>,
    /// Mirrors compared with their projected balance.
    pub mirrors_checked: usize,
    /// Mirrors rewritten because they drifted.
    pub mirrors_refreshed: usize,
    /// Mirror drift and refresh failures.
    pub mirror_warnings: Vec<ConsistencyWarning>,
    /// Accounts taken off the repair queue.
    pub repairs_drained: usize,
    /// Set when cancellation stopped the pass early.
    pub interrupted: bool,
}

impl ReconciliationReport {
    fn started() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: Utc::now(),
            integrity: JournalIntegrityReport::default(),
            accounts_rematerialized: 0,
            balance_warnings: Vec::new(),
            mirrors_checked: 0,
            mirrors_refreshed: 0,
            mirror_warnings: Vec::new(),
            repairs_drained: 0,
            interrupted: false,
        }
    }

    fn interrupted(mut self) -> Self {
        self.interrupted = true;
        self.finished_at = Utc::now();
        info!("Reconciliation interrupted");
        self
    }

    /// Every finding of the pass.
    pub fn warnings(&self) -> impl Iterator<Item = &ConsistencyWarning> {
        self.integrity
            .warnings
            .iter()
            .chain(&self.balance_warnings)
            .chain(&self.mirror_warnings)
    }

    /// True when a complete pass found nothing to report.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        !self.interrupted && self.warnings().next().is_none()
    }
}

/// Re-derives every balance and mirror from the journal and clears the
/// repair queue.
///
/// A pass is idempotent: every figure is a full recompute, so a pass that
/// overlaps live posting or a second reconciler converges to the same
/// state. The journal itself is only read; drift found there is reported.
pub struct Reconciler<D, L, B> {
    projector: BalanceProjector<D, L, B>,
    ledger: Arc<L>,
    mirrors: Vec<Arc<dyn MirrorAdapter>>,
    repairs: RepairQueue,
}

impl<D, L, B> Reconciler<D, L, B>
where
    D: AccountDirectory,
    L: LedgerStore,
    B: BalanceStore,
{
    /// Creates a reconciler with no mirrors.
    #[must_use]
    pub fn new(directory: Arc<D>, ledger: Arc<L>, balances: Arc<B>, repairs: RepairQueue) -> Self {
        Self {
            projector: BalanceProjector::new(directory, Arc::clone(&ledger), balances),
            ledger,
            mirrors: Vec::new(),
            repairs,
        }
    }

    /// Reconciles the stores, mirrors and repair queue of a posting engine.
    #[must_use]
    pub fn for_engine(engine: &PostingEngine<D, L, B>) -> Self {
        Self {
            projector: engine.projector().clone(),
            ledger: Arc::clone(engine.ledger()),
            mirrors: engine.mirrors().to_vec(),
            repairs: engine.repair_queue().clone(),
        }
    }

    /// Registers a mirror to validate.
    #[must_use]
    pub fn with_mirror(mut self, mirror: Arc<dyn MirrorAdapter>) -> Self {
        self.mirrors.push(mirror);
        self
    }

    /// Runs one pass.
    ///
    /// 1. Journal integrity check.
    /// 2. Rematerialize every leaf, then every header bottom-up.
    /// 3. Validate every mirror and refresh the ones that drifted.
    /// 4. Clear repair queue entries recorded before the pass started.
    ///
    /// Cancellation stops the pass at the next account boundary; the queue
    /// is left untouched in that case.
    ///
    /// # Errors
    ///
    /// Returns ledger or balance storage errors. Mirror failures are reported
    /// as warnings instead.
    pub async fn reconcile(&self, cancel: &CancellationToken) -> Result<ReconciliationReport, LedgerError> {
        let mut report = ReconciliationReport::started();
        let queued = self.repairs.pending();

        report.integrity = check_journal_integrity(self.ledger.as_ref(), cancel).await?;
        if report.integrity.interrupted {
            return Ok(report.interrupted());
        }

        let rebuilt = self.projector.rematerialize(cancel).await?;
        report.accounts_rematerialized = rebuilt.balances.len();
        for warning in &rebuilt.warnings {
            warning.log();
        }
        report.balance_warnings = rebuilt.warnings;
        if rebuilt.interrupted {
            return Ok(report.interrupted());
        }

        let mut failed = HashSet::new();
        for mirror in &self.mirrors {
            if !self.sweep_mirror(mirror.as_ref(), cancel, &mut report, &mut failed).await {
                return Ok(report.interrupted());
            }
        }

        for (account_id, reason) in queued {
            if !failed.contains(&account_id) && self.repairs.resolve(account_id, &reason) {
                report.repairs_drained += 1;
            }
        }

        report.finished_at = Utc::now();
        info!(
            entries = report.integrity.entries_checked,
            accounts = report.accounts_rematerialized,
            balance_drift = report.balance_warnings.len(),
            mirrors_checked = report.mirrors_checked,
            mirrors_refreshed = report.mirrors_refreshed,
            repairs_drained = report.repairs_drained,
            "Reconciliation complete"
        );
        Ok(report)
    }

    /// Returns `false` when cancelled.
    async fn sweep_mirror(
        &self,
        mirror: &dyn MirrorAdapter,
        cancel: &CancellationToken,
        report: &mut ReconciliationReport,
        failed: &mut HashSet<AccountId>,
    ) -> bool {
        let accounts = match mirror.mirrored_accounts().await {
            Ok(accounts) => accounts,
            Err(err) => {
                error!(kind = mirror.kind(), error = %err, "Failed to list mirrored accounts");
                return true;
            }
        };

        for account_id in accounts {
            if cancel.is_cancelled() {
                return false;
            }
            let check = match mirror.inspect(account_id).await {
                Ok(check) => check,
                Err(err) => {
                    self.mirror_failed(mirror.kind(), account_id, &err, report, failed);
                    continue;
                }
            };
            report.mirrors_checked += 1;
            let Some(drift) = check.warning() else {
                continue;
            };
            drift.log();
            report.mirror_warnings.push(drift);
            match mirror.refresh(account_id).await {
                Ok(_) => report.mirrors_refreshed += 1,
                Err(err) => self.mirror_failed(mirror.kind(), account_id, &err, report, failed),
            }
        }
        true
    }

    fn mirror_failed(
        &self,
        kind: &'static str,
        account_id: AccountId,
        err: &MirrorError,
        report: &mut ReconciliationReport,
        failed: &mut HashSet<AccountId>,
    ) {
        self.repairs.record(
            account_id,
            RepairReason::Mirror {
                kind,
                reason: err.to_string(),
            },
        );
        failed.insert(account_id);
        let warning = ConsistencyWarning::MirrorRefreshFailed {
            account_id,
            reason: err.to_string(),
        };
        warning.log();
        report.mirror_warnings.push(warning);
    }

    /// Runs a pass every `interval` until `cancel` fires.
    ///
    /// The first pass starts immediately. A failed pass is logged and the
    /// next tick retries.
    pub async fn run_periodic(&self, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = interval.as_secs(), "Starting periodic reconciliation");

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    match self.reconcile(&cancel).await {
                        Ok(report) if report.is_clean() => {}
                        Ok(report) => warn!(
                            issues = report.warnings().count(),
                            interrupted = report.interrupted,
                            "Reconciliation found inconsistencies"
                        ),
                        Err(err) => error!(error = %err, "Reconciliation failed"),
                    }
                }
            }
        }
        info!("Periodic reconciliation stopped");
    }
}
