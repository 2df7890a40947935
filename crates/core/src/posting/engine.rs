//! The posting engine: the only path by which entries enter the ledger.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use saldo_shared::config::LedgerConfig;
use saldo_shared::types::{AccountId, JournalEntryId, JournalLineId};
use tracing::{info, warn};

use super::repair::{RepairQueue, RepairReason};
use crate::account::AccountDirectory;
use crate::fiscal::{PeriodCalendar, ensure_date_open};
use crate::ledger::numbering::entry_number;
use crate::ledger::validation::validate_lines;
use crate::ledger::{
    EntryStatus, IdempotencyKey, JournalEntry, JournalEntryProposal, JournalLine, LedgerError,
    LedgerStore, NewJournalEntry, ReversalInput, ReversalService,
};
use crate::mirror::{MirrorAdapter, MirrorBalance, MirrorError};
use crate::projection::{
    AccountBalance, BalanceProjector, BalanceReader, BalanceStore, ConsistencyWarning, TrialBalance,
};

/// Formatting and precision rules applied to every entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingRules {
    /// Maximum decimal places of a line amount.
    pub amount_scale: u32,
    /// Entry number prefix.
    pub entry_number_prefix: String,
}

impl Default for PostingRules {
    fn default() -> Self {
        Self {
            amount_scale: 2,
            entry_number_prefix: "JE".to_string(),
        }
    }
}

impl From<&LedgerConfig> for PostingRules {
    fn from(config: &LedgerConfig) -> Self {
        Self {
            amount_scale: config.amount_scale,
            entry_number_prefix: config.entry_number_prefix.clone(),
        }
    }
}

/// Whether a call wrote a new entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// A new entry was committed.
    Created,
    /// The key was already posted; nothing was written.
    AlreadyPosted,
}

/// Derived state refreshed after a commit.
#[derive(Debug, Default)]
struct Propagation {
    balances: Vec<AccountBalance>,
    mirrors: Vec<MirrorBalance>,
    warnings: Vec<ConsistencyWarning>,
}

/// Result of [`PostingEngine::post`] and [`PostingEngine::post_draft`].
#[derive(Debug)]
pub struct PostOutcome {
    /// The posted entry.
    pub entry: JournalEntry,
    /// Whether this call wrote it.
    pub disposition: Disposition,
    /// Balances re-projected after the commit.
    pub balances: Vec<AccountBalance>,
    /// Mirrors refreshed after the commit.
    pub mirrors: Vec<MirrorBalance>,
    /// Projection or mirror failures; the entry stays posted regardless.
    pub warnings: Vec<ConsistencyWarning>,
}

impl PostOutcome {
    fn created(entry: JournalEntry, propagation: Propagation) -> Self {
        Self {
            entry,
            disposition: Disposition::Created,
            balances: propagation.balances,
            mirrors: propagation.mirrors,
            warnings: propagation.warnings,
        }
    }

    fn already_posted(entry: JournalEntry) -> Self {
        Self {
            entry,
            disposition: Disposition::AlreadyPosted,
            balances: Vec::new(),
            mirrors: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

/// Result of [`PostingEngine::void`].
#[derive(Debug)]
pub struct VoidOutcome {
    /// The voided entry.
    pub original: JournalEntry,
    /// Its reversal.
    pub reversal: JournalEntry,
    /// `AlreadyPosted` when the entry had been voided before.
    pub disposition: Disposition,
    /// Balances re-projected after the commit.
    pub balances: Vec<AccountBalance>,
    /// Mirrors refreshed after the commit.
    pub mirrors: Vec<MirrorBalance>,
    /// Projection or mirror failures.
    pub warnings: Vec<ConsistencyWarning>,
}

/// Validates proposals, appends them atomically and propagates the result to
/// balances and mirrors.
///
/// Once the ledger accepts an entry the call succeeds. Projection and mirror
/// failures after that point are logged, returned as warnings and queued on
/// the [`RepairQueue`]; they never undo the entry.
pub struct PostingEngine<D, L, B> {
    directory: Arc<D>,
    ledger: Arc<L>,
    projector: BalanceProjector<D, L, B>,
    mirrors: Vec<Arc<dyn MirrorAdapter>>,
    periods: Option<Arc<dyn PeriodCalendar>>,
    repairs: RepairQueue,
    rules: PostingRules,
}

impl<D, L, B> PostingEngine<D, L, B>
where
    D: AccountDirectory,
    L: LedgerStore,
    B: BalanceStore,
{
    /// Creates an engine with no mirrors.
    #[must_use]
    pub fn new(directory: Arc<D>, ledger: Arc<L>, balances: Arc<B>, rules: PostingRules) -> Self {
        let projector = BalanceProjector::new(Arc::clone(&directory), Arc::clone(&ledger), balances);
        Self {
            directory,
            ledger,
            projector,
            mirrors: Vec::new(),
            periods: None,
            repairs: RepairQueue::new(),
            rules,
        }
    }

    /// Registers a mirror refreshed after every commit.
    #[must_use]
    pub fn with_mirror(mut self, mirror: Arc<dyn MirrorAdapter>) -> Self {
        self.mirrors.push(mirror);
        self
    }

    /// Rejects entries dated inside a closed or locked period.
    ///
    /// Without a calendar every date is open.
    #[must_use]
    pub fn with_period_calendar(mut self, periods: Arc<dyn PeriodCalendar>) -> Self {
        self.periods = Some(periods);
        self
    }

    /// Shares an existing repair queue.
    #[must_use]
    pub fn with_repair_queue(mut self, repairs: RepairQueue) -> Self {
        self.repairs = repairs;
        self
    }

    /// The chart of accounts.
    #[must_use]
    pub fn directory(&self) -> &Arc<D> {
        &self.directory
    }

    /// The journal.
    #[must_use]
    pub fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }

    /// The balance projector.
    #[must_use]
    pub fn projector(&self) -> &BalanceProjector<D, L, B> {
        &self.projector
    }

    /// Registered mirrors.
    #[must_use]
    pub fn mirrors(&self) -> &[Arc<dyn MirrorAdapter>] {
        &self.mirrors
    }

    /// Accounts awaiting repair.
    #[must_use]
    pub fn repair_queue(&self) -> &RepairQueue {
        &self.repairs
    }

    /// Posts a proposal.
    ///
    /// Re-posting a key that is already `POSTED` returns the existing entry
    /// with [`Disposition::AlreadyPosted`] and writes nothing, including when
    /// two callers race on the same key.
    ///
    /// # Errors
    ///
    /// Returns validation, unbalanced or storage errors, and `PeriodClosed`
    /// when the entry date falls in a closed period. Nothing is written when
    /// an error is returned.
    pub async fn post(&self, proposal: JournalEntryProposal) -> Result<PostOutcome, LedgerError> {
        let entry_id = JournalEntryId::new();
        let lines = self.resolve_lines(entry_id, &proposal)?;

        if let Some(existing) = self.ledger.find_by_idempotency_key(&proposal.key).await? {
            return Ok(self.already_posted(existing, &lines));
        }
        self.ensure_period_open(proposal.entry_date).await?;

        let sequence = self.ledger.next_sequence().await?;
        let new_entry = self.build_entry(entry_id, proposal, lines.clone(), sequence, EntryStatus::Posted);
        let entry = match self.ledger.append(new_entry).await {
            Ok(entry) => entry,
            Err(LedgerError::DuplicatePosting { key }) => {
                let existing = self.existing_for(key).await?;
                return Ok(self.already_posted(existing, &lines));
            }
            Err(err) => return Err(err),
        };

        info!(
            entry_id = %entry.id,
            entry_number = %entry.entry_number,
            key = %entry.key,
            amount = %entry.total_debit,
            "Posted journal entry"
        );
        let propagation = self.propagate(&entry).await;
        Ok(PostOutcome::created(entry, propagation))
    }

    /// Stores a proposal as a `DRAFT`, invisible to balances.
    ///
    /// # Errors
    ///
    /// Returns validation, unbalanced, `PeriodClosed` or storage errors.
    pub async fn draft(&self, proposal: JournalEntryProposal) -> Result<JournalEntry, LedgerError> {
        let entry_id = JournalEntryId::new();
        let lines = self.resolve_lines(entry_id, &proposal)?;
        self.ensure_period_open(proposal.entry_date).await?;
        let sequence = self.ledger.next_sequence().await?;
        let entry = self
            .ledger
            .append(self.build_entry(entry_id, proposal, lines, sequence, EntryStatus::Draft))
            .await?;
        info!(entry_id = %entry.id, entry_number = %entry.entry_number, "Saved draft journal entry");
        Ok(entry)
    }

    /// Posts a draft.
    ///
    /// Accounts are re-checked because they may have been retired since the
    /// draft was saved. Posting an already-posted draft is a no-op. When
    /// another entry already holds the draft's key, that entry is returned
    /// with [`Disposition::AlreadyPosted`] and the draft stays a draft.
    ///
    /// # Errors
    ///
    /// - `EntryNotFound` for unknown IDs
    /// - `CannotModifyVoided` for voided entries
    /// - `PeriodClosed` when the draft's date was closed since it was saved
    /// - validation and storage errors
    pub async fn post_draft(&self, entry_id: JournalEntryId) -> Result<PostOutcome, LedgerError> {
        let draft = self
            .ledger
            .find_entry(entry_id)
            .await?
            .ok_or(LedgerError::EntryNotFound(entry_id))?;
        match draft.status {
            EntryStatus::Draft => {}
            EntryStatus::Posted => return Ok(PostOutcome::already_posted(draft)),
            EntryStatus::Void => return Err(LedgerError::CannotModifyVoided),
        }

        for line in &draft.lines {
            let account = self
                .directory
                .get(line.account_id)
                .ok_or(LedgerError::AccountNotFound(line.account_id))?;
            if account.is_header {
                return Err(LedgerError::HeaderAccountPosting(account.code.clone()));
            }
            if !account.is_active {
                return Err(LedgerError::AccountInactive(account.code.clone()));
            }
        }
        validate_lines(&draft.lines, self.rules.amount_scale)?;

        if let Some(existing) = self.ledger.find_by_idempotency_key(&draft.key).await? {
            return Ok(self.already_posted(existing, &draft.lines));
        }
        self.ensure_period_open(draft.entry_date).await?;
        let entry = match self.ledger.mark_posted(entry_id, Utc::now()).await {
            Ok(entry) => entry,
            Err(LedgerError::DuplicatePosting { key }) => {
                let existing = self.existing_for(key).await?;
                return Ok(self.already_posted(existing, &draft.lines));
            }
            Err(err) => return Err(err),
        };
        info!(entry_id = %entry.id, entry_number = %entry.entry_number, "Posted draft journal entry");
        let propagation = self.propagate(&entry).await;
        Ok(PostOutcome::created(entry, propagation))
    }

    /// Voids a posted entry by appending its reversal.
    ///
    /// The original is marked `VOID` and a `POSTED` reversal keyed
    /// `REVERSAL:{id}:VOID` is appended in the same commit. Lines of both keep
    /// counting, so the account balances net back to their prior values.
    /// Voiding twice returns the existing reversal.
    ///
    /// # Errors
    ///
    /// - `EmptyVoidReason` when `reason` is blank
    /// - `EntryNotFound`, `CannotVoidDraft` or `CannotVoidReversal`
    /// - `PeriodClosed` when `entry_date` falls in a closed period
    /// - storage errors
    pub async fn void(
        &self,
        entry_id: JournalEntryId,
        reason: &str,
        entry_date: NaiveDate,
    ) -> Result<VoidOutcome, LedgerError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(LedgerError::EmptyVoidReason);
        }
        let original = self
            .ledger
            .find_entry(entry_id)
            .await?
            .ok_or(LedgerError::EntryNotFound(entry_id))?;
        match original.status {
            EntryStatus::Posted => {}
            EntryStatus::Draft => return Err(LedgerError::CannotVoidDraft),
            EntryStatus::Void => return self.already_voided(original).await,
        }
        if original.is_reversal() {
            return Err(LedgerError::CannotVoidReversal(original.entry_number));
        }
        self.ensure_period_open(entry_date).await?;

        let sequence = self.ledger.next_sequence().await?;
        let reversal = ReversalService::create_reversing_entry(&ReversalInput {
            original: &original,
            sequence,
            entry_date,
            reason,
            posted_at: Utc::now(),
        });
        let voided = match self.ledger.void(entry_id, reason.to_string(), reversal).await {
            Ok(voided) => voided,
            Err(LedgerError::CannotModifyVoided | LedgerError::DuplicatePosting { .. }) => {
                let current = self
                    .ledger
                    .find_entry(entry_id)
                    .await?
                    .ok_or(LedgerError::EntryNotFound(entry_id))?;
                return self.already_voided(current).await;
            }
            Err(err) => return Err(err),
        };

        info!(
            entry_id = %voided.original.id,
            entry_number = %voided.original.entry_number,
            reversal = %voided.reversal.entry_number,
            reason,
            "Voided journal entry"
        );
        let propagation = self.propagate(&voided.reversal).await;
        Ok(VoidOutcome {
            original: voided.original,
            reversal: voided.reversal,
            disposition: Disposition::Created,
            balances: propagation.balances,
            mirrors: propagation.mirrors,
            warnings: propagation.warnings,
        })
    }

    /// Finds an entry by ID.
    ///
    /// # Errors
    ///
    /// Returns `EntryNotFound` or storage errors.
    pub async fn entry(&self, entry_id: JournalEntryId) -> Result<JournalEntry, LedgerError> {
        self.ledger
            .find_entry(entry_id)
            .await?
            .ok_or(LedgerError::EntryNotFound(entry_id))
    }

    /// Projected balance of an account, `None` if never projected.
    ///
    /// # Errors
    ///
    /// Returns storage errors.
    pub async fn balance_of(&self, account_id: AccountId) -> Result<Option<AccountBalance>, LedgerError> {
        self.projector.balances().get(account_id).await
    }

    /// Every projected balance.
    ///
    /// # Errors
    ///
    /// Returns storage errors.
    pub async fn balances(&self) -> Result<Vec<AccountBalance>, LedgerError> {
        self.projector.balances().all().await
    }

    /// Projected balance of an account by code, zero if never projected.
    ///
    /// # Errors
    ///
    /// Returns `AccountCodeNotFound` or storage errors.
    pub async fn balance(&self, account_code: &str) -> Result<AccountBalance, LedgerError> {
        let account = self.directory.lookup(account_code)?;
        Ok(self
            .projector
            .balances()
            .get(account.id)
            .await?
            .unwrap_or_else(|| AccountBalance::zero(account.id, Utc::now())))
    }

    /// Report-facing balance: magnitudes for credit-normal accounts.
    ///
    /// # Errors
    ///
    /// Returns `AccountCodeNotFound` or storage errors.
    pub async fn display_balance(&self, account_code: &str) -> Result<Decimal, LedgerError> {
        let account = self.directory.lookup(account_code)?;
        let balance = self.balance(account_code).await?;
        Ok(balance.display_amount(account.class))
    }

    /// Trial balance over every projected leaf.
    ///
    /// # Errors
    ///
    /// Returns storage errors.
    pub async fn trial_balance(&self) -> Result<TrialBalance, LedgerError> {
        let balances = self.balances().await?;
        TrialBalance::build(self.directory.as_ref(), &balances)
    }

    async fn ensure_period_open(&self, date: NaiveDate) -> Result<(), LedgerError> {
        match &self.periods {
            Some(periods) => ensure_date_open(periods.as_ref(), date).await,
            None => Ok(()),
        }
    }

    fn resolve_lines(
        &self,
        entry_id: JournalEntryId,
        proposal: &JournalEntryProposal,
    ) -> Result<Vec<JournalLine>, LedgerError> {
        proposal.key.validate()?;
        if proposal.lines.len() < 2 {
            return Err(LedgerError::InsufficientEntries);
        }
        let lines = proposal
            .lines
            .iter()
            .enumerate()
            .map(|(index, line)| {
                let account = self.directory.resolve_postable(&line.account_code)?;
                let line_number = u32::try_from(index + 1)
                    .map_err(|_| LedgerError::Internal("too many lines".into()))?;
                Ok(JournalLine {
                    id: JournalLineId::new(),
                    entry_id,
                    account_id: account.id,
                    line_number,
                    debit: line.debit,
                    credit: line.credit,
                    description: line.description.clone(),
                })
            })
            .collect::<Result<Vec<_>, LedgerError>>()?;
        validate_lines(&lines, self.rules.amount_scale)?;
        Ok(lines)
    }

    fn build_entry(
        &self,
        id: JournalEntryId,
        proposal: JournalEntryProposal,
        lines: Vec<JournalLine>,
        sequence: i64,
        status: EntryStatus,
    ) -> NewJournalEntry {
        NewJournalEntry {
            id,
            entry_number: entry_number(&self.rules.entry_number_prefix, proposal.entry_date, sequence),
            sequence,
            entry_date: proposal.entry_date,
            description: proposal.description,
            key: proposal.key,
            status,
            posted_at: (status == EntryStatus::Posted).then(Utc::now),
            reverses: None,
            lines,
        }
    }

    fn already_posted(&self, existing: JournalEntry, proposed: &[JournalLine]) -> PostOutcome {
        let same_lines = existing.lines.len() == proposed.len()
            && existing.lines.iter().zip(proposed).all(|(a, b)| {
                a.account_id == b.account_id && a.debit == b.debit && a.credit == b.credit
            });
        if !same_lines {
            warn!(
                entry_id = %existing.id,
                key = %existing.key,
                "Re-posted key carries different lines; keeping the posted entry"
            );
        }
        info!(entry_id = %existing.id, key = %existing.key, "Idempotent re-post");
        PostOutcome::already_posted(existing)
    }

    async fn existing_for(&self, key: IdempotencyKey) -> Result<JournalEntry, LedgerError> {
        match self.ledger.find_by_idempotency_key(&key).await? {
            Some(existing) => Ok(existing),
            None => Err(LedgerError::DuplicatePosting { key }),
        }
    }

    async fn already_voided(&self, original: JournalEntry) -> Result<VoidOutcome, LedgerError> {
        let reversal = self
            .ledger
            .find_by_idempotency_key(&IdempotencyKey::reversal_of(original.id))
            .await?
            .ok_or_else(|| {
                LedgerError::Internal(format!("voided entry {} has no reversal", original.entry_number))
            })?;
        Ok(VoidOutcome {
            original,
            reversal,
            disposition: Disposition::AlreadyPosted,
            balances: Vec::new(),
            mirrors: Vec::new(),
            warnings: Vec::new(),
        })
    }

    async fn propagate(&self, entry: &JournalEntry) -> Propagation {
        let accounts = entry.account_ids();
        let run = self.projector.project_accounts(&accounts).await;
        let mut propagation = Propagation::default();

        for (account_id, err) in &run.failed {
            self.projection_failed(*account_id, err.to_string(), &mut propagation.warnings);
        }
        for account_id in &run.deferred {
            self.projection_failed(
                *account_id,
                "a child account failed to project".to_string(),
                &mut propagation.warnings,
            );
        }

        let projected: HashSet<AccountId> = run.projected.iter().map(|b| b.account_id).collect();
        let refreshable: Vec<AccountId> = accounts.into_iter().filter(|id| projected.contains(id)).collect();
        for account_id in refreshable {
            for mirror in &self.mirrors {
                let refreshed = match mirror.is_mirrored(account_id).await {
                    Ok(false) => continue,
                    Ok(true) => mirror.refresh(account_id).await,
                    Err(err) => Err(err),
                };
                match refreshed {
                    Ok(balance) => propagation.mirrors.push(balance),
                    Err(err) => self.mirror_failed(account_id, mirror.kind(), &err, &mut propagation.warnings),
                }
            }
        }

        propagation.balances = run.projected;
        propagation
    }

    fn projection_failed(&self, account_id: AccountId, reason: String, warnings: &mut Vec<ConsistencyWarning>) {
        self.repairs.record(account_id, RepairReason::Projection(reason.clone()));
        let warning = ConsistencyWarning::ProjectionFailed { account_id, reason };
        warning.log();
        warnings.push(warning);
    }

    fn mirror_failed(
        &self,
        account_id: AccountId,
        kind: &'static str,
        err: &MirrorError,
        warnings: &mut Vec<ConsistencyWarning>,
    ) {
        self.repairs.record(
            account_id,
            RepairReason::Mirror {
                kind,
                reason: err.to_string(),
            },
        );
        let warning = ConsistencyWarning::MirrorRefreshFailed {
            account_id,
            reason: err.to_string(),
        };
        warning.log();
        warnings.push(warning);
    }
}
