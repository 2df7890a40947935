//! Posting engine behaviour over in-memory stores.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::future::join_all;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use saldo_shared::types::{AccountId, JournalEntryId};
use tokio_util::sync::CancellationToken;

use super::*;
use crate::account::{AccountClass, AccountDirectory};
use crate::fiscal::{AccountingPeriod, PeriodStatus};
use crate::fixtures::{self, Harness, date, payment, sale};
use crate::ledger::{EntryStatus, ErrorKind, IdempotencyKey, JournalEntryProposal, LedgerError, LedgerStore};
use crate::memory::{MemoryBalanceStore, MemoryLedgerStore};
use crate::mirror::{CashBankStore, MirrorAdapter, MirrorBalance, MirrorCheck, MirrorError};
use crate::projection::{AccountBalance, BalanceReader, BalanceStore, ConsistencyWarning};

#[tokio::test]
async fn test_sale_posting_updates_leaves_and_headers() {
    let h = Harness::new().await;

    let outcome = h.engine.post(sale("INV-001")).await.unwrap();

    assert_eq!(outcome.disposition, Disposition::Created);
    assert_eq!(outcome.entry.status, EntryStatus::Posted);
    assert_eq!(outcome.entry.entry_number, "JE-2026/10/000001");
    assert_eq!(outcome.entry.total_debit, dec!(2220000));
    assert!(outcome.warnings.is_empty());

    assert_eq!(h.balance("1103").await, dec!(2220000));
    assert_eq!(h.balance("4101").await, dec!(2000000));
    assert_eq!(h.balance("2102").await, dec!(220000));
    assert_eq!(h.balance("1100").await, dec!(2220000));
    assert_eq!(h.balance("1000").await, dec!(2220000));
    assert_eq!(h.balance("4000").await, dec!(2000000));
    assert_eq!(h.balance("2000").await, dec!(220000));
}

#[tokio::test]
async fn test_payment_refreshes_cash_mirror() {
    let h = Harness::new().await;
    h.engine.post(sale("INV-001")).await.unwrap();

    let outcome = h.engine.post(payment("INV-001")).await.unwrap();

    assert_eq!(h.balance("1103").await, Decimal::ZERO);
    assert_eq!(h.balance("1101").await, dec!(2220000));
    assert_eq!(h.balance("1100").await, dec!(2220000));

    assert_eq!(outcome.mirrors.len(), 1);
    assert_eq!(outcome.mirrors[0].balance, dec!(2220000));
    let register = h.registers.find(h.cash_register).await.unwrap().unwrap();
    assert_eq!(register.balance, dec!(2220000));
    assert!(h.mirror.validate(h.id("1101")).await.unwrap());
}

#[tokio::test]
async fn test_unbalanced_proposal_writes_nothing() {
    let h = Harness::new().await;
    let proposal = JournalEntryProposal::new(IdempotencyKey::new("sale", "INV-9", "invoice"), date(), "Bad sale")
        .debit("1103", dec!(2220000))
        .credit("4101", dec!(2000000))
        .credit("2102", dec!(200000));

    let err = h.engine.post(proposal).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Unbalanced);
    assert!(h.ledger.is_empty().await);
    assert_eq!(h.balance("1103").await, Decimal::ZERO);
    assert!(h.balances.get(h.id("4101")).await.unwrap().is_none());
}

#[tokio::test]
async fn test_repost_returns_existing_entry() {
    let h = Harness::new().await;

    let first = h.engine.post(sale("INV-001")).await.unwrap();
    let second = h.engine.post(sale("INV-001")).await.unwrap();

    assert_eq!(second.disposition, Disposition::AlreadyPosted);
    assert_eq!(second.entry.id, first.entry.id);
    assert!(second.balances.is_empty());
    assert_eq!(h.ledger.len().await, 1);
    assert_eq!(h.balance("1103").await, dec!(2220000));
}

#[tokio::test]
async fn test_key_is_case_insensitive() {
    let h = Harness::new().await;
    let first = h.engine.post(sale("INV-001")).await.unwrap();

    let mut again = sale("INV-001");
    again.key = IdempotencyKey::new("Sale ", "INV-001", "INVOICE");
    let second = h.engine.post(again).await.unwrap();

    assert_eq!(second.entry.id, first.entry.id);
}

#[tokio::test]
async fn test_concurrent_posts_of_one_key_commit_once() {
    let h = Harness::new().await;
    let engine = Arc::new(h.engine);

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.post(sale("INV-RACE")).await })
        })
        .collect();
    let outcomes: Vec<PostOutcome> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    let id = outcomes[0].entry.id;
    assert!(outcomes.iter().all(|o| o.entry.id == id));
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| o.disposition == Disposition::Created)
            .count(),
        1
    );
    assert_eq!(h.ledger.len().await, 1);
    assert_eq!(engine.balance("1103").await.unwrap().balance, dec!(2220000));
}

#[tokio::test]
async fn test_header_posting_rejected() {
    let h = Harness::new().await;
    let proposal = JournalEntryProposal::new(IdempotencyKey::new("manual", "1", "adjustment"), date(), "Header")
        .debit("1100", dec!(100))
        .credit("3101", dec!(100));

    let err = h.engine.post(proposal).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(matches!(err, LedgerError::HeaderAccountPosting(code) if code == "1100"));
    assert!(h.ledger.is_empty().await);
}

#[tokio::test]
async fn test_retired_and_unknown_accounts_rejected() {
    let h = Harness::new().await;
    let retired = JournalEntryProposal::new(IdempotencyKey::new("manual", "1", "x"), date(), "Retired")
        .debit("1199", dec!(10))
        .credit("3101", dec!(10));
    let unknown = JournalEntryProposal::new(IdempotencyKey::new("manual", "2", "x"), date(), "Unknown")
        .debit("1999", dec!(10))
        .credit("3101", dec!(10));

    assert!(matches!(
        h.engine.post(retired).await,
        Err(LedgerError::AccountInactive(code)) if code == "1199"
    ));
    assert!(matches!(
        h.engine.post(unknown).await,
        Err(LedgerError::UnknownAccountCode(code)) if code == "1999"
    ));
}

#[tokio::test]
async fn test_malformed_proposals_rejected() {
    let h = Harness::new().await;
    let key = || IdempotencyKey::new("manual", "1", "x");

    let single = JournalEntryProposal::new(key(), date(), "One line").debit("1101", dec!(10));
    let precise = JournalEntryProposal::new(key(), date(), "Too precise")
        .debit("1101", dec!(10.005))
        .credit("3101", dec!(10.005));
    let blank_key = JournalEntryProposal::new(IdempotencyKey::new("", "1", "x"), date(), "No key")
        .debit("1101", dec!(10))
        .credit("3101", dec!(10));

    assert!(matches!(h.engine.post(single).await, Err(LedgerError::InsufficientEntries)));
    assert!(matches!(
        h.engine.post(precise).await,
        Err(LedgerError::ExcessivePrecision { scale: 2, .. })
    ));
    assert!(matches!(
        h.engine.post(blank_key).await,
        Err(LedgerError::InvalidIdempotencyKey("source_type"))
    ));
    assert!(h.ledger.is_empty().await);
}

#[tokio::test]
async fn test_void_reverses_balances_and_frees_key() {
    let h = Harness::new().await;
    let posted = h.engine.post(sale("INV-001")).await.unwrap().entry;

    let voided = h.engine.void(posted.id, "Wrong customer", date()).await.unwrap();

    assert_eq!(voided.disposition, Disposition::Created);
    assert_eq!(voided.original.status, EntryStatus::Void);
    assert_eq!(voided.original.reversed_by, Some(voided.reversal.id));
    assert_eq!(voided.reversal.reverses, Some(posted.id));
    assert_eq!(voided.reversal.entry_number, format!("REV-{}", posted.entry_number));
    assert_eq!(h.balance("1103").await, Decimal::ZERO);
    assert_eq!(h.balance("4101").await, Decimal::ZERO);
    assert_eq!(h.balance("1000").await, Decimal::ZERO);

    // Both entries keep counting: the debit and credit totals double up.
    let receivable = h.engine.balance("1103").await.unwrap();
    assert_eq!(receivable.debit_total, dec!(2220000));
    assert_eq!(receivable.credit_total, dec!(2220000));

    let reposted = h.engine.post(sale("INV-001")).await.unwrap();
    assert_eq!(reposted.disposition, Disposition::Created);
    assert_ne!(reposted.entry.id, posted.id);
    assert_eq!(h.balance("1103").await, dec!(2220000));
}

#[tokio::test]
async fn test_void_twice_returns_existing_reversal() {
    let h = Harness::new().await;
    let posted = h.engine.post(sale("INV-001")).await.unwrap().entry;

    let first = h.engine.void(posted.id, "Duplicate", date()).await.unwrap();
    let second = h.engine.void(posted.id, "Duplicate", date()).await.unwrap();

    assert_eq!(second.disposition, Disposition::AlreadyPosted);
    assert_eq!(second.reversal.id, first.reversal.id);
    assert_eq!(h.ledger.len().await, 2);
}

#[tokio::test]
async fn test_void_guards() {
    let h = Harness::new().await;
    let posted = h.engine.post(sale("INV-001")).await.unwrap().entry;
    let draft = h.engine.draft(payment("INV-001")).await.unwrap();

    assert!(matches!(
        h.engine.void(posted.id, "  ", date()).await,
        Err(LedgerError::EmptyVoidReason)
    ));
    assert!(matches!(
        h.engine.void(draft.id, "Oops", date()).await,
        Err(LedgerError::CannotVoidDraft)
    ));

    let reversal = h.engine.void(posted.id, "Oops", date()).await.unwrap().reversal;
    let err = h.engine.void(reversal.id, "Undo", date()).await.unwrap_err();
    assert!(matches!(err, LedgerError::CannotVoidReversal(_)));
    assert_eq!(err.kind(), ErrorKind::State);

    assert!(matches!(
        h.engine.void(JournalEntryId::new(), "x", date()).await,
        Err(LedgerError::EntryNotFound(_))
    ));
}

#[tokio::test]
async fn test_draft_is_invisible_until_posted() {
    let h = Harness::new().await;

    let draft = h.engine.draft(sale("INV-001")).await.unwrap();
    assert_eq!(draft.status, EntryStatus::Draft);
    assert!(draft.posted_at.is_none());
    assert_eq!(h.balance("1103").await, Decimal::ZERO);
    assert!(
        h.ledger
            .find_by_idempotency_key(&draft.key)
            .await
            .unwrap()
            .is_none()
    );

    let posted = h.engine.post_draft(draft.id).await.unwrap();
    assert_eq!(posted.disposition, Disposition::Created);
    assert_eq!(posted.entry.id, draft.id);
    assert_eq!(posted.entry.status, EntryStatus::Posted);
    assert_eq!(h.balance("1103").await, dec!(2220000));

    let again = h.engine.post_draft(draft.id).await.unwrap();
    assert_eq!(again.disposition, Disposition::AlreadyPosted);

    let repost = h.engine.post(sale("INV-001")).await.unwrap();
    assert_eq!(repost.entry.id, draft.id);
}

#[tokio::test]
async fn test_post_draft_with_taken_key_returns_posted_entry() {
    let h = Harness::new().await;
    let draft = h.engine.draft(sale("INV-001")).await.unwrap();
    let posted = h.engine.post(sale("INV-001")).await.unwrap().entry;

    let outcome = h.engine.post_draft(draft.id).await.unwrap();

    assert_eq!(outcome.disposition, Disposition::AlreadyPosted);
    assert_eq!(outcome.entry.id, posted.id);
    assert_eq!(h.engine.entry(draft.id).await.unwrap().status, EntryStatus::Draft);
    assert_eq!(h.balance("1103").await, dec!(2220000));
}

#[tokio::test]
async fn test_read_accessors() {
    let h = Harness::new().await;
    h.engine.post(sale("INV-001")).await.unwrap();

    assert_eq!(h.engine.display_balance("2102").await.unwrap(), dec!(220000));
    assert_eq!(h.engine.display_balance("4000").await.unwrap(), dec!(2000000));
    assert_eq!(h.balance("5101").await, Decimal::ZERO);
    assert!(matches!(
        h.engine.balance("1199").await,
        Err(LedgerError::AccountCodeNotFound(_))
    ));

    let receivable = h.engine.balance_of(h.id("1103")).await.unwrap().unwrap();
    assert_eq!(receivable.balance, dec!(2220000));
    assert!(h.engine.balance_of(h.id("3101")).await.unwrap().is_none());
    assert_eq!(h.engine.balances().await.unwrap().len(), 9);

    let trial = h.engine.trial_balance().await.unwrap();
    assert!(trial.is_balanced());
    assert_eq!(trial.total_debit, dec!(2220000));
    assert_eq!(trial.lines.len(), 3);
    let revenue = trial.class_totals().unwrap()[&AccountClass::Revenue];
    assert_eq!(revenue.credit, dec!(2000000));
}

/// Fails `put` for one account, as if its row were locked.
struct FlakyBalanceStore {
    inner: MemoryBalanceStore,
    failing: AccountId,
}

impl BalanceReader for FlakyBalanceStore {
    async fn get(&self, account_id: AccountId) -> Result<Option<AccountBalance>, LedgerError> {
        self.inner.get(account_id).await
    }

    async fn all(&self) -> Result<Vec<AccountBalance>, LedgerError> {
        self.inner.all().await
    }
}

impl BalanceStore for FlakyBalanceStore {
    async fn put(&self, balance: AccountBalance) -> Result<(), LedgerError> {
        if balance.account_id == self.failing {
            return Err(LedgerError::Storage("lock timeout".into()));
        }
        self.inner.put(balance).await
    }
}

#[tokio::test]
async fn test_projection_failure_keeps_entry_and_queues_repair() {
    let chart = Arc::new(fixtures::chart());
    let receivable = chart.lookup("1103").unwrap().id;
    let current_assets = chart.lookup("1100").unwrap().id;
    let ledger = Arc::new(MemoryLedgerStore::new());
    let balances = Arc::new(FlakyBalanceStore {
        inner: MemoryBalanceStore::new(),
        failing: receivable,
    });
    let engine = PostingEngine::new(chart, Arc::clone(&ledger), balances, PostingRules::default());

    let outcome = engine.post(sale("INV-001")).await.unwrap();

    assert_eq!(outcome.disposition, Disposition::Created);
    assert_eq!(ledger.len().await, 1);
    assert!(engine.repair_queue().contains(receivable));
    assert!(engine.repair_queue().contains(current_assets));
    assert!(outcome
        .warnings
        .iter()
        .any(|w| matches!(w, ConsistencyWarning::ProjectionFailed { account_id, .. } if *account_id == receivable)));
    // Unaffected branches still project.
    assert_eq!(engine.balance("4101").await.unwrap().balance, dec!(2000000));
}

/// Mirror that refuses every write.
struct BrokenMirror {
    account: AccountId,
}

#[async_trait]
impl MirrorAdapter for BrokenMirror {
    fn kind(&self) -> &'static str {
        "broken"
    }

    async fn is_mirrored(&self, account_id: AccountId) -> Result<bool, MirrorError> {
        Ok(account_id == self.account)
    }

    async fn mirrored_accounts(&self) -> Result<Vec<AccountId>, MirrorError> {
        Ok(vec![self.account])
    }

    async fn refresh(&self, _account_id: AccountId) -> Result<MirrorBalance, MirrorError> {
        Err(MirrorError::Write("table is read-only".into()))
    }

    async fn inspect(&self, _account_id: AccountId) -> Result<MirrorCheck, MirrorError> {
        Err(MirrorError::Write("table is read-only".into()))
    }
}

#[tokio::test]
async fn test_mirror_failure_keeps_entry_and_queues_repair() {
    let chart = Arc::new(fixtures::chart());
    let cash = chart.lookup("1101").unwrap().id;
    let ledger = Arc::new(MemoryLedgerStore::new());
    let engine = PostingEngine::new(
        chart,
        Arc::clone(&ledger),
        Arc::new(MemoryBalanceStore::new()),
        PostingRules::default(),
    )
    .with_mirror(Arc::new(BrokenMirror { account: cash }));

    engine.post(sale("INV-001")).await.unwrap();
    let outcome = engine.post(payment("INV-001")).await.unwrap();

    assert_eq!(outcome.disposition, Disposition::Created);
    assert_eq!(engine.balance("1101").await.unwrap().balance, dec!(2220000));
    assert!(matches!(
        engine.repair_queue().pending()[0],
        (account, RepairReason::Mirror { kind: "broken", .. }) if account == cash
    ));
    assert!(matches!(
        outcome.warnings[0],
        ConsistencyWarning::MirrorRefreshFailed { .. }
    ));
}

#[tokio::test]
async fn test_rematerialize_matches_incremental_projection() {
    let h = Harness::new().await;
    h.engine.post(sale("INV-001")).await.unwrap();
    h.engine.post(payment("INV-001")).await.unwrap();
    let incremental = h.balances.all().await.unwrap();

    let rebuilt = h
        .engine
        .projector()
        .rematerialize(&CancellationToken::new())
        .await
        .unwrap();

    assert!(!rebuilt.interrupted);
    assert!(rebuilt.warnings.is_empty(), "{:?}", rebuilt.warnings);
    let after = h.balances.all().await.unwrap();
    assert_eq!(after.len(), h.chart.len());
    for before in &incremental {
        let now = after.iter().find(|b| b.account_id == before.account_id).unwrap();
        assert!(before.same_figures(now), "{before:?} != {now:?}");
    }
}

#[tokio::test]
async fn test_amounts_beyond_column_range_are_rejected() {
    let h = Harness::new().await;
    let key = IdempotencyKey::new("import", "huge", "legacy");
    let proposal = JournalEntryProposal::new(key.clone(), date(), "Oversized import")
        .debit("1101", Decimal::MAX)
        .debit("1102", Decimal::MAX)
        .credit("4101", Decimal::MAX)
        .credit("2102", Decimal::MAX);

    let err = h.engine.post(proposal).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(matches!(err, LedgerError::AmountOutOfRange { .. }));
    assert!(h.ledger.find_by_idempotency_key(&key).await.unwrap().is_none());
    assert!(h.ledger.is_empty().await);
}

#[tokio::test]
async fn test_largest_line_amount_posts() {
    let h = Harness::new().await;
    let max = crate::ledger::validation::MAX_LINE_AMOUNT.trunc();
    let proposal = JournalEntryProposal::new(IdempotencyKey::new("import", "max", "legacy"), date(), "Largest import")
        .debit("1102", max)
        .credit("3101", max);

    let outcome = h.engine.post(proposal).await.unwrap();

    assert_eq!(outcome.entry.total_debit, max);
    assert_eq!(h.balance("1102").await, max);
    assert_eq!(h.balance("3101").await, max);
}

fn day(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, month, day).unwrap()
}

async fn close_period(h: &Harness, name: &str, start: NaiveDate, end: NaiveDate, status: PeriodStatus) {
    let period = AccountingPeriod::new(name, start, end).unwrap();
    let id = period.id;
    h.periods.insert(period).await;
    h.periods.set_status(id, PeriodStatus::Closed).await.unwrap();
    if status == PeriodStatus::Locked {
        h.periods.set_status(id, PeriodStatus::Locked).await.unwrap();
    }
}

#[tokio::test]
async fn test_entry_dated_in_closed_period_is_rejected() {
    let h = Harness::new().await;
    close_period(&h, "September 2026", day(9, 1), day(9, 30), PeriodStatus::Closed).await;
    let mut late = sale("INV-009");
    late.entry_date = day(9, 30);

    let err = h.engine.post(late).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.error_code(), "PERIOD_CLOSED");
    assert!(matches!(err, LedgerError::PeriodClosed { ref period, .. } if period == "September 2026"));
    assert!(h.ledger.is_empty().await);
    assert_eq!(h.balance("1103").await, Decimal::ZERO);

    // Dates outside every period stay open.
    h.engine.post(sale("INV-010")).await.unwrap();
    let mut early = sale("INV-011");
    early.entry_date = day(8, 31);
    h.engine.post(early).await.unwrap();
    assert_eq!(h.balance("1103").await, dec!(4440000));
}

#[tokio::test]
async fn test_locked_period_rejects_drafts() {
    let h = Harness::new().await;
    close_period(&h, "Q3 2026", day(7, 1), day(9, 30), PeriodStatus::Locked).await;
    let mut proposal = sale("INV-012");
    proposal.entry_date = day(8, 15);

    assert!(matches!(
        h.engine.draft(proposal).await,
        Err(LedgerError::PeriodClosed { .. })
    ));
    assert!(h.ledger.is_empty().await);
}

#[tokio::test]
async fn test_retry_after_close_returns_posted_entry() {
    let h = Harness::new().await;
    let first = h.engine.post(sale("INV-013")).await.unwrap();
    close_period(&h, "October 2026", day(10, 1), day(10, 31), PeriodStatus::Closed).await;

    let retry = h.engine.post(sale("INV-013")).await.unwrap();

    assert_eq!(retry.disposition, Disposition::AlreadyPosted);
    assert_eq!(retry.entry.id, first.entry.id);
}

#[tokio::test]
async fn test_draft_cannot_post_once_its_period_closes() {
    let h = Harness::new().await;
    let draft = h.engine.draft(sale("INV-014")).await.unwrap();
    let october = AccountingPeriod::new("October 2026", day(10, 1), day(10, 31)).unwrap();
    let october_id = october.id;
    h.periods.insert(october).await;
    h.periods.set_status(october_id, PeriodStatus::Closed).await.unwrap();

    assert!(matches!(
        h.engine.post_draft(draft.id).await,
        Err(LedgerError::PeriodClosed { .. })
    ));
    assert_eq!(h.engine.entry(draft.id).await.unwrap().status, EntryStatus::Draft);
    assert_eq!(h.balance("1103").await, Decimal::ZERO);

    h.periods.set_status(october_id, PeriodStatus::Open).await.unwrap();
    let posted = h.engine.post_draft(draft.id).await.unwrap();
    assert_eq!(posted.disposition, Disposition::Created);
    assert_eq!(h.balance("1103").await, dec!(2220000));
}

#[tokio::test]
async fn test_void_reversal_date_must_be_open() {
    let h = Harness::new().await;
    let posted = h.engine.post(sale("INV-015")).await.unwrap();
    close_period(&h, "November 2026", day(11, 1), day(11, 30), PeriodStatus::Closed).await;

    assert!(matches!(
        h.engine.void(posted.entry.id, "wrong customer", day(11, 2)).await,
        Err(LedgerError::PeriodClosed { .. })
    ));
    assert_eq!(h.engine.entry(posted.entry.id).await.unwrap().status, EntryStatus::Posted);
    assert_eq!(h.balance("1103").await, dec!(2220000));

    let voided = h.engine.void(posted.entry.id, "wrong customer", day(12, 1)).await.unwrap();
    assert_eq!(voided.reversal.entry_date, day(12, 1));
    assert_eq!(h.balance("1103").await, Decimal::ZERO);
}
