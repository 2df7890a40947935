use rust_decimal_macros::dec;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::fixtures::{Harness, date, mixed_chart, payment, sale};
use crate::ledger::{IdempotencyKey, JournalEntryProposal};

#[tokio::test]
async fn test_check_rollups_reports_without_correcting() {
    let h = Harness::new().await;
    h.engine.post(sale("INV-001")).await.unwrap();
    let current_assets = h.id("1100");
    let mut tampered = h.balances.get(current_assets).await.unwrap().unwrap();
    tampered.balance = dec!(1);
    h.balances.put(tampered).await.unwrap();

    let warnings = h.engine.projector().check_rollups().await.unwrap();

    assert_eq!(warnings.len(), 1);
    assert!(matches!(
        &warnings[0],
        ConsistencyWarning::HeaderRollupDrift { code, stored, children_sum, .. }
            if code == "1100" && *stored == dec!(1) && *children_sum == dec!(2220000)
    ));
    assert_eq!(h.balance("1100").await, dec!(1));
}

#[tokio::test]
async fn test_rematerialize_repairs_leaf_drift() {
    let h = Harness::new().await;
    h.engine.post(sale("INV-001")).await.unwrap();
    h.engine.post(payment("INV-001")).await.unwrap();
    let cash = h.id("1101");
    let mut tampered = h.balances.get(cash).await.unwrap().unwrap();
    tampered.balance = dec!(999);
    h.balances.put(tampered).await.unwrap();

    let outcome = h
        .engine
        .projector()
        .rematerialize(&CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.warnings.iter().any(|w| matches!(
        w,
        ConsistencyWarning::BalanceDrift { code, cached, recomputed, .. }
            if code == "1101" && *cached == dec!(999) && *recomputed == dec!(2220000)
    )));
    assert_eq!(h.balance("1101").await, dec!(2220000));
    assert!(h.engine.projector().check_rollups().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rematerialize_honours_cancellation() {
    let h = Harness::new().await;
    h.engine.post(sale("INV-001")).await.unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = h.engine.projector().rematerialize(&cancel).await.unwrap();

    assert!(outcome.interrupted);
    assert!(outcome.balances.is_empty());
}

#[tokio::test]
async fn test_project_ancestors_nearest_first() {
    let h = Harness::new().await;
    h.engine.post(sale("INV-001")).await.unwrap();

    let projected = h
        .engine
        .projector()
        .project_ancestors(h.id("1103"))
        .await
        .unwrap();

    let ids: Vec<_> = projected.iter().map(|b| b.account_id).collect();
    assert_eq!(ids, vec![h.id("1100"), h.id("1000")]);
    assert!(projected.iter().all(|b| b.balance == dec!(2220000)));
}

#[tokio::test]
async fn test_project_unknown_account() {
    let h = Harness::new().await;
    let missing = saldo_shared::types::AccountId::new();
    let err = h.engine.projector().project_account(missing).await.unwrap_err();
    assert!(matches!(err, crate::ledger::LedgerError::AccountNotFound(id) if id == missing));
}

#[tokio::test]
async fn test_leaf_tracks_last_entry() {
    let h = Harness::new().await;
    h.engine.post(sale("INV-001")).await.unwrap();
    let paid = h.engine.post(payment("INV-001")).await.unwrap();

    let receivable = h.balances.get(h.id("1103")).await.unwrap().unwrap();
    assert_eq!(receivable.last_entry_id, Some(paid.entry.id));
    assert_eq!(receivable.debit_total, dec!(2220000));
    assert_eq!(receivable.credit_total, dec!(2220000));
}

#[tokio::test]
async fn test_mixed_class_header_is_sum_of_children() {
    let h = Harness::with_chart(mixed_chart()).await;
    let income = JournalEntryProposal::new(IdempotencyKey::new("service", "1", "invoice"), date(), "Service fee")
        .debit("1101", dec!(1000))
        .credit("3901", dec!(1000));
    let cost = JournalEntryProposal::new(IdempotencyKey::new("service", "1", "cost"), date(), "Subcontractor")
        .debit("3902", dec!(400))
        .credit("1101", dec!(400));
    h.engine.post(income).await.unwrap();
    h.engine.post(cost).await.unwrap();

    let income = h.balance("3901").await;
    let cost = h.balance("3902").await;
    assert_eq!(income, dec!(1000));
    assert_eq!(cost, dec!(400));
    assert_eq!(h.balance("3900").await, income + cost);
    assert_eq!(h.balance("3000").await, h.balance("3900").await);

    assert!(h.engine.projector().check_rollups().await.unwrap().is_empty());
    let rebuilt = h
        .engine
        .projector()
        .rematerialize(&CancellationToken::new())
        .await
        .unwrap();
    assert!(rebuilt.warnings.is_empty(), "{:?}", rebuilt.warnings);
    assert_eq!(h.balance("3900").await, dec!(1400));
}
