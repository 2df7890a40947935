//! Property-based tests for balance projection.
//!
//! - Leaf balances equal the signed sum of their lines.
//! - Header balances equal the sum of their children's balances, also
//!   under a mixed-class header.
//! - Rematerializing from scratch reproduces the incremental figures.
//! - The order in which entries are posted does not change any figure.

use std::collections::HashMap;

use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::account::AccountDirectory;
use crate::fixtures::{Harness, date, mixed_chart};
use crate::ledger::{IdempotencyKey, JournalEntryProposal};

const LEAVES: &[&str] = &["1101", "1102", "1103", "2101", "2102", "3101", "4101", "5101"];
const MIXED_LEAVES: &[&str] = &["1101", "1103", "2102", "3101", "3901", "3902", "4101", "5101"];

/// A two-line posting: debit one leaf, credit another.
#[derive(Debug, Clone)]
struct Movement {
    debit: &'static str,
    credit: &'static str,
    amount: Decimal,
}

/// Strategy to generate a movement between two distinct leaves of `leaves`.
fn movement_among(leaves: &'static [&'static str]) -> impl Strategy<Value = Movement> {
    (0..leaves.len(), 1..leaves.len(), 1i64..10_000_000i64).prop_map(move |(from, offset, cents)| Movement {
        debit: leaves[from],
        credit: leaves[(from + offset) % leaves.len()],
        amount: Decimal::new(cents, 2),
    })
}

fn movement() -> impl Strategy<Value = Movement> {
    movement_among(LEAVES)
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

async fn post_all(movements: &[(usize, Movement)]) -> Harness {
    post_all_on(Harness::new().await, movements).await
}

async fn post_all_on(h: Harness, movements: &[(usize, Movement)]) -> Harness {
    for (n, m) in movements {
        let proposal = JournalEntryProposal::new(IdempotencyKey::new("prop", n, "movement"), date(), "movement")
            .debit(m.debit, m.amount)
            .credit(m.credit, m.amount);
        h.engine.post(proposal).await.unwrap();
    }
    h
}

async fn figures(h: &Harness) -> HashMap<String, (Decimal, Decimal, Decimal)> {
    let mut figures = HashMap::new();
    for account in h.chart.accounts() {
        let b = h.engine.projector().balances().get(account.id).await.unwrap();
        let b = b.unwrap_or_else(|| AccountBalance::zero(account.id, chrono::Utc::now()));
        figures.insert(account.code.clone(), (b.debit_total, b.credit_total, b.balance));
    }
    figures
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Each leaf holds normal_sign * (Σdebit - Σcredit) over its lines.
    #[test]
    fn prop_leaf_balance_is_signed_line_sum(movements in prop::collection::vec(movement(), 1..12)) {
        let numbered: Vec<(usize, Movement)> = movements.into_iter().enumerate().collect();
        runtime().block_on(async {
            let h = post_all(&numbered).await;
            for &code in LEAVES {
                let account = h.chart.lookup(code).unwrap();
                let net: Decimal = numbered
                    .iter()
                    .map(|(_, m)| {
                        let debit = if m.debit == code { m.amount } else { Decimal::ZERO };
                        let credit = if m.credit == code { m.amount } else { Decimal::ZERO };
                        debit - credit
                    })
                    .sum();
                prop_assert_eq!(h.balance(code).await, account.class.normal_sign() * net);
            }
            Ok::<(), TestCaseError>(())
        })?;
    }

    /// No header drifts from its children, and a rebuild reports no drift.
    #[test]
    fn prop_rollups_and_rebuild_agree(movements in prop::collection::vec(movement(), 1..12)) {
        let numbered: Vec<(usize, Movement)> = movements.into_iter().enumerate().collect();
        runtime().block_on(async {
            let h = post_all(&numbered).await;
            let before = figures(&h).await;

            let drift = h.engine.projector().check_rollups().await.unwrap();
            prop_assert!(drift.is_empty(), "{:?}", drift);

            let rebuilt = h.engine.projector().rematerialize(&CancellationToken::new()).await.unwrap();
            prop_assert!(rebuilt.warnings.is_empty(), "{:?}", rebuilt.warnings);
            prop_assert_eq!(figures(&h).await, before);
            Ok::<(), TestCaseError>(())
        })?;
    }

    /// Every header's stored balance is the plain sum of its children's
    /// stored balances, checked against the store rather than the projector.
    #[test]
    fn prop_header_is_sum_of_children(movements in prop::collection::vec(movement_among(MIXED_LEAVES), 1..12)) {
        let numbered: Vec<(usize, Movement)> = movements.into_iter().enumerate().collect();
        runtime().block_on(async {
            let h = post_all_on(Harness::with_chart(mixed_chart()).await, &numbered).await;
            let rebuilt = h.engine.projector().rematerialize(&CancellationToken::new()).await.unwrap();
            prop_assert!(rebuilt.warnings.is_empty(), "{:?}", rebuilt.warnings);

            let stored = figures(&h).await;
            for header in h.chart.accounts().into_iter().filter(|account| account.is_header) {
                let children_sum: Decimal = h
                    .chart
                    .children(header.id)
                    .iter()
                    .map(|child| stored[&child.code].2)
                    .sum();
                prop_assert_eq!(stored[&header.code].2, children_sum, "header {}", header.code);
            }
            Ok::<(), TestCaseError>(())
        })?;
    }

    /// Posting the same entries in reverse order yields identical balances.
    #[test]
    fn prop_projection_is_order_independent(movements in prop::collection::vec(movement(), 1..12)) {
        let forward: Vec<(usize, Movement)> = movements.into_iter().enumerate().collect();
        let mut backward = forward.clone();
        backward.reverse();
        runtime().block_on(async {
            let a = post_all(&forward).await;
            let b = post_all(&backward).await;
            prop_assert_eq!(figures(&a).await, figures(&b).await);
            Ok::<(), TestCaseError>(())
        })?;
    }
}

#[test]
fn test_leaf_set_is_postable() {
    let chart = crate::fixtures::chart();
    for &code in LEAVES {
        assert!(chart.resolve_postable(code).is_ok(), "{code}");
    }
    let mixed = mixed_chart();
    for &code in MIXED_LEAVES {
        assert!(mixed.resolve_postable(code).is_ok(), "{code}");
    }
}
