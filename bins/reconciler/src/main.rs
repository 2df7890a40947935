//! Saldo reconciler
//!
//! Re-derives every balance and cash/bank register from the journal, either
//! once (`SALDO__RECONCILIATION__RUN_ONCE=true`) or on a fixed interval until
//! interrupted.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use saldo_core::account::validate_hierarchy;
use saldo_core::mirror::CashBankMirror;
use saldo_core::posting::RepairQueue;
use saldo_core::reconcile::Reconciler;
use saldo_db::{AccountRepository, CashBankRepository, PgBalanceStore, PgLedgerStore, connect};
use saldo_shared::AppConfig;
use saldo_shared::config::LoggingConfig;

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "saldo=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("failed to load configuration")?;
    init_tracing(&config.logging);

    let db = connect(&config.database).await?;

    let chart = Arc::new(AccountRepository::new(db.clone()).load_chart().await?);
    let hierarchy = validate_hierarchy(chart.as_ref(), config.ledger.max_account_depth);
    for issue in &hierarchy.issues {
        if issue.is_error() {
            error!(account = issue.code(), ?issue, "Chart of accounts error");
        } else {
            warn!(account = issue.code(), ?issue, "Chart of accounts warning");
        }
    }
    if !hierarchy.is_valid() {
        anyhow::bail!("chart of accounts has {} structural error(s)", hierarchy.errors().count());
    }

    let ledger = Arc::new(PgLedgerStore::new(db.clone()));
    let balances = Arc::new(PgBalanceStore::new(db.clone()));
    let registers = Arc::new(CashBankRepository::new(db));
    let mirror = Arc::new(CashBankMirror::new(
        Arc::clone(&chart),
        registers,
        Arc::clone(&balances),
    ));
    let reconciler = Reconciler::new(chart, ledger, balances, RepairQueue::new()).with_mirror(mirror);

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown requested");
                cancel.cancel();
            }
        });
    }

    if config.reconciliation.run_once {
        let report = reconciler.reconcile(&cancel).await?;
        for warning in report.warnings() {
            warn!(code = warning.code(), "{warning}");
        }
        if !report.is_clean() {
            anyhow::bail!("reconciliation found {} issue(s)", report.warnings().count());
        }
        return Ok(());
    }

    reconciler
        .run_periodic(Duration::from_secs(config.reconciliation.interval_secs), cancel)
        .await;
    Ok(())
}
