//! Shared test fixtures: a small trading-company chart and an engine over
//! in-memory stores.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use saldo_shared::types::{AccountId, CashBankId};

use crate::account::{Account, AccountClass, AccountDirectory, ChartOfAccounts};
use crate::ledger::{IdempotencyKey, JournalEntryProposal};
use crate::memory::{MemoryBalanceStore, MemoryCashBankStore, MemoryLedgerStore, MemoryPeriodCalendar};
use crate::mirror::{CashBank, CashBankMirror};
use crate::posting::{PostingEngine, PostingRules};

pub type Engine = PostingEngine<ChartOfAccounts, MemoryLedgerStore, MemoryBalanceStore>;
pub type Mirror = CashBankMirror<ChartOfAccounts, MemoryCashBankStore, MemoryBalanceStore>;

/// ```text
/// 1000 Assets                 2000 Liabilities          3000 Equity
///   1100 Current Assets         2100 Current Liab.        3101 Owner Capital
///     1101 Cash                   2101 Accounts Payable  4000 Revenue
///     1102 Bank                   2102 VAT Output          4101 Sales Revenue
///     1103 Accounts Receivable                          5000 Expenses
///     1199 Old Petty Cash (retired)                       5101 Operating Expenses
/// ```
pub fn chart() -> ChartOfAccounts {
    let assets = Account::header("1000", "Assets", AccountClass::Asset);
    let current = Account::header("1100", "Current Assets", AccountClass::Asset).under(&assets);
    let liabilities = Account::header("2000", "Liabilities", AccountClass::Liability);
    let current_liabilities =
        Account::header("2100", "Current Liabilities", AccountClass::Liability).under(&liabilities);
    let equity = Account::header("3000", "Equity", AccountClass::Equity);
    let revenue = Account::header("4000", "Revenue", AccountClass::Revenue);
    let expenses = Account::header("5000", "Expenses", AccountClass::Expense);

    let leaves = vec![
        Account::leaf("1101", "Cash", AccountClass::Asset).under(&current),
        Account::leaf("1102", "Bank", AccountClass::Asset).under(&current),
        Account::leaf("1103", "Accounts Receivable", AccountClass::Asset).under(&current),
        Account::leaf("1199", "Old Petty Cash", AccountClass::Asset)
            .under(&current)
            .retired(),
        Account::leaf("2101", "Accounts Payable", AccountClass::Liability).under(&current_liabilities),
        Account::leaf("2102", "VAT Output", AccountClass::Liability).under(&current_liabilities),
        Account::leaf("3101", "Owner Capital", AccountClass::Equity).under(&equity),
        Account::leaf("4101", "Sales Revenue", AccountClass::Revenue).under(&revenue),
        Account::leaf("5101", "Operating Expenses", AccountClass::Expense).under(&expenses),
    ];

    let mut accounts = vec![
        assets,
        current,
        liabilities,
        current_liabilities,
        equity,
        revenue,
        expenses,
    ];
    accounts.extend(leaves);
    match ChartOfAccounts::new(accounts) {
        Ok(chart) => chart,
        Err(err) => panic!("fixture chart is invalid: {err}"),
    }
}

/// [`chart`] plus a mixed-class header under 3000 Equity:
///
/// ```text
/// 3900 Current Year Result (EQUITY header)
///   3901 Service Income    (REVENUE)
///   3902 Cost of Services  (EXPENSE)
/// ```
pub fn mixed_chart() -> ChartOfAccounts {
    let base = chart();
    let mut accounts: Vec<Account> = base.accounts().into_iter().cloned().collect();
    let Some(equity) = base.find_by_code("3000") else {
        panic!("fixture chart has no 3000 Equity");
    };
    let result = Account::header("3900", "Current Year Result", AccountClass::Equity).under(equity);
    accounts.push(Account::leaf("3901", "Service Income", AccountClass::Revenue).under(&result));
    accounts.push(Account::leaf("3902", "Cost of Services", AccountClass::Expense).under(&result));
    accounts.push(result);
    match ChartOfAccounts::new(accounts) {
        Ok(chart) => chart,
        Err(err) => panic!("mixed fixture chart is invalid: {err}"),
    }
}

pub fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
}

/// Engine, stores and a cash register linked to 1101 Cash. No period is
/// defined, so every date is open.
pub struct Harness {
    pub engine: Engine,
    pub chart: Arc<ChartOfAccounts>,
    pub ledger: Arc<MemoryLedgerStore>,
    pub balances: Arc<MemoryBalanceStore>,
    pub registers: Arc<MemoryCashBankStore>,
    pub periods: Arc<MemoryPeriodCalendar>,
    pub mirror: Arc<Mirror>,
    pub cash_register: CashBankId,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_chart(chart()).await
    }

    pub async fn with_chart(chart: ChartOfAccounts) -> Self {
        let chart = Arc::new(chart);
        let ledger = Arc::new(MemoryLedgerStore::new());
        let balances = Arc::new(MemoryBalanceStore::new());
        let registers = Arc::new(MemoryCashBankStore::new());
        let periods = Arc::new(MemoryPeriodCalendar::new());
        let mirror = Arc::new(CashBankMirror::new(
            Arc::clone(&chart),
            Arc::clone(&registers),
            Arc::clone(&balances),
        ));
        let engine = PostingEngine::new(
            Arc::clone(&chart),
            Arc::clone(&ledger),
            Arc::clone(&balances),
            PostingRules::default(),
        )
        .with_mirror(mirror.clone())
        .with_period_calendar(periods.clone());

        let register = CashBank::new("CASH-01", "Front desk cash");
        let cash_register = register.id;
        registers.insert(register).await;
        let cash = chart.lookup("1101").unwrap().id;
        engine.projector().project_account(cash).await.unwrap();
        mirror.link(cash_register, "1101").await.unwrap();

        Self {
            engine,
            chart,
            ledger,
            balances,
            registers,
            periods,
            mirror,
            cash_register,
        }
    }

    pub fn id(&self, code: &str) -> AccountId {
        self.chart.find_by_code(code).unwrap().id
    }

    pub async fn balance(&self, code: &str) -> Decimal {
        self.engine.balance(code).await.unwrap().balance
    }
}

/// Credit sale of 2,000,000 plus 11% VAT.
pub fn sale(invoice: &str) -> JournalEntryProposal {
    JournalEntryProposal::new(IdempotencyKey::new("sale", invoice, "invoice"), date(), "Credit sale")
        .debit("1103", Decimal::from(2_220_000))
        .credit("4101", Decimal::from(2_000_000))
        .credit("2102", Decimal::from(220_000))
}

/// Customer settles the sale in cash.
pub fn payment(invoice: &str) -> JournalEntryProposal {
    JournalEntryProposal::new(IdempotencyKey::new("payment", invoice, "receipt"), date(), "Customer payment")
        .debit("1101", Decimal::from(2_220_000))
        .credit("1103", Decimal::from(2_220_000))
}
