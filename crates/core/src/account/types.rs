//! Account classes and the account record held by the directory.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use saldo_shared::types::AccountId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The five account classes of the chart of accounts.
///
/// The set is closed: persisted or configured class names are parsed once at
/// the boundary and every later decision matches on the enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccountClass {
    /// Things the business owns.
    Asset,
    /// Things the business owes.
    Liability,
    /// Owner's residual interest.
    Equity,
    /// Income earned.
    Revenue,
    /// Costs incurred.
    Expense,
}

impl AccountClass {
    /// Every class, in chart order.
    pub const ALL: [Self; 5] = [
        Self::Asset,
        Self::Liability,
        Self::Equity,
        Self::Revenue,
        Self::Expense,
    ];

    /// Which side increases an account of this class.
    #[must_use]
    pub const fn normal_balance(self) -> NormalBalance {
        match self {
            Self::Asset | Self::Expense => NormalBalance::Debit,
            Self::Liability | Self::Equity | Self::Revenue => NormalBalance::Credit,
        }
    }

    /// `+1` for debit-normal classes, `-1` for credit-normal classes.
    #[must_use]
    pub fn normal_sign(self) -> Decimal {
        match self.normal_balance() {
            NormalBalance::Debit => Decimal::ONE,
            NormalBalance::Credit => Decimal::NEGATIVE_ONE,
        }
    }

    /// Upper-case name as persisted.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asset => "ASSET",
            Self::Liability => "LIABILITY",
            Self::Equity => "EQUITY",
            Self::Revenue => "REVENUE",
            Self::Expense => "EXPENSE",
        }
    }
}

impl fmt::Display for AccountClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A class name that is not one of the five account classes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown account class: {0}")]
pub struct UnknownAccountClass(pub String);

impl FromStr for AccountClass {
    type Err = UnknownAccountClass;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ASSET" => Ok(Self::Asset),
            "LIABILITY" => Ok(Self::Liability),
            "EQUITY" => Ok(Self::Equity),
            "REVENUE" => Ok(Self::Revenue),
            "EXPENSE" => Ok(Self::Expense),
            _ => Err(UnknownAccountClass(s.to_string())),
        }
    }
}

/// Debit-normal or credit-normal balance rule.
///
/// - Asset/Expense: balance += debit - credit
/// - Liability/Equity/Revenue: balance += credit - debit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NormalBalance {
    /// Debit-normal accounts (Asset, Expense).
    Debit,
    /// Credit-normal accounts (Liability, Equity, Revenue).
    Credit,
}

impl NormalBalance {
    /// Calculates the balance change for a movement.
    #[must_use]
    pub fn balance_change(self, debit: Decimal, credit: Decimal) -> Decimal {
        match self {
            Self::Debit => debit - credit,
            Self::Credit => credit - debit,
        }
    }
}

/// A node of the chart of accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Account ID.
    pub id: AccountId,
    /// Human-facing code, unique across the chart.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Account class.
    pub class: AccountClass,
    /// Header accounts aggregate children and accept no lines.
    pub is_header: bool,
    /// Retired accounts stay in the chart but accept no new lines.
    pub is_active: bool,
    /// Parent header, `None` for roots.
    pub parent_id: Option<AccountId>,
}

impl Account {
    /// Creates an active leaf account.
    #[must_use]
    pub fn leaf(code: impl Into<String>, name: impl Into<String>, class: AccountClass) -> Self {
        Self {
            id: AccountId::new(),
            code: code.into(),
            name: name.into(),
            class,
            is_header: false,
            is_active: true,
            parent_id: None,
        }
    }

    /// Creates an active header account.
    #[must_use]
    pub fn header(code: impl Into<String>, name: impl Into<String>, class: AccountClass) -> Self {
        Self {
            is_header: true,
            ..Self::leaf(code, name, class)
        }
    }

    /// Places this account under `parent`.
    #[must_use]
    pub fn under(mut self, parent: &Account) -> Self {
        self.parent_id = Some(parent.id);
        self
    }

    /// Marks this account as retired.
    #[must_use]
    pub fn retired(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Whether journal lines may reference this account.
    #[must_use]
    pub fn is_postable(&self) -> bool {
        self.is_active && !self.is_header
    }
}
