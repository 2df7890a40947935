//! Business rule validation for journal entries.

use rust_decimal::Decimal;

use super::entry::JournalLine;
use super::error::LedgerError;
use super::types::EntryTotals;

/// Largest amount one line may carry: `NUMERIC(20,4)`.
pub const MAX_LINE_AMOUNT: Decimal = Decimal::from_parts(0x630F_FFFF, 0x6BC7_5E2D, 0x5, false, 4);

/// Validates one line's amounts.
///
/// # Errors
///
/// - `NegativeAmount` if either side is below zero
/// - `ZeroAmount` if both sides are zero
/// - `InvalidEntryType` if both sides are non-zero
/// - `ExcessivePrecision` if an amount has more than `scale` decimal places
/// - `AmountOutOfRange` if an amount exceeds [`MAX_LINE_AMOUNT`]
pub fn validate_line_amounts(debit: Decimal, credit: Decimal, scale: u32) -> Result<(), LedgerError> {
    if debit < Decimal::ZERO || credit < Decimal::ZERO {
        return Err(LedgerError::NegativeAmount);
    }
    match (debit.is_zero(), credit.is_zero()) {
        (true, true) => return Err(LedgerError::ZeroAmount),
        (false, false) => return Err(LedgerError::InvalidEntryType),
        _ => {}
    }
    let amount = debit.max(credit);
    if amount.normalize().scale() > scale {
        return Err(LedgerError::ExcessivePrecision { amount, scale });
    }
    if amount > MAX_LINE_AMOUNT {
        return Err(LedgerError::AmountOutOfRange {
            amount,
            max: MAX_LINE_AMOUNT,
        });
    }
    Ok(())
}

/// Validates a full set of lines and returns their totals.
///
/// # Errors
///
/// - `InsufficientEntries` with fewer than 2 lines
/// - Any error of [`validate_line_amounts`]
/// - `AmountOverflow` if a sum leaves the `Decimal` range
/// - `UnbalancedEntry` if debits != credits
pub fn validate_lines(lines: &[JournalLine], scale: u32) -> Result<EntryTotals, LedgerError> {
    if lines.len() < 2 {
        return Err(LedgerError::InsufficientEntries);
    }
    for line in lines {
        validate_line_amounts(line.debit, line.credit, scale)?;
    }
    let totals = EntryTotals::of(lines)?;
    ensure_balanced(totals)?;
    Ok(totals)
}

/// Rejects totals whose sides differ.
///
/// # Errors
///
/// Returns `UnbalancedEntry` if debits != credits.
pub fn ensure_balanced(totals: EntryTotals) -> Result<(), LedgerError> {
    if totals.is_balanced() {
        Ok(())
    } else {
        Err(LedgerError::UnbalancedEntry {
            debit: totals.debit,
            credit: totals.credit,
        })
    }
}
