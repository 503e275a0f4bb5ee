//! Fixed-point currency arithmetic
//!
//! All amounts are `rust_decimal::Decimal` values carried at two decimal
//! places. Nothing in the ledgers goes through floating point.

use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

/// Number of decimal places amounts are stored with
pub const CURRENCY_SCALE: u32 = 2;

/// Largest amount a ledger column holds: NUMERIC(12, 2), 9 999 999 999.99
pub fn max_amount() -> Decimal {
    Decimal::new(999_999_999_999, 2)
}

/// A price, line or order total past [`max_amount`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Amount exceeds the maximum of 9999999999.99")]
pub struct AmountOverflow;

/// Round an amount to currency precision (half away from zero)
pub fn round_currency(amount: Decimal) -> Decimal {
    let mut rounded = amount.round_dp_with_strategy(CURRENCY_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(CURRENCY_SCALE);
    rounded
}

/// True when the amount carries no more than two significant decimal places
pub fn has_currency_precision(amount: Decimal) -> bool {
    amount.normalize().scale() <= CURRENCY_SCALE
}

/// Round to currency precision and reject anything past [`max_amount`]
pub fn bounded_amount(amount: Decimal) -> Result<Decimal, AmountOverflow> {
    if amount > max_amount() {
        return Err(AmountOverflow);
    }
    let rounded = round_currency(amount);
    if rounded > max_amount() {
        return Err(AmountOverflow);
    }
    Ok(rounded)
}

/// Price of `quantity` units at `unit_price`
pub fn line_total(quantity: i32, unit_price: Decimal) -> Result<Decimal, AmountOverflow> {
    let total = Decimal::from(quantity)
        .checked_mul(unit_price)
        .ok_or(AmountOverflow)?;
    bounded_amount(total)
}

/// Sum amounts that end up in a single ledger column
pub fn checked_sum<I>(amounts: I) -> Result<Decimal, AmountOverflow>
where
    I: IntoIterator<Item = Decimal>,
{
    let total = amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, a| acc.checked_add(a))
        .ok_or(AmountOverflow)?;
    bounded_amount(total)
}

/// Sum a sequence of amounts at currency precision, saturating on overflow.
/// Used for report aggregates that are never stored.
pub fn sum_amounts<I>(amounts: I) -> Decimal
where
    I: IntoIterator<Item = Decimal>,
{
    round_currency(
        amounts
            .into_iter()
            .fold(Decimal::ZERO, |acc, a| acc.saturating_add(a)),
    )
}
