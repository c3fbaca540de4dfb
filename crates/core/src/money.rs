//! Decimal money helpers.
//!
//! Amounts are rounded to two places at computation boundaries only, so a
//! window sum never accumulates intermediate rounding.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::types::Money;

/// Number of fractional digits kept for stored amounts.
pub const MONEY_SCALE: u32 = 2;

/// Round an amount to two places, half away from zero.
pub fn round_money(amount: Money) -> Money {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// `amount × percent / 100`, rounded.
pub fn percent_of(amount: Money, percent: Decimal) -> Money {
    round_money(amount * percent / Decimal::ONE_HUNDRED)
}

/// Sum an iterator of amounts and round the total once.
pub fn sum_money<I>(amounts: I) -> Money
where
    I: IntoIterator<Item = Money>,
{
    round_money(amounts.into_iter().sum())
}
