//! Tick/lot alignment
//!
//! One rounding rule for every price and size the strategy emits: nearest
//! multiple of the increment, exact half-increments rounded away from zero.

use rust_decimal::{Decimal, RoundingStrategy};

/// Round `value` to the nearest multiple of `increment`.
///
/// Returns `None` for a non-positive increment or on overflow.
pub fn to_nearest(value: Decimal, increment: Decimal) -> Option<Decimal> {
    if increment <= Decimal::ZERO {
        return None;
    }
    let steps = value
        .checked_div(increment)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    steps.checked_mul(increment).map(|v| v.normalize())
}

/// `|target / resting - 1| > tolerance`. A non-positive resting price never
/// counts as within tolerance.
pub fn outside_tolerance(target: Decimal, resting: Decimal, tolerance: Decimal) -> bool {
    if target == resting {
        return false;
    }
    if resting <= Decimal::ZERO {
        return true;
    }
    match target.checked_div(resting) {
        Some(ratio) => (ratio - Decimal::ONE).abs() > tolerance,
        None => true,
    }
}
