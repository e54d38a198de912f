//! Price ladder generation
//!
//! Buys start one tick under the bid, sells one tick over the ask. Each
//! deeper rung is the previous raw price compounded by `1 + rung_spacing`
//! (divided for buys, multiplied for sells) and then aligned to the tick.
//! Rung `i` quotes `base_size * i`, aligned to the lot.

use rust_decimal::Decimal;
use thiserror::Error;

use super::decimal::to_nearest;
use crate::exchange::types::{MarketSnapshot, Position, Side, TargetOrder};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LadderError {
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
    #[error("price/size arithmetic overflowed on {0} rung {1}")]
    Overflow(Side, usize),
}

/// Depth, sizing and inventory limits for the ladder
#[derive(Debug, Clone, PartialEq)]
pub struct LadderLimits {
    /// Size of the first rung; rung `i` quotes `base_size * i`
    pub base_size: Decimal,
    pub buy_rungs: usize,
    pub sell_rungs: usize,
    /// Relative distance between rungs. `None` compounds by the tick size
    /// itself (`1 + price_increment`).
    pub rung_spacing: Option<Decimal>,
    /// Buys are suppressed at or above this net position
    pub max_long_position: Decimal,
    /// Sells are suppressed at or below this net position
    pub max_short_position: Decimal,
}

impl Default for LadderLimits {
    fn default() -> Self {
        Self {
            base_size: Decimal::new(3, 4),
            buy_rungs: 2,
            sell_rungs: 4,
            rung_spacing: None,
            max_long_position: Decimal::new(2, 3),
            max_short_position: Decimal::new(-2, 3),
        }
    }
}

/// Target orders for one cycle, nearest-to-touch first on each side
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ladder {
    pub buys: Vec<TargetOrder>,
    pub sells: Vec<TargetOrder>,
    /// Buy side withheld by the long limit
    pub buys_suppressed: bool,
    /// Sell side withheld by the short limit
    pub sells_suppressed: bool,
}

impl Ladder {
    pub fn len(&self) -> usize {
        self.buys.len() + self.sells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn validate(snapshot: &MarketSnapshot) -> Result<(), LadderError> {
    let invalid = |msg: String| Err(LadderError::InvalidSnapshot(msg));

    if snapshot.bid <= Decimal::ZERO {
        return invalid(format!("bid {} is not positive", snapshot.bid));
    }
    if snapshot.ask <= Decimal::ZERO {
        return invalid(format!("ask {} is not positive", snapshot.ask));
    }
    if snapshot.price_increment <= Decimal::ZERO {
        return invalid(format!("price increment {} is not positive", snapshot.price_increment));
    }
    if snapshot.size_increment <= Decimal::ZERO {
        return invalid(format!("size increment {} is not positive", snapshot.size_increment));
    }
    if snapshot.bid > snapshot.ask {
        return invalid(format!("crossed book: bid {} > ask {}", snapshot.bid, snapshot.ask));
    }
    Ok(())
}

pub fn long_limit_exceeded(position: &Position, limits: &LadderLimits) -> bool {
    position.net_size >= limits.max_long_position
}

pub fn short_limit_exceeded(position: &Position, limits: &LadderLimits) -> bool {
    position.net_size <= limits.max_short_position
}

/// Build the buy and sell ladders for the current snapshot and position.
pub fn generate(
    snapshot: &MarketSnapshot,
    position: &Position,
    limits: &LadderLimits,
) -> Result<Ladder, LadderError> {
    validate(snapshot)?;

    let spacing = limits.rung_spacing.unwrap_or(snapshot.price_increment);
    if spacing <= Decimal::ZERO {
        return Err(LadderError::InvalidSnapshot(format!("rung spacing {} is not positive", spacing)));
    }
    let step = Decimal::ONE + spacing;

    let mut ladder = Ladder::default();

    if long_limit_exceeded(position, limits) {
        ladder.buys_suppressed = true;
    } else {
        let start = snapshot.bid - snapshot.price_increment;
        ladder.buys = side_rungs(Side::Buy, start, step, limits.buy_rungs, snapshot, limits.base_size)?;
    }

    if short_limit_exceeded(position, limits) {
        ladder.sells_suppressed = true;
    } else {
        let start = snapshot.ask + snapshot.price_increment;
        ladder.sells = side_rungs(Side::Sell, start, step, limits.sell_rungs, snapshot, limits.base_size)?;
    }

    Ok(ladder)
}

fn side_rungs(
    side: Side,
    start: Decimal,
    step: Decimal,
    depth: usize,
    snapshot: &MarketSnapshot,
    base_size: Decimal,
) -> Result<Vec<TargetOrder>, LadderError> {
    let tick = snapshot.price_increment;
    let mut rungs = Vec::with_capacity(depth);
    let mut raw = start;
    let mut prev: Option<Decimal> = None;

    for rung in 1..=depth {
        let overflow = || LadderError::Overflow(side, rung);

        if rung > 1 {
            raw = match side {
                Side::Buy => raw.checked_div(step),
                Side::Sell => raw.checked_mul(step),
            }
            .ok_or_else(overflow)?;
        }

        let mut price = to_nearest(raw, tick).ok_or_else(overflow)?;

        // Alignment can collapse neighbouring rungs onto one tick; keep each
        // rung strictly further from the touch than the last.
        if let Some(p) = prev {
            match side {
                Side::Buy if price >= p => price = p - tick,
                Side::Sell if price <= p => price = p.checked_add(tick).ok_or_else(overflow)?,
                _ => {}
            }
        }
        if price <= Decimal::ZERO {
            break;
        }
        prev = Some(price);

        let raw_size = base_size
            .checked_mul(Decimal::from(rung as u64))
            .ok_or_else(overflow)?;
        let size = to_nearest(raw_size, snapshot.size_increment).ok_or_else(overflow)?;
        if size <= Decimal::ZERO {
            continue;
        }

        rungs.push(TargetOrder::new(side, price, size));
    }

    Ok(rungs)
}
