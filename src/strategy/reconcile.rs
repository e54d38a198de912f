//! Order reconciliation
//!
//! Turns (resting orders, target ladder) into a cancel/create diff. Matching
//! is greedy and per side: both lists are sorted ascending by price and the
//! n-th resting order is compared against the n-th target. A pair within
//! tolerance is left alone; anything else is cancelled and, if a target was
//! paired with it, replaced.
//!
//! The plan is a pure function of its inputs. Applying it (cancels first,
//! then creates) is the caller's job.

use rust_decimal::Decimal;

use super::decimal::outside_tolerance;
use crate::exchange::types::{RestingOrder, Side, TargetOrder};

/// Relative price difference a resting order may drift from its target
/// before it is replaced (1%).
pub fn default_price_tolerance() -> Decimal {
    Decimal::new(1, 2)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconciliationPlan {
    pub to_cancel: Vec<RestingOrder>,
    pub to_create: Vec<TargetOrder>,
    /// Resting orders that already match a target
    pub kept: Vec<RestingOrder>,
}

impl ReconciliationPlan {
    /// Nothing to send to the venue
    pub fn is_empty(&self) -> bool {
        self.to_cancel.is_empty() && self.to_create.is_empty()
    }

    /// The part of the plan that concerns one side of the book
    pub fn for_side(&self, side: Side) -> ReconciliationPlan {
        ReconciliationPlan {
            to_cancel: self.to_cancel.iter().filter(|o| o.side == side).cloned().collect(),
            to_create: self.to_create.iter().filter(|o| o.side == side).cloned().collect(),
            kept: self.kept.iter().filter(|o| o.side == side).cloned().collect(),
        }
    }
}

pub fn reconcile_with_tolerance(
    resting: &[RestingOrder],
    buy_targets: &[TargetOrder],
    sell_targets: &[TargetOrder],
    tolerance: Decimal,
) -> ReconciliationPlan {
    let mut plan = ReconciliationPlan::default();
    reconcile_side(Side::Buy, resting, buy_targets, tolerance, &mut plan);
    reconcile_side(Side::Sell, resting, sell_targets, tolerance, &mut plan);
    plan
}

fn reconcile_side(
    side: Side,
    resting: &[RestingOrder],
    targets: &[TargetOrder],
    tolerance: Decimal,
    plan: &mut ReconciliationPlan,
) {
    let mut resting: Vec<&RestingOrder> = resting.iter().filter(|o| o.side == side).collect();
    resting.sort_by(|a, b| a.price.cmp(&b.price));

    // Targets of the wrong side are ignored rather than trusted.
    let mut targets: Vec<&TargetOrder> = targets.iter().filter(|t| t.side == side).collect();
    targets.sort_by(|a, b| a.price.cmp(&b.price));

    let mut targets = targets.into_iter();

    for order in resting {
        match targets.next() {
            // Pool exhausted: the ladder shrank or the side is suppressed.
            None => plan.to_cancel.push(order.clone()),
            Some(target) => {
                if is_match(order, target, tolerance) {
                    plan.kept.push(order.clone());
                } else {
                    plan.to_cancel.push(order.clone());
                    plan.to_create.push(target.clone());
                }
            }
        }
    }

    plan.to_create.extend(targets.cloned());
}

/// Exact size and price within relative tolerance
fn is_match(order: &RestingOrder, target: &TargetOrder, tolerance: Decimal) -> bool {
    order.size == target.size && !outside_tolerance(target.price, order.price, tolerance)
}
