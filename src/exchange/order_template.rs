//! Place-order request builder
//!
//! Fills in the fixed parts of every ladder order (market, limit type,
//! flags) and stamps a per-process client id.

use std::sync::atomic::{AtomicU64, Ordering};

use super::types::{OrderType, PlaceOrderRequest, TargetOrder};

pub struct OrderTemplate {
    post_only: bool,
    counter: AtomicU64,
}

impl OrderTemplate {
    pub fn new(post_only: bool) -> Self {
        Self {
            post_only,
            counter: AtomicU64::new(1),
        }
    }

    /// Next client id. Ids only need to be unique within this process; the
    /// venue's order id is what cancels are keyed on.
    pub fn next_client_id(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst)
    }

    /// Resting limit order for a ladder rung
    pub fn build(&self, symbol: &str, target: &TargetOrder) -> PlaceOrderRequest {
        PlaceOrderRequest {
            market: symbol.to_string(),
            side: target.side,
            price: target.price,
            order_type: OrderType::Limit,
            size: target.size,
            reduce_only: false,
            ioc: false,
            post_only: self.post_only,
            client_id: self.next_client_id(),
        }
    }
}
