//! Venue Abstraction Layer
//!
//! The strategy only talks to the venue through these two traits, so the
//! REST client and the test venue are interchangeable.

use async_trait::async_trait;

use super::error::GatewayError;
use super::types::{MarketSnapshot, OrderId, Position, RestingOrder, TargetOrder, Trade};

/// Read side: market state and inventory
#[async_trait]
pub trait MarketSnapshotProvider: Send + Sync {
    /// Top of book and increments. `NotFound` for an unknown symbol.
    async fn get_market(&self, symbol: &str) -> Result<MarketSnapshot, GatewayError>;

    /// Net position. No position is `net_size = 0`, not an error.
    async fn get_position(&self, symbol: &str) -> Result<Position, GatewayError>;

    /// Recent public trades, newest first
    async fn recent_trades(&self, symbol: &str) -> Result<Vec<Trade>, GatewayError>;
}

/// Write side: order entry
///
/// Calls are fire-and-forget from the caller's point of view: there is no
/// transactional guarantee between them.
#[async_trait]
pub trait ExecutionGateway: Send + Sync {
    async fn list_open_orders(&self, symbol: &str) -> Result<Vec<RestingOrder>, GatewayError>;

    /// `Rejected` on venue-side validation failure
    async fn place_order(&self, symbol: &str, order: &TargetOrder) -> Result<OrderId, GatewayError>;

    /// `NotFound` when the order is already filled or cancelled
    async fn cancel_order(&self, order_id: &OrderId) -> Result<(), GatewayError>;

    async fn cancel_all_orders(&self) -> Result<(), GatewayError>;
}
