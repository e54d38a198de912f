//! In-memory venue for driver tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::error::GatewayError;
use super::traits::{ExecutionGateway, MarketSnapshotProvider};
use super::types::*;

/// Every gateway call in the order it was made
#[derive(Debug, Clone, PartialEq)]
pub enum VenueCall {
    GetMarket,
    GetPosition,
    RecentTrades,
    ListOpenOrders,
    Place(TargetOrder),
    Cancel(OrderId),
    CancelAll,
}

#[derive(Default)]
struct MockState {
    market: Option<MarketSnapshot>,
    position: Position,
    trades: Vec<Trade>,
    open_orders: Vec<RestingOrder>,
    calls: Vec<VenueCall>,
    market_errors: VecDeque<GatewayError>,
    place_errors: VecDeque<GatewayError>,
    cancel_errors: VecDeque<GatewayError>,
    next_id: u64,
}

/// Behaves like a venue with instant acks: placed orders rest, cancelled
/// orders disappear. Queued errors are returned by the next matching call.
#[derive(Default)]
pub struct MockVenue {
    state: Mutex<MockState>,
}

impl MockVenue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_market(self, market: MarketSnapshot) -> Self {
        self.state.lock().unwrap().market = Some(market);
        self
    }

    pub fn with_position(self, net_size: rust_decimal::Decimal) -> Self {
        self.state.lock().unwrap().position = Position { net_size };
        self
    }

    pub fn with_order(self, order: RestingOrder) -> Self {
        self.state.lock().unwrap().open_orders.push(order);
        self
    }

    pub fn with_trade(self, trade: Trade) -> Self {
        self.state.lock().unwrap().trades.push(trade);
        self
    }

    pub fn set_market(&self, market: MarketSnapshot) {
        self.state.lock().unwrap().market = Some(market);
    }

    pub fn fail_next_market(&self, err: GatewayError) {
        self.state.lock().unwrap().market_errors.push_back(err);
    }

    pub fn fail_next_place(&self, err: GatewayError) {
        self.state.lock().unwrap().place_errors.push_back(err);
    }

    pub fn fail_next_cancel(&self, err: GatewayError) {
        self.state.lock().unwrap().cancel_errors.push_back(err);
    }

    pub fn calls(&self) -> Vec<VenueCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn open_orders(&self) -> Vec<RestingOrder> {
        self.state.lock().unwrap().open_orders.clone()
    }
}

#[async_trait]
impl MarketSnapshotProvider for MockVenue {
    async fn get_market(&self, symbol: &str) -> Result<MarketSnapshot, GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(VenueCall::GetMarket);
        if let Some(err) = state.market_errors.pop_front() {
            return Err(err);
        }
        state
            .market
            .clone()
            .ok_or_else(|| GatewayError::NotFound(format!("market {}", symbol)))
    }

    async fn get_position(&self, _symbol: &str) -> Result<Position, GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(VenueCall::GetPosition);
        Ok(state.position)
    }

    async fn recent_trades(&self, _symbol: &str) -> Result<Vec<Trade>, GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(VenueCall::RecentTrades);
        Ok(state.trades.clone())
    }
}

#[async_trait]
impl ExecutionGateway for MockVenue {
    async fn list_open_orders(&self, _symbol: &str) -> Result<Vec<RestingOrder>, GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(VenueCall::ListOpenOrders);
        Ok(state.open_orders.clone())
    }

    async fn place_order(&self, _symbol: &str, order: &TargetOrder) -> Result<OrderId, GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(VenueCall::Place(order.clone()));
        if let Some(err) = state.place_errors.pop_front() {
            return Err(err);
        }
        state.next_id += 1;
        let id = OrderId(format!("mock-{}", state.next_id));
        state.open_orders.push(RestingOrder {
            id: id.clone(),
            side: order.side,
            price: order.price,
            size: order.size,
        });
        Ok(id)
    }

    async fn cancel_order(&self, order_id: &OrderId) -> Result<(), GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(VenueCall::Cancel(order_id.clone()));
        if let Some(err) = state.cancel_errors.pop_front() {
            return Err(err);
        }
        let before = state.open_orders.len();
        state.open_orders.retain(|o| &o.id != order_id);
        if state.open_orders.len() == before {
            return Err(GatewayError::NotFound(format!("order {}", order_id)));
        }
        Ok(())
    }

    async fn cancel_all_orders(&self) -> Result<(), GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(VenueCall::CancelAll);
        state.open_orders.clear();
        Ok(())
    }
}
