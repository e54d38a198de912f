//! Venue types
//!
//! Domain types the strategy works with, plus the wire DTOs of the
//! mango-service REST API they are decoded from.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ======================= ENDPOINTS =======================

/// REST service endpoint configuration
#[derive(Debug, Clone)]
pub struct VenueEndpoints {
    /// Service root, e.g. `http://localhost:3000`
    pub base_url: String,
}

impl VenueEndpoints {
    /// Locally running service (default port)
    pub fn local() -> Self {
        Self { base_url: "http://localhost:3000".to_string() }
    }

    /// API prefix every route lives under
    pub fn api_url(&self) -> String {
        format!("{}/api", self.base_url.trim_end_matches('/'))
    }
}

// ======================= ORDER SIDE =======================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

// ======================= ORDER TYPE =======================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Limit,
}

// ======================= MARKET =======================

/// Top of book plus tick/lot sizes for one market
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSnapshot {
    pub bid: Decimal,
    pub ask: Decimal,
    pub last: Decimal,
    /// Tick size
    pub price_increment: Decimal,
    /// Lot size
    pub size_increment: Decimal,
}

/// Net position in the configured market
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    /// Positive = long, negative = short
    pub net_size: Decimal,
}

impl Position {
    pub fn flat() -> Self {
        Self::default()
    }
}

// ======================= ORDERS =======================

/// Venue-assigned order identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderId(pub String);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An order the ladder wants resting on the book
#[derive(Debug, Clone, PartialEq)]
pub struct TargetOrder {
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
}

impl TargetOrder {
    pub fn new(side: Side, price: Decimal, size: Decimal) -> Self {
        Self { side, price, size }
    }

    /// Quote notional (price * size)
    pub fn value(&self) -> Decimal {
        self.price * self.size
    }
}

/// An order observed resting on the venue
#[derive(Debug, Clone, PartialEq)]
pub struct RestingOrder {
    pub id: OrderId,
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
}

impl RestingOrder {
    pub fn value(&self) -> Decimal {
        self.price * self.size
    }
}

/// A print from the venue's public trade tape
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub id: String,
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
    pub time: DateTime<Utc>,
}

// ======================= WIRE DTOS =======================

/// Response envelope used by every route
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub success: bool,
    pub result: Option<T>,
}

/// Error body returned with HTTP 400
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrors {
    #[serde(default)]
    pub errors: Vec<ApiErrorItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorItem {
    pub msg: String,
    /// Request field that failed validation, when the venue names one
    #[serde(default)]
    pub param: Option<String>,
}

impl ApiErrors {
    pub fn joined(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.msg.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn names_param(&self, param: &str) -> bool {
        self.errors.iter().any(|e| e.param.as_deref() == Some(param))
    }

    pub fn has_msg(&self, msg: &str) -> bool {
        self.errors.iter().any(|e| e.msg == msg)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketDto {
    pub name: String,
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
    pub last: Option<Decimal>,
    pub price_increment: Decimal,
    pub size_increment: Decimal,
}

impl From<MarketDto> for MarketSnapshot {
    fn from(dto: MarketDto) -> Self {
        // A missing side of the book decodes as zero and is rejected later
        // as an invalid snapshot.
        Self {
            bid: dto.bid.unwrap_or_default(),
            ask: dto.ask.unwrap_or_default(),
            last: dto.last.unwrap_or_default(),
            price_increment: dto.price_increment,
            size_increment: dto.size_increment,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionDto {
    pub future: String,
    #[serde(default)]
    pub net_size: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderDto {
    #[serde(deserialize_with = "de_string_or_number")]
    pub id: String,
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
}

impl From<OrderDto> for RestingOrder {
    fn from(dto: OrderDto) -> Self {
        Self {
            id: OrderId(dto.id),
            side: dto.side,
            price: dto.price,
            size: dto.size,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlacedOrderDto {
    #[serde(deserialize_with = "de_string_or_number")]
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradeDto {
    #[serde(deserialize_with = "de_string_or_number")]
    pub id: String,
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
    pub time: DateTime<Utc>,
}

impl From<TradeDto> for Trade {
    fn from(dto: TradeDto) -> Self {
        Self {
            id: dto.id,
            side: dto.side,
            price: dto.price,
            size: dto.size,
            time: dto.time,
        }
    }
}

/// Order to place on the venue
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub market: String,
    pub side: Side,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    #[serde(with = "rust_decimal::serde::float")]
    pub size: Decimal,
    pub reduce_only: bool,
    pub ioc: bool,
    pub post_only: bool,
    pub client_id: u64,
}

/// Venue ids come back as either JSON strings or numbers
fn de_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Num(serde_json::Number),
    }
    Ok(match Raw::deserialize(deserializer)? {
        Raw::Str(s) => s,
        Raw::Num(n) => n.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_decode_market() {
        let body = r#"{"success":true,"result":[{"name":"BTC-PERP","ask":3949.25,"bid":3949,
            "last":3949.0,"priceIncrement":0.25,"sizeIncrement":0.0001,"type":"future"}]}"#;
        let parsed: ApiResponse<Vec<MarketDto>> = serde_json::from_str(body).unwrap();
        let market: MarketSnapshot = parsed.result.unwrap().remove(0).into();

        assert_eq!(market.bid, Decimal::from(3949));
        assert_eq!(market.ask, Decimal::from_str("3949.25").unwrap());
        assert_eq!(market.price_increment, Decimal::from_str("0.25").unwrap());
        assert_eq!(market.size_increment, Decimal::from_str("0.0001").unwrap());
    }

    #[test]
    fn test_decode_orders_with_numeric_ids() {
        let body = r#"{"success":true,"result":[
            {"id":3855995,"side":"buy","price":3857.75,"size":0.111,"market":"BTC-PERP"},
            {"id":"abc","side":"sell","price":3900,"size":0.2}]}"#;
        let parsed: ApiResponse<Vec<OrderDto>> = serde_json::from_str(body).unwrap();
        let orders: Vec<RestingOrder> = parsed.result.unwrap().into_iter().map(Into::into).collect();

        assert_eq!(orders[0].id, OrderId("3855995".to_string()));
        assert_eq!(orders[0].side, Side::Buy);
        assert_eq!(orders[0].size, Decimal::from_str("0.111").unwrap());
        assert_eq!(orders[1].id.0, "abc");
        assert_eq!(orders[1].side, Side::Sell);
    }

    #[test]
    fn test_place_order_body() {
        let req = PlaceOrderRequest {
            market: "BTC-PERP".to_string(),
            side: Side::Sell,
            price: Decimal::from_str("102.5").unwrap(),
            order_type: OrderType::Limit,
            size: Decimal::from_str("0.0003").unwrap(),
            reduce_only: false,
            ioc: false,
            post_only: true,
            client_id: 7,
        };
        let v = serde_json::to_value(&req).unwrap();

        assert_eq!(v["market"], "BTC-PERP");
        assert_eq!(v["side"], "sell");
        assert_eq!(v["type"], "limit");
        assert_eq!(v["price"], 102.5);
        assert_eq!(v["reduceOnly"], false);
        assert_eq!(v["postOnly"], true);
        assert_eq!(v["clientId"], 7);
    }

    #[test]
    fn test_api_url() {
        let ep = VenueEndpoints { base_url: "http://host:3000/".to_string() };
        assert_eq!(ep.api_url(), "http://host:3000/api");
    }
}
