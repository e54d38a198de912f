//! mango-service REST API Client

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use super::error::GatewayError;
use super::order_template::OrderTemplate;
use super::retry::RetryPolicy;
use super::traits::{ExecutionGateway, MarketSnapshotProvider};
use super::types::*;

// ==================== REST CLIENT ====================

pub struct MangoRestClient {
    client: Client,
    api_url: String,
    retry: RetryPolicy,
    template: OrderTemplate,
}

impl MangoRestClient {
    pub fn new(
        endpoints: &VenueEndpoints,
        timeout: Duration,
        retry: RetryPolicy,
        post_only: bool,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .tcp_keepalive(Duration::from_secs(30))
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(4)
            .tcp_nodelay(true)
            .build()?;
        Ok(Self {
            client,
            api_url: endpoints.api_url(),
            retry,
            template: OrderTemplate::new(post_only),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.api_url, endpoint)
    }

    /// Send once and map the HTTP status into the error taxonomy.
    async fn send(&self, req: RequestBuilder, what: &str) -> Result<String, GatewayError> {
        let resp = req.send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        debug!("[REST] {} -> {} | {}", what, status, body);

        if status.is_success() {
            return Ok(body);
        }
        if status.as_u16() == 404 {
            return Err(GatewayError::NotFound(what.to_string()));
        }
        Err(GatewayError::Http { status: status.as_u16(), message: body })
    }

    async fn get_result<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, GatewayError> {
        let body = self.send(self.client.get(self.url(endpoint)), endpoint).await?;
        decode_result(&body)
    }

    /// GET with the retry policy applied
    async fn read<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, GatewayError> {
        self.retry.run(endpoint, || self.get_result::<T>(endpoint)).await
    }
}

fn decode_result<T: DeserializeOwned>(body: &str) -> Result<T, GatewayError> {
    let parsed: ApiResponse<T> = serde_json::from_str(body)?;
    parsed
        .result
        .ok_or_else(|| GatewayError::Decode(format!("missing result (success={})", parsed.success)))
}

/// Pull the venue's validation messages out of a 400 body, falling back to the raw text.
fn rejection_message(body: &str) -> String {
    match serde_json::from_str::<ApiErrors>(body) {
        Ok(errs) if !errs.errors.is_empty() => errs.joined(),
        _ => body.to_string(),
    }
}

/// The venue answers "not found" cases with 400 and a validation body, not 404.
fn bad_request_matches(err: &GatewayError, pred: impl Fn(&ApiErrors) -> bool) -> bool {
    match err {
        GatewayError::Http { status: 400, message } => serde_json::from_str::<ApiErrors>(message)
            .map(|errs| pred(&errs))
            .unwrap_or(false),
        _ => false,
    }
}

const ORDER_NOT_FOUND: &str = "Order not found!";
const MARKET_PARAM: &str = "market_name";

#[async_trait]
impl MarketSnapshotProvider for MangoRestClient {
    async fn get_market(&self, symbol: &str) -> Result<MarketSnapshot, GatewayError> {
        let endpoint = format!("/markets/{}", urlencoding::encode(symbol));
        let markets: Vec<MarketDto> = self.read(&endpoint).await.map_err(|e| {
            let unknown = matches!(e, GatewayError::NotFound(_))
                || bad_request_matches(&e, |errs| errs.names_param(MARKET_PARAM));
            if unknown {
                GatewayError::NotFound(format!("market {}", symbol))
            } else {
                e
            }
        })?;

        markets
            .into_iter()
            .find(|m| m.name == symbol)
            .map(MarketSnapshot::from)
            .ok_or_else(|| GatewayError::NotFound(format!("market {}", symbol)))
    }

    async fn get_position(&self, symbol: &str) -> Result<Position, GatewayError> {
        let positions: Vec<PositionDto> = self.read("/positions").await?;

        Ok(positions
            .into_iter()
            .find(|p| p.future == symbol)
            .map(|p| Position { net_size: p.net_size.unwrap_or_default() })
            .unwrap_or_else(Position::flat))
    }

    async fn recent_trades(&self, symbol: &str) -> Result<Vec<Trade>, GatewayError> {
        let endpoint = format!("/markets/{}/trades", urlencoding::encode(symbol));
        let trades: Vec<TradeDto> = self.read(&endpoint).await?;
        Ok(trades.into_iter().map(Trade::from).collect())
    }
}

#[async_trait]
impl ExecutionGateway for MangoRestClient {
    async fn list_open_orders(&self, symbol: &str) -> Result<Vec<RestingOrder>, GatewayError> {
        let endpoint = format!("/orders?market={}", urlencoding::encode(symbol));
        let orders: Vec<OrderDto> = self.read(&endpoint).await?;
        Ok(orders.into_iter().map(RestingOrder::from).collect())
    }

    /// Never retried: without idempotency keys a retry after a lost response
    /// could leave a duplicate order on the book.
    async fn place_order(&self, symbol: &str, order: &TargetOrder) -> Result<OrderId, GatewayError> {
        let request = self.template.build(symbol, order);
        let client_id = request.client_id;

        let body = self
            .send(self.client.post(self.url("/orders")).json(&request), "/orders")
            .await
            .map_err(|e| match e {
                GatewayError::Http { status: 400, message } => {
                    GatewayError::Rejected(rejection_message(&message))
                }
                other => other,
            })?;

        // The service acks without an id; the client id stands in for it.
        let placed: Option<PlacedOrderDto> = serde_json::from_str::<ApiResponse<PlacedOrderDto>>(&body)
            .ok()
            .and_then(|r| r.result);
        Ok(match placed {
            Some(p) => OrderId(p.id),
            None => OrderId(format!("client-{}", client_id)),
        })
    }

    async fn cancel_order(&self, order_id: &OrderId) -> Result<(), GatewayError> {
        let endpoint = format!("/orders/{}", urlencoding::encode(&order_id.0));
        self.retry
            .run(&endpoint, || self.send(self.client.delete(self.url(&endpoint)), &endpoint))
            .await
            .map_err(|e| {
                let gone = matches!(e, GatewayError::NotFound(_))
                    || bad_request_matches(&e, |errs| errs.has_msg(ORDER_NOT_FOUND));
                if gone {
                    GatewayError::NotFound(format!("order {}", order_id))
                } else {
                    e
                }
            })?;
        Ok(())
    }

    async fn cancel_all_orders(&self) -> Result<(), GatewayError> {
        self.retry
            .run("/orders", || self.send(self.client.delete(self.url("/orders")), "/orders"))
            .await?;
        Ok(())
    }
}
