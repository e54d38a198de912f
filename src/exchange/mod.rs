//! Venue Layer
//!
//! REST client for the mango-service API plus the traits the strategy
//! is written against.

pub mod error;
pub mod order_template;
pub mod rest;
pub mod retry;
pub mod traits;
pub mod types;

#[cfg(test)]
pub mod mock;

pub use error::GatewayError;
pub use rest::MangoRestClient;
pub use retry::RetryPolicy;
pub use traits::{ExecutionGateway, MarketSnapshotProvider};
pub use types::*;
