//! Venue error taxonomy

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The request exceeded its deadline
    #[error("timed out: {0}")]
    Timeout(String),
    /// Connection refused/reset, DNS failure and the like
    #[error("network error: {0}")]
    Network(String),
    /// Unknown market, or an order that is already filled/cancelled
    #[error("not found: {0}")]
    NotFound(String),
    /// Venue-side validation failure on create (post-only cross, size below minimum, ...)
    #[error("order rejected: {0}")]
    Rejected(String),
    #[error("http {status}: {message}")]
    Http { status: u16, message: String },
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Errors worth retrying: timeouts, connection trouble, 429 and 5xx.
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayError::Timeout(_) | GatewayError::Network(_) => true,
            GatewayError::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout(err.to_string())
        } else if err.is_decode() {
            GatewayError::Decode(err.to_string())
        } else {
            GatewayError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(GatewayError::Timeout("get_market".into()).is_transient());
        assert!(GatewayError::Network("reset".into()).is_transient());
        assert!(GatewayError::Http { status: 503, message: String::new() }.is_transient());
        assert!(GatewayError::Http { status: 429, message: String::new() }.is_transient());

        assert!(!GatewayError::Http { status: 400, message: String::new() }.is_transient());
        assert!(!GatewayError::Rejected("post only".into()).is_transient());
        assert!(!GatewayError::NotFound("order 1".into()).is_transient());
        assert!(!GatewayError::Decode("eof".into()).is_transient());
    }
}
