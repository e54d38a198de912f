//! Runtime configuration
//!
//! Loaded from a TOML file; every field has a default matching the
//! reference setup (BTC-PERP, 2 buy / 4 sell rungs, 30 s cycle).

use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::exchange::{RetryPolicy, VenueEndpoints};
use crate::strategy::ladder::LadderLimits;
use crate::strategy::reconcile::default_price_tolerance;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    Read(PathBuf, String),
    #[error("failed to parse {0}: {1}")]
    Parse(PathBuf, String),
    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub exchange: ExchangeConfig,
    pub market: MarketConfig,
    pub ladder: LadderConfig,
    pub cycle: CycleConfig,
    pub supervisor: SupervisorConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExchangeConfig {
    pub base_url: String,
    pub request_timeout_ms: u64,
    pub retry: RetryConfig,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            base_url: VenueEndpoints::local().base_url,
            request_timeout_ms: 5_000,
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_interval_ms: u64,
    pub max_interval_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 3, initial_interval_ms: 250, max_interval_ms: 2_000 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarketConfig {
    pub symbol: String,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self { symbol: "BTC-PERP".to_string() }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LadderConfig {
    pub base_size: Decimal,
    pub buy_rungs: usize,
    pub sell_rungs: usize,
    /// Relative rung spacing; unset compounds by the market's tick size
    pub rung_spacing: Option<Decimal>,
    pub max_long_position: Decimal,
    pub max_short_position: Decimal,
    pub price_tolerance: Decimal,
    pub post_only: bool,
}

impl Default for LadderConfig {
    fn default() -> Self {
        let limits = LadderLimits::default();
        Self {
            base_size: limits.base_size,
            buy_rungs: limits.buy_rungs,
            sell_rungs: limits.sell_rungs,
            rung_spacing: limits.rung_spacing,
            max_long_position: limits.max_long_position,
            max_short_position: limits.max_short_position,
            price_tolerance: default_price_tolerance(),
            post_only: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CycleConfig {
    pub interval_secs: u64,
    pub cancel_all_on_startup: bool,
    pub log_recent_trades: bool,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self { interval_secs: 30, cancel_all_on_startup: true, log_recent_trades: true }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SupervisorConfig {
    /// Files whose modification restarts the quoting loop
    pub watch_files: Vec<PathBuf>,
    pub poll_interval_secs: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self { watch_files: Vec::new(), poll_interval_secs: 2 }
    }
}

impl Config {
    /// Load from `path`. A missing file is only tolerated for the default
    /// path, in which case built-in defaults are used.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = if !path.exists() && path == Path::new(DEFAULT_CONFIG_PATH) {
            Config::default()
        } else {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::Read(path.to_path_buf(), e.to_string()))?;
            Self::from_toml(&raw).map_err(|e| match e {
                ConfigError::Parse(_, msg) => ConfigError::Parse(path.to_path_buf(), msg),
                other => other,
            })?
        };
        config.with_env_overrides(std::env::vars())
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(raw).map_err(|e| ConfigError::Parse(PathBuf::new(), e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// `BASE_URL` overrides the configured service root.
    pub fn with_env_overrides<I>(mut self, vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if key == "BASE_URL" && !value.trim().is_empty() {
                self.exchange.base_url = value.trim().to_string();
            }
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &str, msg: &str| Err(ConfigError::InvalidValue(field.to_string(), msg.to_string()));

        if !is_valid_symbol(&self.market.symbol) {
            return invalid("market.symbol", "must look like BASE-QUOTE, e.g. BTC-PERP");
        }
        if !self.exchange.base_url.starts_with("http://") && !self.exchange.base_url.starts_with("https://") {
            return invalid("exchange.base_url", "must be an http(s) URL");
        }
        if self.exchange.request_timeout_ms == 0 {
            return invalid("exchange.request_timeout_ms", "must be positive");
        }
        if self.exchange.retry.max_attempts == 0 {
            return invalid("exchange.retry.max_attempts", "must be at least 1");
        }
        if self.ladder.base_size <= Decimal::ZERO {
            return invalid("ladder.base_size", "must be positive");
        }
        if matches!(self.ladder.rung_spacing, Some(s) if s <= Decimal::ZERO) {
            return invalid("ladder.rung_spacing", "must be positive");
        }
        if self.ladder.max_short_position >= self.ladder.max_long_position {
            return invalid("ladder.max_short_position", "must be below ladder.max_long_position");
        }
        if self.ladder.price_tolerance < Decimal::ZERO {
            return invalid("ladder.price_tolerance", "must not be negative");
        }
        if self.cycle.interval_secs == 0 {
            return invalid("cycle.interval_secs", "must be positive");
        }
        if self.supervisor.poll_interval_secs == 0 {
            return invalid("supervisor.poll_interval_secs", "must be positive");
        }
        Ok(())
    }

    pub fn endpoints(&self) -> VenueEndpoints {
        VenueEndpoints { base_url: self.exchange.base_url.clone() }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.exchange.request_timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.exchange.retry.max_attempts,
            initial_interval: Duration::from_millis(self.exchange.retry.initial_interval_ms),
            max_interval: Duration::from_millis(self.exchange.retry.max_interval_ms),
        }
    }

    pub fn ladder_limits(&self) -> LadderLimits {
        LadderLimits {
            base_size: self.ladder.base_size,
            buy_rungs: self.ladder.buy_rungs,
            sell_rungs: self.ladder.sell_rungs,
            rung_spacing: self.ladder.rung_spacing,
            max_long_position: self.ladder.max_long_position,
            max_short_position: self.ladder.max_short_position,
        }
    }

    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle.interval_secs)
    }
}

/// `BASE-QUOTE`, upper-case alphanumerics on both sides
fn is_valid_symbol(symbol: &str) -> bool {
    let mut parts = symbol.split('-');
    let valid = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
    matches!((parts.next(), parts.next(), parts.next()), (Some(base), Some(quote), None) if valid(base) && valid(quote))
}
