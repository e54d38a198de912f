//! ladder_mm: ladder market maker with polling order reconciliation
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;
mod driver;
mod exchange;
mod strategy;
mod supervisor;

use config::{Config, DEFAULT_CONFIG_PATH};
use driver::{CycleDriver, DriverSettings};
use exchange::MangoRestClient;
use supervisor::Supervisor;

/// First CLI argument, then `MM_CONFIG`, then `config.toml`.
fn config_path() -> PathBuf {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var("MM_CONFIG").ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn build_driver(config: &Config) -> Result<CycleDriver> {
    let client = Arc::new(MangoRestClient::new(
        &config.endpoints(),
        config.request_timeout(),
        config.retry_policy(),
        config.ladder.post_only,
    )?);
    Ok(CycleDriver::new(client.clone(), client, DriverSettings::from(config)))
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("[STARTUP] cannot listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let path = config_path();
    let config = Config::load(&path).with_context(|| format!("loading {}", path.display()))?;

    info!("═══ ladder_mm: {} via {} ═══", config.market.symbol, config.endpoints().api_url());
    info!(
        "[STARTUP] rungs {} buy / {} sell | base size {} | position limits [{}, {}] | every {}s",
        config.ladder.buy_rungs,
        config.ladder.sell_rungs,
        config.ladder.base_size,
        config.ladder.max_short_position,
        config.ladder.max_long_position,
        config.cycle.interval_secs
    );

    Supervisor::new(path, config, build_driver).run(ctrl_c()).await?;

    info!("[STARTUP] stopped");
    Ok(())
}
