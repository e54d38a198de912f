//! Cycle driver
//!
//! One cycle: read snapshot and position, build the ladder, diff it against
//! the venue's open orders, apply the diff. Nothing is carried between
//! cycles; the venue is re-read every time, so a failed call is corrected by
//! the next cycle rather than retried here.

use chrono::Utc;
use futures_util::FutureExt;
use rust_decimal::Decimal;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::Config;
use crate::exchange::{
    ExecutionGateway, GatewayError, MarketSnapshot, MarketSnapshotProvider, RestingOrder, Side,
    TargetOrder,
};
use crate::strategy::ladder::{generate, LadderError, LadderLimits};
use crate::strategy::reconcile::{reconcile_with_tolerance, ReconciliationPlan};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Quoting,
    Sleeping,
}

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("market snapshot unavailable: {0}")]
    Snapshot(GatewayError),
    #[error(transparent)]
    Ladder(#[from] LadderError),
    #[error("open orders unavailable: {0}")]
    OpenOrders(GatewayError),
    #[error("cycle panicked: {0}")]
    Panicked(String),
}

/// Per-cycle tallies of what happened when the plan hit the venue
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub cancelled: usize,
    /// Cancel answered NotFound: already filled or cancelled
    pub already_gone: usize,
    pub cancel_failed: usize,
    pub created: usize,
    pub rejected: usize,
    pub create_failed: usize,
}

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub plan: ReconciliationPlan,
    pub applied: ApplyReport,
}

#[derive(Debug, Clone)]
pub struct DriverSettings {
    pub symbol: String,
    pub limits: LadderLimits,
    pub price_tolerance: Decimal,
    pub interval: Duration,
    pub log_recent_trades: bool,
}

impl From<&Config> for DriverSettings {
    fn from(config: &Config) -> Self {
        Self {
            symbol: config.market.symbol.clone(),
            limits: config.ladder_limits(),
            price_tolerance: config.ladder.price_tolerance,
            interval: config.cycle_interval(),
            log_recent_trades: config.cycle.log_recent_trades,
        }
    }
}

pub struct CycleDriver {
    provider: Arc<dyn MarketSnapshotProvider>,
    gateway: Arc<dyn ExecutionGateway>,
    settings: DriverSettings,
    state: CycleState,
}

impl CycleDriver {
    pub fn new(
        provider: Arc<dyn MarketSnapshotProvider>,
        gateway: Arc<dyn ExecutionGateway>,
        settings: DriverSettings,
    ) -> Self {
        Self { provider, gateway, settings, state: CycleState::Idle }
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    /// Clear the book before the first cycle. Failure is logged, not fatal.
    pub async fn cancel_all_orders(&self) {
        info!("[STARTUP] cancelling all orders...");
        match self.gateway.cancel_all_orders().await {
            Ok(()) => info!("[STARTUP] all orders cancelled"),
            Err(e) => error!("[STARTUP] cancel all failed: {}", e),
        }
    }

    /// Quote every `interval` until `shutdown` flips to true. A failing or
    /// panicking cycle is logged and followed by the same fixed sleep.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "[CYCLE] quoting {} every {}s",
            self.settings.symbol,
            self.settings.interval.as_secs()
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let span = info_span!("cycle", id = %Uuid::new_v4());
            async {
                info!("[CYCLE] next cycle...");
                match self.run_guarded().await {
                    Ok(report) => {
                        let a = &report.applied;
                        info!(
                            "[CYCLE] done | kept:{} cancelled:{} gone:{} created:{} rejected:{} failed:{}",
                            report.plan.kept.len(),
                            a.cancelled,
                            a.already_gone,
                            a.created,
                            a.rejected,
                            a.cancel_failed + a.create_failed
                        );
                    }
                    Err(e) => error!("[CYCLE] skipped: {}", e),
                }
            }
            .instrument(span)
            .await;

            self.state = CycleState::Sleeping;
            if sleep_or_shutdown(&mut shutdown, self.settings.interval).await {
                break;
            }
            self.state = CycleState::Idle;
        }

        self.state = CycleState::Idle;
        info!("[CYCLE] loop stopped");
    }

    /// `run_cycle` with panics turned into a cycle error.
    pub async fn run_guarded(&mut self) -> Result<CycleReport, CycleError> {
        match AssertUnwindSafe(self.run_cycle()).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => {
                let msg = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(CycleError::Panicked(msg))
            }
        }
    }

    pub async fn run_cycle(&mut self) -> Result<CycleReport, CycleError> {
        self.state = CycleState::Quoting;
        let symbol = self.settings.symbol.as_str();

        if self.settings.log_recent_trades {
            self.log_recent_trades().await;
        }

        let snapshot = self.provider.get_market(symbol).await.map_err(CycleError::Snapshot)?;
        let position = self.provider.get_position(symbol).await.map_err(CycleError::Snapshot)?;
        debug!(
            "[MARKET] bid {} ask {} last {} | tick {} lot {} | pos {}",
            snapshot.bid,
            snapshot.ask,
            snapshot.last,
            snapshot.price_increment,
            snapshot.size_increment,
            position.net_size
        );

        let ladder = generate(&snapshot, &position, &self.settings.limits)?;
        debug!("[LADDER] {} rungs ({} buy / {} sell)", ladder.len(), ladder.buys.len(), ladder.sells.len());
        if ladder.buys_suppressed {
            info!("[LADDER] skipping adding to longs, current position {}", position.net_size);
        }
        if ladder.sells_suppressed {
            info!("[LADDER] skipping adding to shorts, current position {}", position.net_size);
        }
        if ladder.is_empty() {
            warn!("[LADDER] nothing to quote, resting orders will be pulled");
        }

        let resting = self
            .gateway
            .list_open_orders(symbol)
            .await
            .map_err(CycleError::OpenOrders)?;

        let plan = reconcile_with_tolerance(&resting, &ladder.buys, &ladder.sells, self.settings.price_tolerance);
        log_plan(&plan, &snapshot, &resting);

        let applied = self.apply(&plan).await;
        Ok(CycleReport { plan, applied })
    }

    /// All cancels, then all creates. Individual failures are logged and
    /// skipped; nothing is retried within the cycle.
    pub async fn apply(&self, plan: &ReconciliationPlan) -> ApplyReport {
        let mut report = ApplyReport::default();

        for order in &plan.to_cancel {
            match self.gateway.cancel_order(&order.id).await {
                Ok(()) => report.cancelled += 1,
                Err(GatewayError::NotFound(_)) => {
                    debug!("[CANCEL] {} already gone", order.id);
                    report.already_gone += 1;
                }
                Err(e) => {
                    warn!("[CANCEL] {} {} @ {} failed: {}", order.id, order.side, order.price, e);
                    report.cancel_failed += 1;
                }
            }
        }

        for order in &plan.to_create {
            match self.gateway.place_order(&self.settings.symbol, order).await {
                Ok(id) => {
                    debug!("[CREATE] {} {} @ {} -> {}", order.side, order.size, order.price, id);
                    report.created += 1;
                }
                Err(GatewayError::Rejected(msg)) => {
                    warn!("[CREATE] {} {} @ {} rejected: {}", order.side, order.size, order.price, msg);
                    report.rejected += 1;
                }
                Err(e) => {
                    warn!("[CREATE] {} {} @ {} failed: {}", order.side, order.size, order.price, e);
                    report.create_failed += 1;
                }
            }
        }

        report
    }

    /// Prints from the last cycle interval. Best-effort.
    async fn log_recent_trades(&self) {
        let trades = match self.provider.recent_trades(&self.settings.symbol).await {
            Ok(trades) => trades,
            Err(e) => {
                warn!("[TRADES] unavailable: {}", e);
                return;
            }
        };

        let window = chrono::Duration::from_std(self.settings.interval).unwrap_or_else(|_| chrono::Duration::zero());
        let now = Utc::now();
        let recent: Vec<_> = trades.iter().filter(|t| now - t.time < window).collect();
        if recent.is_empty() {
            return;
        }

        info!("[TRADES] recent trades");
        for t in recent {
            debug!("[TRADES] trade id {}", t.id);
            info!(
                " |_ side {:4}, size {}, price {}, value {}, time: {}",
                t.side,
                t.size,
                t.price,
                t.price * t.size,
                t.time.format("%H:%M:%S")
            );
        }
    }
}

/// Sleep for `interval`; returns true if shutdown was requested meanwhile.
async fn sleep_or_shutdown(shutdown: &mut watch::Receiver<bool>, interval: Duration) -> bool {
    let sleep = tokio::time::sleep(interval);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => return false,
            changed = shutdown.changed() => match changed {
                Ok(()) if *shutdown.borrow() => return true,
                Ok(()) => continue,
                // Sender gone: nobody can stop us any more, just sleep.
                Err(_) => {
                    (&mut sleep).await;
                    return false;
                }
            },
        }
    }
}

fn log_plan(plan: &ReconciliationPlan, snapshot: &MarketSnapshot, resting: &[RestingOrder]) {
    if plan.is_empty() {
        debug!("[PLAN] converged, keeping {} orders", plan.kept.len());
    }

    if plan.to_cancel.is_empty() {
        info!("[CANCEL] no orders to cancel");
    } else {
        info!("[CANCEL] cancelling {} orders...", plan.to_cancel.len());
        let mut cancels: Vec<&RestingOrder> = plan.to_cancel.iter().collect();
        cancels.sort_by(|a, b| b.price.cmp(&a.price));
        for o in cancels {
            info!(" |_ side {:4}, size {}, price {}, value {}", o.side, o.size, o.price, o.value());
        }
    }

    if plan.to_create.is_empty() {
        info!("[CREATE] no orders to create, current open orders");
        let mut open: Vec<&RestingOrder> = resting.iter().collect();
        open.sort_by(|a, b| b.price.cmp(&a.price));
        for o in open {
            info!(" |_ side {:4}, size {}, price {}, value {}", o.side, o.size, o.price, o.value());
        }
        return;
    }

    info!("[CREATE] creating {} orders...", plan.to_create.len());
    log_creates(plan.for_side(Side::Sell).to_create);
    info!("    current bid -> {}, ask {} <- ask", snapshot.bid, snapshot.ask);
    log_creates(plan.for_side(Side::Buy).to_create);
}

/// Highest price first
fn log_creates(mut orders: Vec<TargetOrder>) {
    orders.sort_by(|a, b| b.price.cmp(&a.price));
    for o in orders {
        info!(" |_ price {}, side {:4}, size {}, value {}", o.price, o.side, o.size, o.value());
    }
}
