/// live.rs — Position/Order Controller
///
/// Live analogue of the backtest state machine. Each poll cycle re-fetches
/// candles, recomputes the full signal table and acts on the newest row only.
///
/// STATE MACHINE:
///   FLAT ──(+1, market buy ok)──▶ LONG ──▶ stop-loss + take-profit triggers
///   LONG ──(−1, market sell ok)─▶ FLAT ──▶ cancel triggers (if enabled)
///
///   market buy fails  → stay FLAT, no protective orders
///   market sell fails → stay LONG, re-evaluated next cycle
///
/// No cycle error escapes `run_until`; it is logged and the loop sleeps.
use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use rust_decimal::Decimal;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::data::{Granularity, Series};
use crate::error::{error_chain, Error, Result};
use crate::models::{PositionState, Side};
use crate::risk::ProtectionLevels;
use crate::strategy::{generate_signals, latest, Crossover};
use crate::venue::{MarketOrderParams, TriggerOrderParams, TriggerType, VenueClient};

/// Everything the controller needs from `AppConfig`.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    pub product_id:              u32,
    pub granularity:             Granularity,
    pub short_window:            usize,
    pub long_window:             usize,
    pub trade_amount:            Decimal,
    pub stop_loss_percent:       Decimal,
    pub take_profit_percent:     Decimal,
    pub cancel_stale_protection: bool,
    pub trigger_expiry:          Duration,
    pub check_interval:          Duration,
}

impl From<&AppConfig> for ControllerConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            product_id: cfg.product_id,
            granularity: cfg.granularity,
            short_window: cfg.short_window,
            long_window: cfg.long_window,
            trade_amount: cfg.trade_amount,
            stop_loss_percent: cfg.stop_loss_percent,
            take_profit_percent: cfg.take_profit_percent,
            cancel_stale_protection: cfg.cancel_stale_protection,
            trigger_expiry: cfg.trigger_expiry,
            check_interval: cfg.check_interval,
        }
    }
}

/// What a single poll cycle did.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// No candles or no signal rows.
    Skipped,
    /// No actionable crossover for the current state.
    Hold,
    /// Long opened; `protective_orders` triggers were accepted.
    Entered { entry_price: Decimal, protective_orders: usize },
    EntryFailed,
    Exited,
    ExitFailed,
}

pub struct Controller<V> {
    venue:      V,
    cfg:        ControllerConfig,
    subaccount: String,
    state:      PositionState,
    /// Digests of the live stop-loss / take-profit triggers.
    protective: Vec<String>,
}

impl<V: VenueClient> Controller<V> {
    /// Starts `Flat`; state is never restored from the venue.
    pub fn new(venue: V, cfg: ControllerConfig, subaccount: impl Into<String>) -> Self {
        Self {
            venue,
            cfg,
            subaccount: subaccount.into(),
            state: PositionState::Flat,
            protective: Vec::new(),
        }
    }

    pub fn state(&self) -> PositionState {
        self.state
    }

    pub fn venue(&self) -> &V {
        &self.venue
    }

    pub fn protective_orders(&self) -> &[String] {
        &self.protective
    }

    /// One poll: fetch, signal, act on the newest row.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome> {
        info!("Checking for new trading signals...");
        let raw = self
            .venue
            .get_candlesticks(self.cfg.product_id, self.cfg.granularity)
            .await?;

        let series = match Series::from_venue(&raw) {
            Ok(s) => s,
            Err(e @ Error::EmptyData(_)) => {
                warn!("{e} (product {}). Skipping this cycle.", self.cfg.product_id);
                return Ok(CycleOutcome::Skipped);
            }
            Err(e) => return Err(e),
        };

        let rows = generate_signals(&series, self.cfg.short_window, self.cfg.long_window);
        let Some(row) = latest(&rows) else {
            warn!("Could not generate strategy data. Skipping this cycle.");
            return Ok(CycleOutcome::Skipped);
        };
        debug!(
            close = %row.close,
            sma_short = ?row.sma_short,
            sma_long = ?row.sma_long,
            position_change = ?row.position_change,
            "Latest signal row"
        );

        let outcome = match (row.crossover(), self.state) {
            (Crossover::Bullish, PositionState::Flat) => self.enter(row.close).await,
            (Crossover::Bearish, PositionState::Long) => self.exit().await,
            _ => {
                info!("No new trading opportunities. Holding {:?}.", self.state);
                CycleOutcome::Hold
            }
        };
        Ok(outcome)
    }

    async fn enter(&mut self, entry_price: Decimal) -> CycleOutcome {
        info!("Buy signal detected at price {}. Opening a long position.", entry_price.round_dp(2));
        let order = self.market_order(Side::Buy);
        match self.venue.place_market_order(&order).await {
            Ok(ack) => {
                info!(digest = %ack.digest, "Market buy order successful");
                self.state = PositionState::Long;
            }
            Err(e) => {
                let err = Error::OrderPlacement { kind: "market buy", reason: error_chain(&e) };
                error!("{err}. No risk management orders placed.");
                return CycleOutcome::EntryFailed;
            }
        }

        let levels = ProtectionLevels::for_long(
            entry_price,
            self.cfg.stop_loss_percent,
            self.cfg.take_profit_percent,
        );
        let expiration = match self.trigger_expiration() {
            Ok(t) => t,
            Err(e) => {
                error!("{e}. Position is LONG without protective orders.");
                return CycleOutcome::Entered { entry_price, protective_orders: 0 };
            }
        };

        let legs = [
            ("stop-loss", levels.stop_price, TriggerType::LastPriceBelow),
            ("take-profit", levels.take_profit_price, TriggerType::LastPriceAbove),
        ];
        for (kind, trigger_price, trigger_type) in legs {
            info!("Placing {kind} order at {}", trigger_price.round_dp(2));
            let params = TriggerOrderParams {
                product_id: self.cfg.product_id,
                sender: self.subaccount.clone(),
                price: Decimal::ZERO,
                amount: -self.cfg.trade_amount,
                trigger_price,
                trigger_type,
                expiration,
                reduce_only: true,
            };
            match self.venue.place_price_trigger_order(&params).await {
                Ok(ack) => self.protective.push(ack.digest),
                Err(e) => {
                    let err = Error::OrderPlacement { kind, reason: error_chain(&e) };
                    error!("{err}");
                }
            }
        }

        CycleOutcome::Entered { entry_price, protective_orders: self.protective.len() }
    }

    async fn exit(&mut self) -> CycleOutcome {
        info!("Sell signal detected. Closing long position.");
        let order = self.market_order(Side::Sell);
        match self.venue.place_market_order(&order).await {
            Ok(ack) => {
                info!(digest = %ack.digest, "Market sell order successful");
                self.state = PositionState::Flat;
                self.settle_protection().await;
                CycleOutcome::Exited
            }
            Err(e) => {
                let err = Error::OrderPlacement { kind: "market sell", reason: error_chain(&e) };
                error!("{err}. Position remains LONG.");
                CycleOutcome::ExitFailed
            }
        }
    }

    /// Drop protective triggers left over from the closed position.
    async fn settle_protection(&mut self) {
        let digests = std::mem::take(&mut self.protective);
        if digests.is_empty() {
            return;
        }
        if !self.cfg.cancel_stale_protection {
            warn!(
                "{} protective order(s) may remain live against a flat position \
                 (CANCEL_STALE_PROTECTION=false)",
                digests.len()
            );
            return;
        }
        if let Err(e) = self
            .venue
            .cancel_trigger_orders(self.cfg.product_id, &self.subaccount, &digests)
            .await
        {
            error!("Failed to cancel {} protective order(s): {e}", digests.len());
        }
    }

    fn market_order(&self, side: Side) -> MarketOrderParams {
        info!("Placing market {side} order for {} of product {}", self.cfg.trade_amount, self.cfg.product_id);
        MarketOrderParams {
            product_id: self.cfg.product_id,
            subaccount: self.subaccount.clone(),
            side,
            amount: self.cfg.trade_amount,
        }
    }

    fn trigger_expiration(&self) -> Result<DateTime<Utc>> {
        TimeDelta::from_std(self.cfg.trigger_expiry)
            .ok()
            .and_then(|d| Utc::now().checked_add_signed(d))
            .ok_or_else(|| Error::config("TRIGGER_EXPIRY_SECONDS is out of range"))
    }

    /// Poll until `shutdown` resolves. Sleeps `check_interval` between cycles.
    pub async fn run_until<F: Future>(&mut self, shutdown: F) {
        tokio::pin!(shutdown);
        info!(
            "Entering live loop: product {} {} SMA {}/{}, polling every {}s",
            self.cfg.product_id,
            self.cfg.granularity,
            self.cfg.short_window,
            self.cfg.long_window,
            self.cfg.check_interval.as_secs()
        );

        loop {
            match self.run_cycle().await {
                Ok(outcome) => debug!(?outcome, state = ?self.state, "Cycle complete"),
                Err(e) => error!(
                    "An unexpected error occurred in the trading loop: {}",
                    error_chain(&e)
                ),
            }

            let next = Utc::now()
                + TimeDelta::from_std(self.cfg.check_interval).unwrap_or(TimeDelta::zero());
            info!("Next check at {}", next.format("%Y-%m-%d %H:%M:%S UTC"));

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested. Controller stopping in state {:?}.", self.state);
                    break;
                }
                _ = sleep(self.cfg.check_interval) => {}
            }
        }
    }
}
