/// config.rs — Centralised configuration loaded from .env
///
/// All parameters consumed by the engine are defined here.
/// Loading happens once at startup; every module borrows &AppConfig.
/// Only the signing key is secret, and only the live trader needs it.
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::backtest::{BacktestParams, DEFAULT_COMMISSION_RATE, DEFAULT_SLIPPAGE};
use crate::data::Granularity;
use crate::error::{Error, Result};

pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 300;
/// Protective trigger orders expire after one week.
pub const DEFAULT_TRIGGER_EXPIRY_SECS: u64 = 7 * 24 * 3_600;

/// Which venue deployment to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VenueMode {
    #[default]
    Testnet,
    Mainnet,
}

impl FromStr for VenueMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "testnet" => Ok(Self::Testnet),
            "mainnet" => Ok(Self::Mainnet),
            other => Err(Error::config(format!(
                "VENUE_MODE must be testnet or mainnet, got {other:?}"
            ))),
        }
    }
}

impl fmt::Display for VenueMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Testnet => "TESTNET",
            Self::Mainnet => "MAINNET",
        })
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // ── Venue credentials ────────────────────────────────────────────
    pub signing_key: Option<String>,
    pub mode:        VenueMode,
    pub testnet_url: Option<String>,
    pub mainnet_url: Option<String>,
    /// Signer address whose first subaccount is traded.
    pub address:     Option<String>,
    /// Place no real orders; reads still hit the venue.
    pub dry_run:     bool,

    // ── Instrument & strategy ────────────────────────────────────────
    pub product_id:   u32,
    pub granularity:  Granularity,
    pub short_window: usize,
    pub long_window:  usize,

    // ── Live order management ────────────────────────────────────────
    /// Base amount per entry/exit market order
    pub trade_amount:            Decimal,
    pub check_interval:          Duration,
    /// % below entry for the stop-loss trigger
    pub stop_loss_percent:       Decimal,
    /// % above entry for the take-profit trigger
    pub take_profit_percent:     Decimal,
    /// Cancel live SL/TP triggers after a signal exit
    pub cancel_stale_protection: bool,
    pub trigger_expiry:          Duration,

    // ── Backtesting ──────────────────────────────────────────────────
    pub initial_capital: Decimal,
    pub commission_rate: Decimal,
    pub slippage:        Decimal,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            signing_key: None,
            mode: VenueMode::Testnet,
            testnet_url: None,
            mainnet_url: None,
            address: None,
            dry_run: false,
            product_id: 2,
            granularity: Granularity::OneHour,
            short_window: 10,
            long_window: 30,
            trade_amount: dec!(0.0001),
            check_interval: Duration::from_secs(DEFAULT_CHECK_INTERVAL_SECS),
            stop_loss_percent: dec!(2.0),
            take_profit_percent: dec!(4.0),
            cancel_stale_protection: false,
            trigger_expiry: Duration::from_secs(DEFAULT_TRIGGER_EXPIRY_SECS),
            initial_capital: dec!(10000),
            commission_rate: DEFAULT_COMMISSION_RATE,
            slippage: DEFAULT_SLIPPAGE,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables (after dotenv).
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok(); // ignore missing .env
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key/value source. `from_env` is this over `std::env`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let cfg = Self {
            signing_key: non_empty("VENUE_SIGNING_KEY"),
            mode:        parse_var(&lookup, "VENUE_MODE", d.mode)?,
            testnet_url: non_empty("VENUE_TESTNET_URL"),
            mainnet_url: non_empty("VENUE_MAINNET_URL"),
            address:     non_empty("VENUE_ADDRESS"),
            dry_run:     parse_bool(&lookup, "DRY_RUN", d.dry_run)?,

            product_id:   parse_var(&lookup, "PRODUCT_ID", d.product_id)?,
            granularity:  parse_var(&lookup, "CANDLE_INTERVAL", d.granularity)?,
            short_window: parse_var(&lookup, "SHORT_WINDOW", d.short_window)?,
            long_window:  parse_var(&lookup, "LONG_WINDOW", d.long_window)?,

            trade_amount: parse_var(&lookup, "TRADE_AMOUNT", d.trade_amount)?,
            check_interval: Duration::from_secs(parse_var(
                &lookup,
                "CHECK_INTERVAL_SECONDS",
                DEFAULT_CHECK_INTERVAL_SECS,
            )?),
            stop_loss_percent:   parse_var(&lookup, "STOP_LOSS_PERCENT", d.stop_loss_percent)?,
            take_profit_percent: parse_var(&lookup, "TAKE_PROFIT_PERCENT", d.take_profit_percent)?,
            cancel_stale_protection: parse_bool(
                &lookup,
                "CANCEL_STALE_PROTECTION",
                d.cancel_stale_protection,
            )?,
            trigger_expiry: Duration::from_secs(parse_var(
                &lookup,
                "TRIGGER_EXPIRY_SECONDS",
                DEFAULT_TRIGGER_EXPIRY_SECS,
            )?),

            initial_capital: parse_var(&lookup, "INITIAL_CAPITAL", d.initial_capital)?,
            commission_rate: parse_var(&lookup, "COMMISSION_RATE", d.commission_rate)?,
            slippage:        parse_var(&lookup, "SLIPPAGE", d.slippage)?,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.short_window == 0 || self.long_window == 0 {
            return Err(Error::config("SHORT_WINDOW and LONG_WINDOW must be at least 1"));
        }
        if self.trade_amount <= Decimal::ZERO {
            return Err(Error::config("TRADE_AMOUNT must be positive"));
        }
        if self.check_interval.is_zero() {
            return Err(Error::config("CHECK_INTERVAL_SECONDS must be positive"));
        }
        if self.initial_capital <= Decimal::ZERO {
            return Err(Error::config("INITIAL_CAPITAL must be positive"));
        }
        let rates = [
            ("STOP_LOSS_PERCENT", self.stop_loss_percent),
            ("TAKE_PROFIT_PERCENT", self.take_profit_percent),
            ("COMMISSION_RATE", self.commission_rate),
            ("SLIPPAGE", self.slippage),
        ];
        if let Some((key, _)) = rates.iter().find(|(_, v)| v.is_sign_negative()) {
            return Err(Error::config(format!("{key} must not be negative")));
        }
        if self.stop_loss_percent >= dec!(100) {
            return Err(Error::config("STOP_LOSS_PERCENT must be below 100"));
        }
        Ok(())
    }

    /// The signing secret; its absence is fatal for anything that trades.
    pub fn require_signing_key(&self) -> Result<&str> {
        self.signing_key
            .as_deref()
            .ok_or_else(|| Error::config("VENUE_SIGNING_KEY must be set in the environment or .env"))
    }

    pub fn require_address(&self) -> Result<&str> {
        self.address
            .as_deref()
            .ok_or_else(|| Error::config("VENUE_ADDRESS must be set in the environment or .env"))
    }

    /// Gateway base URL for the selected mode.
    pub fn rest_url(&self) -> Result<&str> {
        let (key, url) = match self.mode {
            VenueMode::Testnet => ("VENUE_TESTNET_URL", &self.testnet_url),
            VenueMode::Mainnet => ("VENUE_MAINNET_URL", &self.mainnet_url),
        };
        url.as_deref()
            .ok_or_else(|| Error::config(format!("{key} must be set for {} mode", self.mode)))
    }

    pub fn backtest_params(&self) -> BacktestParams {
        BacktestParams {
            short_window: self.short_window,
            long_window: self.long_window,
            initial_capital: self.initial_capital,
            commission_rate: self.commission_rate,
            slippage: self.slippage,
        }
    }
}

fn parse_var<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(v) if !v.trim().is_empty() => v
            .trim()
            .parse::<T>()
            .map_err(|e| Error::config(format!("Config key {key}: {e}"))),
        _ => Ok(default),
    }
}

fn parse_bool<F>(lookup: &F, key: &str, default: bool) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if v.is_empty() => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => Err(Error::config(format!("Config key {key}: {v:?} is not a boolean"))),
    }
}
