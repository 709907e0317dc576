/// backtest.rs — Event-Driven Backtesting Engine
///
/// Replays a candle series through the Signal Engine and a long-only
/// capital ledger. Every position change is appended to the trade ledger;
/// the ledger is never mutated after the fact.
///
/// STATE MACHINE
/// ┌──────────┐  position_change = +1   ┌──────────┐
/// │   FLAT   │ ──────────────────────▶ │   LONG   │
/// │          │ ◀────────────────────── │          │
/// └──────────┘  position_change = −1   └──────────┘
///                 (or last bar: SELL_FINAL)
///
/// FILL MODEL
///   buy  price = close × (1 + slippage)
///   sell price = close × (1 − slippage)
///   commission = commission_rate × (fill price × shares)
///
/// Slippage adjusts the price first; commission is charged on the adjusted
/// notional.
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::data::Series;
use crate::strategy::{generate_signals, Crossover};

pub const DEFAULT_COMMISSION_RATE: Decimal = dec!(0.001); // 0.1%
pub const DEFAULT_SLIPPAGE: Decimal = dec!(0.0001); // 1bp

/// Backtest run parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestParams {
    pub short_window: usize,
    pub long_window: usize,
    pub initial_capital: Decimal,
    pub commission_rate: Decimal,
    pub slippage: Decimal,
}

impl Default for BacktestParams {
    fn default() -> Self {
        Self {
            short_window: 10,
            long_window: 30,
            initial_capital: dec!(10000),
            commission_rate: DEFAULT_COMMISSION_RATE,
            slippage: DEFAULT_SLIPPAGE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeSide {
    Buy,
    Sell,
    /// Forced close of a position still open after the last bar.
    SellFinal,
}

impl TradeSide {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
            Self::SellFinal => "SELL_FINAL",
        }
    }
}

/// One ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub date: DateTime<Utc>,
    pub side: TradeSide,
    /// Fill price after slippage.
    pub price: Decimal,
    pub shares: Decimal,
    pub capital_after: Decimal,
    /// Set on closing trades only.
    pub pnl: Option<Decimal>,
}

/// Mark-to-close account value at one bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub initial_capital: Decimal,
    pub final_capital: Decimal,
    pub total_pnl: Decimal,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
}

impl BacktestResult {
    /// Result of a run that had nothing to replay.
    pub fn empty(initial_capital: Decimal) -> Self {
        Self {
            initial_capital,
            final_capital: initial_capital,
            total_pnl: Decimal::ZERO,
            trades: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn num_trades(&self) -> usize {
        self.trades.len()
    }

    /// Closing trades (those carrying a PnL).
    pub fn closed_trades(&self) -> impl Iterator<Item = &Trade> {
        self.trades.iter().filter(|t| t.pnl.is_some())
    }
}

/// Open long position carried between bars.
#[derive(Debug, Clone, Copy)]
struct OpenLong {
    shares: Decimal,
    entry_price: Decimal,
}

struct Ledger<'a> {
    params: &'a BacktestParams,
    capital: Decimal,
    position: Option<OpenLong>,
    trades: Vec<Trade>,
}

impl Ledger<'_> {
    fn buy(&mut self, date: DateTime<Utc>, close: Decimal) {
        let price = close * (Decimal::ONE + self.params.slippage);
        let shares = match self.capital.checked_div(price) {
            Some(shares) if price > Decimal::ZERO => shares,
            _ => {
                warn!("Skipping BUY at {date}: non-positive fill price {price}");
                return;
            }
        };
        let cost = shares * price;
        self.capital -= cost;
        self.capital -= cost * self.params.commission_rate;
        self.position = Some(OpenLong { shares, entry_price: price });
        self.record(date, TradeSide::Buy, price, shares, None);
    }

    fn sell(&mut self, date: DateTime<Utc>, close: Decimal, side: TradeSide) {
        let Some(open) = self.position.take() else {
            return;
        };
        let price = close * (Decimal::ONE - self.params.slippage);
        let proceeds = open.shares * price;
        self.capital += proceeds;
        self.capital -= proceeds * self.params.commission_rate;
        // Paired with the BUY immediately before it in the ledger.
        let entry_cost = self
            .trades
            .last()
            .filter(|t| t.side == TradeSide::Buy)
            .map(|t| t.shares * t.price)
            .unwrap_or(open.shares * open.entry_price);
        let pnl = proceeds - entry_cost;
        self.record(date, side, price, open.shares, Some(pnl));
    }

    fn record(
        &mut self,
        date: DateTime<Utc>,
        side: TradeSide,
        price: Decimal,
        shares: Decimal,
        pnl: Option<Decimal>,
    ) {
        match pnl {
            Some(pnl) => info!(
                "{}: {} - Price: {:.2}, Shares: {:.6}, Capital: {:.2}, PnL: {:.2}",
                side.as_str(), date, price, shares, self.capital, pnl
            ),
            None => info!(
                "{}: {} - Price: {:.2}, Shares: {:.6}, Capital: {:.2}",
                side.as_str(), date, price, shares, self.capital
            ),
        }
        self.trades.push(Trade {
            date,
            side,
            price,
            shares,
            capital_after: self.capital,
            pnl,
        });
    }

    fn equity(&self, close: Decimal) -> Decimal {
        self.capital + self.position.map_or(Decimal::ZERO, |p| p.shares * close)
    }
}

/// Run a complete backtest over a candle series.
///
/// An empty series returns `BacktestResult::empty`; it is not an error.
pub fn run_backtest(series: &Series, params: &BacktestParams) -> BacktestResult {
    let rows = generate_signals(series, params.short_window, params.long_window);
    if rows.is_empty() {
        info!("No strategy data to backtest.");
        return BacktestResult::empty(params.initial_capital);
    }

    let mut ledger = Ledger {
        params,
        capital: params.initial_capital,
        position: None,
        trades: Vec::new(),
    };
    let mut equity_curve = Vec::with_capacity(rows.len());

    // ── Main event loop ───────────────────────────────────────────────────
    for row in &rows {
        match (row.crossover(), ledger.position.is_some()) {
            (Crossover::Bullish, false) => ledger.buy(row.timestamp, row.close),
            (Crossover::Bearish, true) => ledger.sell(row.timestamp, row.close, TradeSide::Sell),
            _ => {}
        }
        equity_curve.push(EquityPoint {
            timestamp: row.timestamp,
            equity: ledger.equity(row.close),
        });
    }

    // ── Force-close any remaining open position at last close ────────────
    if ledger.position.is_some() {
        if let Some(last) = rows.last() {
            ledger.sell(last.timestamp, last.close, TradeSide::SellFinal);
            if let Some(point) = equity_curve.last_mut() {
                point.equity = ledger.capital;
            }
        }
    }

    let final_capital = ledger.capital;
    BacktestResult {
        initial_capital: params.initial_capital,
        final_capital,
        total_pnl: final_capital - params.initial_capital,
        trades: ledger.trades,
        equity_curve,
    }
}

/// Print the trade ledger as a table.
pub fn print_trade_log(trades: &[Trade], top_n: usize) {
    println!(
        "\n{:<6} {:<11} {:<21} {:<12} {:<12} {:<14} {:<10}",
        "N", "SIDE", "DATE", "PRICE", "SHARES", "CAPITAL", "PNL"
    );
    println!("{}", "─".repeat(90));

    for (i, t) in trades.iter().enumerate().take(top_n) {
        let pnl = t.pnl.map(|p| format!("{p:+.2}")).unwrap_or_else(|| "-".into());
        println!(
            "{:<6} {:<11} {:<21} {:<12.2} {:<12.6} {:<14.2} {:<10}",
            i + 1,
            t.side.as_str(),
            t.date.format("%Y-%m-%d %H:%M"),
            t.price,
            t.shares,
            t.capital_after,
            pnl,
        );
    }
}
