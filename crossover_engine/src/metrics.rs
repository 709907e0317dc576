/// metrics.rs — Performance Metrics
///
/// ─────────────────────────────────────────────────────────────────────────
/// DEFINITIONS
/// ─────────────────────────────────────────────────────────────────────────
///
/// ROUND TRIPS
///   Closing ledger entries (SELL / SELL_FINAL) with their PnL in quote
///   currency.
///
///   P_win         = count(pnl > 0) / N_round_trips
///   AvgWin        = mean(pnl | pnl > 0)
///   AvgLoss       = mean(|pnl| | pnl ≤ 0)
///   Profit Factor = Σ wins / Σ |losses|
///
/// SHARPE RATIO (annualised, per-bar equity returns)
///   r_t = E_t / E_{t-1} − 1
///   SR  = mean(r) / std(r) × √bars_per_year
///
/// MAXIMUM DRAWDOWN
///   peak_t = max_{s ≤ t}(E_s)
///   MaxDD  = min_t (E_t − peak_t) / peak_t      (≤ 0)
/// ─────────────────────────────────────────────────────────────────────────
use rust_decimal::prelude::ToPrimitive;

use crate::backtest::BacktestResult;

#[derive(Debug, Clone, PartialEq)]
pub struct PerfReport {
    pub n_trades:       usize,
    pub n_round_trips:  usize,
    pub win_rate:       f64,
    pub avg_win:        f64,  // quote currency
    pub avg_loss:       f64,  // quote currency, positive
    pub profit_factor:  f64,
    pub total_return:   f64,  // fraction of initial capital
    pub sharpe:         f64,
    pub max_drawdown:   f64,  // fraction (negative)
    pub initial_equity: f64,
    pub final_equity:   f64,
}

impl std::fmt::Display for PerfReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "════════════════════════════════════════════")?;
        writeln!(f, "  SMA CROSSOVER — BACKTEST PERFORMANCE REPORT")?;
        writeln!(f, "════════════════════════════════════════════")?;
        writeln!(f, "  Ledger Entries : {}", self.n_trades)?;
        writeln!(f, "  Round Trips    : {}", self.n_round_trips)?;
        writeln!(f, "  Win Rate       : {:.2}%", self.win_rate * 100.0)?;
        writeln!(f, "  Avg Win        : ${:.2}", self.avg_win)?;
        writeln!(f, "  Avg Loss       : ${:.2}", self.avg_loss)?;
        writeln!(f, "  Profit Factor  : {:.3}", self.profit_factor)?;
        writeln!(f, "  Total Return   : {:.2}%", self.total_return * 100.0)?;
        writeln!(f, "  Sharpe Ratio   : {:.3}", self.sharpe)?;
        writeln!(f, "  Max Drawdown   : {:.2}%", self.max_drawdown * 100.0)?;
        writeln!(f, "  Initial Equity : ${:.2}", self.initial_equity)?;
        writeln!(f, "  Final Equity   : ${:.2}", self.final_equity)?;
        writeln!(f, "════════════════════════════════════════════")
    }
}

/// Compute all performance metrics from a finished backtest.
///
/// # Arguments
/// * `result`        — ledger and equity curve of the run
/// * `bars_per_year` — annualisation factor (see `Granularity::bars_per_year`)
pub fn compute_metrics(result: &BacktestResult, bars_per_year: f64) -> PerfReport {
    let initial_equity = result.initial_capital.to_f64().unwrap_or(0.0);
    let final_equity = result.final_capital.to_f64().unwrap_or(0.0);
    let total_return = if initial_equity.abs() < 1e-12 {
        0.0
    } else {
        (final_equity - initial_equity) / initial_equity
    };

    // ── Per-trade statistics ──────────────────────────────────────────────
    let pnls: Vec<f64> = result
        .closed_trades()
        .filter_map(|t| t.pnl.and_then(|p| p.to_f64()))
        .collect();
    let winners: Vec<f64> = pnls.iter().copied().filter(|&p| p > 0.0).collect();
    let losers: Vec<f64> = pnls.iter().copied().filter(|&p| p <= 0.0).map(f64::abs).collect();

    let n = pnls.len();
    let win_rate = if n == 0 { 0.0 } else { winners.len() as f64 / n as f64 };
    let gross_win: f64 = winners.iter().sum();
    let gross_loss: f64 = losers.iter().sum();
    let profit_factor = if gross_loss < 1e-10 {
        if gross_win > 0.0 { f64::INFINITY } else { 0.0 }
    } else {
        gross_win / gross_loss
    };

    // ── Equity-curve statistics ───────────────────────────────────────────
    let curve: Vec<f64> = result
        .equity_curve
        .iter()
        .filter_map(|p| p.equity.to_f64())
        .collect();
    let returns: Vec<f64> = curve
        .windows(2)
        .filter(|w| w[0].abs() > 1e-12)
        .map(|w| w[1] / w[0] - 1.0)
        .collect();
    let r_std = std_dev(&returns);
    let sharpe = if r_std < 1e-12 {
        0.0
    } else {
        mean(&returns).unwrap_or(0.0) / r_std * bars_per_year.sqrt()
    };

    PerfReport {
        n_trades: result.num_trades(),
        n_round_trips: n,
        win_rate,
        avg_win: mean(&winners).unwrap_or(0.0),
        avg_loss: mean(&losers).unwrap_or(0.0),
        profit_factor,
        total_return,
        sharpe,
        max_drawdown: max_drawdown(&curve),
        initial_equity,
        final_equity,
    }
}

/// Maximum drawdown from an equity curve.
/// Returns a negative value (e.g. −0.15 = −15% drawdown).
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let Some(&first) = equity_curve.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0f64;

    for &e in equity_curve {
        if e > peak {
            peak = e;
        }
        if peak > 0.0 {
            max_dd = max_dd.min((e - peak) / peak);
        }
    }
    max_dd
}

// ── Statistical helpers ───────────────────────────────────────────────────

fn mean(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    Some(data.iter().sum::<f64>() / data.len() as f64)
}

fn std_dev(data: &[f64]) -> f64 {
    if data.len() < 2 {
        return 0.0;
    }
    let m = data.iter().sum::<f64>() / data.len() as f64;
    let var = data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (data.len() - 1) as f64;
    var.sqrt()
}
