/// sweep.rs — Window grid search over one series.
///
/// Every `(short, long)` pair with `short < long` is backtested in parallel.
/// Each run is independent and deterministic, so the sorted output does not
/// depend on thread scheduling.
use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::backtest::{run_backtest, BacktestParams};
use crate::data::Series;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepResult {
    pub short_window: usize,
    pub long_window: usize,
    pub total_pnl: Decimal,
    pub final_capital: Decimal,
    pub num_trades: usize,
}

/// Backtest every valid window pair; best `total_pnl` first, ties by windows.
pub fn sweep_windows(
    series: &Series,
    shorts: &[usize],
    longs: &[usize],
    base: &BacktestParams,
) -> Vec<SweepResult> {
    let pairs: Vec<(usize, usize)> = shorts
        .iter()
        .flat_map(|&s| longs.iter().map(move |&l| (s, l)))
        .filter(|&(s, l)| s > 0 && s < l)
        .collect();

    let mut results: Vec<SweepResult> = pairs
        .par_iter()
        .map(|&(short_window, long_window)| {
            let params = BacktestParams { short_window, long_window, ..base.clone() };
            let result = run_backtest(series, &params);
            SweepResult {
                short_window,
                long_window,
                total_pnl: result.total_pnl,
                final_capital: result.final_capital,
                num_trades: result.num_trades(),
            }
        })
        .collect();

    results.sort_by(|a, b| {
        b.total_pnl
            .cmp(&a.total_pnl)
            .then(a.short_window.cmp(&b.short_window))
            .then(a.long_window.cmp(&b.long_window))
    });
    results
}
