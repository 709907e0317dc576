/// report.rs — Backtest artifacts
///
/// A run directory holds:
///   report.txt     parameters + performance report + trade ledger
///   trades.csv     one row per ledger entry
///   equity.csv     bar-by-bar mark-to-close equity
///   manifest.json  the full BacktestResult
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;

use crossover_engine::backtest::{BacktestParams, BacktestResult, EquityPoint, Trade};
use crossover_engine::metrics::PerfReport;
use crossover_engine::sweep::SweepResult;

/// Human-readable report for one run.
pub fn generate_text_report(
    label: &str,
    params: &BacktestParams,
    result: &BacktestResult,
    perf: &PerfReport,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Backtest: {label}");
    let _ = writeln!(out, "Generated: {}", Utc::now().format("%Y-%m-%d %H:%M:%S UTC"));
    let _ = writeln!(
        out,
        "SMA {}/{}  capital=${}  commission={}  slippage={}",
        params.short_window,
        params.long_window,
        params.initial_capital,
        params.commission_rate,
        params.slippage
    );
    let _ = writeln!(out);
    let _ = write!(out, "{perf}");
    let _ = writeln!(out, "  Total PnL      : ${:.2}", result.total_pnl);
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:<5} {:<11} {:<17} {:>14} {:>14} {:>14} {:>12}",
        "N", "SIDE", "DATE", "PRICE", "SHARES", "CAPITAL", "PNL"
    );
    for (i, t) in result.trades.iter().enumerate() {
        let pnl = t.pnl.map(|p| format!("{p:+.2}")).unwrap_or_else(|| "-".into());
        let _ = writeln!(
            out,
            "{:<5} {:<11} {:<17} {:>14.4} {:>14.6} {:>14.2} {:>12}",
            i + 1,
            t.side.as_str(),
            t.date.format("%Y-%m-%d %H:%M"),
            t.price,
            t.shares,
            t.capital_after,
            pnl
        );
    }
    out
}

/// Columns: date,side,price,shares,capital_after,pnl
pub fn export_trades_csv(trades: &[Trade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "side", "price", "shares", "capital_after", "pnl"])?;
    for t in trades {
        wtr.write_record([
            t.date.to_rfc3339(),
            t.side.as_str().to_string(),
            t.price.to_string(),
            t.shares.to_string(),
            t.capital_after.to_string(),
            t.pnl.map(|p| p.to_string()).unwrap_or_default(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Columns: timestamp,equity
pub fn export_equity_csv(curve: &[EquityPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["timestamp", "equity"])?;
    for p in curve {
        wtr.write_record([p.timestamp.to_rfc3339(), format!("{:.6}", p.equity)])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Write the artifact set under `output_dir/{label}_{timestamp}/`.
pub fn save_artifacts(
    output_dir: &Path,
    label: &str,
    params: &BacktestParams,
    result: &BacktestResult,
    perf: &PerfReport,
) -> Result<PathBuf> {
    let run_dir = output_dir.join(format!("{label}_{}", Utc::now().format("%Y%m%d_%H%M%S")));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("report.txt"), generate_text_report(label, params, result, perf))?;
    std::fs::write(run_dir.join("trades.csv"), export_trades_csv(&result.trades)?)?;
    std::fs::write(run_dir.join("equity.csv"), export_equity_csv(&result.equity_curve)?)?;
    let manifest = serde_json::to_string_pretty(result)
        .context("failed to serialize BacktestResult to JSON")?;
    std::fs::write(run_dir.join("manifest.json"), manifest)?;

    Ok(run_dir)
}

/// Top `n` rows of a window sweep as a table.
pub fn format_sweep_table(results: &[SweepResult], n: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<6} {:>6} {:>6} {:>14} {:>14} {:>8}",
        "RANK", "SHORT", "LONG", "TOTAL PNL", "FINAL CAP", "TRADES"
    );
    let _ = writeln!(out, "{}", "─".repeat(59));
    for (i, r) in results.iter().take(n).enumerate() {
        let _ = writeln!(
            out,
            "{:<6} {:>6} {:>6} {:>14.2} {:>14.2} {:>8}",
            i + 1,
            r.short_window,
            r.long_window,
            r.total_pnl,
            r.final_capital,
            r.num_trades
        );
    }
    out
}
