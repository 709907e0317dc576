/// main.rs — Backtesting Entry Point
///
/// Runs the SMA crossover backtest against live venue history:
///   1. Load config from .env
///   2. Fetch candlesticks from the venue gateway (testnet or mainnet)
///   3. Replay the crossover ledger
///   4. Print the trade log and performance metrics
use anyhow::Result;
use rust_decimal_macros::dec;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crossover_engine::backtest::{print_trade_log, run_backtest};
use crossover_engine::config::AppConfig;
use crossover_engine::data::Series;
use crossover_engine::gateway::GatewayClient;
use crossover_engine::metrics::compute_metrics;
use crossover_engine::venue::VenueClient;

#[tokio::main]
async fn main() -> Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════╗");
    info!("║   CROSSOVER ENGINE  —  BACKTEST MODE         ║");
    info!("║   SMA short/long crossover, long only        ║");
    info!("╚══════════════════════════════════════════════╝");

    // ── Config ───────────────────────────────────────────────────────────
    let cfg = AppConfig::from_env()?;
    let params = cfg.backtest_params();
    info!(
        "Config: product={} interval={} mode={} SMA {}/{}",
        cfg.product_id, cfg.granularity, cfg.mode, params.short_window, params.long_window
    );
    info!(
        "Fees:  commission={}% slippage={}%  capital=${}",
        params.commission_rate * dec!(100),
        params.slippage * dec!(100),
        params.initial_capital
    );

    // ── Fetch Data ───────────────────────────────────────────────────────
    // Candle reads are unsigned; the key is only needed for orders.
    let rest_url = cfg.rest_url()?;
    let client = GatewayClient::new(rest_url, cfg.signing_key.as_deref().unwrap_or_default())?;

    info!("Fetching {} candles for product {} from {}...", cfg.granularity, cfg.product_id, rest_url);
    let raw = client.get_candlesticks(cfg.product_id, cfg.granularity).await?;
    let series = Series::from_venue(&raw)?;

    if let (Some(first), Some(last)) = (series.candles().first(), series.last()) {
        info!("Loaded {} bars  ({} → {})", series.len(), first.timestamp, last.timestamp);
    }

    // ── Run Backtest ──────────────────────────────────────────────────────
    let result = run_backtest(&series, &params);
    print_trade_log(&result.trades, 50);

    // ── Print Report ──────────────────────────────────────────────────────
    let report = compute_metrics(&result, cfg.granularity.bars_per_year());
    println!("\n{}", report);
    println!("Total PnL: ${}", result.total_pnl.round_dp(2));

    Ok(())
}
