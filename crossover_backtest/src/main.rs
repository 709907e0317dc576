/// main.rs — File-driven Backtest Runner
///
/// Subcommands:
///   run    replay a candle CSV and save report artifacts
///   sweep  grid-search SMA windows over a candle CSV
///   fetch  download venue candles into a CSV
///
/// Strategy and fee defaults come from .env (see `AppConfig`); flags override.
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crossover_backtest::csv_data::{load_candles, save_candles};
use crossover_backtest::report::{format_sweep_table, save_artifacts};
use crossover_engine::backtest::{print_trade_log, run_backtest, BacktestParams};
use crossover_engine::config::AppConfig;
use crossover_engine::data::{Granularity, Series};
use crossover_engine::gateway::GatewayClient;
use crossover_engine::metrics::compute_metrics;
use crossover_engine::sweep::sweep_windows;
use crossover_engine::venue::VenueClient;

#[derive(Parser)]
#[command(name = "crossover_backtest")]
#[command(about = "SMA crossover backtests over candle CSV files")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a single backtest
    Run {
        /// Candle CSV (timestamp,open,high,low,close,volume)
        #[arg(short, long)]
        data_file: PathBuf,

        /// Label used for the artifact directory
        #[arg(short, long, default_value = "crossover")]
        label: String,

        #[arg(long)]
        short_window: Option<usize>,

        #[arg(long)]
        long_window: Option<usize>,

        /// Initial capital in quote currency
        #[arg(short, long)]
        initial_capital: Option<Decimal>,

        #[arg(long)]
        commission_rate: Option<Decimal>,

        #[arg(long)]
        slippage: Option<Decimal>,

        /// Bar interval of the data, for Sharpe annualisation
        #[arg(long)]
        interval: Option<Granularity>,

        /// Output directory for reports
        #[arg(short, long, default_value = "./reports")]
        output_dir: PathBuf,

        /// Ledger rows printed to the console
        #[arg(long, default_value_t = 20)]
        top: usize,
    },

    /// Backtest every short < long window pair
    Sweep {
        #[arg(short, long)]
        data_file: PathBuf,

        /// Short windows, comma separated
        #[arg(long, value_delimiter = ',', default_value = "5,10,15,20")]
        shorts: Vec<usize>,

        /// Long windows, comma separated
        #[arg(long, value_delimiter = ',', default_value = "20,30,50,100")]
        longs: Vec<usize>,

        /// Rows printed
        #[arg(long, default_value_t = 10)]
        top: usize,
    },

    /// Download candles from the venue gateway
    Fetch {
        /// Output CSV path
        #[arg(short, long)]
        output: PathBuf,

        #[arg(long)]
        product_id: Option<u32>,

        #[arg(long)]
        interval: Option<Granularity>,
    },
}

/// Main application
pub struct BacktestApp {
    cli: Cli,
    cfg: AppConfig,
}

impl BacktestApp {
    pub fn new(cli: Cli, cfg: AppConfig) -> Self {
        Self { cli, cfg }
    }

    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Run {
                data_file,
                label,
                short_window,
                long_window,
                initial_capital,
                commission_rate,
                slippage,
                interval,
                output_dir,
                top,
            } => {
                let defaults = self.cfg.backtest_params();
                let params = BacktestParams {
                    short_window: short_window.unwrap_or(defaults.short_window),
                    long_window: long_window.unwrap_or(defaults.long_window),
                    initial_capital: initial_capital.unwrap_or(defaults.initial_capital),
                    commission_rate: commission_rate.unwrap_or(defaults.commission_rate),
                    slippage: slippage.unwrap_or(defaults.slippage),
                };
                let interval = interval.unwrap_or(self.cfg.granularity);
                self.run_backtest(data_file, label, &params, interval, output_dir, *top)
            }
            Commands::Sweep { data_file, shorts, longs, top } => {
                self.run_sweep(data_file, shorts, longs, *top)
            }
            Commands::Fetch { output, product_id, interval } => {
                let product_id = product_id.unwrap_or(self.cfg.product_id);
                let interval = interval.unwrap_or(self.cfg.granularity);
                self.fetch(output, product_id, interval).await
            }
        }
    }

    fn run_backtest(
        &self,
        data_file: &Path,
        label: &str,
        params: &BacktestParams,
        interval: Granularity,
        output_dir: &Path,
        top: usize,
    ) -> Result<()> {
        info!("Starting backtest run...");
        info!("Data file: {}", data_file.display());
        info!(
            "SMA {}/{}  capital=${}  commission={}  slippage={}",
            params.short_window,
            params.long_window,
            params.initial_capital,
            params.commission_rate,
            params.slippage
        );

        let series = load_candles(data_file)?;
        info!("Loaded {} candles", series.len());

        let result = run_backtest(&series, params);
        let perf = compute_metrics(&result, interval.bars_per_year());

        let run_dir = save_artifacts(output_dir, label, params, &result, &perf)?;
        info!("Report saved to: {}", run_dir.display());

        print_trade_log(&result.trades, top);
        println!("\n{perf}");
        println!("Total PnL: ${:.2}", result.total_pnl);
        Ok(())
    }

    fn run_sweep(&self, data_file: &Path, shorts: &[usize], longs: &[usize], top: usize) -> Result<()> {
        let series = load_candles(data_file)?;
        info!(
            "Sweeping {} short × {} long windows over {} candles",
            shorts.len(),
            longs.len(),
            series.len()
        );
        let results = sweep_windows(&series, shorts, longs, &self.cfg.backtest_params());
        if results.is_empty() {
            anyhow::bail!("No valid window pairs: every short window must be below a long window");
        }
        println!("\n{}", format_sweep_table(&results, top));
        Ok(())
    }

    async fn fetch(&self, output: &Path, product_id: u32, interval: Granularity) -> Result<()> {
        let rest_url = self.cfg.rest_url()?;
        let client = GatewayClient::new(rest_url, self.cfg.require_signing_key()?)?;

        info!("Fetching {interval} candles for product {product_id} from {rest_url}...");
        let raw = client.get_candlesticks(product_id, interval).await?;
        let series = Series::from_venue(&raw)?;
        save_candles(output, &series)?;
        info!("Saved {} candles to {}", series.len(), output.display());
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let cfg = AppConfig::from_env()?;

    let app = BacktestApp::new(cli, cfg);
    if let Err(e) = app.run().await {
        error!("Application error: {e:#}");
        std::process::exit(1);
    }

    Ok(())
}
