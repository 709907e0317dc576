/// live_main.rs — Live Trading Entry Point
///
/// Runs the SMA crossover controller against the venue gateway.
///
/// FLOW:
///   1. Load config from .env (VENUE_SIGNING_KEY, VENUE_ADDRESS, ...)
///   2. Resolve the first subaccount of the signer address
///   3. Warn if the venue already reports an open perp (no reconciliation)
///   4. Poll every CHECK_INTERVAL_SECONDS: candles → signals → orders
///   5. Ctrl-C stops the loop between cycles
///
/// DRY_RUN=true wraps the gateway in a paper venue: reads are real,
/// orders are only logged.
use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crossover_engine::config::{AppConfig, VenueMode};
use crossover_engine::gateway::GatewayClient;
use crossover_engine::live::{Controller, ControllerConfig};
use crossover_engine::paper::PaperVenue;
use crossover_engine::venue::VenueClient;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════╗");
    info!("║   CROSSOVER ENGINE  —  LIVE TRADING MODE     ║");
    info!("╚══════════════════════════════════════════════╝");

    let cfg = AppConfig::from_env()?;
    match cfg.mode {
        VenueMode::Testnet => info!("TESTNET active. No real funds at risk."),
        VenueMode::Mainnet => warn!("⚠️  MAINNET — REAL MONEY — ensure all parameters are correct!"),
    }

    let gateway = GatewayClient::new(cfg.rest_url()?, cfg.require_signing_key()?)?;
    let address = cfg.require_address()?.to_owned();

    if cfg.dry_run {
        warn!("DRY_RUN enabled: orders are logged, not sent.");
        run(PaperVenue::new(gateway), &cfg, &address).await
    } else {
        run(gateway, &cfg, &address).await
    }
}

async fn run<V: VenueClient>(venue: V, cfg: &AppConfig, address: &str) -> Result<()> {
    info!(
        "Configuration: Product ID={}, Interval={}, Strategy={}/{} SMA Crossover",
        cfg.product_id, cfg.granularity, cfg.short_window, cfg.long_window
    );

    // ── Subaccount ────────────────────────────────────────────────────────
    let subaccounts = venue
        .get_subaccounts(address)
        .await
        .context("Failed to initialize bot and get subaccount")?;
    let Some(first) = subaccounts.into_iter().next() else {
        error!("No subaccounts found for address {address}. Exiting.");
        return Ok(());
    };
    let subaccount = first.subaccount;
    info!("Using subaccount ID: {subaccount}");

    // ── Existing exposure (informational) ─────────────────────────────────
    match venue.get_account_summary(&subaccount).await {
        Ok(summary) if !summary.exists => warn!("Subaccount {subaccount} does not exist on the venue yet"),
        Ok(summary) => {
            if let Some(pos) = summary.perp_position(cfg.product_id) {
                warn!(
                    "Venue reports an open perp of {} @ {} on product {}; controller starts FLAT and will not manage it",
                    pos.amount, pos.entry_price.round_dp(2), cfg.product_id
                );
            }
            if let Some(h) = summary.healths.first() {
                info!("Account health: assets={} liabilities={} health={}", h.assets, h.liabilities, h.health);
            }
        }
        Err(e) => warn!("Could not fetch account summary: {e}"),
    }

    // ── Live polling loop ─────────────────────────────────────────────────
    let mut controller = Controller::new(venue, ControllerConfig::from(cfg), subaccount);
    controller
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for ctrl-c: {e}");
                std::future::pending::<()>().await;
            }
        })
        .await;

    info!("Bot shutting down gracefully...");
    Ok(())
}
