//! Basis watcher entry point
//!
//! 1. Loads configuration (YAML + env overrides)
//! 2. Builds the spot and perp price sources
//! 3. Streams per-pair prices through the detector
//! 4. Hands fired opportunities to the opportunity task
//! 5. Shuts down cleanly on Ctrl+C

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tracing::{error, info, warn};

use basis_watch::adapters::build_sources;
use basis_watch::config::{self, constants};
use basis_watch::core::{
    forward_opportunity, init_logging, last_prices, opportunity_task, ArbitrageDetector,
    ChannelBundle, DetectorConfig, InMemoryPositionStore, OpportunityLog, PriceFeed,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if it exists)
    dotenvy::dotenv().ok();

    init_logging();

    info!("Basis watcher starting...");

    let config_path = constants::config_path(std::env::args().nth(1));
    info!(path = %config_path, "Loading configuration");
    let config = match config::load_config(Path::new(&config_path)) {
        Ok(cfg) => {
            let pairs: Vec<String> = cfg.pairs.iter().map(ToString::to_string).collect();
            info!("[CONFIG] Loaded pairs: {:?}", pairs);
            info!(
                spread_threshold = %format!("{:.4}%", cfg.trading.spread_threshold * 100.0),
                trade_size = cfg.trading.trade_size_quote,
                poll_interval_ms = cfg.feed.poll_interval_ms,
                "[CONFIG] Trading parameters"
            );
            cfg
        }
        Err(e) => {
            error!("[ERROR] Configuration failed: {}", e);
            std::process::exit(1);
        }
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(config.feed.request_timeout_ms))
        .build()?;
    let sources = build_sources(&config.venues, &config.feed, client);
    info!(
        spot = sources.spot.name(),
        perp = sources.perp.name(),
        "[CONFIG] Price sources ready"
    );

    let detector = Arc::new(ArbitrageDetector::with_pairs(
        DetectorConfig::from(&config.trading),
        &config.pairs,
    ));
    let feed = PriceFeed::new(sources.spot, sources.perp, config.feed);
    let price_history = feed.history();

    let ChannelBundle {
        opportunity_tx,
        opportunity_rx,
        cancel,
    } = ChannelBundle::default();

    let opportunity_log = OpportunityLog::new(constants::OPPORTUNITY_LOG_CAPACITY).into_shared();
    let store = InMemoryPositionStore::new().into_shared();
    let opportunity_handle = tokio::spawn(opportunity_task(
        opportunity_rx,
        opportunity_log.clone(),
        store,
        cancel.clone(),
    ));

    // SIGINT -> cancel every task
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("[SHUTDOWN] Graceful shutdown initiated");
                signal_cancel.cancel();
            }
            Err(err) => {
                error!("Failed to listen for Ctrl+C signal: {}", err);
            }
        }
    });

    info!("Monitoring started. Press Ctrl+C to stop.");

    let callback_detector = detector.clone();
    feed.start_price_monitoring(
        &config.pairs,
        move |sample| {
            let checked = callback_detector.check_arbitrage_opportunity(
                &sample.pair,
                sample.spot_price,
                sample.perp_price,
            );
            match checked {
                Ok(Some(record)) => {
                    forward_opportunity(&opportunity_tx, record);
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "[FEED] Sample rejected by detector"),
            }
        },
        cancel.clone(),
    )
    .await;

    // Monitoring only returns on cancellation or when every producer died
    cancel.cancel();
    if let Err(e) = opportunity_handle.await {
        error!(error = %e, "Opportunity task panicked");
    }

    for last in last_prices(&price_history, &config.pairs).await {
        info!(
            pair = %last.pair,
            spot = ?last.spot.map(|q| q.price),
            perp = ?last.perp.map(|q| q.price),
            "[SHUTDOWN] Last known prices"
        );
    }

    let logged = opportunity_log.read().await.len();
    info!(opportunities = logged, "[SHUTDOWN] Clean exit");
    Ok(())
}
