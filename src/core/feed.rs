//! Price feed: per-(pair, venue) polling tasks merged into one sample stream
//!
//! # Architecture
//! - One producer task per (pair, venue) polls its `PriceSource` on an
//!   interval and pushes `PriceUpdate`s into a bounded mpsc channel
//! - A single dispatch loop keeps the latest spot and perp price per pair
//!   and invokes the callback with a `PriceSample` once both legs are known
//! - Failed polls are logged and retried with backoff inside the producer;
//!   they never reach the dispatch loop or other producers
//! - Cancellation stops every producer; the dispatch loop only checks it
//!   between updates, so a running callback always completes

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapters::errors::SourceError;
use crate::adapters::traits::PriceSource;
use crate::config::{BackoffConfig, FeedConfig, TradingPair};
use crate::core::history::{PriceHistory, SharedPriceHistory};
use crate::core::reconnect::Backoff;
use crate::core::types::{PriceQuote, PriceSample, PriceUpdate, Venue};

/// Latest known price per venue for one pair
#[derive(Debug, Clone, Copy, Default)]
struct LatestPrices {
    spot: Option<f64>,
    perp: Option<f64>,
}

impl LatestPrices {
    fn set(&mut self, venue: Venue, price: f64) {
        match venue {
            Venue::Spot => self.spot = Some(price),
            Venue::Perp => self.perp = Some(price),
        }
    }

    fn both(&self) -> Option<(f64, f64)> {
        Some((self.spot?, self.perp?))
    }
}

/// Polling parameters handed to each producer task
#[derive(Debug, Clone, Copy)]
struct PollSettings {
    poll_interval: Duration,
    request_timeout_ms: u64,
    backoff: BackoffConfig,
}

/// Continuous per-pair (spot, perp) price stream from two venue sources.
pub struct PriceFeed {
    spot: Arc<dyn PriceSource>,
    perp: Arc<dyn PriceSource>,
    config: FeedConfig,
    history: SharedPriceHistory,
}

impl PriceFeed {
    pub fn new(spot: Arc<dyn PriceSource>, perp: Arc<dyn PriceSource>, config: FeedConfig) -> Self {
        let history = PriceHistory::new(config.history_len).into_shared();
        Self {
            spot,
            perp,
            config,
            history,
        }
    }

    /// Handle on the price history this feed records into
    pub fn history(&self) -> SharedPriceHistory {
        self.history.clone()
    }

    /// Monitor `pairs` until `cancel` fires.
    ///
    /// `callback` is invoked with the latest (spot, perp) prices of a pair
    /// every time either leg updates and both are known. Calls for the
    /// same pair happen in the order updates were received. The callback
    /// runs on the dispatch loop and must not block.
    pub async fn start_price_monitoring<F>(
        &self,
        pairs: &[TradingPair],
        mut callback: F,
        cancel: CancellationToken,
    ) where
        F: FnMut(PriceSample) + Send,
    {
        let pairs = dedup_pairs(pairs);
        info!(
            pairs = ?pairs.iter().map(ToString::to_string).collect::<Vec<_>>(),
            spot = self.spot.name(),
            perp = self.perp.name(),
            "[FEED] Starting price monitoring"
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("[SHUTDOWN] Price monitoring cancelled during source preparation");
                return;
            }
            _ = self.prepare_sources(&pairs) => {}
        }

        let (update_tx, mut update_rx) = mpsc::channel::<PriceUpdate>(self.config.channel_capacity);
        let producers = cancel.child_token();
        let settings = PollSettings {
            poll_interval: Duration::from_millis(self.config.poll_interval_ms),
            request_timeout_ms: self.config.request_timeout_ms,
            backoff: self.config.backoff,
        };

        let mut handles: Vec<JoinHandle<()>> = Vec::with_capacity(pairs.len() * 2);
        for pair in &pairs {
            for source in [&self.spot, &self.perp] {
                handles.push(tokio::spawn(poll_venue(
                    source.clone(),
                    pair.clone(),
                    update_tx.clone(),
                    settings,
                    producers.clone(),
                )));
            }
        }
        // Only producers hold senders now
        drop(update_tx);

        let mut latest: HashMap<TradingPair, LatestPrices> = HashMap::with_capacity(pairs.len());
        let mut dispatched: u64 = 0;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("[SHUTDOWN] Price monitoring cancelled");
                    break;
                }
                update = update_rx.recv() => {
                    let Some(update) = update else {
                        warn!("[FEED] All producers stopped");
                        break;
                    };
                    if let Some(sample) = self.apply_update(update, &mut latest).await {
                        dispatched += 1;
                        callback(sample);
                    }
                }
            }
        }

        producers.cancel();
        join_all(handles).await;
        info!(samples = dispatched, "[FEED] Price monitoring stopped");
    }

    async fn prepare_sources(&self, pairs: &[TradingPair]) {
        let (spot, perp) = tokio::join!(self.spot.prepare(pairs), self.perp.prepare(pairs));
        for (source, result) in [(&self.spot, spot), (&self.perp, perp)] {
            if let Err(e) = result {
                warn!(source = source.name(), error = %e, "[FEED] Source preparation failed");
            }
        }
    }

    /// Record an update and build the merged sample if both legs are known.
    async fn apply_update(
        &self,
        update: PriceUpdate,
        latest: &mut HashMap<TradingPair, LatestPrices>,
    ) -> Option<PriceSample> {
        self.history.write().await.record(
            update.venue,
            &update.pair,
            PriceQuote {
                price: update.price,
                observed_at: update.observed_at,
            },
        );

        let entry = latest.entry(update.pair.clone()).or_default();
        entry.set(update.venue, update.price);
        let (spot_price, perp_price) = entry.both()?;

        Some(PriceSample {
            pair: update.pair,
            spot_price,
            perp_price,
            observed_at: update.observed_at,
        })
    }
}

/// Producer loop for one (pair, venue).
///
/// Runs until cancelled or the dispatch side goes away. Failures are
/// retried with backoff; success resets the backoff.
async fn poll_venue(
    source: Arc<dyn PriceSource>,
    pair: TradingPair,
    tx: mpsc::Sender<PriceUpdate>,
    settings: PollSettings,
    cancel: CancellationToken,
) {
    let venue = source.venue();
    let mut backoff = Backoff::new(settings.backoff);
    let mut ticker = interval(settings.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    debug!(pair = %pair, venue = %venue, "[FEED] Producer started");

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = fetch_with_timeout(source.as_ref(), &pair, settings.request_timeout_ms) => {
                result
            }
        };

        match result {
            Ok(quote) => {
                if backoff.failures() > 0 {
                    info!(
                        pair = %pair,
                        venue = %venue,
                        failures = backoff.failures(),
                        "[FEED] Upstream recovered"
                    );
                }
                backoff.reset();

                let update = PriceUpdate {
                    pair: pair.clone(),
                    venue,
                    price: quote.price,
                    observed_at: quote.observed_at,
                };
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    sent = tx.send(update) => {
                        if sent.is_err() {
                            debug!(pair = %pair, venue = %venue, "[FEED] Dispatch closed");
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                let mut delay = backoff.next_delay();
                if !e.is_transient() {
                    delay = delay.max(backoff.max_delay());
                }
                warn!(
                    pair = %pair,
                    venue = %venue,
                    source = source.name(),
                    error = %e,
                    failures = backoff.failures(),
                    retry_in_ms = delay.as_millis() as u64,
                    "[FEED] Upstream unavailable"
                );
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
                // Next attempt happens right after the backoff
                ticker.reset_immediately();
            }
        }
    }

    debug!(pair = %pair, venue = %venue, "[FEED] Producer stopped");
}

async fn fetch_with_timeout(
    source: &dyn PriceSource,
    pair: &TradingPair,
    timeout_ms: u64,
) -> Result<PriceQuote, SourceError> {
    let quote = tokio::time::timeout(Duration::from_millis(timeout_ms), source.fetch_price(pair))
        .await
        .map_err(|_| SourceError::NetworkTimeout(timeout_ms))??;

    if !quote.price.is_finite() || quote.price <= 0.0 {
        return Err(SourceError::InvalidResponse(format!(
            "{} returned non-positive price {} for {}",
            source.name(),
            quote.price,
            pair
        )));
    }
    Ok(quote)
}

/// Drop repeated pairs while keeping configuration order
fn dedup_pairs(pairs: &[TradingPair]) -> Vec<TradingPair> {
    let mut seen = std::collections::HashSet::new();
    pairs
        .iter()
        .filter(|p| seen.insert((*p).clone()))
        .cloned()
        .collect()
}
