//! Runtime tasks on the orchestrator side of the detector
//!
//! The opportunity task consumes `OpportunityRecord`s fired by the detector,
//! keeps a bounded log of them and tracks one open position per
//! (pair, direction). Order placement stays outside this crate.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::TradingPair;
use crate::core::history::SharedPriceHistory;
use crate::core::state::{PositionKey, PositionRecord, PositionStore};
use crate::core::types::{OpportunityRecord, PriceQuote, Venue};

/// Type alias for the shared opportunity log
pub type SharedOpportunityLog = Arc<RwLock<OpportunityLog>>;

/// Bounded, append-only log of fired opportunities (oldest evicted first)
#[derive(Debug)]
pub struct OpportunityLog {
    records: VecDeque<OpportunityRecord>,
    capacity: usize,
}

impl OpportunityLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
        }
    }

    pub fn into_shared(self) -> SharedOpportunityLog {
        Arc::new(RwLock::new(self))
    }

    pub fn push(&mut self, record: OpportunityRecord) {
        if self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// Records detected within `window` of now, oldest first.
    pub fn recent(&self, window: ChronoDuration) -> Vec<OpportunityRecord> {
        self.recent_at(Utc::now(), window)
    }

    pub fn recent_at(&self, now: DateTime<Utc>, window: ChronoDuration) -> Vec<OpportunityRecord> {
        let cutoff = now - window;
        self.records
            .iter()
            .filter(|r| r.detected_at >= cutoff)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Last known quote of each leg for one pair
#[derive(Debug, Clone, PartialEq)]
pub struct LastPrices {
    pub pair: TradingPair,
    pub spot: Option<PriceQuote>,
    pub perp: Option<PriceQuote>,
}

/// Read-only snapshot of the feed's latest prices, in `pairs` order.
pub async fn last_prices(history: &SharedPriceHistory, pairs: &[TradingPair]) -> Vec<LastPrices> {
    let history = history.read().await;
    pairs
        .iter()
        .map(|pair| LastPrices {
            pair: pair.clone(),
            spot: history.last(Venue::Spot, pair),
            perp: history.last(Venue::Perp, pair),
        })
        .collect()
}

/// Opportunity task: drains the channel until cancelled or closed.
///
/// Every record is logged and appended to `log`. A record whose
/// (pair, direction) already has an open position is skipped for position
/// tracking; otherwise a position is opened in `store`. Nothing here closes
/// positions, so once a key is open every later record for it is skipped;
/// closing belongs to whoever executes trades, through `PositionStore`.
pub async fn opportunity_task(
    mut opportunity_rx: mpsc::Receiver<OpportunityRecord>,
    log: SharedOpportunityLog,
    store: Arc<dyn PositionStore>,
    cancel: CancellationToken,
) {
    info!("Opportunity task started");
    let mut received: u64 = 0;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(total_opportunities = received, "[SHUTDOWN] Opportunity task shutting down");
                break;
            }
            record = opportunity_rx.recv() => {
                let Some(record) = record else {
                    info!(total_opportunities = received, "Opportunity channel closed");
                    break;
                };
                received += 1;
                handle_opportunity(record, &log, store.as_ref()).await;
            }
        }
    }
}

async fn handle_opportunity(
    record: OpportunityRecord,
    log: &SharedOpportunityLog,
    store: &dyn PositionStore,
) {
    info!(
        event_type = "OPPORTUNITY",
        id = %record.id,
        pair = %record.pair,
        direction = %record.direction,
        spot = record.spot_price,
        perp = record.perp_price,
        spread = %format!("{:.4}%", record.spread * 100.0),
        profit = %format!("{:.2}", record.potential_profit_quote),
        profit_after_fees = %format!("{:.2}", record.profit_after_fees_quote),
        "[TRADE] Opportunity received"
    );

    let key = PositionKey::of(&record);
    if store.has_open(&key).await {
        debug!(
            pair = %key.pair,
            direction = %key.direction,
            "[TRADE] Position already open, skipping"
        );
    } else if let Err(e) = store.open_position(PositionRecord::from_opportunity(&record)).await {
        warn!(error = %e, "[TRADE] Failed to record position");
    } else {
        info!(pair = %key.pair, direction = %key.direction, "[TRADE] Position opened");
    }

    log.write().await.push(record);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::history::PriceHistory;
    use crate::core::state::InMemoryPositionStore;
    use crate::core::types::Direction;
    use tokio::time::{timeout, Duration};
    use uuid::Uuid;

    fn record_at(pair: &str, spread: f64, detected_at: DateTime<Utc>) -> OpportunityRecord {
        OpportunityRecord {
            id: Uuid::new_v4(),
            pair: TradingPair::parse(pair).unwrap(),
            spot_price: 100.0,
            perp_price: 100.0 * (1.0 + spread),
            spread,
            direction: Direction::from_spread(spread).unwrap(),
            potential_profit_quote: spread.abs() * 100.0,
            net_spread: spread.abs() - 0.0015,
            profit_after_fees_quote: (spread.abs() - 0.0015) * 100.0,
            detected_at,
        }
    }

    #[test]
    fn test_log_evicts_oldest() {
        let mut log = OpportunityLog::new(2);
        let now = Utc::now();
        let first = record_at("SOL/USDC", 0.01, now);
        let first_id = first.id;
        log.push(first);
        log.push(record_at("SOL/USDC", 0.02, now));
        log.push(record_at("SOL/USDC", 0.03, now));

        assert_eq!(log.len(), 2);
        let all = log.recent_at(now, ChronoDuration::hours(1));
        assert!(all.iter().all(|r| r.id != first_id));
        assert_eq!(all[0].spread, 0.02);
    }

    #[test]
    fn test_recent_filters_by_window() {
        let mut log = OpportunityLog::new(10);
        let now = Utc::now();
        log.push(record_at("SOL/USDC", 0.01, now - ChronoDuration::hours(2)));
        log.push(record_at("ETH/USDC", 0.01, now - ChronoDuration::minutes(30)));
        log.push(record_at("BTC/USDC", 0.01, now));

        let recent = log.recent_at(now, ChronoDuration::hours(1));
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].pair.base(), "ETH");
        assert_eq!(recent[1].pair.base(), "BTC");
        assert!(log.recent_at(now, ChronoDuration::zero()).len() == 1);
    }

    #[tokio::test]
    async fn test_opportunity_task_records_and_dedups_positions() {
        let (tx, rx) = mpsc::channel(10);
        let log = OpportunityLog::new(10).into_shared();
        let store = InMemoryPositionStore::new().into_shared();
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(opportunity_task(rx, log.clone(), store.clone(), cancel.clone()));

        let now = Utc::now();
        tx.send(record_at("SOL/USDC", 0.01, now)).await.unwrap();
        tx.send(record_at("SOL/USDC", 0.02, now)).await.unwrap();
        tx.send(record_at("SOL/USDC", -0.01, now)).await.unwrap();
        drop(tx);

        let result = timeout(Duration::from_secs(1), handle).await;
        assert!(result.is_ok(), "Task should finish when the channel closes");

        assert_eq!(log.read().await.len(), 3);
        let open = store.open_positions().await;
        assert_eq!(open.len(), 2);
        let key = PositionKey {
            pair: TradingPair::parse("SOL/USDC").unwrap(),
            direction: Direction::BuySpotSellPerp,
        };
        // First record won the key
        assert_eq!(store.get(&key).await.unwrap().entry_spread, 0.01);
    }

    #[tokio::test]
    async fn test_last_prices_snapshot() {
        let sol = TradingPair::parse("SOL/USDC").unwrap();
        let eth = TradingPair::parse("ETH/USDC").unwrap();
        let history = PriceHistory::new(10).into_shared();
        {
            let mut h = history.write().await;
            h.record(Venue::Spot, &sol, PriceQuote::now(100.0));
            h.record(Venue::Spot, &sol, PriceQuote::now(100.5));
            h.record(Venue::Perp, &sol, PriceQuote::now(101.0));
        }

        let snapshot = last_prices(&history, &[sol.clone(), eth.clone()]).await;
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].pair, sol);
        assert_eq!(snapshot[0].spot.unwrap().price, 100.5);
        assert_eq!(snapshot[0].perp.unwrap().price, 101.0);
        assert_eq!(snapshot[1].pair, eth);
        assert!(snapshot[1].spot.is_none() && snapshot[1].perp.is_none());
    }

    #[tokio::test]
    async fn test_opportunity_task_shutdown() {
        let (_tx, rx) = mpsc::channel::<OpportunityRecord>(10);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(opportunity_task(
            rx,
            OpportunityLog::new(10).into_shared(),
            InMemoryPositionStore::new().into_shared(),
            cancel.clone(),
        ));

        cancel.cancel();

        let result = timeout(Duration::from_secs(1), handle).await;
        assert!(result.is_ok(), "Task should shutdown gracefully");
    }
}
