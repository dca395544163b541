//! Bounded per-(venue, pair) price history.
//!
//! The feed appends every accepted venue update; readers get the last
//! price or a window of recent points. Oldest entries are evicted once a
//! series reaches its capacity.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::config::TradingPair;
use crate::core::types::{PriceQuote, Venue};

/// Type alias for history shared between the feed and its readers
pub type SharedPriceHistory = Arc<RwLock<PriceHistory>>;

#[derive(Debug, Clone)]
pub struct PriceHistory {
    series: HashMap<(Venue, TradingPair), VecDeque<PriceQuote>>,
    max_len: usize,
}

impl PriceHistory {
    pub fn new(max_len: usize) -> Self {
        Self {
            series: HashMap::new(),
            max_len: max_len.max(1),
        }
    }

    pub fn into_shared(self) -> SharedPriceHistory {
        Arc::new(RwLock::new(self))
    }

    pub fn record(&mut self, venue: Venue, pair: &TradingPair, quote: PriceQuote) {
        let max_len = self.max_len;
        let series = self
            .series
            .entry((venue, pair.clone()))
            .or_insert_with(|| VecDeque::with_capacity(max_len.min(64)));

        if series.len() >= max_len {
            series.pop_front();
        }
        series.push_back(quote);
    }

    /// Most recent quote for this venue and pair
    pub fn last(&self, venue: Venue, pair: &TradingPair) -> Option<PriceQuote> {
        self.series
            .get(&(venue, pair.clone()))
            .and_then(|s| s.back().copied())
    }

    /// Quotes observed strictly after `cutoff`, oldest first
    pub fn since(
        &self,
        venue: Venue,
        pair: &TradingPair,
        cutoff: DateTime<Utc>,
    ) -> Vec<PriceQuote> {
        self.series
            .get(&(venue, pair.clone()))
            .map(|s| s.iter().filter(|q| q.observed_at > cutoff).copied().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, venue: Venue, pair: &TradingPair) -> usize {
        self.series
            .get(&(venue, pair.clone()))
            .map_or(0, VecDeque::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sol() -> TradingPair {
        TradingPair::parse("SOL/USDC").unwrap()
    }

    #[test]
    fn test_last_price_per_venue() {
        let mut history = PriceHistory::new(10);
        history.record(Venue::Spot, &sol(), PriceQuote::now(100.0));
        history.record(Venue::Perp, &sol(), PriceQuote::now(100.4));
        history.record(Venue::Spot, &sol(), PriceQuote::now(100.2));

        assert_eq!(history.last(Venue::Spot, &sol()).unwrap().price, 100.2);
        assert_eq!(history.last(Venue::Perp, &sol()).unwrap().price, 100.4);
        assert!(history.last(Venue::Spot, &TradingPair::parse("ETH/USDC").unwrap()).is_none());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut history = PriceHistory::new(3);
        for price in [1.0, 2.0, 3.0, 4.0, 5.0] {
            history.record(Venue::Spot, &sol(), PriceQuote::now(price));
        }
        assert_eq!(history.len(Venue::Spot, &sol()), 3);

        let all = history.since(Venue::Spot, &sol(), Utc::now() - Duration::hours(1));
        let prices: Vec<f64> = all.iter().map(|q| q.price).collect();
        assert_eq!(prices, vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_since_filters_by_time() {
        let now = Utc::now();
        let mut history = PriceHistory::new(10);
        history.record(
            Venue::Perp,
            &sol(),
            PriceQuote { price: 99.0, observed_at: now - Duration::minutes(90) },
        );
        history.record(
            Venue::Perp,
            &sol(),
            PriceQuote { price: 101.0, observed_at: now - Duration::minutes(5) },
        );

        let recent = history.since(Venue::Perp, &sol(), now - Duration::minutes(60));
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].price, 101.0);
    }
}
