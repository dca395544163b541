//! Price source trait definition
//!
//! A `PriceSource` is one venue's view of prices. The feed polls it once
//! per pair per interval; transport details stay inside the implementation.

use async_trait::async_trait;

use crate::adapters::errors::SourceResult;
use crate::config::TradingPair;
use crate::core::types::{PriceQuote, Venue};

/// Common trait for all venue price sources
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Which leg this source prices
    fn venue(&self) -> Venue;

    /// Human-readable name for logs (e.g. "binance-spot")
    fn name(&self) -> &str;

    /// One-time setup before polling starts (symbol tables, warm-up).
    ///
    /// Failures here are logged by the feed; polling starts regardless.
    async fn prepare(&self, _pairs: &[TradingPair]) -> SourceResult<()> {
        Ok(())
    }

    /// Fetch the latest price for `pair`.
    ///
    /// Implementations must return only finite, strictly positive prices.
    async fn fetch_price(&self, pair: &TradingPair) -> SourceResult<PriceQuote>;
}

#[cfg(test)]
pub mod tests {
    //! Scriptable in-memory source shared by unit tests

    use super::*;
    use crate::adapters::errors::SourceError;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Serves fixed prices per pair; pairs marked down fail every fetch.
    pub struct MockSource {
        venue: Venue,
        prepare_delay: Duration,
        prices: Mutex<HashMap<TradingPair, f64>>,
        down: Mutex<HashSet<TradingPair>>,
        calls: Mutex<HashMap<TradingPair, u32>>,
    }

    impl MockSource {
        pub fn new(venue: Venue) -> Self {
            Self {
                venue,
                prepare_delay: Duration::ZERO,
                prices: Mutex::new(HashMap::new()),
                down: Mutex::new(HashSet::new()),
                calls: Mutex::new(HashMap::new()),
            }
        }

        pub fn with_price(self, pair: &TradingPair, price: f64) -> Self {
            self.set_price(pair, price);
            self
        }

        /// Make `prepare` take this long
        pub fn with_prepare_delay(mut self, delay: Duration) -> Self {
            self.prepare_delay = delay;
            self
        }

        pub fn set_price(&self, pair: &TradingPair, price: f64) {
            self.prices.lock().unwrap().insert(pair.clone(), price);
        }

        pub fn set_down(&self, pair: &TradingPair, down: bool) {
            let mut set = self.down.lock().unwrap();
            if down {
                set.insert(pair.clone());
            } else {
                set.remove(pair);
            }
        }

        pub fn calls(&self, pair: &TradingPair) -> u32 {
            self.calls.lock().unwrap().get(pair).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl PriceSource for MockSource {
        fn venue(&self) -> Venue {
            self.venue
        }

        fn name(&self) -> &str {
            "mock"
        }

        async fn prepare(&self, _pairs: &[TradingPair]) -> SourceResult<()> {
            tokio::time::sleep(self.prepare_delay).await;
            Ok(())
        }

        async fn fetch_price(&self, pair: &TradingPair) -> SourceResult<PriceQuote> {
            *self.calls.lock().unwrap().entry(pair.clone()).or_default() += 1;

            if self.down.lock().unwrap().contains(pair) {
                return Err(SourceError::ConnectionFailed(format!("{} is down", pair)));
            }
            self.prices
                .lock()
                .unwrap()
                .get(pair)
                .map(|p| PriceQuote::now(*p))
                .ok_or_else(|| SourceError::UnknownSymbol {
                    pair: pair.to_string(),
                    venue: self.venue,
                })
        }
    }
}
