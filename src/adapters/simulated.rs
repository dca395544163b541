//! Simulated perpetual venue for dry runs
//!
//! Prices the perp leg as the reference spot price times `1 + premium`.
//! Perps more often trade at a premium than a discount: 60% of draws are a
//! premium in `[min, max]`, the rest a discount in `[min, max / 2]`.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::adapters::errors::SourceResult;
use crate::adapters::traits::PriceSource;
use crate::config::TradingPair;
use crate::core::types::{PriceQuote, Venue};

/// Probability that a draw is a premium rather than a discount
const PREMIUM_PROBABILITY: f64 = 0.6;

pub struct SimulatedPerpSource {
    reference: Arc<dyn PriceSource>,
    premium_min: f64,
    premium_max: f64,
    rng: Mutex<StdRng>,
}

impl SimulatedPerpSource {
    pub fn new(reference: Arc<dyn PriceSource>, premium_min: f64, premium_max: f64) -> Self {
        Self::with_rng(reference, premium_min, premium_max, StdRng::from_entropy())
    }

    /// Deterministic variant for tests and replays
    pub fn with_seed(
        reference: Arc<dyn PriceSource>,
        premium_min: f64,
        premium_max: f64,
        seed: u64,
    ) -> Self {
        Self::with_rng(reference, premium_min, premium_max, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        reference: Arc<dyn PriceSource>,
        premium_min: f64,
        premium_max: f64,
        rng: StdRng,
    ) -> Self {
        Self {
            reference,
            premium_min: premium_min.min(premium_max),
            premium_max,
            rng: Mutex::new(rng),
        }
    }

    /// Draw a signed premium (fraction of the reference price).
    pub fn draw_premium(&self) -> f64 {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        if rng.gen_bool(PREMIUM_PROBABILITY) {
            rng.gen_range(self.premium_min..=self.premium_max)
        } else {
            let max_discount = self.premium_max * 0.5;
            -rng.gen_range(self.premium_min.min(max_discount)..=max_discount)
        }
    }
}

#[async_trait]
impl PriceSource for SimulatedPerpSource {
    fn venue(&self) -> Venue {
        Venue::Perp
    }

    fn name(&self) -> &str {
        "simulated-perp"
    }

    async fn fetch_price(&self, pair: &TradingPair) -> SourceResult<PriceQuote> {
        let reference = self.reference.fetch_price(pair).await?;
        let premium = self.draw_premium();
        let price = reference.price * (1.0 + premium);

        debug!(
            pair = %pair,
            perp_market = %pair.perp_market(),
            reference = reference.price,
            premium = %format!("{:.4}%", premium * 100.0),
            "Simulated perp price"
        );

        Ok(PriceQuote::now(price))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::traits::tests::MockSource;

    fn sol() -> TradingPair {
        TradingPair::parse("SOL/USDC").unwrap()
    }

    #[test]
    fn test_premium_stays_in_range() {
        let reference = Arc::new(MockSource::new(Venue::Spot));
        let source = SimulatedPerpSource::with_seed(reference, 0.0002, 0.006, 7);

        let mut premiums = 0;
        for _ in 0..1000 {
            let p = source.draw_premium();
            if p >= 0.0 {
                premiums += 1;
                assert!((0.0002..=0.006).contains(&p));
            } else {
                assert!((-0.003..=-0.0002).contains(&p));
            }
        }
        // Roughly 60% premiums
        assert!((500..700).contains(&premiums), "premiums = {}", premiums);
    }

    #[test]
    fn test_degenerate_range() {
        let reference = Arc::new(MockSource::new(Venue::Spot));
        let source = SimulatedPerpSource::with_seed(reference, 0.004, 0.004, 1);
        for _ in 0..100 {
            let p = source.draw_premium();
            assert!(p == 0.004 || p == -0.002);
        }
    }

    #[tokio::test]
    async fn test_price_derived_from_reference() {
        let reference = Arc::new(MockSource::new(Venue::Spot).with_price(&sol(), 100.0));
        let source = SimulatedPerpSource::with_seed(reference, 0.001, 0.002, 42);

        let quote = source.fetch_price(&sol()).await.unwrap();
        assert!(quote.price >= 100.0 * (1.0 - 0.001) && quote.price <= 100.0 * 1.002);
        assert_eq!(source.venue(), Venue::Perp);
    }

    #[tokio::test]
    async fn test_reference_failure_propagates() {
        let reference = Arc::new(MockSource::new(Venue::Spot));
        let source = SimulatedPerpSource::with_seed(reference, 0.001, 0.002, 42);
        assert!(source.fetch_price(&sol()).await.is_err());
    }
}
