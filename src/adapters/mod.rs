//! Venue price sources (spot and perpetual)
//!
//! This module provides the `PriceSource` abstraction and its
//! implementations for Binance spot, Binance USD-M futures and a simulated
//! perpetual venue.

pub mod binance;
pub mod errors;
pub mod simulated;
pub mod traits;

use std::sync::Arc;

use crate::config::{FeedConfig, PerpVenueConfig, SpotVenueConfig, VenuesConfig};

// Re-export commonly used types for convenience
pub use binance::{BinanceFuturesSource, BinanceSpotSource};
pub use errors::{SourceError, SourceResult};
pub use simulated::SimulatedPerpSource;
pub use traits::PriceSource;

/// Spot and perp sources built from configuration
pub struct VenueSources {
    pub spot: Arc<dyn PriceSource>,
    pub perp: Arc<dyn PriceSource>,
}

/// Build both venue sources, sharing one HTTP client.
pub fn build_sources(
    venues: &VenuesConfig,
    feed: &FeedConfig,
    client: reqwest::Client,
) -> VenueSources {
    let spot: Arc<dyn PriceSource> = match &venues.spot {
        SpotVenueConfig::Binance { base_url } => Arc::new(BinanceSpotSource::new(
            client.clone(),
            base_url.clone(),
            feed.request_timeout_ms,
        )),
    };

    let perp: Arc<dyn PriceSource> = match &venues.perp {
        PerpVenueConfig::BinanceFutures { base_url } => Arc::new(BinanceFuturesSource::new(
            client,
            base_url.clone(),
            feed.request_timeout_ms,
        )),
        PerpVenueConfig::Simulated {
            premium_min,
            premium_max,
        } => Arc::new(SimulatedPerpSource::new(spot.clone(), *premium_min, *premium_max)),
    };

    VenueSources { spot, perp }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Venue;

    #[test]
    fn test_build_default_sources() {
        let sources = build_sources(
            &VenuesConfig::default(),
            &FeedConfig::default(),
            reqwest::Client::new(),
        );
        assert_eq!(sources.spot.venue(), Venue::Spot);
        assert_eq!(sources.spot.name(), "binance-spot");
        assert_eq!(sources.perp.venue(), Venue::Perp);
        assert_eq!(sources.perp.name(), "binance-futures");
    }

    #[test]
    fn test_build_simulated_perp() {
        let venues = VenuesConfig {
            perp: PerpVenueConfig::Simulated {
                premium_min: 0.001,
                premium_max: 0.004,
            },
            ..VenuesConfig::default()
        };
        let sources = build_sources(&venues, &FeedConfig::default(), reqwest::Client::new());
        assert_eq!(sources.perp.name(), "simulated-perp");
        assert_eq!(sources.perp.venue(), Venue::Perp);
    }
}
