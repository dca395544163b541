//! Core data types for the price feed and arbitrage detection pipeline.
//!
//! These types form the common vocabulary between venue sources, the feed,
//! the detector and whatever orchestrates them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::TradingPair;

// =============================================================================
// Venue
// =============================================================================

/// The two markets a pair is watched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Venue {
    /// Spot market (reference venue)
    Spot,
    /// Perpetual futures market
    Perp,
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Venue::Spot => write!(f, "spot"),
            Venue::Perp => write!(f, "perp"),
        }
    }
}

// =============================================================================
// Prices
// =============================================================================

/// A single price observation returned by a venue source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub price: f64,
    pub observed_at: DateTime<Utc>,
}

impl PriceQuote {
    pub fn now(price: f64) -> Self {
        Self {
            price,
            observed_at: Utc::now(),
        }
    }
}

/// Event pushed by a producer task into the feed's dispatch channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub pair: TradingPair,
    pub venue: Venue,
    pub price: f64,
    pub observed_at: DateTime<Utc>,
}

/// Latest known (spot, perp) pair for one trading pair.
///
/// Produced fresh on every feed tick. One leg may be older than the other:
/// it is the last value known for that venue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSample {
    pub pair: TradingPair,
    pub spot_price: f64,
    pub perp_price: f64,
    pub observed_at: DateTime<Utc>,
}

// =============================================================================
// Opportunity
// =============================================================================

/// Trade recommended by an opportunity: buy the cheaper leg, sell the richer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    /// Perp trades above spot (spread > 0)
    BuySpotSellPerp,
    /// Perp trades below spot (spread < 0)
    SellSpotBuyPerp,
}

impl Direction {
    /// Direction for a signed spread. Zero has no direction.
    pub fn from_spread(spread: f64) -> Option<Self> {
        if spread > 0.0 {
            Some(Direction::BuySpotSellPerp)
        } else if spread < 0.0 {
            Some(Direction::SellSpotBuyPerp)
        } else {
            None
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::BuySpotSellPerp => write!(f, "BUY_SPOT_SELL_PERP"),
            Direction::SellSpotBuyPerp => write!(f, "SELL_SPOT_BUY_PERP"),
        }
    }
}

/// Fired when a pair's spread crosses the threshold while armed.
///
/// Ownership passes to the caller; the detector keeps no reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpportunityRecord {
    pub id: Uuid,
    pub pair: TradingPair,
    pub spot_price: f64,
    pub perp_price: f64,
    /// Signed relative spread: (perp - spot) / spot
    pub spread: f64,
    pub direction: Direction,
    /// |spread| * trade_size_quote
    pub potential_profit_quote: f64,
    /// |spread| minus round-trip taker fees (informational only)
    pub net_spread: f64,
    pub profit_after_fees_quote: f64,
    pub detected_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_from_spread() {
        assert_eq!(Direction::from_spread(0.02), Some(Direction::BuySpotSellPerp));
        assert_eq!(Direction::from_spread(-0.02), Some(Direction::SellSpotBuyPerp));
        assert_eq!(Direction::from_spread(0.0), None);
    }

    #[test]
    fn test_direction_serialization() {
        let json = serde_json::to_string(&Direction::BuySpotSellPerp).unwrap();
        assert_eq!(json, "\"BUY_SPOT_SELL_PERP\"");
        assert_eq!(Direction::SellSpotBuyPerp.to_string(), "SELL_SPOT_BUY_PERP");
    }

    #[test]
    fn test_venue_display() {
        assert_eq!(Venue::Spot.to_string(), "spot");
        assert_eq!(Venue::Perp.to_string(), "perp");
    }
}
