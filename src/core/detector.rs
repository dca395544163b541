//! Arbitrage opportunity detector.
//!
//! Pure spread math plus a per-pair edge trigger: a pair fires once when
//! its spread crosses the threshold, then stays silent until the spread
//! falls back under the threshold at least once.
//!
//! The per-pair signal state is the only mutable state. Each pair owns its
//! own mutex, so ticks for different pairs never contend while ticks for
//! the same pair are serialized through the check-and-set.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{TradingConfig, TradingPair};
use crate::core::spread::{crosses_threshold, relative_spread, FeeModel};
use crate::core::types::{Direction, OpportunityRecord, Venue};

/// Caller errors raised by the detector. Market conditions never error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectorError {
    /// Non-positive, NaN or infinite price passed in
    #[error("Invalid {leg} price for {pair}: {value}")]
    InvalidPrice {
        pair: String,
        leg: Venue,
        value: f64,
    },
}

/// Per-pair edge-trigger state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignalState {
    /// Next crossing fires
    #[default]
    Armed,
    /// Already signaled; waiting for the spread to fall under threshold
    Fired,
}

/// Configuration for the arbitrage detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorConfig {
    /// Minimum |spread| (fraction) to fire, inclusive
    pub spread_threshold: f64,
    /// Notional used for profit estimates
    pub trade_size_quote: f64,
    /// Fees used for the informational net-profit fields
    pub fees: FeeModel,
}

impl DetectorConfig {
    pub fn new(spread_threshold: f64, trade_size_quote: f64) -> Self {
        Self {
            spread_threshold,
            trade_size_quote,
            fees: FeeModel::default(),
        }
    }

    pub fn with_fees(mut self, fees: FeeModel) -> Self {
        self.fees = fees;
        self
    }
}

impl From<&TradingConfig> for DetectorConfig {
    fn from(trading: &TradingConfig) -> Self {
        Self {
            spread_threshold: trading.spread_threshold,
            trade_size_quote: trading.trade_size_quote,
            fees: trading.fees.into(),
        }
    }
}

type SignalSlot = Arc<Mutex<SignalState>>;

/// Spot/perp spread detector with per-pair duplicate suppression.
///
/// Shareable across tasks behind an `Arc`; every method takes `&self`.
#[derive(Debug)]
pub struct ArbitrageDetector {
    config: DetectorConfig,
    /// pair -> signal state. The outer lock is only written when a pair
    /// is seen for the first time.
    states: RwLock<HashMap<TradingPair, SignalSlot>>,
}

impl ArbitrageDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            states: RwLock::new(HashMap::new()),
        }
    }

    /// Create with the monitored pairs registered up front.
    pub fn with_pairs<'a>(
        config: DetectorConfig,
        pairs: impl IntoIterator<Item = &'a TradingPair>,
    ) -> Self {
        let states = pairs
            .into_iter()
            .map(|pair| (pair.clone(), SignalSlot::default()))
            .collect();
        Self {
            config,
            states: RwLock::new(states),
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Decide whether `pair` has a fresh opportunity at these prices.
    ///
    /// Returns `Ok(None)` when the spread is under threshold (re-arming the
    /// pair) or when the opportunity was already signaled. Invalid prices
    /// return `DetectorError::InvalidPrice` and leave the state untouched.
    pub fn check_arbitrage_opportunity(
        &self,
        pair: &TradingPair,
        spot_price: f64,
        perp_price: f64,
    ) -> Result<Option<OpportunityRecord>, DetectorError> {
        validate_price(pair, Venue::Spot, spot_price)?;
        validate_price(pair, Venue::Perp, perp_price)?;

        let spread = relative_spread(spot_price, perp_price);
        // A zero spread has no direction and never counts as a crossing,
        // whatever the threshold
        let crossing = Direction::from_spread(spread)
            .filter(|_| crosses_threshold(spread, self.config.spread_threshold));

        debug!(
            pair = %pair,
            spot = spot_price,
            perp = perp_price,
            spread = %format!("{:.4}%", spread * 100.0),
            "Spread calculated"
        );

        let fired = {
            let slot = self.slot(pair);
            let mut state = slot.lock().unwrap_or_else(PoisonError::into_inner);
            match (crossing, *state) {
                (None, _) => {
                    *state = SignalState::Armed;
                    None
                }
                (Some(direction), SignalState::Armed) => {
                    *state = SignalState::Fired;
                    Some(direction)
                }
                (Some(_), SignalState::Fired) => None,
            }
        };

        let Some(direction) = fired else {
            return Ok(None);
        };

        let magnitude = spread.abs();
        let net_spread = self.config.fees.net_spread(spread);
        let record = OpportunityRecord {
            id: Uuid::new_v4(),
            pair: pair.clone(),
            spot_price,
            perp_price,
            spread,
            direction,
            potential_profit_quote: magnitude * self.config.trade_size_quote,
            net_spread,
            profit_after_fees_quote: net_spread * self.config.trade_size_quote,
            detected_at: Utc::now(),
        };

        info!(
            pair = %pair,
            spread = %format!("{:.4}%", spread * 100.0),
            direction = %direction,
            profit = %format!("{:.2}", record.potential_profit_quote),
            "[TRADE] Arbitrage opportunity detected"
        );

        Ok(Some(record))
    }

    /// Current signal state for a pair (`Armed` if never seen).
    pub fn state(&self, pair: &TradingPair) -> SignalState {
        let states = self.states.read().unwrap_or_else(PoisonError::into_inner);
        states
            .get(pair)
            .map(|slot| *slot.lock().unwrap_or_else(PoisonError::into_inner))
            .unwrap_or_default()
    }

    fn slot(&self, pair: &TradingPair) -> SignalSlot {
        if let Some(slot) = self
            .states
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(pair)
        {
            return slot.clone();
        }

        let mut states = self.states.write().unwrap_or_else(PoisonError::into_inner);
        states.entry(pair.clone()).or_default().clone()
    }
}

fn validate_price(pair: &TradingPair, leg: Venue, value: f64) -> Result<(), DetectorError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(DetectorError::InvalidPrice {
            pair: pair.to_string(),
            leg,
            value,
        })
    }
}
