//! Spread math between the spot and perpetual legs of a pair
//!
//! All functions here are pure: no allocation, no state, no I/O.
//!
//! # Formula
//! `spread = (perp - spot) / spot`, signed:
//! - positive: perp trades above spot
//! - negative: perp trades below spot

use serde::{Deserialize, Serialize};

use crate::config::FeeConfig;

/// Relative spread of the perp leg over the spot leg.
///
/// Callers must ensure `spot_price > 0`; the detector validates inputs
/// before calling this.
#[inline]
#[must_use]
pub fn relative_spread(spot_price: f64, perp_price: f64) -> f64 {
    (perp_price - spot_price) / spot_price
}

/// Whether a spread magnitude meets the threshold (inclusive).
#[inline]
#[must_use]
pub fn crosses_threshold(spread: f64, threshold: f64) -> bool {
    spread.abs() >= threshold
}

/// Taker fees paid on each leg of a spot/perp round trip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeeModel {
    /// Spot venue taker fee (fraction)
    pub spot_taker: f64,
    /// Perp venue taker fee (fraction)
    pub perp_taker: f64,
}

impl FeeModel {
    pub fn new(spot_taker: f64, perp_taker: f64) -> Self {
        Self {
            spot_taker,
            perp_taker,
        }
    }

    /// Fee-free model, mostly for tests
    pub fn zero() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Total fees for opening both legs
    #[inline]
    pub fn total(&self) -> f64 {
        self.spot_taker + self.perp_taker
    }

    /// Spread magnitude left after fees (may be negative)
    #[inline]
    #[must_use]
    pub fn net_spread(&self, spread: f64) -> f64 {
        spread.abs() - self.total()
    }
}

impl From<FeeConfig> for FeeModel {
    fn from(fees: FeeConfig) -> Self {
        Self::new(fees.spot_taker, fees.perp_taker)
    }
}

impl Default for FeeModel {
    fn default() -> Self {
        FeeConfig::default().into()
    }
}
