//! Configuration types for monitor settings
//!
//! This module defines all configuration structs that are loaded from YAML.
//! Configuration is read once at startup and never mutated afterwards.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_SPREAD_THRESHOLD: f64 = 0.007;
pub const DEFAULT_TRADE_SIZE_QUOTE: f64 = 100.0;
pub const DEFAULT_SPOT_TAKER_FEE: f64 = 0.001;
pub const DEFAULT_PERP_TAKER_FEE: f64 = 0.0005;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;
pub const DEFAULT_HISTORY_LEN: usize = 1_000;
pub const DEFAULT_BINANCE_SPOT_URL: &str = "https://api.binance.com";
pub const DEFAULT_BINANCE_FUTURES_URL: &str = "https://fapi.binance.com";

// ============================================================================
// TradingPair
// ============================================================================

/// A monitored market, written `BASE/QUOTE` (e.g. `SOL/USDC`).
///
/// Immutable once loaded. The perpetual market is derived as `BASE-PERP`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TradingPair {
    base: String,
    quote: String,
}

impl TradingPair {
    /// Build a pair from its two assets (upper-cased).
    pub fn new(base: impl AsRef<str>, quote: impl AsRef<str>) -> Result<Self, AppError> {
        let base = base.as_ref().trim().to_ascii_uppercase();
        let quote = quote.as_ref().trim().to_ascii_uppercase();

        let valid = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric());
        if !valid(&base) || !valid(&quote) {
            return Err(AppError::Config(format!(
                "Invalid trading pair '{}/{}': assets must be non-empty alphanumeric",
                base, quote
            )));
        }

        Ok(Self { base, quote })
    }

    /// Parse `BASE/QUOTE`.
    pub fn parse(s: &str) -> Result<Self, AppError> {
        match s.split_once('/') {
            Some((base, quote)) if !quote.contains('/') => Self::new(base, quote),
            _ => Err(AppError::Config(format!(
                "Invalid trading pair '{}': expected BASE/QUOTE",
                s
            ))),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn quote(&self) -> &str {
        &self.quote
    }

    /// Perpetual market identifier on the futures venue (e.g. `SOL-PERP`)
    pub fn perp_market(&self) -> String {
        format!("{}-PERP", self.base)
    }

    /// Spot symbols to try on the spot venue, most specific first.
    pub fn spot_symbol_candidates(&self) -> Vec<String> {
        let mut candidates = vec![format!("{}{}", self.base, self.quote)];
        for quote in ["USDT", "BUSD", "BTC", "ETH"] {
            let symbol = format!("{}{}", self.base, quote);
            if !candidates.contains(&symbol) {
                candidates.push(symbol);
            }
        }
        candidates
    }
}

impl fmt::Display for TradingPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

impl TryFrom<String> for TradingPair {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TradingPair> for String {
    fn from(pair: TradingPair) -> Self {
        pair.to_string()
    }
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Taker fees charged on each leg (fractions, e.g. 0.001 = 0.1%)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeeConfig {
    #[serde(default = "default_spot_taker")]
    pub spot_taker: f64,
    #[serde(default = "default_perp_taker")]
    pub perp_taker: f64,
}

/// Spread threshold and trade sizing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Minimum |spread| to signal, as a fraction in (0, 1) (e.g. 0.003 = 0.3%)
    #[serde(default = "default_spread_threshold")]
    pub spread_threshold: f64,
    /// Notional per trade in quote currency
    #[serde(default = "default_trade_size_quote", alias = "trade_size_usdc")]
    pub trade_size_quote: f64,
    #[serde(default)]
    pub fees: FeeConfig,
}

/// Retry backoff for failed venue polls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// First retry delay in milliseconds (doubles each consecutive failure)
    pub initial_delay_ms: u64,
    /// Upper bound for the retry delay
    pub max_delay_ms: u64,
}

/// Polling and buffering parameters for the price feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Capacity of the producer -> dispatch channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Price history entries kept per (venue, pair)
    #[serde(default = "default_history_len")]
    pub history_len: usize,
    #[serde(default)]
    pub backoff: BackoffConfig,
}

/// Spot venue selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpotVenueConfig {
    Binance {
        #[serde(default = "default_binance_spot_url")]
        base_url: String,
    },
}

/// Perpetual venue selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PerpVenueConfig {
    /// Binance USD-M futures ticker
    BinanceFutures {
        #[serde(default = "default_binance_futures_url")]
        base_url: String,
    },
    /// Spot price with a random premium/discount, for dry runs
    Simulated {
        /// Smallest premium magnitude (fraction)
        #[serde(default = "default_premium_min")]
        premium_min: f64,
        /// Largest premium magnitude (fraction)
        #[serde(default = "default_premium_max")]
        premium_max: f64,
    },
}

/// Both venues
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenuesConfig {
    #[serde(default)]
    pub spot: SpotVenueConfig,
    #[serde(default)]
    pub perp: PerpVenueConfig,
}

/// Root application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Ordered list of pairs to monitor
    pub pairs: Vec<TradingPair>,
    #[serde(default)]
    pub trading: TradingConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub venues: VenuesConfig,
}

impl AppConfig {
    /// Validate all configuration rules
    pub fn validate(&self) -> Result<(), AppError> {
        // Rule: At least one pair must be configured
        if self.pairs.is_empty() {
            return Err(AppError::Config(
                "Configuration must contain at least one pair".to_string(),
            ));
        }

        // Rule: pairs are unique
        let mut seen = HashSet::new();
        for pair in &self.pairs {
            if !seen.insert(pair) {
                return Err(AppError::Config(format!("Duplicate pair '{}'", pair)));
            }
        }

        self.trading.validate()?;
        self.feed.validate()?;
        self.venues.validate()?;

        Ok(())
    }
}

impl TradingConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        // Rule: threshold is a fraction strictly between 0 and 1
        if !(self.spread_threshold > 0.0 && self.spread_threshold < 1.0) {
            return Err(AppError::Config(format!(
                "spread_threshold must be > 0 and < 1 (got {})",
                self.spread_threshold
            )));
        }

        if !(self.trade_size_quote > 0.0 && self.trade_size_quote.is_finite()) {
            return Err(AppError::Config(format!(
                "trade_size_quote must be > 0 (got {})",
                self.trade_size_quote
            )));
        }

        for (name, fee) in [
            ("spot_taker", self.fees.spot_taker),
            ("perp_taker", self.fees.perp_taker),
        ] {
            if !(0.0..1.0).contains(&fee) {
                return Err(AppError::Config(format!(
                    "fees.{} must be >= 0 and < 1 (got {})",
                    name, fee
                )));
            }
        }

        Ok(())
    }
}

impl FeedConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.poll_interval_ms == 0 {
            return Err(AppError::Config("feed.poll_interval_ms must be > 0".to_string()));
        }
        if self.request_timeout_ms == 0 {
            return Err(AppError::Config("feed.request_timeout_ms must be > 0".to_string()));
        }
        if self.channel_capacity == 0 {
            return Err(AppError::Config("feed.channel_capacity must be > 0".to_string()));
        }
        if self.history_len == 0 {
            return Err(AppError::Config("feed.history_len must be > 0".to_string()));
        }
        let backoff = &self.backoff;
        if backoff.initial_delay_ms == 0 || backoff.max_delay_ms < backoff.initial_delay_ms {
            return Err(AppError::Config(format!(
                "feed.backoff: need 0 < initial_delay_ms <= max_delay_ms (got {} / {})",
                self.backoff.initial_delay_ms, self.backoff.max_delay_ms
            )));
        }
        Ok(())
    }
}

impl VenuesConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if let PerpVenueConfig::Simulated { premium_min, premium_max } = self.perp {
            if !(premium_min >= 0.0 && premium_min <= premium_max && premium_max < 1.0) {
                return Err(AppError::Config(format!(
                    "venues.perp: need 0 <= premium_min <= premium_max < 1 (got {} / {})",
                    premium_min, premium_max
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Default impls
// ============================================================================

fn default_spread_threshold() -> f64 {
    DEFAULT_SPREAD_THRESHOLD
}

fn default_trade_size_quote() -> f64 {
    DEFAULT_TRADE_SIZE_QUOTE
}

fn default_spot_taker() -> f64 {
    DEFAULT_SPOT_TAKER_FEE
}

fn default_perp_taker() -> f64 {
    DEFAULT_PERP_TAKER_FEE
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

fn default_history_len() -> usize {
    DEFAULT_HISTORY_LEN
}

fn default_binance_spot_url() -> String {
    DEFAULT_BINANCE_SPOT_URL.to_string()
}

fn default_binance_futures_url() -> String {
    DEFAULT_BINANCE_FUTURES_URL.to_string()
}

fn default_premium_min() -> f64 {
    0.0002
}

fn default_premium_max() -> f64 {
    0.006
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            spot_taker: DEFAULT_SPOT_TAKER_FEE,
            perp_taker: DEFAULT_PERP_TAKER_FEE,
        }
    }
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            spread_threshold: DEFAULT_SPREAD_THRESHOLD,
            trade_size_quote: DEFAULT_TRADE_SIZE_QUOTE,
            fees: FeeConfig::default(),
        }
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            history_len: DEFAULT_HISTORY_LEN,
            backoff: BackoffConfig::default(),
        }
    }
}

impl Default for SpotVenueConfig {
    fn default() -> Self {
        SpotVenueConfig::Binance {
            base_url: default_binance_spot_url(),
        }
    }
}

impl Default for PerpVenueConfig {
    fn default() -> Self {
        PerpVenueConfig::BinanceFutures {
            base_url: default_binance_futures_url(),
        }
    }
}

impl Default for VenuesConfig {
    fn default() -> Self {
        Self {
            spot: SpotVenueConfig::default(),
            perp: PerpVenueConfig::default(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
