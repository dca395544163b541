//! Binance REST price sources (spot and USD-M futures)
//!
//! Both venues expose a public `ticker/price` endpoint returning
//! `{"symbol": "SOLUSDT", "price": "145.23"}`; no API key is needed.
//!
//! # Spot symbol resolution
//! `prepare()` loads the spot symbol table from `/api/v3/exchangeInfo` and
//! maps each pair to the first tradable candidate (`SOLUSDC`, `SOLUSDT`, ...).
//! Loading is retried a few times; if the table still cannot be loaded a
//! small fallback set is used instead. While on the fallback set, a pair
//! that does not resolve triggers a reload, at most once per
//! `DEFAULT_SYMBOL_RELOAD_INTERVAL`.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::adapters::errors::{SourceError, SourceResult};
use crate::adapters::traits::PriceSource;
use crate::config::{BackoffConfig, TradingPair};
use crate::core::reconnect::retry_with_backoff;
use crate::core::types::{PriceQuote, Venue};

/// Symbols assumed tradable when the exchange info cannot be loaded
pub const FALLBACK_SPOT_SYMBOLS: &[&str] = &["BTCUSDT", "ETHUSDT", "BNBUSDT"];

/// Exchange info is fetched once at startup; a few quick retries before
/// falling back
const SYMBOL_LOAD_ATTEMPTS: u32 = 3;
const SYMBOL_LOAD_BACKOFF: BackoffConfig = BackoffConfig {
    initial_delay_ms: 100,
    max_delay_ms: 400,
};

/// Minimum spacing between symbol table reloads while on the fallback set
pub const DEFAULT_SYMBOL_RELOAD_INTERVAL: Duration = Duration::from_secs(60);

const SPOT_EXCHANGE_INFO_PATH: &str = "/api/v3/exchangeInfo";
const SPOT_TICKER_PATH: &str = "/api/v3/ticker/price";
const FUTURES_TICKER_PATH: &str = "/fapi/v1/ticker/price";

// =============================================================================
// API Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct TickerPrice {
    #[allow(dead_code)]
    symbol: String,
    price: String,
}

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
struct SymbolInfo {
    symbol: String,
    status: String,
}

// =============================================================================
// Shared request helper
// =============================================================================

async fn get_json<T: serde::de::DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    query: &[(&str, &str)],
    timeout_ms: u64,
) -> SourceResult<T> {
    let response = client
        .get(url)
        .query(query)
        .timeout(Duration::from_millis(timeout_ms))
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                SourceError::NetworkTimeout(timeout_ms)
            } else {
                SourceError::from(e)
            }
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SourceError::RequestFailed {
            status: status.as_u16(),
            body,
        });
    }

    let body = response.text().await?;
    serde_json::from_str(&body)
        .map_err(|e| SourceError::InvalidResponse(format!("{} - body: {}", e, body)))
}

async fn fetch_ticker(
    client: &reqwest::Client,
    url: &str,
    symbol: &str,
    timeout_ms: u64,
) -> SourceResult<PriceQuote> {
    let ticker: TickerPrice = get_json(client, url, &[("symbol", symbol)], timeout_ms).await?;
    let price = parse_price(&ticker.price)?;
    Ok(PriceQuote::now(price))
}

/// Parse a decimal price string, rejecting non-positive or non-finite values.
pub fn parse_price(raw: &str) -> SourceResult<f64> {
    let price: f64 = raw
        .trim()
        .parse()
        .map_err(|e| SourceError::InvalidResponse(format!("Invalid price '{}': {}", raw, e)))?;

    if !price.is_finite() || price <= 0.0 {
        return Err(SourceError::InvalidResponse(format!(
            "Non-positive price '{}'",
            raw
        )));
    }
    Ok(price)
}

// =============================================================================
// BinanceSpotSource
// =============================================================================

/// Spot prices from the Binance REST API
#[derive(Debug)]
pub struct BinanceSpotSource {
    client: reqwest::Client,
    base_url: String,
    timeout_ms: u64,
    /// Tradable symbols from exchange info (empty until `prepare`)
    available: RwLock<HashSet<String>>,
    /// Resolved pair -> symbol cache
    resolved: RwLock<HashMap<TradingPair, String>>,
    /// `available` holds the fallback set, not the venue's table
    on_fallback: AtomicBool,
    last_reload: Mutex<Option<Instant>>,
    reload_interval: Duration,
}

impl BinanceSpotSource {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, timeout_ms: u64) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout_ms,
            available: RwLock::new(HashSet::new()),
            resolved: RwLock::new(HashMap::new()),
            on_fallback: AtomicBool::new(false),
            last_reload: Mutex::new(None),
            reload_interval: DEFAULT_SYMBOL_RELOAD_INTERVAL,
        }
    }

    pub fn with_symbol_reload_interval(mut self, interval: Duration) -> Self {
        self.reload_interval = interval;
        self
    }

    /// Whether the symbol table is the built-in fallback set
    pub fn on_fallback(&self) -> bool {
        self.on_fallback.load(Ordering::SeqCst)
    }

    /// Replace the tradable symbol table and drop cached resolutions.
    pub fn set_available_symbols(&self, symbols: HashSet<String>) {
        *self.available.write().unwrap_or_else(PoisonError::into_inner) = symbols;
        self.resolved
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Map a pair to a tradable spot symbol.
    ///
    /// Without a symbol table the direct `BASEQUOTE` symbol is assumed.
    pub fn resolve_symbol(&self, pair: &TradingPair) -> SourceResult<String> {
        if let Some(symbol) = self
            .resolved
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(pair)
        {
            return Ok(symbol.clone());
        }

        let candidates = pair.spot_symbol_candidates();
        let symbol = {
            let available = self.available.read().unwrap_or_else(PoisonError::into_inner);
            if available.is_empty() {
                candidates.into_iter().next()
            } else {
                candidates.into_iter().find(|s| available.contains(s))
            }
        }
        .ok_or_else(|| SourceError::UnknownSymbol {
            pair: pair.to_string(),
            venue: Venue::Spot,
        })?;

        debug!(pair = %pair, symbol = %symbol, "Resolved spot symbol");
        self.resolved
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pair.clone(), symbol.clone());
        Ok(symbol)
    }

    async fn load_symbols(&self) -> SourceResult<HashSet<String>> {
        let url = format!("{}{}", self.base_url, SPOT_EXCHANGE_INFO_PATH);
        let info: ExchangeInfo = get_json(&self.client, &url, &[], self.timeout_ms).await?;
        Ok(info
            .symbols
            .into_iter()
            .filter(|s| s.status == "TRADING")
            .map(|s| s.symbol)
            .collect())
    }

    /// Claim the next reload slot if on the fallback set and the interval
    /// has elapsed since the last attempt.
    fn reload_due(&self) -> bool {
        if !self.on_fallback() {
            return false;
        }
        let mut last = self.last_reload.lock().unwrap_or_else(PoisonError::into_inner);
        match *last {
            Some(at) if at.elapsed() < self.reload_interval => false,
            _ => {
                *last = Some(Instant::now());
                true
            }
        }
    }

    /// Single reload attempt; errors go back to the caller's backoff.
    async fn reload_symbols(&self) -> SourceResult<()> {
        let symbols = self.load_symbols().await?;
        info!(count = symbols.len(), "[FEED] Spot symbol table reloaded");
        self.set_available_symbols(symbols);
        self.on_fallback.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl PriceSource for BinanceSpotSource {
    fn venue(&self) -> Venue {
        Venue::Spot
    }

    fn name(&self) -> &str {
        "binance-spot"
    }

    async fn prepare(&self, pairs: &[TradingPair]) -> SourceResult<()> {
        let loaded = retry_with_backoff(
            SYMBOL_LOAD_BACKOFF,
            SYMBOL_LOAD_ATTEMPTS,
            "Spot exchange info",
            || self.load_symbols(),
        )
        .await;
        let symbols = match loaded {
            Ok(symbols) => {
                info!(count = symbols.len(), "[FEED] Spot symbol table loaded");
                self.on_fallback.store(false, Ordering::SeqCst);
                symbols
            }
            Err(e) => {
                warn!(error = %e, "[FEED] Failed to load spot symbols, using fallback set");
                self.on_fallback.store(true, Ordering::SeqCst);
                let mut last = self.last_reload.lock().unwrap_or_else(PoisonError::into_inner);
                *last = Some(Instant::now());
                FALLBACK_SPOT_SYMBOLS.iter().map(|s| s.to_string()).collect()
            }
        };
        self.set_available_symbols(symbols);

        for pair in pairs {
            if let Err(e) = self.resolve_symbol(pair) {
                warn!(pair = %pair, error = %e, "[FEED] No tradable spot symbol");
            }
        }
        Ok(())
    }

    async fn fetch_price(&self, pair: &TradingPair) -> SourceResult<PriceQuote> {
        let symbol = match self.resolve_symbol(pair) {
            Ok(symbol) => symbol,
            Err(SourceError::UnknownSymbol { .. }) if self.reload_due() => {
                debug!(pair = %pair, "[FEED] Unresolved on fallback symbols, reloading table");
                self.reload_symbols().await?;
                self.resolve_symbol(pair)?
            }
            Err(e) => return Err(e),
        };
        let url = format!("{}{}", self.base_url, SPOT_TICKER_PATH);
        fetch_ticker(&self.client, &url, &symbol, self.timeout_ms).await
    }
}

// =============================================================================
// BinanceFuturesSource
// =============================================================================

/// Perpetual prices from the Binance USD-M futures REST API
#[derive(Debug, Clone)]
pub struct BinanceFuturesSource {
    client: reqwest::Client,
    base_url: String,
    timeout_ms: u64,
}

impl BinanceFuturesSource {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, timeout_ms: u64) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout_ms,
        }
    }

    /// USD-M perpetuals are quoted in USDT regardless of the pair's quote
    pub fn futures_symbol(pair: &TradingPair) -> String {
        format!("{}USDT", pair.base())
    }
}

#[async_trait]
impl PriceSource for BinanceFuturesSource {
    fn venue(&self) -> Venue {
        Venue::Perp
    }

    fn name(&self) -> &str {
        "binance-futures"
    }

    async fn fetch_price(&self, pair: &TradingPair) -> SourceResult<PriceQuote> {
        let symbol = Self::futures_symbol(pair);
        let url = format!("{}{}", self.base_url, FUTURES_TICKER_PATH);
        fetch_ticker(&self.client, &url, &symbol, self.timeout_ms).await
    }
}
