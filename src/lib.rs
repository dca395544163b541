//! Spot/perp basis watcher
//!
//! - Venue price sources (Binance spot, Binance USD-M futures, simulated perp)
//! - Continuous per-pair price feed with per-venue backoff
//! - Edge-triggered spread detection with per-pair state

pub mod adapters;
pub mod config;
pub mod core;
pub mod error;

pub use error::AppError;
