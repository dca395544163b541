//! Configuration module for monitor settings and YAML loading
//!
//! This module provides:
//! - Configuration types (`AppConfig`, `TradingConfig`, `FeedConfig`, `VenuesConfig`)
//! - YAML loading functionality (`load_config`)
//! - Environment variable overrides

pub mod constants;
mod loader;
mod types;

// Re-export types
pub use types::{
    AppConfig, BackoffConfig, FeeConfig, FeedConfig, PerpVenueConfig, SpotVenueConfig,
    TradingConfig, TradingPair, VenuesConfig,
};

// Re-export loader functions
pub use loader::{apply_env_overrides, load_config, load_config_from_str};
