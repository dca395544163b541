//! Core module - price feed, detection, spread math, orchestration tasks
//!
//! This module uses **explicit re-exports** instead of glob exports
//! (`pub use module::*`) so the public API only changes on purpose.
//!
//! ## Usage
//! Prefer importing from `crate::core`:
//! ```ignore
//! use basis_watch::core::{ArbitrageDetector, DetectorConfig, PriceFeed};
//! ```

pub mod channels;
pub mod detector;
pub mod feed;
pub mod history;
pub mod logging;
pub mod reconnect;
pub mod runtime;
pub mod spread;
pub mod state;
pub mod types;

// Explicit re-exports for types module
pub use types::{Direction, OpportunityRecord, PriceQuote, PriceSample, PriceUpdate, Venue};

// Explicit re-exports for spread module
pub use spread::{crosses_threshold, relative_spread, FeeModel};

// Explicit re-exports for detector module
pub use detector::{ArbitrageDetector, DetectorConfig, DetectorError, SignalState};

// Explicit re-exports for feed and history modules
pub use feed::PriceFeed;
pub use history::{PriceHistory, SharedPriceHistory};

// Explicit re-exports for reconnect module
pub use reconnect::{retry_with_backoff, Backoff};

// Explicit re-exports for channels module
pub use channels::{forward_opportunity, ChannelBundle};

// Explicit re-exports for runtime module
pub use runtime::{last_prices, opportunity_task, LastPrices, OpportunityLog, SharedOpportunityLog};

// Explicit re-exports for state module
pub use state::{
    InMemoryPositionStore, PositionKey, PositionRecord, PositionStatus, PositionStore, StateError,
};

// Explicit re-exports for logging module
pub use logging::{
    init_logging, init_logging_with_config, init_test_logging, LoggingConfig, DEFAULT_LOG_LEVEL,
};
