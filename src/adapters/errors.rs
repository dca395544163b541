//! Price source error types
//!
//! Every failure to obtain a venue price is wrapped in `SourceError`.
//! The feed treats all of them as "upstream unavailable": logged, retried
//! with backoff, never propagated to the detector.

use thiserror::Error;

use crate::core::types::Venue;

/// Venue-specific error types for price source operations
#[derive(Error, Debug)]
pub enum SourceError {
    /// Could not reach the venue at all
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Venue answered with a non-success status
    #[error("Request failed with status {status}: {body}")]
    RequestFailed { status: u16, body: String },

    /// Network operation timed out
    #[error("Network timeout after {0}ms")]
    NetworkTimeout(u64),

    /// Invalid or unexpected response from venue
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The pair has no tradable symbol on this venue
    #[error("No {venue} symbol found for {pair}")]
    UnknownSymbol { pair: String, venue: Venue },
}

impl SourceError {
    /// Whether a retry can reasonably succeed later.
    ///
    /// An unknown symbol will not appear by itself, but the feed still
    /// retries it on the slow path: a source running on a partial symbol
    /// table reloads it there, and a new venue listing is picked up.
    pub fn is_transient(&self) -> bool {
        !matches!(self, SourceError::UnknownSymbol { .. })
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::NetworkTimeout(0)
        } else if err.is_decode() {
            SourceError::InvalidResponse(err.to_string())
        } else {
            SourceError::ConnectionFailed(err.to_string())
        }
    }
}

/// Result type alias for price source operations
pub type SourceResult<T> = std::result::Result<T, SourceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_failed_display() {
        let err = SourceError::ConnectionFailed("refused".to_string());
        assert_eq!(err.to_string(), "Connection failed: refused");
    }

    #[test]
    fn test_request_failed_display() {
        let err = SourceError::RequestFailed {
            status: 429,
            body: "too many requests".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Request failed with status 429: too many requests"
        );
    }

    #[test]
    fn test_unknown_symbol_display() {
        let err = SourceError::UnknownSymbol {
            pair: "FOO/USDC".to_string(),
            venue: Venue::Spot,
        };
        assert_eq!(err.to_string(), "No spot symbol found for FOO/USDC");
        assert!(!err.is_transient());
    }

    #[test]
    fn test_timeout_is_transient() {
        assert!(SourceError::NetworkTimeout(5000).is_transient());
    }
}
