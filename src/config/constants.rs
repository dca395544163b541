//! Environment variable overrides and runtime constants
//!
//! Values here are read from the environment (a `.env` file is loaded by
//! `main` through dotenvy) and layered over the YAML configuration.

use crate::error::AppError;

/// Environment variable holding the config file path
pub const CONFIG_PATH_ENV: &str = "BASIS_WATCH_CONFIG";

/// Config file used when neither CLI argument nor env var is given
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Capacity of the detector -> orchestrator opportunity channel
pub const OPPORTUNITY_CHANNEL_CAPACITY: usize = 100;

/// Fired opportunities kept in memory by the orchestrator
pub const OPPORTUNITY_LOG_CAPACITY: usize = 500;

/// Spread threshold override (fraction)
///
/// Environment variable: `SPREAD_THRESHOLD`
pub fn spread_threshold_override() -> Result<Option<f64>, AppError> {
    parse_f64_env(&["SPREAD_THRESHOLD"])
}

/// Trade size override (quote currency)
///
/// Environment variables: `TRADE_SIZE_QUOTE`, then `TRADE_SIZE_USDC`
pub fn trade_size_override() -> Result<Option<f64>, AppError> {
    parse_f64_env(&["TRADE_SIZE_QUOTE", "TRADE_SIZE_USDC"])
}

/// Resolve the config path: first CLI argument, then env, then default.
pub fn config_path(cli_arg: Option<String>) -> String {
    cli_arg
        .or_else(|| std::env::var(CONFIG_PATH_ENV).ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
}

fn parse_f64_env(names: &[&str]) -> Result<Option<f64>, AppError> {
    for name in names {
        if let Ok(raw) = std::env::var(name) {
            return raw
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|e| {
                    AppError::Config(format!("{} must be a number (got '{}'): {}", name, raw, e))
                });
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial(env)]
    fn test_no_override_by_default() {
        std::env::remove_var("SPREAD_THRESHOLD");
        assert_eq!(spread_threshold_override().unwrap(), None);
    }

    #[test]
    #[serial(env)]
    fn test_trade_size_alias() {
        std::env::remove_var("TRADE_SIZE_QUOTE");
        std::env::set_var("TRADE_SIZE_USDC", "250");

        assert_eq!(trade_size_override().unwrap(), Some(250.0));

        std::env::remove_var("TRADE_SIZE_USDC");
    }

    #[test]
    #[serial(env)]
    fn test_unparseable_override_fails() {
        std::env::set_var("SPREAD_THRESHOLD", "abc");

        let result = spread_threshold_override();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("SPREAD_THRESHOLD"));

        std::env::remove_var("SPREAD_THRESHOLD");
    }

    #[test]
    #[serial(env)]
    fn test_config_path_precedence() {
        std::env::set_var(CONFIG_PATH_ENV, "/etc/basis.yaml");
        assert_eq!(config_path(Some("local.yaml".to_string())), "local.yaml");
        assert_eq!(config_path(None), "/etc/basis.yaml");

        std::env::remove_var(CONFIG_PATH_ENV);
        assert_eq!(config_path(None), DEFAULT_CONFIG_PATH);
    }
}
