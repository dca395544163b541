//! Configuration loader for YAML files
//!
//! This module handles loading, overriding and validating configuration.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::AppError;

use super::constants::{spread_threshold_override, trade_size_override};
use super::types::AppConfig;

/// Load configuration from a YAML file
///
/// This function:
/// 1. Checks if the file exists
/// 2. Parses the YAML content
/// 3. Applies environment overrides
/// 4. Validates the configuration rules
///
/// # Returns
/// * `Ok(AppConfig)` - Successfully loaded and validated configuration
/// * `Err(AppError::Config)` - File not found, parse error, or validation failure
pub fn load_config(path: &Path) -> Result<AppConfig, AppError> {
    if !path.exists() {
        return Err(AppError::Config(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut config: AppConfig = serde_yaml::from_reader(reader).map_err(|e| {
        AppError::Config(format!("YAML parse error in '{}': {}", path.display(), e))
    })?;

    apply_env_overrides(&mut config)?;
    config.validate()?;

    Ok(config)
}

/// Load configuration from a YAML string (useful for testing)
///
/// Environment overrides are not applied here.
pub fn load_config_from_str(yaml_content: &str) -> Result<AppConfig, AppError> {
    let config: AppConfig = serde_yaml::from_str(yaml_content)
        .map_err(|e| AppError::Config(format!("YAML parse error: {}", e)))?;

    config.validate()?;

    Ok(config)
}

/// Apply `SPREAD_THRESHOLD` / `TRADE_SIZE_QUOTE` overrides from the environment
pub fn apply_env_overrides(config: &mut AppConfig) -> Result<(), AppError> {
    if let Some(threshold) = spread_threshold_override()? {
        tracing::info!(spread_threshold = threshold, "[CONFIG] SPREAD_THRESHOLD override");
        config.trading.spread_threshold = threshold;
    }
    if let Some(size) = trade_size_override()? {
        tracing::info!(trade_size_quote = size, "[CONFIG] Trade size override");
        config.trading.trade_size_quote = size;
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const VALID_CONFIG_YAML: &str = r#"
pairs:
  - SOL/USDC
  - ETH/USDT
trading:
  spread_threshold: 0.003
  trade_size_quote: 1000.0
feed:
  poll_interval_ms: 2000
venues:
  perp:
    kind: binance_futures
"#;

    #[test]
    fn test_load_config_from_str_valid() {
        let config = load_config_from_str(VALID_CONFIG_YAML).unwrap();
        assert_eq!(config.pairs.len(), 2);
        assert_eq!(config.pairs[0].to_string(), "SOL/USDC");
        assert_eq!(config.trading.spread_threshold, 0.003);
        assert_eq!(config.feed.poll_interval_ms, 2000);
    }

    #[test]
    fn test_load_config_from_str_invalid_yaml() {
        let result = load_config_from_str("invalid: yaml: content: [");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("YAML parse error"));
    }

    #[test]
    fn test_load_config_from_str_bad_pair() {
        let result = load_config_from_str("pairs: [\"SOLUSDC\"]");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("expected BASE/QUOTE"));
    }

    #[test]
    fn test_load_config_from_str_validation_failure() {
        let yaml = r#"
pairs: ["SOL/USDC"]
trading:
  spread_threshold: 1.5
"#;
        let result = load_config_from_str(yaml);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("spread_threshold"));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/path/config.yaml"));
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Configuration file not found"));
    }

    #[test]
    #[serial(env)]
    fn test_load_config_from_file_valid() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(VALID_CONFIG_YAML.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.pairs.len(), 2);
        assert_eq!(config.trading.trade_size_quote, 1000.0);
    }

    #[test]
    fn test_load_config_from_file_invalid_yaml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"invalid: [yaml: content").unwrap();
        temp_file.flush().unwrap();

        let result = load_config(temp_file.path());
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("YAML parse error"));
    }

    #[test]
    #[serial(env)]
    fn test_env_override_applied_before_validation() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(VALID_CONFIG_YAML.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        std::env::set_var("SPREAD_THRESHOLD", "0.005");
        std::env::set_var("TRADE_SIZE_QUOTE", "50");
        let config = load_config(temp_file.path());
        std::env::remove_var("SPREAD_THRESHOLD");
        std::env::remove_var("TRADE_SIZE_QUOTE");

        let config = config.unwrap();
        assert_eq!(config.trading.spread_threshold, 0.005);
        assert_eq!(config.trading.trade_size_quote, 50.0);
    }

    #[test]
    #[serial(env)]
    fn test_invalid_env_override_is_config_error() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(VALID_CONFIG_YAML.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        std::env::set_var("SPREAD_THRESHOLD", "2.0");
        let result = load_config(temp_file.path());
        std::env::remove_var("SPREAD_THRESHOLD");

        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
