//! Configuration of default run options.
//!
//! Defaults are resolved with the following priority (highest to lowest):
//! 1. Environment variables (`ZAP_*`)
//! 2. Configuration file (JSON)
//! 3. Built-in defaults
//!
//! Durations are given in (fractional) seconds, matching how callers
//! usually think about timeouts.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::execution::RunOptions;

/// Default run options as loaded from file and environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Treat nonzero exit as failure.
    pub check: bool,
    /// Timeout in seconds; `None` means unbounded.
    pub timeout_secs: Option<f64>,
    /// Echo output to the terminal while capturing.
    pub live: bool,
    /// Extra attempts after a failure.
    pub retries: u32,
    /// Seconds between attempts.
    pub delay_secs: f64,
    /// Log filter directive (error, warn, info, debug, trace or a full
    /// `EnvFilter` string).
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            check: true,
            timeout_secs: None,
            live: false,
            retries: 0,
            delay_secs: 1.0,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    ///
    /// Values that do not parse are ignored.
    pub fn apply_env(&mut self) {
        if let Some(check) = env_bool("ZAP_CHECK") {
            self.check = check;
        }

        if let Ok(timeout) = std::env::var("ZAP_TIMEOUT") {
            if let Ok(secs) = timeout.parse() {
                self.timeout_secs = Some(secs);
            }
        }

        if let Some(live) = env_bool("ZAP_LIVE") {
            self.live = live;
        }

        if let Ok(retries) = std::env::var("ZAP_RETRIES") {
            if let Ok(retries) = retries.parse() {
                self.retries = retries;
            }
        }

        if let Ok(delay) = std::env::var("ZAP_RETRY_DELAY") {
            if let Ok(secs) = delay.parse() {
                self.delay_secs = secs;
            }
        }

        if let Ok(level) = std::env::var("ZAP_LOG_LEVEL") {
            self.log_level = level;
        } else if let Ok(level) = std::env::var("RUST_LOG") {
            self.log_level = level;
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: env vars > config file > defaults
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Convert to [`RunOptions`], validating durations.
    pub fn to_run_options(&self) -> Result<RunOptions, ConfigError> {
        let mut options = RunOptions::new()
            .check(self.check)
            .live(self.live)
            .retries(self.retries)
            .delay(secs("delay_secs", self.delay_secs)?);

        if let Some(timeout) = self.timeout_secs {
            let timeout = secs("timeout_secs", timeout)?;
            if timeout.is_zero() {
                return Err(ConfigError::Invalid("timeout_secs must be positive".into()));
            }
            options = options.timeout(timeout);
        }

        Ok(options)
    }

    /// Get the log level filter string.
    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

fn env_bool(key: &str) -> Option<bool> {
    match std::env::var(key).ok()?.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn secs(field: &str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value)
        .map_err(|_| ConfigError::Invalid(format!("{field} must be a finite, non-negative number")))
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// A value is out of range.
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::Invalid(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.check);
        assert!(config.timeout_secs.is_none());
        assert_eq!(config.retries, 0);
        assert_eq!(config.delay_secs, 1.0);
        assert_eq!(config.to_run_options().unwrap(), RunOptions::default());
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "check": false,
            "timeout_secs": 2.5,
            "retries": 3,
            "delay_secs": 0.25
        }"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert!(!config.check);
        assert_eq!(config.timeout_secs, Some(2.5));
        assert!(!config.live); // Default

        let options = config.to_run_options().unwrap();
        assert_eq!(options.timeout, Some(Duration::from_millis(2500)));
        assert_eq!(options.retries, 3);
        assert_eq!(options.delay, Duration::from_millis(250));
    }

    #[test]
    fn test_config_bad_json() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();

        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn test_invalid_durations() {
        let config = Config {
            delay_secs: -1.0,
            ..Config::default()
        };
        assert!(matches!(config.to_run_options(), Err(ConfigError::Invalid(_))));

        let config = Config {
            timeout_secs: Some(0.0),
            ..Config::default()
        };
        assert!(config.to_run_options().is_err());

        let config = Config {
            timeout_secs: Some(f64::NAN),
            ..Config::default()
        };
        assert!(config.to_run_options().is_err());
    }

    #[test]
    fn test_zero_delay_allowed() {
        let config = Config {
            delay_secs: 0.0,
            ..Config::default()
        };
        assert_eq!(config.to_run_options().unwrap().delay, Duration::ZERO);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        assert!(json.contains("\"check\""));
        assert!(json.contains("\"delay_secs\""));
    }
}
