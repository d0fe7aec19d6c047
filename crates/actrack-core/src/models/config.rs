//! Application configuration

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

use super::DEFAULT_ASSET_KEY;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub version: String,
    pub log_level: String,
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub presence: PresenceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimerConfig {
    /// How often a running stopwatch publishes its display time
    pub tick_interval_ms: u64,
    /// Start the main stopwatch with the last activity when nothing was persisted
    pub auto_start_main: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PresenceConfig {
    pub enabled: bool,
    pub endpoint: Option<String>,
    pub timeout_ms: u64,
    pub default_asset_key: String,
    /// Refuse to start the main stopwatch while another session holds presence
    pub guard_foreign_session: bool,
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.log_level.as_str()) {
            return Err(Error::Validation(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.log_level,
                valid_log_levels.join(", ")
            )));
        }

        self.timer.validate()?;
        self.presence.validate()?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0.0".to_string(),
            log_level: "info".to_string(),
            timer: TimerConfig::default(),
            presence: PresenceConfig::default(),
        }
    }
}

impl TimerConfig {
    const MIN_TICK_MS: u64 = 100;
    const MAX_TICK_MS: u64 = 60_000;

    pub fn validate(&self) -> Result<()> {
        if !(Self::MIN_TICK_MS..=Self::MAX_TICK_MS).contains(&self.tick_interval_ms) {
            return Err(Error::Validation(format!(
                "Tick interval must be between {} and {} ms",
                Self::MIN_TICK_MS,
                Self::MAX_TICK_MS
            )));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            auto_start_main: false,
        }
    }
}

impl PresenceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.enabled && self.endpoint.is_none() {
            return Err(Error::Validation(
                "Presence endpoint must be set when presence is enabled".to_string(),
            ));
        }

        if let Some(ref url) = self.endpoint {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(Error::Validation(format!(
                    "Presence endpoint '{}' must be an http(s) URL",
                    url
                )));
            }
        }

        if self.timeout_ms == 0 {
            return Err(Error::Validation(
                "Presence timeout must be greater than 0".to_string(),
            ));
        }

        if self.default_asset_key.trim().is_empty() {
            return Err(Error::Validation(
                "Default asset key cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            timeout_ms: 5000,
            default_asset_key: DEFAULT_ASSET_KEY.to_string(),
            guard_foreign_session: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.version, "1.0.0");
        assert!(!config.timer.auto_start_main);
        assert_eq!(config.timer.tick_interval_ms, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_log_level_validation() {
        let mut config = Config::default();
        config.log_level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tick_interval_bounds() {
        let mut config = TimerConfig {
            tick_interval_ms: 10,
            ..TimerConfig::default()
        };
        assert!(config.validate().is_err());

        config.tick_interval_ms = 120_000;
        assert!(config.validate().is_err());

        config.tick_interval_ms = 500;
        assert!(config.validate().is_ok());
        assert_eq!(config.tick_interval().as_millis(), 500);
    }

    #[test]
    fn test_presence_config_validation() {
        let config = PresenceConfig::default();
        assert!(config.validate().is_ok());

        let mut enabled = PresenceConfig {
            enabled: true,
            ..PresenceConfig::default()
        };
        assert!(enabled.validate().is_err());

        enabled.endpoint = Some("localhost:5000".to_string());
        assert!(enabled.validate().is_err());

        enabled.endpoint = Some("http://localhost:5000".to_string());
        assert!(enabled.validate().is_ok());
    }

    #[test]
    fn test_partial_config_fills_sections() {
        let config: Config =
            serde_json::from_str(r#"{"version": "1.0.0", "log_level": "debug"}"#).unwrap();
        assert_eq!(config.timer, TimerConfig::default());
        assert_eq!(config.presence, PresenceConfig::default());
    }
}
