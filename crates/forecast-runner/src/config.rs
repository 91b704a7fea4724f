//! Runner configuration.
//!
//! Configuration is read from TOML:
//!
//! ```toml
//! [run]
//! deadline_ms = 900000
//!
//! [telemetry]
//! enabled = true
//! render_on_apply = true
//! ```
//!
//! Every section and field is optional.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::timer::DeadlineTimer;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[source] std::io::Error),

    /// The TOML could not be parsed.
    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),

    /// The config could not be serialized.
    #[error("failed to serialize config: {0}")]
    Serialize(#[source] toml::ser::Error),

    /// A value is out of range.
    #[error("invalid config: {0}")]
    Validation(String),
}

/// Top-level runner configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunnerConfig {
    /// Run settings.
    #[serde(default)]
    pub run: RunConfig,

    /// Telemetry settings.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Settings for individual runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Deadline for a whole run in milliseconds. Unbounded when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_ms: Option<u64>,
}

/// Settings for the telemetry aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfig {
    /// Whether log entries are merged into the aggregate.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Whether applying an entry also renders the aggregate.
    #[serde(default = "default_true")]
    pub render_on_apply: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            render_on_apply: true,
        }
    }
}

const fn default_true() -> bool {
    true
}

impl RunnerConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or fails validation.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes configuration to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] for a zero deadline.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.run.deadline_ms == Some(0) {
            return Err(ConfigError::Validation(
                "run.deadline_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the configured run deadline.
    #[must_use]
    pub fn deadline(&self) -> Option<Duration> {
        self.run.deadline_ms.map(Duration::from_millis)
    }

    /// Creates and starts a timer with the configured deadline.
    #[must_use]
    pub fn start_timer(&self) -> DeadlineTimer {
        DeadlineTimer::started(self.deadline())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;
    use crate::timer::ExecutionTimer;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = RunnerConfig::from_toml("").unwrap();
        assert_eq!(config, RunnerConfig::default());
        assert!(config.telemetry.enabled);
        assert!(config.telemetry.render_on_apply);
        assert_eq!(config.deadline(), None);
    }

    #[test]
    fn test_parse_full_config() {
        let config = RunnerConfig::from_toml(
            r"
            [run]
            deadline_ms = 900000

            [telemetry]
            enabled = false
            ",
        )
        .unwrap();
        assert_eq!(config.deadline(), Some(Duration::from_secs(900)));
        assert!(!config.telemetry.enabled);
        assert!(config.telemetry.render_on_apply);
        assert_eq!(config.start_timer().deadline_ms(), Some(900_000));
    }

    #[test]
    fn test_zero_deadline_rejected() {
        let err = RunnerConfig::from_toml("[run]\ndeadline_ms = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = RunnerConfig::from_toml("[run]\nretries = 3\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = RunnerConfig::default();
        config.run.deadline_ms = Some(60_000);
        let text = config.to_toml().unwrap();
        assert_eq!(RunnerConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[telemetry]\nrender_on_apply = false").unwrap();
        let config = RunnerConfig::from_file(file.path()).unwrap();
        assert!(!config.telemetry.render_on_apply);
    }

    #[test]
    fn test_missing_file() {
        let err = RunnerConfig::from_file(Path::new("/nonexistent/runner.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
