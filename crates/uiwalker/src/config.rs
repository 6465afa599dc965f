//! Walker configuration

use crate::result::{WalkError, WalkResult};
use crate::wait::{WaitOptions, DEFAULT_POLL_INTERVAL_MS, DEFAULT_WAIT_TIMEOUT_MS};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Timeouts and logging for walks and window waits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkerConfig {
    /// Timeout for windows to open and predicates to hold (ms)
    pub wait_timeout_ms: u64,
    /// Delay between polls (ms)
    pub poll_interval_ms: u64,
    /// Timeout for windows to close (ms)
    pub close_timeout_ms: u64,
    /// `tracing` filter directive used by [`crate::logging::init_with_config`]
    pub log_filter: Option<String>,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            wait_timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            close_timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            log_filter: None,
        }
    }
}

impl WalkerConfig {
    /// Create config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the opening timeout
    #[must_use]
    pub const fn with_wait_timeout(mut self, ms: u64) -> Self {
        self.wait_timeout_ms = ms;
        self
    }

    /// Set the poll interval
    #[must_use]
    pub const fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Set the closing timeout
    #[must_use]
    pub const fn with_close_timeout(mut self, ms: u64) -> Self {
        self.close_timeout_ms = ms;
        self
    }

    /// Set the log filter directive
    #[must_use]
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = Some(filter.into());
        self
    }

    /// Options for opening waits
    #[must_use]
    pub fn wait_options(&self) -> WaitOptions {
        WaitOptions::new()
            .with_timeout(self.wait_timeout_ms)
            .with_poll_interval(self.poll_interval_ms)
    }

    /// Options for closing waits
    #[must_use]
    pub fn close_options(&self) -> WaitOptions {
        WaitOptions::new()
            .with_timeout(self.close_timeout_ms)
            .with_poll_interval(self.poll_interval_ms)
    }

    /// Reject settings that would make every wait fail or spin
    pub fn validate(&self) -> WalkResult<()> {
        if self.poll_interval_ms == 0 {
            return Err(WalkError::Config {
                message: "poll_interval_ms must be greater than zero".to_string(),
            });
        }
        if self.poll_interval_ms > self.wait_timeout_ms {
            return Err(WalkError::Config {
                message: format!(
                    "poll_interval_ms ({}) exceeds wait_timeout_ms ({})",
                    self.poll_interval_ms, self.wait_timeout_ms
                ),
            });
        }
        Ok(())
    }

    /// Parse and validate YAML
    pub fn from_yaml(yaml: &str) -> WalkResult<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate JSON
    pub fn from_json(json: &str) -> WalkResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a file; `.json` files are JSON, anything else YAML
    pub fn load(path: &Path) -> WalkResult<Self> {
        let text = std::fs::read_to_string(path)?;
        if path.extension().is_some_and(|ext| ext == "json") {
            Self::from_json(&text)
        } else {
            Self::from_yaml(&text)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WalkerConfig::default();
        assert_eq!(config.wait_timeout_ms, 5_000);
        assert_eq!(config.poll_interval_ms, 50);
        assert_eq!(config.close_timeout_ms, 5_000);
        assert!(config.log_filter.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_feeds_wait_options() {
        let config = WalkerConfig::new()
            .with_wait_timeout(800)
            .with_poll_interval(20)
            .with_close_timeout(300);
        assert_eq!(config.wait_options(), WaitOptions::new().with_timeout(800).with_poll_interval(20));
        assert_eq!(config.close_options().timeout_ms, 300);
        assert_eq!(config.close_options().poll_interval_ms, 20);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = WalkerConfig::from_yaml("wait_timeout_ms: 1000\nlog_filter: uiwalker=debug\n").unwrap();
        assert_eq!(config.wait_timeout_ms, 1_000);
        assert_eq!(config.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        assert_eq!(config.log_filter.as_deref(), Some("uiwalker=debug"));
    }

    #[test]
    fn test_invalid_poll_interval() {
        let err = WalkerConfig::from_json(r#"{"poll_interval_ms": 0}"#).unwrap_err();
        assert!(matches!(err, WalkError::Config { .. }));
        let err = WalkerConfig::from_json(r#"{"wait_timeout_ms": 10, "poll_interval_ms": 50}"#).unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn test_load_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = dir.path().join("walker.yaml");
        std::fs::write(&yaml, "close_timeout_ms: 250\n").unwrap();
        assert_eq!(WalkerConfig::load(&yaml).unwrap().close_timeout_ms, 250);

        let json = dir.path().join("walker.json");
        std::fs::write(&json, r#"{"poll_interval_ms": 10}"#).unwrap();
        assert_eq!(WalkerConfig::load(&json).unwrap().poll_interval_ms, 10);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = WalkerConfig::load(&dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, WalkError::Io(_)));
    }
}
