//! Subscriber setup for `tracing` output.
//!
//! The walker only emits events; binaries and test suites install a
//! subscriber once. `UIWALKER_LOG` overrides the configured filter.

use crate::config::WalkerConfig;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable read for the filter directive
pub const LOG_ENV: &str = "UIWALKER_LOG";

/// Filter used when neither the environment nor config set one
pub const DEFAULT_FILTER: &str = "warn";

/// Output format of the console layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human readable lines
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

fn env_filter(fallback: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(fallback.unwrap_or(DEFAULT_FILTER)))
}

/// Install the global subscriber.
///
/// Returns `false` when a subscriber was already installed.
pub fn init(filter: Option<&str>, format: LogFormat) -> bool {
    let registry = tracing_subscriber::registry().with(env_filter(filter));
    let installed = match format {
        LogFormat::Pretty => registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    };
    installed.is_ok()
}

/// Install the global subscriber with the filter from `config`
pub fn init_with_config(config: &WalkerConfig) -> bool {
    init(config.log_filter.as_deref(), LogFormat::Pretty)
}

/// Route events through the test harness's captured output
pub fn init_for_tests() {
    let _ = tracing_subscriber::registry()
        .with(env_filter(Some("uiwalker=debug")))
        .with(fmt::layer().with_test_writer())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_reports_existing_subscriber() {
        init_for_tests();
        assert!(!init(None, LogFormat::Json));
        assert!(!init_with_config(&WalkerConfig::default()));
    }

    #[test]
    fn test_default_format() {
        assert_eq!(LogFormat::default(), LogFormat::Pretty);
    }
}
