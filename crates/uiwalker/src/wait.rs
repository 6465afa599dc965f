//! Wait Mechanisms
//!
//! Bounded polling used for every synchronization point: window state,
//! selection state and caller predicates. Nothing here blocks on I/O; each
//! attempt pumps the host's pending notifications, checks the condition, then sleeps.

use crate::result::{WalkError, WalkResult};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Default timeout for wait operations (5 seconds)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 5_000;

/// Default polling interval (50ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

// =============================================================================
// WAIT OPTIONS
// =============================================================================

/// Options for wait operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitOptions {
    /// Timeout in milliseconds
    pub timeout_ms: u64,
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl WaitOptions {
    /// Create new wait options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Get timeout as Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get poll interval as Duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// =============================================================================
// WAIT RESULT
// =============================================================================

/// Result of a successful wait operation
#[derive(Debug, Clone)]
pub struct WaitResult {
    /// Time spent waiting
    pub elapsed: Duration,
    /// Number of condition checks made
    pub attempts: u32,
    /// Description of what was waited for
    pub waited_for: String,
}

// =============================================================================
// POLLING
// =============================================================================

/// Poll `condition` until it yields a value or the timeout elapses.
///
/// `pump` runs before every check so hosts can deliver queued window
/// notifications. The condition runs at least once, even with a zero timeout.
pub fn poll_until<T>(
    options: &WaitOptions,
    description: &str,
    mut pump: impl FnMut(),
    mut condition: impl FnMut() -> Option<T>,
) -> WalkResult<(T, WaitResult)> {
    let start = Instant::now();
    let timeout = options.timeout();
    let mut attempts = 0u32;

    loop {
        pump();
        attempts += 1;
        if let Some(value) = condition() {
            return Ok((
                value,
                WaitResult {
                    elapsed: start.elapsed(),
                    attempts,
                    waited_for: description.to_string(),
                },
            ));
        }

        let elapsed = start.elapsed();
        if elapsed >= timeout {
            tracing::debug!(
                waited_for = description,
                attempts,
                timeout_ms = options.timeout_ms,
                "wait timed out"
            );
            return Err(WalkError::timeout(options.timeout_ms, description));
        }
        std::thread::sleep(options.poll_interval().min(timeout - elapsed));
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    mod wait_options_tests {
        use super::*;

        #[test]
        fn test_wait_options_default() {
            let opts = WaitOptions::default();
            assert_eq!(opts.timeout_ms, DEFAULT_WAIT_TIMEOUT_MS);
            assert_eq!(opts.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        }

        #[test]
        fn test_wait_options_chained() {
            let opts = WaitOptions::new().with_timeout(10_000).with_poll_interval(200);
            assert_eq!(opts.timeout(), Duration::from_millis(10_000));
            assert_eq!(opts.poll_interval(), Duration::from_millis(200));
        }

        #[test]
        fn test_wait_options_deserialize_partial() {
            let opts: WaitOptions = serde_json::from_str(r#"{"timeout_ms": 750}"#).unwrap();
            assert_eq!(opts.timeout_ms, 750);
            assert_eq!(opts.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        }
    }

    mod poll_tests {
        use super::*;
        use std::cell::Cell;

        #[test]
        fn test_poll_returns_value() {
            let options = WaitOptions::new().with_timeout(100).with_poll_interval(5);
            let calls = Cell::new(0);
            let (value, result) = poll_until(
                &options,
                "third check",
                || {},
                || {
                    calls.set(calls.get() + 1);
                    (calls.get() == 3).then_some("ready")
                },
            )
            .unwrap();
            assert_eq!(value, "ready");
            assert_eq!(result.attempts, 3);
            assert_eq!(result.waited_for, "third check");
        }

        #[test]
        fn test_poll_pumps_before_each_check() {
            let options = WaitOptions::new().with_timeout(100).with_poll_interval(1);
            let pumped = Cell::new(0);
            let _ = poll_until(
                &options,
                "pumped twice",
                || pumped.set(pumped.get() + 1),
                || (pumped.get() == 2).then_some(()),
            )
            .unwrap();
            assert_eq!(pumped.get(), 2);
        }

        #[test]
        fn test_poll_zero_timeout_checks_once() {
            let options = WaitOptions::new().with_timeout(0);
            let calls = Cell::new(0);
            let result = poll_until(
                &options,
                "never",
                || {},
                || {
                    calls.set(calls.get() + 1);
                    None::<()>
                },
            );
            assert!(result.unwrap_err().is_timeout());
            assert_eq!(calls.get(), 1);
        }

        #[test]
        fn test_poll_timeout_respects_deadline() {
            let options = WaitOptions::new().with_timeout(60).with_poll_interval(10);
            let start = Instant::now();
            let err = poll_until(&options, "nothing", || {}, || None::<()>).unwrap_err();
            let elapsed = start.elapsed();
            assert!(elapsed >= Duration::from_millis(60));
            assert!(elapsed < Duration::from_millis(1_000));
            match err {
                WalkError::Timeout { ms, context } => {
                    assert_eq!(ms, 60);
                    assert_eq!(context, "nothing");
                }
                _ => panic!("Expected Timeout error"),
            }
        }
    }
}
