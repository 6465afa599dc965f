//! Result and error types for uiwalker.

use thiserror::Error;

/// Result type for uiwalker operations
pub type WalkResult<T> = Result<T, WalkError>;

/// Errors that can occur while collecting nodes, waiting on windows or walking
#[derive(Debug, Error)]
pub enum WalkError {
    /// Caller passed a missing or malformed root, window or descriptor
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message
        message: String,
    },

    /// Selector string could not be parsed
    #[error("Malformed selector {selector:?}: {message}")]
    QuerySyntax {
        /// The offending selector
        selector: String,
        /// Error message
        message: String,
    },

    /// Descriptor requested a lookup strategy that is not implemented
    #[error("Unsupported lookup strategy: {strategy}")]
    UnsupportedLookup {
        /// Strategy name as given
        strategy: String,
    },

    /// A wait for window state or predicate exceeded its deadline
    #[error("Operation timed out after {ms}ms: {context}")]
    Timeout {
        /// Timeout in milliseconds
        ms: u64,
        /// What was being waited for
        context: String,
    },

    /// The host failed to perform a UI action
    #[error("UI action failed: {message}")]
    Action {
        /// Error message
        message: String,
    },

    /// A pre- or post-navigation hook failed
    #[error("Hook failed on {anchor}: {message}")]
    Hook {
        /// Identifier of the anchor node
        anchor: String,
        /// Error message
        message: String,
    },

    /// No open window matched
    #[error("No window matching {matcher}")]
    WindowNotFound {
        /// Description of the matcher
        matcher: String,
    },

    /// Configuration or descriptor data was invalid
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl WalkError {
    /// Shorthand for [`WalkError::InvalidArgument`]
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Shorthand for [`WalkError::Timeout`]
    #[must_use]
    pub fn timeout(ms: u64, context: impl Into<String>) -> Self {
        Self::Timeout {
            ms,
            context: context.into(),
        }
    }

    /// Shorthand for [`WalkError::Action`]
    #[must_use]
    pub fn action(message: impl Into<String>) -> Self {
        Self::Action {
            message: message.into(),
        }
    }

    /// Append context to a timeout, leaving other errors untouched.
    ///
    /// Used to name the navigation descriptor whose window never showed up.
    #[must_use]
    pub fn with_context(self, extra: impl AsRef<str>) -> Self {
        match self {
            Self::Timeout { ms, context } => Self::Timeout {
                ms,
                context: format!("{context} ({})", extra.as_ref()),
            },
            other => other,
        }
    }

    /// Whether this is a timeout
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
