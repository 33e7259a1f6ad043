//! Error types for admission decisions.
//!
//! Store faults are the only failure a decision can produce at runtime. They are
//! surfaced as [`RateLimitError::StoreUnavailable`] and never turned into an
//! allow or deny by the strategies themselves; what to do with them is up to the
//! caller (see [`crate::policy::FailurePolicy`]).

use std::time::Duration;
use thiserror::Error;

/// Result type for rate limiting operations.
pub type Result<T> = std::result::Result<T, RateLimitError>;

/// Main error type for rate limiting operations.
#[derive(Debug, Error)]
pub enum RateLimitError {
    /// The backing store could not complete an operation.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The client key was empty.
    #[error("Invalid client key: {0}")]
    InvalidKey(String),
}

impl RateLimitError {
    /// Check if this error came from the store.
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

/// Store-related errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store operation failed (network or service fault).
    #[error("{message}")]
    Unavailable {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The store did not answer in time.
    #[error("Store did not respond within {0:?}")]
    Timeout(Duration),

    /// A stored value could not be interpreted.
    #[error("Malformed value at {key}: {value:?}")]
    Malformed {
        /// The offending key.
        key: String,
        /// The raw stored value.
        value: String,
    },

    /// Connection pool exhausted.
    #[error("Connection pool exhausted")]
    PoolExhausted,
}

impl StoreError {
    /// Create a new unavailable error.
    pub fn unavailable(message: impl Into<String>, retryable: bool) -> Self {
        Self::Unavailable {
            message: message.into(),
            retryable,
        }
    }

    /// Create a malformed-value error.
    pub fn malformed(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Malformed {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Unavailable { retryable, .. } => *retryable,
            Self::Timeout(_) => true,
            Self::PoolExhausted => true,
            Self::Malformed { .. } => false,
        }
    }
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid quota configuration.
    #[error("Invalid quota: {0}")]
    InvalidQuota(String),

    /// Unknown strategy name.
    #[error("Unknown strategy: {0}")]
    InvalidStrategy(String),

    /// Invalid storage configuration.
    #[error("Invalid storage configuration: {0}")]
    InvalidStorage(String),

    /// Unknown failure policy name.
    #[error("Unknown failure policy: {0}")]
    InvalidPolicy(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_retryable() {
        let err = StoreError::unavailable("connection refused", true);
        assert!(err.is_retryable());

        let err = StoreError::unavailable("wrong type", false);
        assert!(!err.is_retryable());

        let err = StoreError::Timeout(Duration::from_millis(50));
        assert!(err.is_retryable());

        let err = StoreError::malformed("1.2.3.4", "abc");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = RateLimitError::InvalidKey("empty".into());
        assert_eq!(err.to_string(), "Invalid client key: empty");

        let err: RateLimitError = StoreError::unavailable("connection refused", true).into();
        assert!(err.is_store_unavailable());
        assert_eq!(err.to_string(), "Store unavailable: connection refused");

        let err: RateLimitError = StoreError::malformed("5.6.7.8", "lots").into();
        assert_eq!(err.to_string(), "Store unavailable: Malformed value at 5.6.7.8: \"lots\"");
    }
}
