//! Quota configuration for rate limiting.
//!
//! A `Quota` pairs a request allowance with a window. Each strategy reads it
//! slightly differently:
//!
//! - sliding counter: `limit` hits are admitted, and `window` is the TTL pushed
//!   forward by every admitted hit;
//! - token bucket: `limit` is the bucket size restored at every window boundary,
//!   and `window` is the fixed window length.
//!
//! # Examples
//!
//! ```ignore
//! use ipgate::Quota;
//! use std::time::Duration;
//!
//! // 10 requests per 20 seconds
//! let quota = Quota::new(10, Duration::from_secs(20));
//!
//! // Same thing, from loosely typed configuration
//! let quota = Quota::try_new(10, Duration::from_secs(20))?;
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Rate limiting quota configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quota {
    /// Maximum number of requests (or tokens) in the window.
    limit: u64,

    /// Time window duration.
    window: Duration,
}

impl Quota {
    /// Create a new quota with the given limit and window.
    ///
    /// # Panics
    ///
    /// Panics if `limit` is 0 or `window` is zero duration.
    pub fn new(limit: u64, window: Duration) -> Self {
        assert!(limit > 0, "limit must be greater than 0");
        assert!(!window.is_zero(), "window must be non-zero");

        Self { limit, window }
    }

    /// Try to create a new quota, returning an error if invalid.
    pub fn try_new(limit: u64, window: Duration) -> Result<Self> {
        if limit == 0 {
            return Err(ConfigError::InvalidQuota("limit must be greater than 0".into()).into());
        }
        if window.is_zero() {
            return Err(ConfigError::InvalidQuota("window must be non-zero".into()).into());
        }
        Ok(Self { limit, window })
    }

    /// Create a quota allowing `n` requests per second.
    pub fn per_second(n: u64) -> Self {
        Self::new(n, Duration::from_secs(1))
    }

    /// Create a quota allowing `n` requests per minute.
    pub fn per_minute(n: u64) -> Self {
        Self::new(n, Duration::from_secs(60))
    }

    /// Create a quota allowing `n` requests per `secs` seconds.
    pub fn per_seconds(n: u64, secs: u64) -> Self {
        Self::new(n, Duration::from_secs(secs))
    }

    /// Get the maximum requests (or tokens) per window.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Get the window duration.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Window length in milliseconds.
    pub fn window_ms(&self) -> u64 {
        self.window.as_millis() as u64
    }
}

impl Default for Quota {
    fn default() -> Self {
        Self::per_seconds(10, 20)
    }
}
