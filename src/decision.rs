//! Decision types for admission results.
//!
//! A rate limit check produces a `Decision`: allow or deny, plus a
//! [`RateLimitInfo`] snapshot describing the client's standing afterwards.

use std::time::Duration;

/// Header carrying the request allowance per window.
pub const LIMIT_HEADER: &str = "X-RateLimit-Limit";
/// Header carrying the allowance left in the current window.
pub const REMAINING_HEADER: &str = "X-RateLimit-Remaining";
/// Header carrying whole seconds until the client's state resets.
pub const RESET_HEADER: &str = "X-RateLimit-Reset";
/// Header naming the strategy that decided.
pub const POLICY_HEADER: &str = "X-RateLimit-Policy";
/// Header carrying the configured window, e.g. `20s`.
pub const WINDOW_HEADER: &str = "X-RateLimit-Window";

/// The result of a rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Whether the request is allowed.
    allowed: bool,
    /// Rate limit information.
    info: RateLimitInfo,
}

impl Decision {
    /// Create a new "allowed" decision.
    pub fn allowed(info: RateLimitInfo) -> Self {
        Self {
            allowed: true,
            info,
        }
    }

    /// Create a new "denied" decision.
    pub fn denied(info: RateLimitInfo) -> Self {
        Self {
            allowed: false,
            info,
        }
    }

    /// Check if the request is allowed.
    pub fn is_allowed(&self) -> bool {
        self.allowed
    }

    /// Check if the request is denied.
    pub fn is_denied(&self) -> bool {
        !self.allowed
    }

    /// Get the rate limit info.
    pub fn info(&self) -> &RateLimitInfo {
        &self.info
    }

    /// Consume the decision and return the info.
    pub fn into_info(self) -> RateLimitInfo {
        self.info
    }
}

/// Information about the client's rate limit state after a decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitInfo {
    /// Maximum requests allowed per window.
    pub limit: u64,
    /// Remaining requests in the current window.
    pub remaining: u64,
    /// Configured window length.
    pub window: Duration,
    /// Time until the client's state resets, when the strategy knows it.
    pub reset_after: Option<Duration>,
    /// How long to wait before retrying (only set when rate limited).
    pub retry_after: Option<Duration>,
    /// Name of the algorithm that made this decision.
    pub algorithm: Option<&'static str>,
}

impl RateLimitInfo {
    /// Create a new rate limit info.
    pub fn new(limit: u64, remaining: u64, window: Duration) -> Self {
        Self {
            limit,
            remaining,
            window,
            reset_after: None,
            retry_after: None,
            algorithm: None,
        }
    }

    /// Set the reset duration.
    pub fn with_reset_after(mut self, duration: Duration) -> Self {
        self.reset_after = Some(duration);
        self
    }

    /// Set the retry-after duration.
    pub fn with_retry_after(mut self, duration: Duration) -> Self {
        self.retry_after = Some(duration);
        self
    }

    /// Set the algorithm name.
    pub fn with_algorithm(mut self, name: &'static str) -> Self {
        self.algorithm = Some(name);
        self
    }

    /// Reset time as whole seconds from now, rounded up.
    pub fn reset_seconds(&self) -> Option<u64> {
        self.reset_after.map(ceil_secs)
    }

    /// Retry-after as whole seconds, rounded up so clients never retry early.
    pub fn retry_after_seconds(&self) -> Option<u64> {
        self.retry_after.map(ceil_secs)
    }

    /// Render as `(name, value)` header pairs.
    ///
    /// Limit, remaining and window are always present. Reset, `Retry-After`
    /// and policy only when known.
    pub fn to_headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            (LIMIT_HEADER, self.limit.to_string()),
            (REMAINING_HEADER, self.remaining.to_string()),
            (WINDOW_HEADER, format!("{}s", self.window.as_secs())),
        ];
        if let Some(reset) = self.reset_seconds() {
            headers.push((RESET_HEADER, reset.to_string()));
        }
        if let Some(retry) = self.retry_after_seconds() {
            headers.push(("Retry-After", retry.to_string()));
        }
        if let Some(algorithm) = self.algorithm {
            headers.push((POLICY_HEADER, algorithm.to_string()));
        }
        headers
    }
}

fn ceil_secs(d: Duration) -> u64 {
    let secs = d.as_secs();
    if d.subsec_nanos() > 0 { secs + 1 } else { secs }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_allowed() {
        let info = RateLimitInfo::new(10, 9, Duration::from_secs(20));
        let decision = Decision::allowed(info);

        assert!(decision.is_allowed());
        assert!(!decision.is_denied());
        assert_eq!(decision.info().limit, 10);
        assert_eq!(decision.info().remaining, 9);
    }

    #[test]
    fn test_decision_denied() {
        let info = RateLimitInfo::new(10, 0, Duration::from_secs(20))
            .with_retry_after(Duration::from_secs(30));
        let decision = Decision::denied(info);

        assert!(decision.is_denied());
        assert!(!decision.is_allowed());
        assert_eq!(decision.info().remaining, 0);
        assert_eq!(decision.info().retry_after, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_seconds_round_up() {
        let info = RateLimitInfo::new(10, 0, Duration::from_secs(20))
            .with_reset_after(Duration::from_millis(1500))
            .with_retry_after(Duration::from_millis(1));

        assert_eq!(info.reset_seconds(), Some(2));
        assert_eq!(info.retry_after_seconds(), Some(1));
    }

    #[test]
    fn test_rate_limit_info_headers() {
        let info = RateLimitInfo::new(100, 50, Duration::from_secs(60))
            .with_reset_after(Duration::from_secs(60))
            .with_algorithm("token_bucket")
            .with_retry_after(Duration::from_secs(10));

        let headers = info.to_headers();

        assert!(headers.iter().any(|(k, v)| *k == "X-RateLimit-Limit" && v == "100"));
        assert!(headers.iter().any(|(k, v)| *k == "X-RateLimit-Remaining" && v == "50"));
        assert!(headers.iter().any(|(k, v)| *k == "X-RateLimit-Reset" && v == "60"));
        assert!(headers.iter().any(|(k, v)| *k == "Retry-After" && v == "10"));
        assert!(headers.iter().any(|(k, v)| *k == "X-RateLimit-Policy" && v == "token_bucket"));
    }

    #[test]
    fn test_headers_without_reset_or_retry() {
        let info = RateLimitInfo::new(10, 0, Duration::from_secs(20));
        let headers = info.to_headers();

        assert_eq!(
            headers,
            vec![
                (LIMIT_HEADER, "10".to_string()),
                (REMAINING_HEADER, "0".to_string()),
                (WINDOW_HEADER, "20s".to_string()),
            ]
        );
    }
}
