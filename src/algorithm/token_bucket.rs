//! Token Bucket rate limiting algorithm.

use std::sync::Arc;
use std::time::Duration;

use crate::algorithm::Algorithm;
use crate::clock::{Clock, SystemClock};
use crate::decision::{Decision, RateLimitInfo};
use crate::error::{Result, StoreError};
use crate::quota::Quota;
use crate::storage::Storage;

/// Slack added to the idle expiry so a bucket outlives its window.
const IDLE_EXPIRY_SLACK: Duration = Duration::from_secs(1);

/// A bucket as stored: `<tokens>:<window start in unix ms>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Bucket {
    tokens: u64,
    window_start: u64,
}

impl Bucket {
    /// Parse a stored bucket, clamping the token count to the bucket size.
    fn parse(key: &str, raw: &str, max_tokens: u64) -> Result<Self> {
        let malformed = || StoreError::malformed(key, raw);
        let (tokens, window_start) = raw.split_once(':').ok_or_else(malformed)?;
        let tokens = tokens.parse::<u64>().map_err(|_| malformed())?;
        let window_start = window_start.parse::<u64>().map_err(|_| malformed())?;

        Ok(Self {
            tokens: tokens.min(max_tokens),
            window_start,
        })
    }

    fn window_end(&self, window_ms: u64) -> u64 {
        self.window_start.saturating_add(window_ms)
    }

    fn encode(&self) -> String {
        format!("{}:{}", self.tokens, self.window_start)
    }
}

/// Token Bucket rate limiting algorithm.
///
/// Each client holds `quota.limit()` tokens per window. The window starts with
/// the client's first request and the bucket is refilled all at once, not
/// gradually, on the first request after the window has elapsed. A request is
/// admitted while tokens remain; the request that opens a window is charged
/// against the fresh bucket like any other.
///
/// The token count and the window start live together in one value at
/// `<key>`, written as `<tokens>:<window start in unix ms>`. Every write is a
/// conditional write against the exact value that was read, so a refill and a
/// spend can never interleave and no token is spent twice. A lost write means
/// another request made progress; the decision is then taken again from the
/// fresh value.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    clock: Arc<dyn Clock>,
    idle_expiry: bool,
}

impl Default for TokenBucket {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenBucket {
    /// Create a new Token Bucket algorithm instance.
    pub fn new() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            idle_expiry: true,
        }
    }

    /// Use a custom clock for window bookkeeping.
    pub fn with_clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Let buckets expire one second after their window ends.
    ///
    /// An expired bucket and an elapsed window lead to the same outcome, so this
    /// only bounds store memory. Disable to keep buckets forever.
    pub fn with_idle_expiry(mut self, enabled: bool) -> Self {
        self.idle_expiry = enabled;
        self
    }

    fn bucket_ttl(&self, quota: &Quota) -> Option<Duration> {
        self.idle_expiry.then(|| quota.window() + IDLE_EXPIRY_SLACK)
    }

    fn info(&self, quota: &Quota, remaining: u64) -> RateLimitInfo {
        RateLimitInfo::new(quota.limit(), remaining, quota.window()).with_algorithm(self.name())
    }
}

impl Algorithm for TokenBucket {
    fn name(&self) -> &'static str {
        "token_bucket"
    }

    async fn decide<S: Storage>(&self, storage: &S, key: &str, quota: &Quota) -> Result<Decision> {
        let max_tokens = quota.limit();
        let window_ms = quota.window_ms();
        let mut conflicts = 0u32;

        loop {
            let raw = storage.get(key).await?;
            let now = self.clock.now_ms();
            let bucket = raw
                .as_deref()
                .map(|raw| Bucket::parse(key, raw, max_tokens))
                .transpose()?;

            match bucket {
                Some(bucket) if now <= bucket.window_end(window_ms) => {
                    let window_end = bucket.window_end(window_ms);
                    let until_reset = Duration::from_millis(window_end - now);

                    if bucket.tokens == 0 {
                        tracing::debug!(key, window_end, "no available tokens");
                        // Strictly after the window end
                        let retry_after = until_reset + Duration::from_millis(1);
                        let info = self
                            .info(quota, 0)
                            .with_reset_after(retry_after)
                            .with_retry_after(retry_after);
                        return Ok(Decision::denied(info));
                    }

                    let spent = Bucket {
                        tokens: bucket.tokens - 1,
                        ..bucket
                    };
                    if storage
                        .compare_and_set(key, raw.as_deref(), &spent.encode(), None)
                        .await?
                    {
                        tracing::debug!(key, remaining = spent.tokens, "token spent");
                        let info = self.info(quota, spent.tokens).with_reset_after(until_reset);
                        return Ok(Decision::allowed(info));
                    }
                }
                stale => {
                    if stale.is_none() {
                        tracing::debug!(key, "never seen, setting up tokens");
                    } else {
                        tracing::debug!(key, "window is over, refilling tokens");
                    }

                    let opened = Bucket {
                        tokens: max_tokens - 1,
                        window_start: now,
                    };
                    if storage
                        .compare_and_set(key, raw.as_deref(), &opened.encode(), self.bucket_ttl(quota))
                        .await?
                    {
                        let info = self.info(quota, opened.tokens).with_reset_after(quota.window());
                        return Ok(Decision::allowed(info));
                    }
                }
            }

            conflicts += 1;
            tracing::trace!(key, conflicts, "bucket changed under us, retrying");
        }
    }
}
