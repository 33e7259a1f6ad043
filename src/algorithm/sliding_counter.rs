//! Sliding counter rate limiting algorithm.

use crate::algorithm::Algorithm;
use crate::decision::{Decision, RateLimitInfo};
use crate::error::Result;
use crate::quota::Quota;
use crate::storage::Storage;

/// Sliding counter rate limiting algorithm.
///
/// Every hit atomically increments a per-client counter. Admitted hits push the
/// counter's TTL forward to the full window; denied hits leave it alone, so a
/// client that keeps hammering while over the limit still recovers once the
/// last admitted hit ages out. The counter only resets after `window` of no
/// admitted traffic.
///
/// The atomic increment serializes concurrent hits for one client: no two
/// requests can observe the same count.
#[derive(Debug, Clone, Default)]
pub struct SlidingCounter;

impl SlidingCounter {
    /// Create a new sliding counter instance.
    pub fn new() -> Self {
        Self
    }
}

impl Algorithm for SlidingCounter {
    fn name(&self) -> &'static str {
        "sliding_counter"
    }

    async fn decide<S: Storage>(&self, storage: &S, key: &str, quota: &Quota) -> Result<Decision> {
        let limit = quota.limit();
        let hits = storage.increment(key).await?.max(0) as u64;

        tracing::debug!(key, hits, limit, "sliding counter hit");

        if hits > limit {
            // The live TTL is at most one window away.
            let info = RateLimitInfo::new(limit, 0, quota.window())
                .with_retry_after(quota.window())
                .with_algorithm(self.name());
            return Ok(Decision::denied(info));
        }

        if !storage.expire(key, quota.window()).await? {
            tracing::debug!(key, "counter expired before its ttl could be refreshed");
        }

        let info = RateLimitInfo::new(limit, limit - hits, quota.window())
            .with_reset_after(quota.window())
            .with_algorithm(self.name());
        Ok(Decision::allowed(info))
    }
}
