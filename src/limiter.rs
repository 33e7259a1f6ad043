//! The admission entry point.
//!
//! A `RateLimiter` binds one strategy and one quota to a shared store and
//! answers "may this client proceed?" for any [`ClientKey`].
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use ipgate::{ClientKey, MemoryStorage, Quota, RateLimiter, TokenBucket};
//!
//! let limiter = RateLimiter::new(
//!     Arc::new(MemoryStorage::new()),
//!     TokenBucket::new(),
//!     Quota::per_seconds(10, 20),
//! )
//! .with_namespace("bucket")
//! .with_timeout(Duration::from_secs(1));
//!
//! let decision = limiter.decide(&ClientKey::new("5.6.7.8")?).await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::algorithm::{Algorithm, Strategy};
use crate::decision::Decision;
use crate::error::{Result, StoreError};
use crate::key::ClientKey;
use crate::quota::Quota;
use crate::storage::Storage;

/// Admission decisions for one strategy and quota over a shared store.
pub struct RateLimiter<S> {
    storage: Arc<S>,
    strategy: Arc<Strategy>,
    quota: Quota,
    namespace: Option<String>,
    timeout: Option<Duration>,
}

impl<S> std::fmt::Debug for RateLimiter<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("strategy", &self.strategy.name())
            .field("quota", &self.quota)
            .field("namespace", &self.namespace)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl<S: Storage> RateLimiter<S> {
    /// Create a limiter with no key namespace and no store timeout.
    pub fn new(storage: Arc<S>, strategy: impl Into<Strategy>, quota: Quota) -> Self {
        Self {
            storage,
            strategy: Arc::new(strategy.into()),
            quota,
            namespace: None,
            timeout: None,
        }
    }

    /// Prefix every store key with `namespace:`. An empty namespace is ignored.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        self.namespace = (!namespace.is_empty()).then_some(namespace);
        self
    }

    /// Give up on the store after `timeout`.
    ///
    /// A decision that times out still runs to completion in the background,
    /// so a half-applied token bucket update is never abandoned.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Wait on the store for as long as it takes.
    pub fn without_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    /// The configured quota.
    pub fn quota(&self) -> &Quota {
        &self.quota
    }

    /// The configured strategy.
    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    /// The shared store.
    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// The store key used for `client`.
    pub fn storage_key(&self, client: &ClientKey) -> String {
        match &self.namespace {
            Some(namespace) => format!("{}:{}", namespace, client),
            None => client.to_string(),
        }
    }

    /// Decide whether `client` may proceed, recording the request if admitted.
    ///
    /// Store faults are returned as errors, never guessed into an outcome.
    pub async fn decide(&self, client: &ClientKey) -> Result<Decision> {
        let key = self.storage_key(client);

        let result = match self.timeout {
            None => self.strategy.decide(&*self.storage, &key, &self.quota).await,
            Some(limit) => self.decide_within(key.clone(), limit).await,
        };

        match &result {
            Ok(decision) => tracing::debug!(
                key = %key,
                algorithm = self.strategy.name(),
                allowed = decision.is_allowed(),
                remaining = decision.info().remaining,
                "rate limit decision"
            ),
            Err(e) => tracing::warn!(
                key = %key,
                algorithm = self.strategy.name(),
                error = %e,
                "rate limit decision failed"
            ),
        }

        result
    }

    async fn decide_within(&self, key: String, limit: Duration) -> Result<Decision> {
        let storage = Arc::clone(&self.storage);
        let strategy = Arc::clone(&self.strategy);
        let quota = self.quota;

        let task = tokio::spawn(async move { strategy.decide(&*storage, &key, &quota).await });

        match tokio::time::timeout(limit, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(StoreError::unavailable(
                format!("decision task failed: {}", join_error),
                false,
            )
            .into()),
            Err(_) => Err(StoreError::Timeout(limit).into()),
        }
    }

    /// Forget everything recorded for `client`.
    pub async fn reset(&self, client: &ClientKey) -> Result<()> {
        let key = self.storage_key(client);
        self.strategy.reset(&*self.storage, &key).await?;
        tracing::debug!(key = %key, "rate limit state reset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::{SlidingCounter, TokenBucket};
    use crate::error::RateLimitError;
    use crate::storage::MemoryStorage;

    /// Store whose every call hangs for a while before delegating.
    struct SlowStorage {
        inner: MemoryStorage,
        delay: Duration,
    }

    impl Storage for SlowStorage {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            tokio::time::sleep(self.delay).await;
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> Result<()> {
            tokio::time::sleep(self.delay).await;
            self.inner.set(key, value).await
        }

        async fn increment(&self, key: &str) -> Result<i64> {
            tokio::time::sleep(self.delay).await;
            self.inner.increment(key).await
        }

        async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
            tokio::time::sleep(self.delay).await;
            self.inner.expire(key, ttl).await
        }

        async fn compare_and_set(
            &self,
            key: &str,
            expected: Option<&str>,
            new: &str,
            ttl: Option<Duration>,
        ) -> Result<bool> {
            tokio::time::sleep(self.delay).await;
            self.inner.compare_and_set(key, expected, new, ttl).await
        }

        async fn delete(&self, key: &str) -> Result<()> {
            tokio::time::sleep(self.delay).await;
            self.inner.delete(key).await
        }
    }

    fn client(s: &str) -> ClientKey {
        ClientKey::new(s).unwrap()
    }

    #[tokio::test]
    async fn test_sliding_counter_limiter() {
        let storage = Arc::new(MemoryStorage::new());
        let limiter = RateLimiter::new(Arc::clone(&storage), SlidingCounter::new(), Quota::per_seconds(10, 10));

        for _ in 0..10 {
            assert!(limiter.decide(&client("1.2.3.4")).await.unwrap().is_allowed());
        }
        assert!(limiter.decide(&client("1.2.3.4")).await.unwrap().is_denied());
        assert_eq!(storage.get("1.2.3.4").await.unwrap(), Some("11".to_string()));

        // Other clients are unaffected
        assert!(limiter.decide(&client("9.9.9.9")).await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn test_namespace_prefixes_keys() {
        let storage = Arc::new(MemoryStorage::new());
        let limiter = RateLimiter::new(Arc::clone(&storage), TokenBucket::new(), Quota::default())
            .with_namespace("bucket");

        limiter.decide(&client("5.6.7.8")).await.unwrap();
        let bucket = storage.get("bucket:5.6.7.8").await.unwrap().unwrap();
        assert!(bucket.starts_with("9:"), "unexpected bucket {:?}", bucket);
        assert_eq!(storage.get("5.6.7.8").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_empty_namespace_is_ignored() {
        let limiter = RateLimiter::new(Arc::new(MemoryStorage::new()), SlidingCounter::new(), Quota::default())
            .with_namespace("");
        assert_eq!(limiter.storage_key(&client("1.2.3.4")), "1.2.3.4");
    }

    #[tokio::test]
    async fn test_reset_restores_allowance() {
        let storage = Arc::new(MemoryStorage::new());
        let limiter = RateLimiter::new(storage, TokenBucket::new(), Quota::per_seconds(1, 60));

        assert!(limiter.decide(&client("a")).await.unwrap().is_allowed());
        assert!(limiter.decide(&client("a")).await.unwrap().is_denied());

        limiter.reset(&client("a")).await.unwrap();
        assert!(limiter.decide(&client("a")).await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn test_store_fault_is_returned() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set_unavailable(true);
        let limiter = RateLimiter::new(storage, SlidingCounter::new(), Quota::default())
            .with_timeout(Duration::from_secs(1));

        let err = limiter.decide(&client("a")).await.unwrap_err();
        assert!(err.is_store_unavailable());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_surfaces_as_store_error() {
        let storage = Arc::new(SlowStorage {
            inner: MemoryStorage::new(),
            delay: Duration::from_secs(5),
        });
        let limiter = RateLimiter::new(Arc::clone(&storage), SlidingCounter::new(), Quota::default())
            .with_timeout(Duration::from_millis(100));

        let err = limiter.decide(&client("a")).await.unwrap_err();
        assert!(matches!(
            err,
            RateLimitError::StoreUnavailable(StoreError::Timeout(t)) if t == Duration::from_millis(100)
        ));

        // The abandoned decision still completes in the background
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(storage.inner.get("a").await.unwrap(), Some("1".to_string()));
        assert!(storage.inner.ttl("a").is_some());
    }
}
