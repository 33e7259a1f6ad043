//! Storage backend trait and implementations.
//!
//! This module defines the narrow `Storage` contract the strategies use against
//! an external key-value store with expiring keys, along with an in-memory
//! implementation and a Redis implementation.

#[cfg(feature = "memory")]
mod memory_gc;
#[cfg(feature = "redis")]
mod redis;

#[cfg(feature = "memory")]
pub use memory_gc::{GcConfig, GcInterval, MemoryStorage};

#[cfg(feature = "redis")]
pub use self::redis::{RedisConfig, RedisStorage};

use std::future::Future;
use std::time::Duration;

use crate::error::Result;

/// Storage backend trait for rate limiting state.
///
/// All operations are async because the store is normally reached over the
/// network, and any of them may fail with
/// [`RateLimitError::StoreUnavailable`](crate::RateLimitError::StoreUnavailable).
/// Implementations must be thread-safe (`Send + Sync`).
///
/// Values are opaque strings. Keys carry a time-to-live only when one is set
/// explicitly; a plain [`set`](Storage::set) clears it.
///
/// # Example
///
/// ```ignore
/// use ipgate::storage::{MemoryStorage, Storage};
/// use std::time::Duration;
///
/// let storage = MemoryStorage::new();
/// let hits = storage.increment("1.2.3.4").await?;
/// storage.expire("1.2.3.4", Duration::from_secs(10)).await?;
/// ```
pub trait Storage: Send + Sync + 'static {
    /// Get the value stored at `key`.
    ///
    /// Returns `None` if the key doesn't exist or has expired.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Unconditionally overwrite `key`, clearing any TTL.
    fn set(&self, key: &str, value: &str) -> impl Future<Output = Result<()>> + Send;

    /// Atomically increment the integer at `key` and return the new value.
    ///
    /// An absent key counts as 0, so the first call returns 1. The TTL of an
    /// existing key is left untouched.
    fn increment(&self, key: &str) -> impl Future<Output = Result<i64>> + Send;

    /// Set or refresh the TTL of an existing key.
    ///
    /// Returns `false` if the key does not exist.
    fn expire(&self, key: &str, ttl: Duration) -> impl Future<Output = Result<bool>> + Send;

    /// Atomically replace the value at `key` if it still equals `expected`.
    ///
    /// `expected = None` requires the key to be absent. With `ttl = None` the
    /// key keeps whatever TTL it already had. Returns `true` if the write
    /// happened.
    fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&str>,
        new: &str,
        ttl: Option<Duration>,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Delete a key.
    ///
    /// Returns success even if the key didn't exist.
    fn delete(&self, key: &str) -> impl Future<Output = Result<()>> + Send;
}

impl<S: Storage + ?Sized> Storage for std::sync::Arc<S> {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value).await
    }

    async fn increment(&self, key: &str) -> Result<i64> {
        (**self).increment(key).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        (**self).expire(key, ttl).await
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&str>,
        new: &str,
        ttl: Option<Duration>,
    ) -> Result<bool> {
        (**self).compare_and_set(key, expected, new, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        (**self).delete(key).await
    }
}

impl<S: Storage + ?Sized> Storage for Box<S> {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value).await
    }

    async fn increment(&self, key: &str) -> Result<i64> {
        (**self).increment(key).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        (**self).expire(key, ttl).await
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&str>,
        new: &str,
        ttl: Option<Duration>,
    ) -> Result<bool> {
        (**self).compare_and_set(key, expected, new, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        (**self).delete(key).await
    }
}
