//! Redis storage backend for distributed rate limiting.
//!
//! Uses connection pooling for high performance. Counters map directly onto
//! `INCR`/`PEXPIRE`; the conditional write used by the token bucket runs as a
//! Lua script so the compare and the write happen in one server-side step.

use std::time::Duration;

use deadpool_redis::redis::{AsyncCommands, RedisError, Script, cmd};
use deadpool_redis::{Config, Connection, Pool, PoolConfig, PoolError, Runtime};

use crate::error::{Result, StoreError};
use crate::storage::Storage;

const COMPARE_AND_SET: &str = include_str!("../../scripts/compare_and_set.lua");

/// Redis storage configuration.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    pub url: String,
    /// Connection pool size
    pub pool_size: usize,
    /// Key prefix applied to every key
    pub key_prefix: String,
    /// Connection timeout
    pub connection_timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            pool_size: 10,
            key_prefix: String::new(),
            connection_timeout: Duration::from_secs(5),
        }
    }
}

impl RedisConfig {
    /// Create a new Redis configuration.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set the key prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Set the pool size.
    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }

    /// Set the connection timeout.
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }
}

/// Redis storage backend for distributed rate limiting.
///
/// # Example
///
/// ```ignore
/// use ipgate::storage::{RedisStorage, RedisConfig};
///
/// let config = RedisConfig::new("redis://localhost:6379")
///     .with_prefix("myapp:")
///     .with_pool_size(20);
///
/// let storage = RedisStorage::new(config).await?;
/// ```
pub struct RedisStorage {
    pool: Pool,
    key_prefix: String,
    cas_script: Script,
}

impl std::fmt::Debug for RedisStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStorage")
            .field("key_prefix", &self.key_prefix)
            .finish()
    }
}

impl RedisStorage {
    /// Create a new Redis storage from configuration.
    ///
    /// Fails with `StoreUnavailable` if the server does not answer `PING`.
    pub async fn new(config: RedisConfig) -> Result<Self> {
        let mut cfg = Config::from_url(&config.url);
        let mut pool_config = PoolConfig::new(config.pool_size);
        pool_config.timeouts.wait = Some(config.connection_timeout);
        pool_config.timeouts.create = Some(config.connection_timeout);
        cfg.pool = Some(pool_config);

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| StoreError::unavailable(format!("pool creation failed: {}", e), false))?;

        // Test connection
        let mut conn = pool
            .get()
            .await
            .map_err(|e| StoreError::unavailable(format!("failed to connect: {}", e), true))?;
        let _: () = cmd("PING")
            .query_async(&mut *conn)
            .await
            .map_err(redis_error)?;

        tracing::info!(
            pool_size = config.pool_size,
            prefix = %config.key_prefix,
            "connected to redis"
        );

        Ok(Self {
            pool,
            key_prefix: config.key_prefix,
            cas_script: Script::new(COMPARE_AND_SET),
        })
    }

    /// Create a new Redis storage from a URL.
    pub async fn from_url(url: impl Into<String>) -> Result<Self> {
        Self::new(RedisConfig::new(url)).await
    }

    /// Get the full key with prefix.
    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    /// Get a connection from the pool.
    async fn get_conn(&self) -> Result<Connection> {
        self.pool.get().await.map_err(|e| match e {
            PoolError::Timeout(_) => StoreError::PoolExhausted.into(),
            other => StoreError::unavailable(other.to_string(), true).into(),
        })
    }
}

/// Map a Redis client error to a store fault.
fn redis_error(e: RedisError) -> StoreError {
    let retryable = e.is_io_error() || e.is_timeout() || e.is_connection_dropped();
    StoreError::unavailable(e.to_string(), retryable)
}

impl Storage for RedisStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.get_conn().await?;
        let value: Option<String> = conn.get(self.full_key(key)).await.map_err(redis_error)?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.get_conn().await?;
        conn.set::<_, _, ()>(self.full_key(key), value)
            .await
            .map_err(redis_error)?;
        Ok(())
    }

    async fn increment(&self, key: &str) -> Result<i64> {
        let mut conn = self.get_conn().await?;
        let count: i64 = conn
            .incr(self.full_key(key), 1)
            .await
            .map_err(redis_error)?;
        Ok(count)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.get_conn().await?;
        let ttl_ms = (ttl.as_millis() as i64).max(1);
        let applied: bool = conn
            .pexpire(self.full_key(key), ttl_ms)
            .await
            .map_err(redis_error)?;
        Ok(applied)
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&str>,
        new: &str,
        ttl: Option<Duration>,
    ) -> Result<bool> {
        let mut conn = self.get_conn().await?;
        let ttl_ms = ttl.map(|t| (t.as_millis() as u64).max(1)).unwrap_or(0);

        let mut invocation = self.cas_script.prepare_invoke();
        invocation
            .key(self.full_key(key))
            .arg(expected.unwrap_or_default())
            .arg(if expected.is_some() { "1" } else { "0" })
            .arg(new)
            .arg(ttl_ms);

        let swapped: i64 = invocation
            .invoke_async(&mut *conn)
            .await
            .map_err(redis_error)?;
        Ok(swapped == 1)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.get_conn().await?;
        conn.del::<_, ()>(self.full_key(key))
            .await
            .map_err(redis_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redis_config() {
        let config = RedisConfig::new("redis://localhost:6380")
            .with_prefix("test:")
            .with_pool_size(5)
            .with_connection_timeout(Duration::from_millis(250));

        assert_eq!(config.url, "redis://localhost:6380");
        assert_eq!(config.key_prefix, "test:");
        assert_eq!(config.pool_size, 5);
        assert_eq!(config.connection_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_default_prefix_is_empty() {
        assert!(RedisConfig::default().key_prefix.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_store_unavailable() {
        let config = RedisConfig::new("redis://127.0.0.1:1")
            .with_connection_timeout(Duration::from_millis(200));
        let err = RedisStorage::new(config).await.unwrap_err();
        assert!(err.is_store_unavailable());
    }
}
