//! Service configuration from command-line flags and environment variables.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use clap::Parser;

use crate::algorithm::StrategyKind;
use crate::error::ConfigError;
use crate::policy::FailurePolicy;
use crate::quota::Quota;

/// Which store backs the limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// Shared Redis server.
    Redis,
    /// Process-local map, for single-node use.
    Memory,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Redis => "redis",
            Self::Memory => "memory",
        })
    }
}

impl FromStr for StoreKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" | "mem" => Ok(Self::Memory),
            other => Err(ConfigError::InvalidStorage(format!("unknown store {:?}", other))),
        }
    }
}

/// Service configuration.
///
/// Every flag can also be given through the environment variable named next
/// to it.
#[derive(Debug, Clone, Parser)]
#[command(name = "ipgate", version, about = "Per-address HTTP admission control")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Admission strategy: sliding-counter or token-bucket
    #[arg(long, env = "STRATEGY", default_value_t = StrategyKind::TokenBucket)]
    pub strategy: StrategyKind,

    /// Requests admitted per window (sliding counter)
    #[arg(long, env = "LIMIT", default_value_t = 10)]
    pub limit: u64,

    /// Sliding counter TTL in seconds
    #[arg(long, env = "EXP_SECONDS", default_value_t = 10)]
    pub exp_seconds: u64,

    /// Bucket size (token bucket)
    #[arg(long, env = "MAX_TOKENS", default_value_t = 10)]
    pub max_tokens: u64,

    /// Token bucket window in seconds
    #[arg(long, env = "WINDOW_SEC", default_value_t = 20)]
    pub window_sec: u64,

    /// Store backend: redis or memory
    #[arg(long, env = "STORE", default_value_t = StoreKind::Redis)]
    pub store: StoreKind,

    /// Redis connection URL
    #[arg(long, env = "REDIS_URL", default_value = "redis://localhost:6379")]
    pub redis_url: String,

    /// Prefix for every Redis key
    #[arg(long, env = "REDIS_PREFIX", default_value = "")]
    pub redis_prefix: String,

    /// Namespace separating limiters that share a store
    #[arg(long, env = "KEY_NAMESPACE", default_value = "")]
    pub namespace: String,

    /// Store timeout in milliseconds, 0 to wait indefinitely
    #[arg(long, env = "STORE_TIMEOUT_MS", default_value_t = 1000)]
    pub store_timeout_ms: u64,

    /// Answer to store faults: error (503), open (admit) or closed (429)
    #[arg(long, env = "ON_STORE_ERROR", default_value_t = FailurePolicy::Error)]
    pub on_store_error: FailurePolicy,

    /// Key clients on the first X-Forwarded-For address
    #[arg(long, env = "TRUST_FORWARDED_FOR", default_value_t = false)]
    pub trust_forwarded_for: bool,
}

impl Config {
    /// Address to bind the listener to.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// The quota of the configured strategy.
    pub fn quota(&self) -> Result<Quota, ConfigError> {
        let (limit, secs) = match self.strategy {
            StrategyKind::SlidingCounter => (self.limit, self.exp_seconds),
            StrategyKind::TokenBucket => (self.max_tokens, self.window_sec),
        };
        if limit == 0 {
            return Err(ConfigError::InvalidQuota(format!("{} needs a non-zero limit", self.strategy)));
        }
        if secs == 0 {
            return Err(ConfigError::InvalidQuota(format!("{} needs a non-zero window", self.strategy)));
        }
        Ok(Quota::new(limit, Duration::from_secs(secs)))
    }

    /// How long to wait on the store, `None` for no limit.
    pub fn store_timeout(&self) -> Option<Duration> {
        (self.store_timeout_ms > 0).then(|| Duration::from_millis(self.store_timeout_ms))
    }

    /// Check settings that the parser cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.quota()?;
        if self.store == StoreKind::Redis && self.redis_url.trim().is_empty() {
            return Err(ConfigError::InvalidStorage("redis url is empty".into()));
        }
        Ok(())
    }
}
