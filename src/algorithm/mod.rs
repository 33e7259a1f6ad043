//! Admission algorithm trait and implementations.
//!
//! Two strategies are provided. Both are stateless: every bit of per-client
//! state lives in the [`Storage`] they are handed, which is what lets several
//! instances of a service share one store.
//!
//! - **Sliding counter**: atomic counter whose TTL is pushed forward by every
//!   admitted hit, so the window only closes after a quiet period
//! - **Token bucket**: fixed allowance restored in full at each window boundary
//!
//! [`Strategy`] selects one of them at runtime.

mod sliding_counter;
mod token_bucket;

pub use sliding_counter::SlidingCounter;
pub use token_bucket::TokenBucket;

use std::fmt;
use std::future::Future;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::decision::Decision;
use crate::error::{ConfigError, Result};
use crate::quota::Quota;
use crate::storage::Storage;

/// Rate limiting algorithm trait.
///
/// Implementations must be thread-safe and must propagate every store fault to
/// the caller instead of guessing an outcome.
pub trait Algorithm: Send + Sync + 'static {
    /// Get the algorithm name (for logging/metrics).
    fn name(&self) -> &'static str;

    /// Decide whether the request identified by `key` is admitted, recording
    /// it against the quota when it is.
    fn decide<S: Storage>(
        &self,
        storage: &S,
        key: &str,
        quota: &Quota,
    ) -> impl Future<Output = Result<Decision>> + Send;

    /// Forget all state held for `key`.
    fn reset<S: Storage>(&self, storage: &S, key: &str) -> impl Future<Output = Result<()>> + Send {
        async move { storage.delete(key).await }
    }
}

/// Which strategy to run, as named in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// [`SlidingCounter`]
    SlidingCounter,
    /// [`TokenBucket`]
    TokenBucket,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SlidingCounter => "sliding-counter",
            Self::TokenBucket => "token-bucket",
        })
    }
}

impl FromStr for StrategyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "sliding-counter" | "sliding-window" | "sliding" => Ok(Self::SlidingCounter),
            "token-bucket" | "bucket" => Ok(Self::TokenBucket),
            other => Err(ConfigError::InvalidStrategy(other.to_string())),
        }
    }
}

/// Runtime-selected strategy.
///
/// `Algorithm` has generic methods and cannot be used as a trait object, so the
/// two variants are dispatched through this enum instead.
#[derive(Debug, Clone)]
pub enum Strategy {
    /// Counter with rolling re-expiration.
    SlidingCounter(SlidingCounter),
    /// Token bucket with hard window resets.
    TokenBucket(TokenBucket),
}

impl Strategy {
    /// Build the default-configured strategy of the given kind.
    pub fn from_kind(kind: StrategyKind) -> Self {
        match kind {
            StrategyKind::SlidingCounter => Self::SlidingCounter(SlidingCounter::new()),
            StrategyKind::TokenBucket => Self::TokenBucket(TokenBucket::new()),
        }
    }

    /// Which kind of strategy this is.
    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::SlidingCounter(_) => StrategyKind::SlidingCounter,
            Self::TokenBucket(_) => StrategyKind::TokenBucket,
        }
    }
}

impl From<SlidingCounter> for Strategy {
    fn from(algorithm: SlidingCounter) -> Self {
        Self::SlidingCounter(algorithm)
    }
}

impl From<TokenBucket> for Strategy {
    fn from(algorithm: TokenBucket) -> Self {
        Self::TokenBucket(algorithm)
    }
}

impl Algorithm for Strategy {
    fn name(&self) -> &'static str {
        match self {
            Self::SlidingCounter(a) => a.name(),
            Self::TokenBucket(a) => a.name(),
        }
    }

    async fn decide<S: Storage>(&self, storage: &S, key: &str, quota: &Quota) -> Result<Decision> {
        match self {
            Self::SlidingCounter(a) => a.decide(storage, key, quota).await,
            Self::TokenBucket(a) => a.decide(storage, key, quota).await,
        }
    }

    async fn reset<S: Storage>(&self, storage: &S, key: &str) -> Result<()> {
        match self {
            Self::SlidingCounter(a) => a.reset(storage, key).await,
            Self::TokenBucket(a) => a.reset(storage, key).await,
        }
    }
}
