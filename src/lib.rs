//! Per-address HTTP admission control.
//!
//! `ipgate` decides whether a client may proceed with a request, based on how
//! many requests it has recently made. All per-client state lives in an external
//! key-value store with expiring keys, so any number of service instances can
//! share one quota.
//!
//! - **Two strategies**: a sliding counter and a token bucket with hard window
//!   resets, selectable at runtime
//! - **Pluggable storage**: Redis with connection pooling, or in-memory with GC
//! - **HTTP surface**: Axum middleware and a ready-made service
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use ipgate::{ClientKey, MemoryStorage, Quota, RateLimiter, TokenBucket};
//!
//! #[tokio::main]
//! async fn main() -> ipgate::Result<()> {
//!     let limiter = RateLimiter::new(
//!         Arc::new(MemoryStorage::new()),
//!         TokenBucket::new(),
//!         Quota::per_seconds(10, 20),
//!     );
//!
//!     let decision = limiter.decide(&ClientKey::new("5.6.7.8")?).await?;
//!     if decision.is_allowed() {
//!         println!("Request allowed! {} remaining", decision.info().remaining);
//!     } else {
//!         println!("Rate limited! Retry after {:?}", decision.info().retry_after);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Algorithms
//!
//! | Algorithm | Window | Stored value |
//! |-----------|--------|--------------|
//! | Sliding Counter | pushed forward by every admitted hit | hit count |
//! | Token Bucket | fixed, starts with the first request | `<tokens>:<window start ms>` |
//!
//! # Feature Flags
//!
//! - `memory` (default): In-memory storage with garbage collection
//! - `redis` (default): Redis storage backend
//! - `axum`: Axum middleware integration
//! - `server` (default): the HTTP service, its configuration and the binary

pub mod algorithm;
pub mod clock;
pub mod decision;
pub mod error;
pub mod key;
pub mod limiter;
pub mod policy;
pub mod quota;
pub mod storage;

#[cfg(feature = "axum")]
pub mod middleware;

#[cfg(feature = "server")]
pub mod config;
#[cfg(feature = "server")]
pub mod server;

// Re-export main types
pub use algorithm::{Algorithm, SlidingCounter, Strategy, StrategyKind, TokenBucket};
pub use clock::{Clock, ManualClock, SystemClock};
pub use decision::{Decision, RateLimitInfo};
pub use error::{ConfigError, RateLimitError, Result, StoreError};
pub use key::{ClientKey, IpKey, Key};
pub use limiter::RateLimiter;
pub use policy::FailurePolicy;
pub use quota::Quota;
pub use storage::Storage;

// Re-export storage types
#[cfg(feature = "memory")]
pub use storage::{GcConfig, GcInterval, MemoryStorage};

#[cfg(feature = "redis")]
pub use storage::{RedisConfig, RedisStorage};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::algorithm::{Algorithm, SlidingCounter, Strategy, StrategyKind, TokenBucket};
    pub use crate::decision::{Decision, RateLimitInfo};
    pub use crate::error::{RateLimitError, Result};
    pub use crate::key::ClientKey;
    pub use crate::limiter::RateLimiter;
    pub use crate::policy::FailurePolicy;
    pub use crate::quota::Quota;
    pub use crate::storage::Storage;

    #[cfg(feature = "memory")]
    pub use crate::storage::{GcConfig, GcInterval, MemoryStorage};
}
