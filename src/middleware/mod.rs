//! Axum middleware for rate limiting.
//!
//! Provides a Tower-compatible layer that admits or rejects requests by source
//! address before they reach the wrapped handler.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use axum::{Router, routing::post};
//! use ipgate::{
//!     middleware::RateLimitLayer,
//!     MemoryStorage, Quota, RateLimiter, SlidingCounter,
//! };
//!
//! let limiter = RateLimiter::new(
//!     Arc::new(MemoryStorage::new()),
//!     SlidingCounter::new(),
//!     Quota::per_seconds(10, 10),
//! );
//!
//! let app = Router::new()
//!     .route("/", post(handler).layer(RateLimitLayer::new(limiter)));
//! ```

mod layer;

pub use layer::{AxumRequest, RateLimitLayer, RateLimitService};
