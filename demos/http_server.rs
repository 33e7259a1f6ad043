//! Rate-limited HTTP service on an in-memory store.
//!
//! Run with:
//! ```
//! cargo run --example http_server --features memory,server
//! ```
//!
//! Then:
//! ```
//! curl localhost:3000
//! for i in $(seq 12); do curl -s -X POST localhost:3000; echo; done
//! ```

use std::sync::Arc;

use ipgate::middleware::RateLimitLayer;
use ipgate::{FailurePolicy, MemoryStorage, Quota, RateLimiter, SlidingCounter, server};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ipgate=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let limiter = RateLimiter::new(
        Arc::new(MemoryStorage::new()),
        SlidingCounter::new(),
        Quota::per_seconds(10, 10),
    )
    .with_timeout(std::time::Duration::from_secs(1));

    let layer = RateLimitLayer::new(limiter).with_failure_policy(FailurePolicy::Error);
    let listener = TcpListener::bind("127.0.0.1:3000").await?;

    server::serve(listener, server::router(layer)).await?;
    Ok(())
}
