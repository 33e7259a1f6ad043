use std::sync::Arc;

use clap::Parser;
use ipgate::config::{Config, StoreKind};
use ipgate::key::IpKey;
use ipgate::middleware::RateLimitLayer;
use ipgate::storage::{MemoryStorage, RedisConfig, RedisStorage, Storage};
use ipgate::{RateLimiter, Strategy, server};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ipgate=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::parse();
    config.validate()?;

    tracing::info!(
        strategy = %config.strategy,
        store = %config.store,
        on_store_error = %config.on_store_error,
        "ipgate starting"
    );

    match config.store {
        StoreKind::Redis => {
            let redis = RedisConfig::new(config.redis_url.clone()).with_prefix(config.redis_prefix.clone());
            run(&config, RedisStorage::new(redis).await?).await
        }
        StoreKind::Memory => run(&config, MemoryStorage::new()).await,
    }
}

async fn run<S: Storage>(config: &Config, storage: S) -> Result<(), Box<dyn std::error::Error>> {
    let quota = config.quota()?;
    let mut limiter = RateLimiter::new(Arc::new(storage), Strategy::from_kind(config.strategy), quota)
        .with_namespace(config.namespace.clone());
    if let Some(timeout) = config.store_timeout() {
        limiter = limiter.with_timeout(timeout);
    }

    tracing::info!(
        limit = quota.limit(),
        window_secs = quota.window().as_secs(),
        "quota configured"
    );

    let key = if config.trust_forwarded_for {
        IpKey::with_forwarded_for()
    } else {
        IpKey::new()
    };
    let layer = RateLimitLayer::new(limiter)
        .with_key(key)
        .with_failure_policy(config.on_store_error);

    let listener = TcpListener::bind(config.bind_addr()).await?;
    server::serve(listener, server::router(layer)).await?;
    Ok(())
}
