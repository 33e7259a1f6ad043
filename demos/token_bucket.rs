//! Token bucket rate limiting example.
//!
//! Run with:
//! ```
//! cargo run --example token_bucket --features memory
//! ```

use std::sync::Arc;
use std::time::Duration;

use ipgate::{ClientKey, ManualClock, MemoryStorage, Quota, RateLimiter, Storage, TokenBucket};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let clock = ManualClock::new(ipgate::clock::current_timestamp_ms());
    let storage = Arc::new(MemoryStorage::with_clock(clock.clone()));
    let limiter = RateLimiter::new(
        Arc::clone(&storage),
        TokenBucket::new().with_clock(clock.clone()),
        Quota::per_seconds(10, 20),
    );
    let client = ClientKey::new("5.6.7.8")?;

    println!("=== Token Bucket Demo ===\n");
    println!("Quota: 10 tokens, refilled every 20 seconds\n");

    for i in 1..=12 {
        let decision = limiter.decide(&client).await?;
        if decision.is_allowed() {
            println!("Request {}: ✅ Allowed (tokens left: {})", i, decision.info().remaining);
        } else {
            println!(
                "Request {}: ❌ Denied (retry after: {:?})",
                i,
                decision.info().retry_after
            );
        }
    }

    println!("\nStored bucket (tokens:window start): {:?}", storage.get("5.6.7.8").await?);

    println!("\n--- 20 seconds later: still inside the window ---\n");
    clock.advance(Duration::from_secs(20));
    println!("Allowed: {}", limiter.decide(&client).await?.is_allowed());

    println!("\n--- one more millisecond: full refill ---\n");
    clock.advance(Duration::from_millis(1));
    let decision = limiter.decide(&client).await?;
    println!(
        "Allowed: {} (tokens left: {})",
        decision.is_allowed(),
        decision.info().remaining
    );

    Ok(())
}
