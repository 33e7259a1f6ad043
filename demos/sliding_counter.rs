//! Sliding counter rate limiting example.
//!
//! Run with:
//! ```
//! cargo run --example sliding_counter --features memory
//! ```

use ipgate::{Algorithm, ManualClock, MemoryStorage, Quota, SlidingCounter};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A manual clock lets the demo skip ahead instead of sleeping
    let clock = ManualClock::new(0);
    let storage = MemoryStorage::with_clock(clock.clone());
    let algorithm = SlidingCounter::new();

    // 5 requests, window pushed forward 10 seconds by every admitted hit
    let quota = Quota::per_seconds(5, 10);

    println!("=== Sliding Counter Demo ===\n");
    println!("Quota: 5 requests, 10 second sliding window\n");

    for i in 1..=8 {
        let decision = algorithm.decide(&storage, "1.2.3.4", &quota).await?;
        if decision.is_allowed() {
            println!("Request {}: ✅ Allowed (remaining: {})", i, decision.info().remaining);
        } else {
            println!("Request {}: ❌ Denied", i);
        }
    }

    println!("\n--- 6 seconds later: denied hits did not extend the window ---\n");
    clock.advance(Duration::from_secs(6));
    let decision = algorithm.decide(&storage, "1.2.3.4", &quota).await?;
    println!("Still limited: {}", decision.is_denied());

    println!("\n--- 10 seconds after the last admitted hit ---\n");
    clock.advance(Duration::from_secs(4));
    let decision = algorithm.decide(&storage, "1.2.3.4", &quota).await?;
    println!(
        "Request after quiet period: {} (counter: {:?})",
        if decision.is_allowed() { "✅ Allowed" } else { "❌ Denied" },
        ipgate::Storage::get(&storage, "1.2.3.4").await?
    );

    Ok(())
}
