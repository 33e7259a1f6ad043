//! Benchmarks for rate limiting algorithms.

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use ipgate::{
    algorithm::{Algorithm, SlidingCounter, TokenBucket},
    storage::MemoryStorage,
    ClientKey, Quota, RateLimiter,
};
use tokio::runtime::Runtime;

fn bench_algorithms(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let quota = Quota::per_seconds(1_000_000, 20);

    let mut group = c.benchmark_group("algorithms");

    // Sliding Counter
    group.bench_function("sliding_counter", |b| {
        let storage = MemoryStorage::new();
        let algorithm = SlidingCounter::new();
        let mut i = 0u64;
        b.iter(|| {
            i += 1;
            let key = format!("sliding:{}", i % 100);
            rt.block_on(async { black_box(algorithm.decide(&storage, &key, &quota).await) })
        })
    });

    // Token Bucket
    group.bench_function("token_bucket", |b| {
        let storage = MemoryStorage::new();
        let algorithm = TokenBucket::new();
        let mut i = 0u64;
        b.iter(|| {
            i += 1;
            let key = format!("token:{}", i % 100);
            rt.block_on(async { black_box(algorithm.decide(&storage, &key, &quota).await) })
        })
    });

    // Denials take the read-only path
    group.bench_function("token_bucket_denied", |b| {
        let storage = MemoryStorage::new();
        let algorithm = TokenBucket::new();
        let small = Quota::per_seconds(1, 3600);
        rt.block_on(async { algorithm.decide(&storage, "exhausted", &small).await.unwrap() });
        b.iter(|| rt.block_on(async { black_box(algorithm.decide(&storage, "exhausted", &small).await) }))
    });

    group.finish();
}

fn bench_key_scaling(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let quota = Quota::per_seconds(1_000_000, 20);

    let mut group = c.benchmark_group("key_scaling");

    for num_keys in [10u64, 1_000, 100_000].iter() {
        group.bench_with_input(BenchmarkId::new("token_bucket", num_keys), num_keys, |b, &num_keys| {
            let storage = MemoryStorage::new();
            let algorithm = TokenBucket::new();
            let mut i = 0u64;
            b.iter(|| {
                i += 1;
                let key = format!("scale:{}", i % num_keys);
                rt.block_on(async { black_box(algorithm.decide(&storage, &key, &quota).await) })
            })
        });
    }

    group.finish();
}

fn bench_limiter(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let quota = Quota::per_seconds(1_000_000, 20);

    let mut group = c.benchmark_group("limiter");

    let direct = RateLimiter::new(Arc::new(MemoryStorage::new()), TokenBucket::new(), quota);
    let client = ClientKey::new("1.2.3.4").unwrap();
    group.bench_function("direct", |b| {
        b.iter(|| rt.block_on(async { black_box(direct.decide(&client).await) }))
    });

    // Each decision runs on a spawned task under a timeout
    let bounded = RateLimiter::new(Arc::new(MemoryStorage::new()), TokenBucket::new(), quota)
        .with_timeout(std::time::Duration::from_secs(1));
    group.bench_function("with_timeout", |b| {
        b.iter(|| rt.block_on(async { black_box(bounded.decide(&client).await) }))
    });

    group.finish();
}

criterion_group!(benches, bench_algorithms, bench_key_scaling, bench_limiter);
criterion_main!(benches);
