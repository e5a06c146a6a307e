//! Benchmarks for cache key derivation and the cache hit path
//!
//! This benchmark measures:
//! - Message key digest over growing conversations
//! - Tool key canonicalization for flat and nested arguments
//! - A warm `get_or_compute` lookup against the in-memory store

use ai_lib_layers::cache::{CacheKeyGenerator, CacheManager};
use ai_lib_layers::{CallContext, Turn};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;

fn conversation(turns: usize) -> Vec<Turn> {
    (0..turns)
        .map(|i| {
            if i % 2 == 0 {
                Turn::user(format!("question number {} about the speed of light", i))
            } else {
                Turn::model(format!("answer number {}", i))
            }
        })
        .collect()
}

fn bench_message_key(c: &mut Criterion) {
    let keys = CacheKeyGenerator::new();
    let mut group = c.benchmark_group("message_key");
    for turns in [1usize, 16, 256] {
        let history = conversation(turns);
        group.bench_with_input(BenchmarkId::from_parameter(turns), &history, |b, h| {
            b.iter(|| keys.message_key(black_box(h)))
        });
    }
    group.finish();
}

fn bench_tool_key(c: &mut Criterion) {
    let keys = CacheKeyGenerator::new();
    let flat = json!({"symbol": "GOOGL"});
    let nested = json!({
        "query": {"city": "London", "units": "metric", "days": [1, 2, 3]},
        "options": {"lang": "en", "detail": {"hourly": true, "alerts": false}},
        "limit": 10
    });

    let mut group = c.benchmark_group("tool_key");
    group.bench_function("flat", |b| {
        b.iter(|| keys.tool_key("get_stock_price", black_box(&flat)))
    });
    group.bench_function("nested", |b| {
        b.iter(|| keys.tool_key("get_weather", black_box(&nested)))
    });
    group.finish();
}

fn bench_warm_lookup(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("tokio runtime");
    let cache = CacheManager::in_memory();
    let ctx = CallContext::new();
    let key = cache.keys().message_key(&conversation(1));
    rt.block_on(async {
        cache
            .get_or_compute(&ctx, &key, || async { Ok("cached".to_string()) })
            .await
            .expect("warm cache");
    });

    c.bench_function("get_or_compute_hit", |b| {
        b.to_async(&rt).iter(|| async {
            cache
                .get_or_compute(&ctx, &key, || async { Ok("recomputed".to_string()) })
                .await
        })
    });
}

criterion_group!(benches, bench_message_key, bench_tool_key, bench_warm_lookup);
criterion_main!(benches);
