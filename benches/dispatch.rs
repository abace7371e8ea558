//! Benchmarks for batch dispatch overhead
//!
//! This benchmark measures:
//! - Queueing, worker hand-off and index reassembly with a no-op handler
//! - Provider request building for a text prompt

use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;
use std::sync::Arc;

use batch_infer::batch::BatchDispatcher;
use batch_infer::config::GenerationConfig;
use batch_infer::drivers::{GeminiDriver, OpenAiDriver, ProviderDriver};
use batch_infer::executor::RequestHandler;
use batch_infer::types::{RequestRecord, ResultRecord};

struct Noop;

#[async_trait]
impl RequestHandler for Noop {
    async fn handle(&self, record: &RequestRecord) -> ResultRecord {
        ResultRecord::success(record, Some(String::new()), None, None)
    }
}

fn records(n: usize) -> Vec<RequestRecord> {
    (0..n)
        .map(|i| RequestRecord::new(i, format!("prompt {i}")).with_field("doc", i))
        .collect()
}

fn bench_dispatch(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("dispatch");
    let n = 1000;
    group.throughput(Throughput::Elements(n as u64));

    for concurrency in [1usize, 10, 64] {
        let dispatcher = BatchDispatcher::new(Arc::new(Noop)).with_concurrency(concurrency);
        group.bench_with_input(
            BenchmarkId::new("noop_handler", concurrency),
            &concurrency,
            |b, _| {
                b.to_async(&rt)
                    .iter(|| async { black_box(dispatcher.run(records(n)).await) });
            },
        );
    }
    group.finish();
}

fn bench_build_request(c: &mut Criterion) {
    let mut generation = GenerationConfig::new();
    generation.insert("temperature".into(), json!(0.6));
    generation.insert("max_tokens".into(), json!(4096));

    let openai = OpenAiDriver::new("http://localhost:8000/v1/chat/completions".parse().unwrap())
        .with_model("Qwen/Qwen3-8B");
    let gemini = GeminiDriver::new(
        "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
            .parse()
            .unwrap(),
    );
    let prompt = "Extract all (subject, relation, object) triplets from the abstract below.";

    c.bench_function("build_request/openai", |b| {
        b.iter(|| black_box(openai.build_request(black_box(prompt), None, &generation)))
    });
    c.bench_function("build_request/gemini", |b| {
        b.iter(|| black_box(gemini.build_request(black_box(prompt), None, &generation)))
    });
}

criterion_group!(benches, bench_dispatch, bench_build_request);
criterion_main!(benches);
