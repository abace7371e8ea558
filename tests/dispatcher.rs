//! Dispatcher behaviour under a scripted handler: ordering, isolation,
//! the concurrency ceiling and aggregate statistics.

use async_trait::async_trait;
use batch_infer::batch::{BatchDispatcher, ProgressSink, ProgressSnapshot};
use batch_infer::executor::RequestHandler;
use batch_infer::types::{RequestRecord, ResultRecord};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Sleeps a per-index amount, fails the indices in `fail`, panics on `panic`,
/// and records the in-flight high-water mark.
struct Scripted {
    fail: HashSet<usize>,
    panic: HashSet<usize>,
    delay_ms: fn(usize) -> u64,
    in_flight: AtomicUsize,
    high_water: AtomicUsize,
    calls: AtomicUsize,
}

fn no_delay(_: usize) -> u64 {
    0
}

impl Scripted {
    fn new() -> Self {
        Self {
            fail: HashSet::new(),
            panic: HashSet::new(),
            delay_ms: no_delay,
            in_flight: AtomicUsize::new(0),
            high_water: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RequestHandler for Scripted {
    async fn handle(&self, record: &RequestRecord) -> ResultRecord {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.high_water.fetch_max(now, Ordering::SeqCst);

        let delay = (self.delay_ms)(record.index);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        } else {
            tokio::task::yield_now().await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.panic.contains(&record.index) {
            panic!("scripted panic at {}", record.index);
        }
        if self.fail.contains(&record.index) {
            return ResultRecord::failure(record, format!("HTTP 500: boom {}", record.index));
        }
        ResultRecord::success(
            record,
            Some(format!("answer to {}", record.prompt)),
            None,
            Some("stop".into()),
        )
    }
}

fn records(n: usize) -> Vec<RequestRecord> {
    (0..n)
        .map(|i| RequestRecord::new(i, format!("q{i}")).with_field("doc_id", format!("doc-{i}")))
        .collect()
}

#[tokio::test]
async fn test_one_result_per_record_in_input_order() {
    let mut handler = Scripted::new();
    // Later indices finish first.
    handler.delay_ms = |i| 40 - (i as u64 % 20) * 2;
    let handler = Arc::new(handler);

    let dispatcher = BatchDispatcher::new(handler.clone()).with_concurrency(8);
    let outcome = dispatcher.run(records(40)).await;

    assert_eq!(outcome.results.len(), 40);
    assert_eq!(handler.calls.load(Ordering::SeqCst), 40);
    for (pos, r) in outcome.results.iter().enumerate() {
        assert_eq!(r.index, pos);
        assert_eq!(r.response.as_deref(), Some(format!("answer to q{pos}").as_str()));
        assert_eq!(r.passthrough["doc_id"], format!("doc-{pos}"));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrency_ceiling_is_respected() {
    let mut handler = Scripted::new();
    handler.delay_ms = |_| 10;
    let handler = Arc::new(handler);

    let dispatcher = BatchDispatcher::new(handler.clone()).with_concurrency(3);
    let outcome = dispatcher.run(records(30)).await;

    assert_eq!(outcome.results.len(), 30);
    let peak = handler.high_water.load(Ordering::SeqCst);
    assert!(peak <= 3, "peak in-flight was {peak}");
    assert!(peak >= 2, "workers never overlapped");
}

#[tokio::test]
async fn test_failures_do_not_cancel_siblings() {
    let mut handler = Scripted::new();
    handler.fail = [2, 5, 7].into_iter().collect();
    let dispatcher = BatchDispatcher::new(Arc::new(handler)).with_concurrency(4);

    let outcome = dispatcher.run(records(10)).await;
    let stats = outcome.stats();

    assert_eq!(stats.total_requests, 10);
    assert_eq!(stats.successful_requests, 7);
    assert_eq!(stats.failed_requests, 3);
    assert_eq!(stats.failed_request_ids, vec![2, 5, 7]);
    assert!(stats.elapsed_time > 0.0);
    let expected = 7.0 / stats.elapsed_time;
    assert!((stats.throughput - expected).abs() < 1e-9);

    let failed: Vec<_> = outcome.failures().map(|r| r.index).collect();
    assert_eq!(failed, vec![2, 5, 7]);
    assert_eq!(outcome.results[5].error.as_deref(), Some("HTTP 500: boom 5"));
    assert_eq!(outcome.results[5].passthrough["doc_id"], "doc-5");
}

#[tokio::test]
async fn test_panicking_request_becomes_error_record() {
    let mut handler = Scripted::new();
    handler.panic = [1].into_iter().collect();
    let dispatcher = BatchDispatcher::new(Arc::new(handler)).with_concurrency(2);

    let outcome = dispatcher.run(records(4)).await;

    assert_eq!(outcome.results.len(), 4);
    let r = &outcome.results[1];
    assert!(r.response.is_none());
    assert!(r.error.as_deref().unwrap().contains("scripted panic at 1"));
    assert!(outcome.results[3].is_success());
}

#[tokio::test]
async fn test_single_worker_runs_everything() {
    let handler = Arc::new(Scripted::new());
    let dispatcher = BatchDispatcher::new(handler.clone()).with_concurrency(1);
    let outcome = dispatcher.run(records(5)).await;
    assert_eq!(outcome.results.len(), 5);
    assert_eq!(handler.high_water.load(Ordering::SeqCst), 1);
}

#[derive(Default)]
struct Recording {
    seen: Mutex<Vec<ProgressSnapshot>>,
}

impl ProgressSink for Recording {
    fn on_result(&self, progress: &ProgressSnapshot, _result: &ResultRecord) {
        self.seen.lock().unwrap().push(*progress);
    }
}

#[tokio::test]
async fn test_progress_sink_sees_every_completion() {
    let mut handler = Scripted::new();
    handler.fail = [0].into_iter().collect();
    let sink = Arc::new(Recording::default());
    let dispatcher = BatchDispatcher::new(Arc::new(handler))
        .with_concurrency(3)
        .with_progress_sink(sink.clone());

    dispatcher.run(records(6)).await;

    let seen = sink.seen.lock().unwrap();
    assert_eq!(seen.len(), 6);
    let completed: Vec<_> = seen.iter().map(|s| s.completed).collect();
    assert_eq!(completed, vec![1, 2, 3, 4, 5, 6]);
    let last = seen.last().unwrap();
    assert_eq!((last.succeeded, last.failed), (5, 1));
    assert!(last.is_done());

    let tracked = dispatcher.progress().snapshot();
    assert_eq!(tracked, *last);
}
