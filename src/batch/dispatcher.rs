//! Batch dispatcher.

use futures::FutureExt;
use std::any::Any;
use std::collections::{BTreeMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::progress::{NoopProgress, ProgressSink, ProgressTracker};
use crate::config::DEFAULT_CONCURRENCY;
use crate::executor::RequestHandler;
use crate::types::{BatchStats, RequestRecord, ResultRecord};

/// Results of one run, in ascending index order.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub results: Vec<ResultRecord>,
    pub elapsed: Duration,
}

impl BatchOutcome {
    pub fn stats(&self) -> BatchStats {
        BatchStats::from_results(&self.results, self.elapsed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ResultRecord> {
        self.results.iter().filter(|r| !r.is_success())
    }
}

/// Runs every request through a fixed pool of worker tasks.
///
/// All records are queued up front; at most `concurrency` handler calls are in
/// flight at once. Workers push results over a channel to the dispatcher task,
/// which alone owns the index-keyed result store. A failing or panicking
/// request only affects its own result.
pub struct BatchDispatcher {
    handler: Arc<dyn RequestHandler>,
    concurrency: usize,
    sink: Arc<dyn ProgressSink>,
    tracker: Arc<ProgressTracker>,
}

impl BatchDispatcher {
    pub fn new(handler: Arc<dyn RequestHandler>) -> Self {
        Self {
            handler,
            concurrency: DEFAULT_CONCURRENCY,
            sink: Arc::new(NoopProgress),
            tracker: Arc::new(ProgressTracker::default()),
        }
    }

    /// Worker pool size; clamped to at least 1.
    pub fn with_concurrency(mut self, c: usize) -> Self {
        self.concurrency = c.max(1);
        self
    }

    pub fn with_progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Shared progress counters, reset at the start of every run.
    pub fn progress(&self) -> Arc<ProgressTracker> {
        Arc::clone(&self.tracker)
    }

    pub async fn run(&self, records: Vec<RequestRecord>) -> BatchOutcome {
        let total = records.len();
        self.tracker.reset(total);
        let start = Instant::now();
        if total == 0 {
            return BatchOutcome {
                results: Vec::new(),
                elapsed: start.elapsed(),
            };
        }

        let workers = self.concurrency.min(total);
        info!(total, workers, "dispatching batch");

        let queue = Arc::new(Mutex::new(VecDeque::from(records)));
        let (tx, mut rx) = mpsc::unbounded_channel::<ResultRecord>();
        let mut pool = JoinSet::new();

        for worker_id in 0..workers {
            let queue = Arc::clone(&queue);
            let tx = tx.clone();
            let handler = Arc::clone(&self.handler);
            pool.spawn(async move {
                loop {
                    let Some(record) = pop_next(&queue) else { break };

                    let result = match AssertUnwindSafe(handler.handle(&record))
                        .catch_unwind()
                        .await
                    {
                        Ok(result) => result,
                        Err(panic) => {
                            let msg = panic_message(panic.as_ref());
                            error!(index = record.index, worker_id, "request handler panicked: {}", msg);
                            ResultRecord::failure(&record, format!("handler panicked: {}", msg))
                        }
                    };
                    if tx.send(result).is_err() {
                        break;
                    }
                }
                debug!(worker_id, "worker finished");
            });
        }
        drop(tx);

        let mut store: BTreeMap<usize, ResultRecord> = BTreeMap::new();
        while let Some(result) = rx.recv().await {
            let snapshot = self.tracker.record(&result);
            self.sink.on_result(&snapshot, &result);
            if let Some(prev) = store.insert(result.index, result) {
                warn!(index = prev.index, "duplicate request index; earlier result replaced");
            }
        }

        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "worker task aborted");
            }
        }

        let elapsed = start.elapsed();
        if store.len() != total {
            error!(expected = total, collected = store.len(), "result count mismatch");
        }
        info!(
            total,
            elapsed_secs = elapsed.as_secs_f64(),
            "batch complete"
        );

        BatchOutcome {
            results: store.into_values().collect(),
            elapsed,
        }
    }
}

fn pop_next(queue: &Mutex<VecDeque<RequestRecord>>) -> Option<RequestRecord> {
    match queue.lock() {
        Ok(mut q) => q.pop_front(),
        Err(poisoned) => poisoned.into_inner().pop_front(),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
