//! Progress tracking for a running batch.

use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

use crate::types::ResultRecord;

/// Point-in-time view of a run's progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub completed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl ProgressSnapshot {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }

    pub fn is_done(&self) -> bool {
        self.completed >= self.total
    }
}

/// Lock-free completion counters. Cheap to read from any task while the
/// dispatcher is collecting results.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    total: AtomicUsize,
    completed: AtomicUsize,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        let t = Self::default();
        t.total.store(total, Ordering::Relaxed);
        t
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            total: self.total.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn reset(&self, total: usize) {
        self.total.store(total, Ordering::Relaxed);
        self.completed.store(0, Ordering::Relaxed);
        self.succeeded.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
    }

    pub(crate) fn record(&self, result: &ResultRecord) -> ProgressSnapshot {
        if result.is_success() {
            self.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.snapshot()
    }
}

/// Observer notified once per completed request, on the collecting task.
pub trait ProgressSink: Send + Sync {
    fn on_result(&self, progress: &ProgressSnapshot, result: &ResultRecord);
}

#[derive(Debug, Default)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn on_result(&self, _progress: &ProgressSnapshot, _result: &ResultRecord) {}
}

/// Logs a line each time another `percent_step` percent of the batch completes.
#[derive(Debug)]
pub struct LogProgress {
    percent_step: usize,
}

impl LogProgress {
    pub fn new(percent_step: usize) -> Self {
        Self {
            percent_step: percent_step.clamp(1, 100),
        }
    }

    fn crossed_milestone(&self, p: &ProgressSnapshot) -> bool {
        if p.total == 0 || p.is_done() {
            return true;
        }
        let step = self.percent_step;
        let before = p.completed.saturating_sub(1) * 100 / p.total / step;
        let now = p.completed * 100 / p.total / step;
        now > before
    }
}

impl Default for LogProgress {
    fn default() -> Self {
        Self::new(10)
    }
}

impl ProgressSink for LogProgress {
    fn on_result(&self, progress: &ProgressSnapshot, _result: &ResultRecord) {
        if self.crossed_milestone(progress) {
            info!(
                completed = progress.completed,
                total = progress.total,
                failed = progress.failed,
                "processing requests: {:.0}%",
                progress.fraction() * 100.0
            );
        }
    }
}
