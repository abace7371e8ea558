//! 批处理调度模块：在固定并发上限下执行整批请求。
//!
//! # Batch Dispatch Module
//!
//! Fans a batch of independent requests out to a [`RequestHandler`](crate::executor::RequestHandler)
//! under a fixed concurrency ceiling, and reassembles the results in input order.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`BatchDispatcher`] | Fixed-size worker pool; owns the result store for a run |
//! | [`BatchOutcome`] | Ordered results plus elapsed wall-clock time |
//! | [`ProgressTracker`] | Atomic completed/succeeded/failed counters |
//! | [`ProgressSink`] | Per-completion observer ([`LogProgress`], [`NoopProgress`]) |
//!
//! ## Guarantees
//!
//! - Exactly one result per input record, whatever happens to the request.
//! - Results come back sorted by `index`, independent of completion order.
//! - One request failing never cancels its siblings.
//!
//! ## Scaling
//!
//! All records are queued immediately and every result is held until the run
//! ends, so memory is O(N). That is fine for batches in the thousands; much
//! larger inputs should be split into several runs.
//!
//! ## Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use batch_infer::batch::BatchDispatcher;
//! use batch_infer::executor::RequestHandler;
//! use batch_infer::types::{RequestRecord, ResultRecord};
//! use std::sync::Arc;
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl RequestHandler for Echo {
//!     async fn handle(&self, r: &RequestRecord) -> ResultRecord {
//!         ResultRecord::success(r, Some(r.prompt.clone()), None, None)
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let dispatcher = BatchDispatcher::new(Arc::new(Echo)).with_concurrency(4);
//! let records = (0..8).map(|i| RequestRecord::new(i, format!("prompt {i}"))).collect();
//! let outcome = dispatcher.run(records).await;
//! assert_eq!(outcome.results.len(), 8);
//! assert_eq!(outcome.stats().successful_requests, 8);
//! # });
//! ```

mod dispatcher;
mod progress;

pub use dispatcher::{BatchDispatcher, BatchOutcome};
pub use progress::{LogProgress, NoopProgress, ProgressSink, ProgressSnapshot, ProgressTracker};
