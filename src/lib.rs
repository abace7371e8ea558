//! # batch-infer
//!
//! 批量推理执行器：在有限并发下把大量独立的文本生成请求发送到远程模型服务，并按输入顺序汇总结果。
//!
//! Bounded-concurrency batch inference executor for remote model-serving endpoints.
//!
//! ## Overview
//!
//! A batch is a list of independent text-generation requests, read from a JSONL
//! file. Every request is sent to an OpenAI-style chat-completions server or to
//! the Gemini `generateContent` API by a fixed pool of workers. Failures stay
//! contained to the request that caused them, and the results are written back
//! in input order together with aggregate throughput statistics.
//!
//! ## Pipeline
//!
//! ```text
//! JSONL ─▶ dataset::read_requests ─▶ batch::BatchDispatcher ─▶ dataset::write_results
//!                                        │  (C workers)               dataset::write_stats
//!                                        ▼
//!                             executor::RequestExecutor
//!                          drivers::ProviderDriver + transport
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use batch_infer::runner::BatchRunner;
//!
//! #[tokio::main]
//! async fn main() -> batch_infer::Result<()> {
//!     let runner = BatchRunner::from_config_path("configs/qwen3.yaml")?;
//!     let report = runner
//!         .run("data/prompts.jsonl", "data/responses.jsonl", None)
//!         .await?;
//!     println!("{} / {} succeeded", report.stats.successful_requests, report.stats.total_requests);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`types`] | Request/result records and batch statistics |
//! | [`drivers`] | Provider adapters (OpenAI-style, Gemini) |
//! | [`transport`] | HTTP transport with per-request timeout |
//! | [`executor`] | Single-request execution and retry policy |
//! | [`batch`] | Worker-pool dispatcher and progress tracking |
//! | [`dataset`] | JSONL input reader, result and stats writers |
//! | [`config`] | YAML runner configuration |
//! | [`runner`] | End-to-end batch runs |
//! | [`structured`] | Lenient JSON extraction from responses |

pub mod batch;
pub mod config;
pub mod dataset;
pub mod drivers;
pub mod executor;
pub mod runner;
pub mod structured;
pub mod transport;
pub mod types;

pub use batch::{BatchDispatcher, BatchOutcome};
pub use config::{ProviderKind, RunnerConfig};
pub use executor::{RequestExecutor, RequestHandler, RetryPolicy};
pub use runner::{BatchRunner, RunReport};
pub use types::{BatchStats, RequestRecord, ResultRecord};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the library
pub mod error;
pub use error::{Error, ErrorContext, RequestError};
