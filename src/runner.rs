//! End-to-end batch run: config → input → dispatch → results + stats.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::batch::{BatchDispatcher, LogProgress, ProgressSink};
use crate::config::RunnerConfig;
use crate::dataset::{read_requests, stats_path_for, write_results, write_stats};
use crate::drivers::create_driver;
use crate::executor::RequestExecutor;
use crate::transport::HttpTransport;
use crate::types::BatchStats;
use crate::Result;

/// Failures listed in the end-of-run log.
const FAILURES_TO_LOG: usize = 5;

/// Where a run's output went, and how it did.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub stats: BatchStats,
    pub results_file: PathBuf,
    pub stats_file: PathBuf,
}

pub struct BatchRunner {
    config: RunnerConfig,
    sink: Arc<dyn ProgressSink>,
}

impl BatchRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            sink: Arc::new(LogProgress::default()),
        }
    }

    pub fn from_config_path(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(RunnerConfig::from_path(path)?))
    }

    pub fn with_progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Run one batch. `stats_file` defaults to `<input-stem>_stats.json` next
    /// to the input.
    ///
    /// Only configuration, input and output-file problems are returned as
    /// errors; individual request failures end up in the results file.
    pub async fn run(
        &self,
        input_file: impl AsRef<Path>,
        results_file: impl AsRef<Path>,
        stats_file: Option<PathBuf>,
    ) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!("batch_run", %run_id);
        self.run_inner(
            run_id,
            input_file.as_ref(),
            results_file.as_ref(),
            stats_file,
        )
        .instrument(span)
        .await
    }

    async fn run_inner(
        &self,
        run_id: Uuid,
        input_file: &Path,
        results_file: &Path,
        stats_file: Option<PathBuf>,
    ) -> Result<RunReport> {
        let endpoint = self.config.resolve_endpoint()?;
        let records = read_requests(input_file)?;

        let driver = create_driver(&endpoint);
        let model = driver.model().map(String::from);
        let transport = HttpTransport::new(endpoint.timeout)?;
        let executor = RequestExecutor::new(driver, transport, self.config.generation.clone())
            .with_retry_policy(self.config.retry_policy());

        let concurrency = self.config.concurrent_requests;
        info!(
            provider = %endpoint.provider,
            model = model.as_deref().unwrap_or("-"),
            requests = records.len(),
            "starting inference with {} concurrent workers",
            concurrency
        );

        let dispatcher = BatchDispatcher::new(Arc::new(executor))
            .with_concurrency(concurrency)
            .with_progress_sink(Arc::clone(&self.sink));
        let outcome = dispatcher.run(records).await;

        write_results(results_file, &outcome.results)?;

        let mut stats = outcome.stats();
        if let Some(m) = model {
            stats = stats.with_model(m);
        }
        let stats_file = stats_file.unwrap_or_else(|| stats_path_for(input_file));
        write_stats(&stats_file, &stats)?;

        info!(
            stats_file = %stats_file.display(),
            successful = stats.successful_requests,
            failed = stats.failed_requests,
            "throughput: {:.2} requests/second",
            stats.throughput
        );
        if stats.failed_requests > 0 {
            warn!(
                "encountered {} failed requests; first {}:",
                stats.failed_requests,
                FAILURES_TO_LOG.min(stats.failed_requests)
            );
            for r in outcome.failures().take(FAILURES_TO_LOG) {
                warn!(
                    "ID {}: {}",
                    r.index,
                    r.error.as_deref().unwrap_or("empty response")
                );
            }
        }

        Ok(RunReport {
            run_id,
            stats,
            results_file: results_file.to_path_buf(),
            stats_file,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_credentials_fail_before_reading_input() {
        let config = RunnerConfig::from_yaml_str("provider: openai\n").unwrap();
        let runner = BatchRunner::new(config);
        let err = runner
            .run("/no/input.jsonl", "/tmp/never-written.jsonl", None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("endpoint_host"));
    }

    #[tokio::test]
    async fn test_unreadable_input_is_fatal() {
        let config =
            RunnerConfig::from_yaml_str("endpoint_host: localhost\nendpoint_port: 9\n").unwrap();
        let runner = BatchRunner::new(config);
        let result = runner
            .run("/no/input.jsonl", "/tmp/never-written.jsonl", None)
            .await;
        tokio_test::assert_err!(result);
    }
}
