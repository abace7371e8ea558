//! Aggregate statistics for one batch run.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::record::ResultRecord;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchStats {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub total_requests: usize,
    pub successful_requests: usize,
    pub failed_requests: usize,
    /// Indices of every result without a response, ascending.
    pub failed_request_ids: Vec<usize>,
    /// Wall-clock seconds.
    pub elapsed_time: f64,
    /// Successful requests per second.
    pub throughput: f64,
}

impl BatchStats {
    pub fn from_results(results: &[ResultRecord], elapsed: Duration) -> Self {
        let mut failed_request_ids: Vec<usize> = results
            .iter()
            .filter(|r| !r.is_success())
            .map(|r| r.index)
            .collect();
        failed_request_ids.sort_unstable();

        let total_requests = results.len();
        let successful_requests = total_requests - failed_request_ids.len();
        let elapsed_time = elapsed.as_secs_f64();
        let throughput = if elapsed_time > 0.0 {
            successful_requests as f64 / elapsed_time
        } else {
            0.0
        };

        Self {
            model: None,
            total_requests,
            successful_requests,
            failed_requests: failed_request_ids.len(),
            failed_request_ids,
            elapsed_time,
            throughput,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.successful_requests as f64 / self.total_requests as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RequestRecord;

    fn results(n: usize, failing: &[usize]) -> Vec<ResultRecord> {
        (0..n)
            .map(|i| {
                let rec = RequestRecord::new(i, format!("p{i}"));
                if failing.contains(&i) {
                    ResultRecord::failure(&rec, "boom")
                } else {
                    ResultRecord::success(&rec, Some("ok".into()), None, None)
                }
            })
            .collect()
    }

    #[test]
    fn test_counts_and_throughput() {
        let stats = BatchStats::from_results(&results(10, &[7, 2, 5]), Duration::from_secs(2));
        assert_eq!(stats.total_requests, 10);
        assert_eq!(stats.successful_requests, 7);
        assert_eq!(stats.failed_requests, 3);
        assert_eq!(stats.failed_request_ids, vec![2, 5, 7]);
        assert!((stats.throughput - 3.5).abs() < f64::EPSILON);
        assert!((stats.success_rate() - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_zero_elapsed_gives_zero_throughput() {
        let stats = BatchStats::from_results(&results(3, &[]), Duration::ZERO);
        assert_eq!(stats.throughput, 0.0);
    }

    #[test]
    fn test_null_response_without_error_counts_as_failed() {
        let rec = RequestRecord::new(0, "p");
        let res = vec![ResultRecord::success(&rec, None, None, Some("STOP".into()))];
        let stats = BatchStats::from_results(&res, Duration::from_secs(1));
        assert_eq!(stats.failed_request_ids, vec![0]);
    }

    #[test]
    fn test_json_field_names() {
        let stats = BatchStats::from_results(&results(1, &[]), Duration::from_secs(1))
            .with_model("gemini-2.0-flash");
        let v = serde_json::to_value(&stats).unwrap();
        for key in [
            "model",
            "total_requests",
            "successful_requests",
            "failed_requests",
            "failed_request_ids",
            "elapsed_time",
            "throughput",
        ] {
            assert!(v.get(key).is_some(), "missing {key}");
        }
    }
}
