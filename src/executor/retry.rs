//! Retry policy for the request executor.
//!
//! The default is a single attempt. Raising `max_attempts` retries only the
//! errors [`RequestError::is_retryable`] classifies as transient.

use std::time::Duration;

use crate::error::RequestError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    min_delay: Duration,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::single_attempt()
    }
}

impl RetryPolicy {
    /// `max_attempts` counts the first call; zero is treated as one.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            min_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }

    pub fn single_attempt() -> Self {
        Self::new(1)
    }

    pub fn with_min_delay(mut self, d: Duration) -> Self {
        self.min_delay = d;
        self
    }

    pub fn with_max_delay(mut self, d: Duration) -> Self {
        self.max_delay = d;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the next attempt, or `None` to give up.
    ///
    /// `attempt` is 0-based (first failure => attempt=0).
    pub fn next_delay(&self, attempt: u32, err: &RequestError) -> Option<Duration> {
        if attempt + 1 >= self.max_attempts || !err.is_retryable() {
            return None;
        }
        Some(self.backoff(attempt))
    }

    // min_delay * 2^attempt, capped at max_delay
    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.min_delay.as_millis() as u64;
        let cap = self.max_delay.as_millis() as u64;
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(base.saturating_mul(factor).min(cap))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transient() -> RequestError {
        RequestError::Status {
            status: 503,
            message: "overloaded".into(),
        }
    }

    #[test]
    fn test_default_never_retries() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.next_delay(0, &transient()), None);
    }

    #[test]
    fn test_exponential_backoff_capped() {
        let policy = RetryPolicy::new(10)
            .with_min_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(500));
        assert_eq!(policy.next_delay(0, &transient()), Some(Duration::from_millis(100)));
        assert_eq!(policy.next_delay(1, &transient()), Some(Duration::from_millis(200)));
        assert_eq!(policy.next_delay(2, &transient()), Some(Duration::from_millis(400)));
        assert_eq!(policy.next_delay(3, &transient()), Some(Duration::from_millis(500)));
        assert_eq!(policy.next_delay(9, &transient()), None);
    }

    #[test]
    fn test_non_retryable_errors_give_up() {
        let policy = RetryPolicy::new(5);
        let err = RequestError::GenerationStopped("SAFETY".into());
        assert_eq!(policy.next_delay(0, &err), None);
    }

    #[test]
    fn test_zero_attempts_clamped() {
        assert_eq!(RetryPolicy::new(0).max_attempts(), 1);
    }
}
