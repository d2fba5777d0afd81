//! Bounded exponential-backoff retry around a single remote call.

use crate::config::RetryConfig;
use crate::error::{SyncError, SyncResult};
use std::future::Future;
use tokio::time::sleep;
use tracing::warn;

/// Retries transient failures of one remote operation.
///
/// Failures carrying status 408, 429 or 5xx are retried after
/// `initial_delay * 2^(attempt - 1)`; any other failure is returned
/// immediately. Once every attempt has failed the caller receives
/// [`SyncError::RetriesExhausted`] rather than the last underlying error.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    /// Creates an executor.
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Runs `operation` until it succeeds, fails terminally, or runs out of
    /// attempts. The closure receives the 1-indexed attempt number.
    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> SyncResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = SyncResult<T>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let err = match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_retryable() {
                return Err(err);
            }

            if attempt >= max_attempts {
                warn!(
                    attempt,
                    status = err.status(),
                    error = %err.detail(),
                    "request failed; retries exhausted"
                );
                return Err(SyncError::RetriesExhausted { attempts: attempt });
            }

            let backoff = self.config.delay_for_attempt(attempt);
            warn!(
                attempt,
                status = err.status(),
                backoff_ms = backoff.as_millis() as u64,
                error = %err.detail(),
                "request failed; retrying"
            );
            sleep(backoff).await;
        }
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;
    use tracing_test::traced_test;

    /// Fails with `status` for the first `failures` attempts, recording the
    /// instant of every attempt.
    async fn flaky(
        attempts: Arc<Mutex<Vec<Instant>>>,
        failures: usize,
        status: u16,
    ) -> SyncResult<&'static str> {
        let mut log = attempts.lock();
        log.push(Instant::now());
        if log.len() <= failures {
            Err(SyncError::remote(status, "transient"))
        } else {
            Ok("done")
        }
    }

    fn gaps(attempts: &[Instant]) -> Vec<Duration> {
        attempts.windows(2).map(|w| w[1] - w[0]).collect()
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn rate_limited_four_times_then_succeeds() {
        let executor = RetryExecutor::default();
        let attempts = Arc::new(Mutex::new(Vec::new()));

        let result = executor
            .execute(|_| flaky(Arc::clone(&attempts), 4, 429))
            .await;

        assert_eq!(result.unwrap(), "done");
        let attempts = attempts.lock();
        assert_eq!(attempts.len(), 5);
        assert_eq!(
            gaps(&attempts),
            vec![
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
                Duration::from_secs(16),
            ]
        );
        assert!(logs_contain("request failed; retrying"));
        assert!(logs_contain("status=429"));
    }

    #[tokio::test(start_paused = true)]
    async fn bad_request_is_never_retried() {
        let executor = RetryExecutor::default();
        let attempts = Arc::new(Mutex::new(Vec::new()));

        let result = executor
            .execute(|_| flaky(Arc::clone(&attempts), 10, 400))
            .await;

        assert_eq!(result.unwrap_err().status(), Some(400));
        assert_eq!(attempts.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_yields_distinct_error() {
        let executor = RetryExecutor::default();
        let attempts = Arc::new(Mutex::new(Vec::new()));

        let result = executor
            .execute(|_| flaky(Arc::clone(&attempts), 10, 503))
            .await;

        assert_eq!(
            result.unwrap_err(),
            SyncError::RetriesExhausted { attempts: 5 }
        );
        assert_eq!(attempts.lock().len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn timeouts_are_retried() {
        let executor = RetryExecutor::new(RetryConfig::new(2));
        let mut calls = 0;

        let result = executor
            .execute(|attempt| {
                calls += 1;
                async move {
                    if attempt == 1 {
                        Err(SyncError::Timeout)
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn no_retry_config_makes_one_attempt() {
        let executor = RetryExecutor::new(RetryConfig::no_retry());
        let result: SyncResult<()> = executor
            .execute(|_| async { Err(SyncError::remote(500, "down")) })
            .await;
        assert_eq!(
            result.unwrap_err(),
            SyncError::RetriesExhausted { attempts: 1 }
        );
    }
}
