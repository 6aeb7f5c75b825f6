//! Bounded retry with a fixed delay between attempts.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::command::RunOptions;
use crate::Result;

/// Re-attempts a failing operation up to `retries` extra times.
///
/// Only errors for which [`ZapError::is_retryable`](crate::ZapError::is_retryable)
/// holds are retried (nonzero exit under enforcement, timeout). The last
/// attempt's error is returned as-is. A run with `check = false` completes
/// on its first attempt whatever its exit code, so retries only kick in
/// for timeouts in that mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first.
    pub retries: u32,
    /// Pause before each re-attempt.
    pub delay: Duration,
}

impl RetryPolicy {
    /// Create a new policy.
    pub fn new(retries: u32, delay: Duration) -> Self {
        Self { retries, delay }
    }

    /// Take the retry settings out of run options.
    pub fn from_options(options: &RunOptions) -> Self {
        Self::new(options.retries, options.delay)
    }

    /// Total number of attempts this policy allows.
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Run `attempt` until it succeeds or attempts are exhausted.
    pub fn run<T, F>(&self, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let mut failures = 0;
        loop {
            match attempt() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && failures < self.retries => {
                    failures += 1;
                    warn!(attempt = failures, of = self.max_attempts(), error = %e, "retrying");
                    std::thread::sleep(self.delay);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Async form of [`run`](Self::run); sleeps on the tokio timer.
    pub async fn run_async<T, F, Fut>(&self, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut failures = 0;
        loop {
            match attempt().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && failures < self.retries => {
                    failures += 1;
                    warn!(attempt = failures, of = self.max_attempts(), error = %e, "retrying");
                    tokio::time::sleep(self.delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_options(&RunOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::{Command, ExecutionResult};
    use crate::ZapError;
    use std::cell::Cell;
    use std::time::Instant;

    fn failure(code: i32) -> ZapError {
        ZapError::CommandFailed(Box::new(ExecutionResult::new(
            Command::new("flaky"),
            String::new(),
            format!("attempt failed with {code}"),
            code,
            Duration::ZERO,
        )))
    }

    #[test]
    fn test_succeeds_after_failures() {
        let calls = Cell::new(0);
        let policy = RetryPolicy::new(2, Duration::from_millis(20));

        let start = Instant::now();
        let value = policy
            .run(|| {
                calls.set(calls.get() + 1);
                if calls.get() < 3 {
                    Err(failure(1))
                } else {
                    Ok(calls.get())
                }
            })
            .unwrap();

        assert_eq!(value, 3);
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn test_returns_last_error_verbatim() {
        let calls = Cell::new(0);
        let policy = RetryPolicy::new(2, Duration::ZERO);

        let err = policy
            .run::<(), _>(|| {
                calls.set(calls.get() + 1);
                Err(failure(calls.get()))
            })
            .unwrap_err();

        assert_eq!(calls.get(), 3);
        assert_eq!(err.code(), Some(3));
        assert_eq!(err.to_string(), "attempt failed with 3");
    }

    #[test]
    fn test_no_delay_after_last_attempt() {
        let policy = RetryPolicy::new(0, Duration::from_secs(5));
        let start = Instant::now();
        let _ = policy.run::<(), _>(|| Err(failure(1)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_spawn_errors_not_retried() {
        let calls = Cell::new(0);
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let err = policy
            .run::<(), _>(|| {
                calls.set(calls.get() + 1);
                Err(ZapError::EmptyCommand)
            })
            .unwrap_err();
        assert_eq!(calls.get(), 1);
        assert!(matches!(err, ZapError::EmptyCommand));
    }

    #[tokio::test]
    async fn test_run_async_retries() {
        let calls = Cell::new(0);
        let policy = RetryPolicy::new(1, Duration::from_millis(10));
        let value = policy
            .run_async(|| {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move {
                    if n == 1 {
                        Err(failure(1))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(value, 2);
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.retries, 0);
        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.delay, Duration::from_secs(1));
    }
}
