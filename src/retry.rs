//! Capped retry with linear backoff.
//!
//! After failed attempt `n` the policy waits `base_delay * n` before trying
//! again. Failures the classifier marks as permanent are returned at once.

use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one (at least 1)
    max_attempts: usize,
    base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Policy for `retries` retries after the first attempt
    pub fn with_retries(retries: usize, base_delay: Duration) -> Self {
        Self::new(retries.saturating_add(1), base_delay)
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Delay to wait after failed attempt `attempt` (1-based)
    pub fn delay_after(&self, attempt: usize) -> Duration {
        self.base_delay
            .saturating_mul(u32::try_from(attempt).unwrap_or(u32::MAX))
    }

    /// Runs `operation` until it succeeds, fails permanently or the attempt
    /// budget is spent. The last error is returned on exhaustion.
    pub async fn run<T, E, Op, Fut, C>(&self, mut operation: Op, is_retryable: C) -> Result<T, E>
    where
        Op: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if !is_retryable(&e) => {
                    ::log::debug!("Attempt {} failed permanently: {}", attempt, e);
                    return Err(e);
                }
                Err(e) if attempt >= self.max_attempts => {
                    ::log::error!("Giving up after {} attempts. Last error: {}", attempt, e);
                    return Err(e);
                }
                Err(e) => {
                    let delay = self.delay_after(attempt);
                    ::log::warn!(
                        "Attempt {}/{} failed with {}. Retrying in {:?}...",
                        attempt,
                        self.max_attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Debug, PartialEq)]
    enum TestError {
        Transient(usize),
        Fatal,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:?}", self)
        }
    }

    fn transient(e: &TestError) -> bool {
        matches!(e, TestError::Transient(_))
    }

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy::new(4, Duration::from_millis(100));
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(300));
    }

    #[test]
    fn test_attempt_budget_is_at_least_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts(), 1);
        assert_eq!(RetryPolicy::with_retries(2, Duration::ZERO).max_attempts(), 3);
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = Cell::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(20));
        let started = std::time::Instant::now();

        let result = policy
            .run(
                |attempt| {
                    calls.set(calls.get() + 1);
                    async move {
                        if attempt < 3 {
                            Err(TestError::Transient(attempt))
                        } else {
                            Ok(attempt)
                        }
                    }
                },
                transient,
            )
            .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.get(), 3);
        // 20ms after the first failure, 40ms after the second
        assert!(started.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn test_returns_last_error_on_exhaustion() {
        let calls = Cell::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(10));

        let result: Result<(), _> = policy
            .run(
                |attempt| {
                    calls.set(calls.get() + 1);
                    async move { Err(TestError::Transient(attempt)) }
                },
                transient,
            )
            .await;

        assert_eq!(result, Err(TestError::Transient(3)));
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let calls = Cell::new(0);
        let policy = RetryPolicy::new(5, Duration::from_secs(60));

        let result: Result<(), _> = policy
            .run(
                |_| {
                    calls.set(calls.get() + 1);
                    async { Err(TestError::Fatal) }
                },
                transient,
            )
            .await;

        assert_eq!(result, Err(TestError::Fatal));
        assert_eq!(calls.get(), 1);
    }
}
