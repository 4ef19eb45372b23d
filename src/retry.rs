//! Bounded exponential-backoff retry.
//!
//! [`with_retry`] runs an async operation up to `max_attempts` times. After
//! a failed attempt `n` (zero-based) it sleeps `base_delay * 2^n`, capped at
//! `max_delay`, unless that was the final attempt. The combinator knows
//! nothing about networking and is tested in isolation.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// How many times to try and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Treated as at least 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay after the failed attempt `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// The operation failed on every attempt.
#[derive(Debug)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

/// Run `operation` under `policy`, returning the first success or the last
/// error once attempts run out.
pub async fn with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut operation: F,
) -> Result<T, RetryExhausted<E>>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(label, attempt = attempt + 1, "retry succeeded");
                }
                return Ok(value);
            }
            Err(err) => {
                if attempt + 1 >= max_attempts {
                    warn!(label, attempts = max_attempts, error = %err, "retries exhausted");
                    return Err(RetryExhausted {
                        attempts: max_attempts,
                        last_error: err,
                    });
                }
                let delay = policy.delay_for(attempt);
                warn!(
                    label,
                    attempt = attempt + 1,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "attempt failed, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(800));
        assert_eq!(policy.delay_for(4), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(40), Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_succeeds_first_try() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, RetryExhausted<String>> = with_retry(&fast(3), "t", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(7) }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast(3), "t", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(format!("transient {n}"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fast(3), "t", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(format!("failure {n}")) }
        })
        .await;
        let err = result.unwrap_err();
        assert_eq!(err.attempts, 3);
        assert_eq!(err.last_error, "failure 2");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_tries_once() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fast(0), "t", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("nope") }
        })
        .await;
        assert_eq!(result.unwrap_err().attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
