//! Bounded retry for outbound API calls.

use std::future::Future;
use std::time::Duration;

use super::ApiError;

const LOG_TARGET: &str = "imebot::api";

/// How often and how patiently a call is retried.
///
/// The wait before try `n + 1` is `delay * n`, so delays grow linearly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total tries including the first one (at least 1)
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry that follows the given (1-based) failed try.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.delay * attempt
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy runs out of attempts. The last error is returned.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, what: &str, mut op: F) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < attempts => {
                let delay = policy.delay_after(attempt);
                log::debug!(
                    target: LOG_TARGET,
                    "{} failed (attempt {}/{}): {}; retrying in {:?}",
                    what,
                    attempt,
                    attempts,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn delays_grow_with_each_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_secs(2));
        assert_eq!(policy.delay_after(2), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn transport_failures_are_retried_up_to_the_limit() {
        let calls = AtomicU32::new(0);

        let result: Result<(), ApiError> = with_retry(quick(3), "getMe", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ApiError::transport("connection reset"))
        })
        .await;

        assert!(matches!(result, Err(ApiError::Transport { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn success_after_failure_stops_retrying() {
        let calls = AtomicU32::new(0);

        let result = with_retry(quick(3), "getMe", || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ApiError::transport("timeout"))
            } else {
                Ok(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn rejection_is_not_retried() {
        let calls = AtomicU32::new(0);

        let result: Result<(), ApiError> = with_retry(quick(3), "sendMessage", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ApiError::Rejected {
                method: "sendMessage".to_string(),
                description: "Bad Request: chat not found".to_string(),
            })
        })
        .await;

        assert!(matches!(result, Err(ApiError::Rejected { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
