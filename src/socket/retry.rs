//! Request retry with exponential backoff.
//!
//! - Backoff: `base * 2^n` (base, 2x base, 4x base, ...)
//! - Capped at [`MAX_BACKOFF`]
//! - Gives up after `max_retries` retries, returning the last error

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Upper bound for a single backoff sleep
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Backoff policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_retries: u32,
}

impl RetryPolicy {
    pub fn new(base_delay: Duration, max_retries: u32) -> Self {
        Self {
            base_delay,
            max_retries,
        }
    }

    /// Sleep before retry number `attempt` (0-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(MAX_BACKOFF)
    }
}

/// Retry an async operation while `is_retryable` accepts its error.
///
/// # Example
///
/// ```no_run
/// use lotus::socket::retry::{retry_with_backoff, RetryPolicy};
/// use lotus::socket::SessionError;
/// use std::time::Duration;
///
/// async fn leave() -> Result<(), SessionError> {
///     retry_with_backoff(
///         RetryPolicy::new(Duration::from_secs(3), 5),
///         || async { /* request/response call */ Ok(()) },
///         SessionError::is_transient,
///     )
///     .await
/// }
/// ```
pub async fn retry_with_backoff<F, Fut, T, E>(
    policy: RetryPolicy,
    mut operation: F,
    is_retryable: fn(&E) -> bool,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(err) => {
                if !is_retryable(&err) || attempt >= policy.max_retries {
                    return Err(err);
                }

                let backoff = policy.backoff(attempt);
                warn!(
                    attempt = attempt + 1,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "request failed, retrying"
                );

                sleep(backoff).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socket::error::SessionError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(Duration::from_millis(100), 3)
    }

    #[tokio::test]
    async fn test_retry_succeeds_immediately() {
        let result = retry_with_backoff(
            policy(),
            || async { Ok::<_, SessionError>(42) },
            SessionError::is_transient,
        )
        .await;

        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_succeeds_after_failures() {
        let attempt = Arc::new(AtomicU32::new(0));
        let attempt_clone = attempt.clone();

        let result = retry_with_backoff(
            policy(),
            move || {
                let attempt = attempt_clone.clone();
                async move {
                    let count = attempt.fetch_add(1, Ordering::SeqCst);
                    if count < 2 {
                        Err(SessionError::Transport("reset".to_string()))
                    } else {
                        Ok(42)
                    }
                }
            },
            SessionError::is_transient,
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempt.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_non_retryable_error_fails_immediately() {
        let attempt = Arc::new(AtomicU32::new(0));
        let attempt_clone = attempt.clone();

        let result = retry_with_backoff(
            policy(),
            move || {
                let attempt = attempt_clone.clone();
                async move {
                    attempt.fetch_add(1, Ordering::SeqCst);
                    Err::<i32, _>(SessionError::NotConnected)
                }
            },
            SessionError::is_transient,
        )
        .await;

        assert_eq!(result, Err(SessionError::NotConnected));
        assert_eq!(attempt.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhausts_max_retries() {
        let attempt = Arc::new(AtomicU32::new(0));
        let attempt_clone = attempt.clone();

        let result = retry_with_backoff(
            policy(),
            move || {
                let attempt = attempt_clone.clone();
                async move {
                    attempt.fetch_add(1, Ordering::SeqCst);
                    Err::<i32, _>(SessionError::Transport("down".to_string()))
                }
            },
            SessionError::is_transient,
        )
        .await;

        assert!(matches!(result, Err(SessionError::Transport(_))));
        // First attempt plus three retries
        assert_eq!(attempt.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_backoff_calculation() {
        let policy = policy();
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(800));
        assert_eq!(policy.backoff(40), MAX_BACKOFF);
    }
}
