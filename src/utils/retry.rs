//! Bounded retry with a fixed delay.

use std::future::Future;
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::models::StoreConfig;

/// How many times to try and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    /// Policy for store writes.
    pub fn for_store(config: &StoreConfig) -> Self {
        Self::new(
            config.retry_attempts,
            Duration::from_millis(config.retry_delay_ms),
        )
    }
}

/// Run `op` until it succeeds, fails with an error `should_retry` rejects, or
/// the attempts run out.
///
/// Exhausting the attempts yields [`AppError::RetryExhausted`] carrying the
/// last error.
pub async fn retry<T, F, Fut, P>(policy: RetryPolicy, should_retry: P, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&AppError) -> bool,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if !should_retry(&e) => return Err(e),
            Err(e) if attempt >= policy.attempts => {
                return Err(AppError::RetryExhausted {
                    attempts: attempt,
                    source: Box::new(e),
                });
            }
            Err(e) => {
                log::debug!(
                    "Attempt {}/{} failed: {}; retrying in {:?}",
                    attempt,
                    policy.attempts,
                    e,
                    policy.delay
                );
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result = retry(fast(5), AppError::is_write_conflict, move || async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(AppError::WriteConflict("locked".into()))
            } else {
                Ok("done")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_surfaces_error() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<()> = retry(fast(3), AppError::is_write_conflict, move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(AppError::WriteConflict("locked".into()))
        })
        .await;

        assert!(matches!(
            result,
            Err(AppError::RetryExhausted { attempts: 3, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<()> = retry(fast(5), AppError::is_write_conflict, move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(AppError::Store("disk full".into()))
        })
        .await;

        assert!(matches!(result, Err(AppError::Store(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_store_policy_defaults() {
        let policy = RetryPolicy::for_store(&StoreConfig::default());
        assert_eq!(policy.attempts, 10);
        assert_eq!(policy.delay, Duration::from_secs(3));
    }
}
