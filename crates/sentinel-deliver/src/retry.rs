use std::future::Future;
use std::time::{Duration, Instant};

use rand::Rng;
use sentinel_core::SentinelError;

/// Policy parameters for [`with_retries`].
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_backoff_ms: u64,
    pub max_total_time_ms: Option<u64>,
}

/// Exponential backoff with an attempt cap and an optional total-time
/// budget, expressed as a free function since fetch and delivery share one
/// algorithm rather than each owning a trait object.
///
/// `attempt_fn` is retried while `should_retry` returns true for its error
/// and the attempt budget and (optional) time budget allow it.
pub async fn with_retries<T, F, Fut>(
    policy: &RetryPolicy,
    should_retry: impl Fn(&SentinelError) -> bool,
    mut attempt_fn: F,
) -> Result<T, SentinelError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SentinelError>>,
{
    let start = Instant::now();
    let mut attempt: u32 = 0;
    let mut last_err: Option<SentinelError> = None;

    loop {
        if let Some(budget) = policy.max_total_time_ms {
            let elapsed = start.elapsed().as_millis() as u64;
            if elapsed > budget {
                if attempt >= 1 {
                    return Err(last_err.unwrap_or(SentinelError::RetryBudgetExceeded));
                }
                return Err(SentinelError::RetryBudgetExceeded);
            }
        }

        match attempt_fn().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= policy.max_retries || !should_retry(&err) {
                    return Err(err);
                }

                let jitter_max = std::cmp::min(250, policy.base_backoff_ms);
                let jitter = if jitter_max == 0 {
                    0
                } else {
                    rand::thread_rng().gen_range(0..=jitter_max)
                };
                let delay_ms = policy.base_backoff_ms.saturating_mul(1 << attempt) + jitter;

                if let Some(budget) = policy.max_total_time_ms {
                    let elapsed = start.elapsed().as_millis() as u64;
                    if budget.saturating_sub(elapsed) <= delay_ms {
                        return Err(err);
                    }
                }

                last_err = Some(err);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_without_retry() {
        let policy = RetryPolicy {
            max_retries: 3,
            base_backoff_ms: 1,
            max_total_time_ms: None,
        };
        let result: Result<u32, SentinelError> =
            with_retries(&policy, |_| true, || async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn retries_until_success() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_backoff_ms: 1,
            max_total_time_ms: None,
        };
        let attempts = AtomicU32::new(0);
        let result: Result<u32, SentinelError> = with_retries(
            &policy,
            |_| true,
            || {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(SentinelError::Network("boom".into()))
                    } else {
                        Ok(99)
                    }
                }
            },
        )
        .await;
        assert_eq!(result.unwrap(), 99);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_when_should_retry_false() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_backoff_ms: 1,
            max_total_time_ms: None,
        };
        let attempts = AtomicU32::new(0);
        let result: Result<u32, SentinelError> = with_retries(
            &policy,
            |_| false,
            || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(SentinelError::UrlSafety("nope".into())) }
            },
        )
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_max_retries() {
        let policy = RetryPolicy {
            max_retries: 2,
            base_backoff_ms: 1,
            max_total_time_ms: None,
        };
        let attempts = AtomicU32::new(0);
        let result: Result<u32, SentinelError> = with_retries(
            &policy,
            |_| true,
            || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(SentinelError::Network("boom".into())) }
            },
        )
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
