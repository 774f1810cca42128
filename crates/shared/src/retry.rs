//! Retry helpers with exponential backoff and jitter.
//!
//! Used for transient failures talking to the system under test (backup
//! service lookups, info commands). Only errors classified as
//! [`ErrorClass::Retriable`](crate::ErrorClass) are retried.

use crate::{ErrorEnvelope, RequestContext, Result};
use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Retry policy configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum attempts (including the first try).
    pub max_attempts: u32,
    /// Base delay for backoff in milliseconds.
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds.
    pub max_delay_ms: u64,
    /// Jitter ratio as percentage (0..=100).
    pub jitter_ratio_pct: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 250,
            max_delay_ms: 5_000,
            jitter_ratio_pct: 20,
        }
    }
}

impl RetryPolicy {
    /// A policy that tries exactly once.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 0,
            max_delay_ms: 0,
            jitter_ratio_pct: 0,
        }
    }

    /// Delay before the retry following `attempt` (1-based).
    #[must_use]
    pub fn delay_for(self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(30);
        let capped = self
            .base_delay_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_delay_ms);
        let jitter_pct = u64::from(self.jitter_ratio_pct.min(100));
        if jitter_pct == 0 || capped == 0 {
            return Duration::from_millis(capped);
        }

        // Spread uniformly over [capped - range, capped + range], clamped to the cap.
        let range = capped.saturating_mul(jitter_pct) / 100;
        let unit = jitter_seed(attempt) % 1_001;
        let low = capped.saturating_sub(range);
        let span = range.saturating_mul(2);
        let jittered = low.saturating_add(span.saturating_mul(unit) / 1_000);
        Duration::from_millis(jittered.min(self.max_delay_ms))
    }
}

/// Retry a fallible async operation with backoff + jitter.
pub async fn retry_async<T, F, Fut>(
    ctx: &RequestContext,
    policy: RetryPolicy,
    operation: &'static str,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_async_with_observer(ctx, policy, operation, &mut op, |_, _| {}).await
}

/// Retry with a callback invoked on each retryable failure.
pub async fn retry_async_with_observer<T, F, Fut, Obs>(
    ctx: &RequestContext,
    policy: RetryPolicy,
    operation: &'static str,
    op: &mut F,
    mut on_retry: Obs,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    Obs: FnMut(u32, &ErrorEnvelope),
{
    let mut attempt = 0u32;

    loop {
        attempt = attempt.saturating_add(1);
        ctx.ensure_not_cancelled(operation)?;

        let error = match op().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };
        if !error.class.is_retriable() || attempt >= policy.max_attempts.max(1) {
            return Err(error.with_metadata("attempts", attempt.to_string()));
        }

        on_retry(attempt, &error);
        ctx.sleep(policy.delay_for(attempt), operation).await?;
    }
}

fn jitter_seed(attempt: u32) -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| u64::from(duration.subsec_nanos()));
    nanos ^ u64::from(attempt).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ErrorClass, ErrorCode};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 5,
            jitter_ratio_pct: 0,
        }
    }

    #[tokio::test]
    async fn retries_retriable_errors_until_success() -> Result<()> {
        let ctx = RequestContext::new_request();
        let calls = Arc::new(AtomicU32::new(0));
        let calls_task = Arc::clone(&calls);

        let result = retry_async(&ctx, fast_policy(), "get_job", || {
            let calls = Arc::clone(&calls_task);
            async move {
                let attempt = calls.fetch_add(1, Ordering::Relaxed) + 1;
                if attempt < 3 {
                    Err(ErrorEnvelope::unexpected(
                        ErrorCode::dependency_unavailable(),
                        "503",
                        ErrorClass::Retriable,
                    ))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await?;

        assert_eq!(result, 3);
        assert_eq!(calls.load(Ordering::Relaxed), 3);
        Ok(())
    }

    #[tokio::test]
    async fn non_retriable_errors_fail_immediately() {
        let ctx = RequestContext::new_request();
        let calls = Arc::new(AtomicU32::new(0));
        let calls_task = Arc::clone(&calls);

        let result: Result<()> = retry_async(&ctx, fast_policy(), "get_job", || {
            calls_task.fetch_add(1, Ordering::Relaxed);
            async { Err(ErrorEnvelope::expected(ErrorCode::not_found(), "no job")) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn delay_respects_cap_and_jitter_bounds() {
        let policy = RetryPolicy::default();
        for attempt in 1..10 {
            let delay = policy.delay_for(attempt);
            assert!(delay <= Duration::from_millis(policy.max_delay_ms));
        }
        let first = policy.delay_for(1).as_millis();
        assert!((200..=300).contains(&first));
        assert_eq!(RetryPolicy::no_retry().delay_for(1), Duration::ZERO);
    }
}
