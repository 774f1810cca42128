//! Polling helpers for waiting on asynchronous state in the system under test.
//!
//! A probe is called repeatedly until it yields `Some(value)`. The first probe
//! runs after `poll_delay`, later probes every `poll_interval`, and the whole
//! wait is bounded by `timeout`. Running out of time is a retriable
//! `core:timeout` error that callers may also treat as an expected negative
//! signal ("the backup did not happen").

use crate::{ErrorEnvelope, RequestContext, Result};
use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::Instant;

/// Polling schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay before the first probe.
    pub poll_delay: Duration,
    /// Delay between probes.
    pub poll_interval: Duration,
    /// Upper bound for the whole wait.
    pub timeout: Duration,
}

impl PollPolicy {
    /// Build a policy from explicit durations.
    #[must_use]
    pub const fn new(poll_delay: Duration, poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            poll_delay,
            poll_interval,
            timeout,
        }
    }

    /// Namespace truncation: first probe after 1s, every 10s, up to 1 minute.
    #[must_use]
    pub const fn namespace_truncate() -> Self {
        Self::new(
            Duration::from_secs(1),
            Duration::from_secs(10),
            Duration::from_secs(60),
        )
    }

    /// Set truncation: first probe after 500ms, every 3s, up to 30s.
    #[must_use]
    pub const fn set_truncate() -> Self {
        Self::new(
            Duration::from_millis(500),
            Duration::from_secs(3),
            Duration::from_secs(30),
        )
    }

    /// Restore job completion: every 1s, up to 2 minutes.
    #[must_use]
    pub const fn restore_job() -> Self {
        Self::new(Duration::ZERO, Duration::from_secs(1), Duration::from_secs(120))
    }
}

/// Poll `probe` until it yields a value, the timeout elapses, or the context is cancelled.
pub async fn poll_until<T, F, Fut>(
    ctx: &RequestContext,
    policy: PollPolicy,
    operation: &'static str,
    mut probe: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let deadline = Instant::now() + policy.timeout;
    let mut attempts = 0u32;

    ctx.sleep(policy.poll_delay.min(policy.timeout), operation).await?;
    loop {
        attempts = attempts.saturating_add(1);
        if let Some(value) = probe().await? {
            return Ok(value);
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(ErrorEnvelope::timed_out(
                operation,
                format!(
                    "{operation}: condition not met within {}ms",
                    policy.timeout.as_millis()
                ),
            )
            .with_metadata("attempts", attempts.to_string()));
        }
        let pause = policy.poll_interval.min(deadline - now);
        ctx.sleep(pause, operation).await?;
    }
}

/// Sleep until the wall clock reaches the next whole second.
///
/// Used to separate "before" and "after" timestamps for time-range filters
/// such as `--modified-after`.
pub async fn sleep_until_next_round_second(ctx: &RequestContext) -> Result<()> {
    let subsec = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.subsec_millis());
    let remaining = 1_000u64.saturating_sub(u64::from(subsec));
    ctx.sleep(Duration::from_millis(remaining), "sleep_until_next_round_second")
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick() -> PollPolicy {
        PollPolicy::new(
            Duration::ZERO,
            Duration::from_millis(5),
            Duration::from_millis(200),
        )
    }

    #[tokio::test]
    async fn returns_once_condition_holds() -> Result<()> {
        let ctx = RequestContext::new_request();
        let calls = Arc::new(AtomicU32::new(0));
        let probe_calls = Arc::clone(&calls);

        let value = poll_until(&ctx, quick(), "wait_for_count", || {
            let calls = Arc::clone(&probe_calls);
            async move {
                let seen = calls.fetch_add(1, Ordering::Relaxed) + 1;
                Ok((seen >= 3).then_some(seen))
            }
        })
        .await?;

        assert_eq!(value, 3);
        Ok(())
    }

    #[tokio::test]
    async fn times_out_with_retriable_error() {
        let ctx = RequestContext::new_request();
        let policy = PollPolicy::new(
            Duration::ZERO,
            Duration::from_millis(5),
            Duration::from_millis(30),
        );

        let result: Result<()> =
            poll_until(&ctx, policy, "wait_for_backup", || async { Ok(None) }).await;

        let error = result.err();
        assert!(error.as_ref().is_some_and(ErrorEnvelope::is_timeout));
        assert!(error.is_some_and(|error| error.class.is_retriable()));
    }

    #[tokio::test]
    async fn probe_errors_propagate() {
        let ctx = RequestContext::new_request();
        let result: Result<()> = poll_until(&ctx, quick(), "wait_for_job", || async {
            Err(ErrorEnvelope::expected(
                crate::ErrorCode::not_found(),
                "job vanished",
            ))
        })
        .await;

        assert!(result.is_err_and(|error| error.code == crate::ErrorCode::not_found()));
    }

    #[tokio::test]
    async fn cancelled_context_stops_polling() {
        let ctx = RequestContext::new_request();
        ctx.cancel();

        let result: Result<()> = poll_until(&ctx, quick(), "wait", || async { Ok(None) }).await;
        assert!(result.is_err_and(|error| error.is_cancelled()));
    }
}
