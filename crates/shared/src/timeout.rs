//! Timeout helpers with cancellation awareness.

use crate::{ErrorEnvelope, RequestContext, Result};
use std::future::Future;
use std::time::Duration;

/// Apply a timeout to a future, honoring request cancellation.
pub async fn timeout_with_context<T, F>(
    ctx: &RequestContext,
    timeout: Duration,
    operation: &'static str,
    fut: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    ctx.ensure_not_cancelled(operation)?;

    tokio::select! {
        () = ctx.cancelled() => Err(ErrorEnvelope::cancelled("operation cancelled")
            .with_metadata("operation", operation)),
        res = tokio::time::timeout(timeout, fut) => {
            res.unwrap_or_else(|_| Err(ErrorEnvelope::timed_out(
                operation,
                format!("{operation} timed out after {}ms", timeout.as_millis()),
            )))
        }
    }
}
