//! # backup-harness-shared
//!
//! Shared utilities, result types, and error handling for the backup-harness workspace.
//!
//! This crate provides foundational types that are used across all other crates:
//!
//! - Result and error envelope types
//! - Request context, cancellation and named wait groups
//! - Retry, timeout and polling helpers
//! - Secret redaction and log masking
//!
//! ## Design Principles
//!
//! 1. **No workspace dependencies** - This crate only depends on external crates
//! 2. **Injected, not global** - shared state (wait groups, caches) is an ordinary value
//! 3. **Serde-compatible** - error types serialize for machine-readable CLI output

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

// =============================================================================
// ERRORS + RESULTS
// =============================================================================

pub mod errors;
pub mod result;

// =============================================================================
// ASYNC COORDINATION
// =============================================================================

pub mod concurrency;
pub mod poll;
pub mod retry;
pub mod timeout;

// =============================================================================
// LOG HYGIENE
// =============================================================================

pub mod dedup;
pub mod redaction;

pub use concurrency::{
    CancellationToken, CorrelationId, RequestContext, WaitGroup, WaitGroupRegistry,
    WaitGroupSnapshot,
};
pub use dedup::PrintedLogCache;
pub use errors::{
    ErrorClass, ErrorCode, ErrorEnvelope, ErrorKind, ErrorMetadata, REDACTED_VALUE,
    UnexpectedError, check_cancelled, normalize_unexpected_error, redact_metadata,
};
pub use poll::{PollPolicy, poll_until, sleep_until_next_round_second};
pub use redaction::{
    LOG_PART_CHARS, REDACTED, SecretString, is_secret_key, mask_text, redact_if_secret,
    split_for_logging,
};
pub use result::{Result, ResultExt};
pub use retry::{RetryPolicy, retry_async, retry_async_with_observer};
pub use timeout::timeout_with_context;

/// Returns the shared crate version.
#[must_use]
pub const fn shared_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_error_types_are_available() {
        let error = ErrorEnvelope::expected(ErrorCode::invalid_input(), "invalid");
        assert_eq!(error.kind, ErrorKind::Expected);
        assert_eq!(error.class, ErrorClass::NonRetriable);
    }

    #[test]
    fn shared_crate_has_no_workspace_dependencies() {
        let cargo_toml = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml"));
        let workspace_deps = cargo_toml
            .lines()
            .filter(|line| line.trim_start().starts_with("backup-harness-"))
            .count();
        assert_eq!(workspace_deps, 0);
        assert!(!shared_crate_version().is_empty());
    }
}
