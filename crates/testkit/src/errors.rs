//! Test fixtures for shared error codes and envelopes.

use backup_harness_ports::ProcessError;
use backup_harness_shared::{ErrorClass, ErrorCode, ErrorEnvelope};

/// Return a list of common error codes used in tests.
pub fn common_error_codes() -> Vec<ErrorCode> {
    vec![
        ErrorCode::cancelled(),
        ErrorCode::invalid_input(),
        ErrorCode::not_found(),
        ErrorCode::timeout(),
        ErrorCode::io(),
        ErrorCode::internal(),
        ErrorCode::assertion_failed(),
        ErrorCode::dependency_unavailable(),
    ]
}

/// A cancellation error fixture.
pub fn cancelled_error() -> ErrorEnvelope {
    ErrorEnvelope::cancelled("cancelled")
}

/// A retriable timeout error fixture.
pub fn timeout_error() -> ErrorEnvelope {
    ErrorEnvelope::unexpected(ErrorCode::timeout(), "timeout", ErrorClass::Retriable)
}

/// A retriable "service unavailable" fixture.
pub fn unavailable_error() -> ErrorEnvelope {
    ErrorEnvelope::unexpected(
        ErrorCode::dependency_unavailable(),
        "service unavailable",
        ErrorClass::Retriable,
    )
}

/// A process that could not be started.
pub fn spawn_error(program: &str) -> ProcessError {
    ProcessError::Spawn {
        program: program.to_string(),
        message: "No such file or directory (os error 2)".to_string(),
    }
}
