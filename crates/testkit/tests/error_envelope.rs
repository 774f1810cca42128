//! Integration tests for shared error propagation.

use backup_harness_shared::{ErrorClass, ErrorCode, ErrorEnvelope, ErrorKind};
use backup_harness_testkit::errors::{
    cancelled_error, spawn_error, timeout_error, unavailable_error,
};

#[test]
fn error_envelope_crosses_crates() {
    let timeout = timeout_error();
    assert_eq!(timeout.code, ErrorCode::timeout());

    let boxed: Box<dyn std::error::Error> = Box::new(timeout);
    assert!(boxed.to_string().contains("timeout"));

    assert!(cancelled_error().is_cancelled());
    assert_eq!(unavailable_error().class, ErrorClass::Retriable);
}

#[test]
fn process_errors_become_envelopes() {
    let envelope = ErrorEnvelope::from(spawn_error("asbackup"));
    assert_eq!(envelope.code, ErrorCode::new("process", "spawn"));
    assert_eq!(envelope.kind, ErrorKind::Unexpected);
    assert_eq!(
        envelope.metadata.get("program").map(String::as_str),
        Some("asbackup")
    );
}
