//! # backup-harness-testkit
//!
//! Test doubles and report fixtures.
//! This crate depends on `ports` and `shared`.

pub mod errors;
pub mod fixtures;
pub mod in_memory;
pub mod scripted;

pub use in_memory::{
    InMemoryBackupService, InMemoryCluster, NoopLogger, RecordingLogger, seeded_bins,
};
pub use scripted::ScriptedProcessRunner;

/// Returns the testkit crate version.
#[must_use]
pub const fn testkit_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
