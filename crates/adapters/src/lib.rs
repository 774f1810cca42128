//! # backup-harness-adapters
//!
//! Adapter implementations for ports (subprocesses, cluster tools, logging,
//! container logs and the backup service REST API).
//! This crate depends on `ports`, `domain`, and `shared`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

/// Backup service REST client.
#[cfg(feature = "backup-service")]
pub mod backup_service;
/// `asinfo`/`asbench` backed cluster adapter.
pub mod cluster;
pub mod container_logs;
pub mod log_sink;
pub mod logger;
pub mod process;
pub mod tracing_logger;

/// Crate version, used by boundary tests.
#[must_use]
pub const fn adapters_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub use cluster::{AsinfoCluster, BenchSettings};
pub use container_logs::{DockerLogBaseline, PodLogWatcher};
pub use log_sink::{LogSink, MemoryLogSink, StderrLogSink};
pub use logger::JsonLogger;
pub use process::ShellProcessRunner;
pub use tracing_logger::TracingLogger;

#[cfg(feature = "backup-service")]
pub use backup_service::{BackupServiceError, HttpBackupService, HttpBackupServiceConfig};
