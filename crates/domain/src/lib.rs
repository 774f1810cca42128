//! # backup-harness-domain
//!
//! Domain model for driving the backup and restore tools from the outside.
//!
//! - **Reports** - `BackupResult`, `RestoreResult`, `EstimateResult`, `ValidationReport`
//! - **Report fields** - `ReportDuration`, start-time parsing, `extract_value`
//! - **Environment** - `Environment`, `ConnectionProfile`
//! - **Jobs** - `JobStatus`, `JobDetails`, `RestoreJobStatus`
//! - **Cluster info** - set/namespace object counts, replication factor
//! - **Scenarios** - `ScenarioStage`, `ScenarioReport`
//!
//! ## Dependency Rules
//!
//! - Depends only on the `shared` crate
//! - Pure parsing and value types, no I/O

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub use backup_harness_shared::shared_crate_version;

// =============================================================================
// REPORTS
// =============================================================================

pub mod backup;
pub mod duration;
pub mod estimate;
pub mod report;
pub mod restore;
pub mod start_time;
pub mod validation;

// =============================================================================
// CLUSTER + SERVICE MODEL
// =============================================================================

pub mod environment;
pub mod info;
pub mod job;
pub mod scenario;

pub use backup::BackupResult;
pub use duration::ReportDuration;
pub use environment::{
    CLOUD_PORT, ConnectionProfile, DEFAULT_PASSWORD, DEFAULT_TLS_NAME, DEFAULT_USER,
    DOCKER_HOST_ADDRESS, Environment, LOCAL_PORT, SecretAgentEndpoint, TlsSettings,
    UnknownEnvironment,
};
pub use estimate::EstimateResult;
pub use info::{
    cluster_size, master_objects, namespace_object_count, peer_addresses, per_node_logical_count,
    replication_factor, set_object_count,
};
pub use job::{JobDetails, JobStatus, RestoreJobStatus};
pub use report::{ERROR_MARKER, ReportError, ReportOptions, contains_error_marker, extract_value};
pub use restore::RestoreResult;
pub use scenario::{MutationMode, ScenarioOutcome, ScenarioReport, ScenarioStage, StageTiming};
pub use start_time::parse_start_time;
pub use validation::{VALIDATION_HEADER, ValidationReport};

/// Returns the domain crate version.
#[must_use]
pub const fn domain_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_crate_compiles() {
        assert!(!domain_crate_version().is_empty());
        assert!(!shared_crate_version().is_empty());
    }

    #[test]
    fn domain_depends_only_on_shared() {
        let manifest = include_str!("../Cargo.toml");
        let internal: Vec<&str> = manifest
            .lines()
            .map(str::trim)
            .filter(|line| line.starts_with("backup-harness-"))
            .collect();
        assert_eq!(internal, vec!["backup-harness-shared.workspace = true"]);
    }
}
