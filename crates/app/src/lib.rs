//! # backup-harness-app
//!
//! Command builders for the backup and restore tools, job helpers over the
//! backup service, and the seed/backup/restore scenario.
//! This crate depends on `ports`, `domain`, and `shared`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod macros;

pub mod argv;
pub mod asbench;
pub mod classic;
pub mod cli_backup;
pub mod cli_restore;
pub mod jobs;
pub mod scenario;
pub mod tools;

/// Returns the app crate version.
#[must_use]
pub const fn app_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub use argv::{Arg, CommandLine, Flag, FlagStyle};
pub use asbench::AsBench;
pub use classic::{AsBackup, AsRestore};
pub use cli_backup::{BackupRunOptions, CliBackup};
pub use cli_restore::CliRestore;
pub use jobs::{
    JobDeps, JobWaits, cancel_job, get_job, resume_job, wait_for_job_status, wait_for_restore,
    wait_for_restore_failure,
};
pub use scenario::{
    ScenarioDeps, ScenarioError, ScenarioInput, ScenarioPolicies, run_scenario,
};
pub use tools::{ToolDeps, ToolSettings};

#[cfg(test)]
mod tests {
    use super::*;
    use backup_harness_domain::domain_crate_version;
    use backup_harness_ports::ports_crate_version;
    use backup_harness_shared::shared_crate_version;

    fn workspace_deps() -> Vec<String> {
        let cargo_toml = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml"));
        let mut deps = Vec::new();
        let mut in_deps = false;

        for raw_line in cargo_toml.lines() {
            let line = raw_line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with('[') {
                in_deps = line == "[dependencies]";
                continue;
            }
            if in_deps && line.starts_with("backup-harness-") {
                let key = line.split('=').next().unwrap_or("").trim();
                deps.push(key.split('.').next().unwrap_or("").trim().to_string());
            }
        }

        deps
    }

    #[test]
    fn app_never_reaches_for_adapters_or_config() {
        for dep in workspace_deps() {
            assert!(
                [
                    "backup-harness-ports",
                    "backup-harness-domain",
                    "backup-harness-shared"
                ]
                .contains(&dep.as_str()),
                "unexpected dependency found: {dep}"
            );
        }
    }

    #[test]
    fn app_can_use_ports_domain_shared() {
        assert!(!app_crate_version().is_empty());
        assert!(!ports_crate_version().is_empty());
        assert!(!domain_crate_version().is_empty());
        assert!(!shared_crate_version().is_empty());
    }
}
