//! # backup-harness-infra
//!
//! Infrastructure wiring and runtime composition.
//! This crate depends on `app`, `adapters`, `config`, and `shared`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

/// Local CLI orchestration helpers.
pub mod cli_local;
/// Config loading helpers used by CLI surfaces.
pub mod config_check;
/// Environment validation helpers used by CLI surfaces.
pub mod env_check;
/// Backup service job helpers.
pub mod jobs;
/// Logger selection.
pub mod observability;
/// Composition root.
pub mod runtime;

pub use cli_local::{
    BackupRequest, CommandOutcome, ParsedReport, ReportKind, RestoreRequest, ScenarioRequest,
    ValidateTarget, parse_flag_pairs, parse_report, run_backup_local, run_estimate_local,
    run_restore_local, run_scenario_local, run_validate_local,
};
pub use config_check::{config_schema_json, load_effective_config_json, load_effective_config_toml};
pub use env_check::{
    EnvironmentSummary, InfraError, InfraResult, describe_environment, validate_env_parsing,
};
pub use jobs::{cancel_job_status, read_job_status, resume_job_status, wait_restore_status};
pub use runtime::HarnessRuntime;

pub use backup_harness_config::collect_env_map;

// Re-export redaction utilities for CLI boundary sanitization
pub use backup_harness_shared::{is_secret_key, mask_text, redact_if_secret};

/// Returns the infra crate version.
#[must_use]
pub const fn infra_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;
    use backup_harness_adapters::adapters_crate_version;
    use backup_harness_app::app_crate_version;
    use backup_harness_config::config_crate_version;
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
            if !in_deps {
                continue;
            }
            if line.starts_with("backup-harness-") {
                let key = line.split('=').next().unwrap_or("").trim();
                let name = key.split('.').next().unwrap_or("").trim();
                deps.push(name.to_string());
            }
        }

        deps
    }

    #[test]
    fn infra_depends_on_app_adapters_config() {
        let deps = workspace_deps();
        let required = [
            "backup-harness-app",
            "backup-harness-adapters",
            "backup-harness-config",
        ];

        for expected in required {
            assert!(
                deps.iter().any(|dep| dep == expected),
                "missing dependency: {expected}"
            );
        }
    }

    #[test]
    fn testkit_stays_a_dev_dependency() {
        assert!(!workspace_deps().iter().any(|dep| dep == "backup-harness-testkit"));
    }

    #[test]
    fn infra_can_use_app_adapters_config_shared() {
        assert!(!infra_crate_version().is_empty());
        assert!(!app_crate_version().is_empty());
        assert!(!adapters_crate_version().is_empty());
        assert!(!config_crate_version().is_empty());
        assert!(!shared_crate_version().is_empty());
    }
}
