//! # backup-harness-ports
//!
//! Port traits for the backup-harness hexagonal architecture.
//!
//! This crate defines the boundaries to the outside world: subprocesses,
//! the cluster under test, the backup service and logging. It depends only
//! on `domain` and `shared`.

use std::future::Future;
use std::pin::Pin;

/// Boxed future used by port traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Returns the ports crate version.
#[must_use]
pub const fn ports_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub mod backup_service;
pub mod cluster;
pub mod logger;
pub mod process;

pub use backup_service::*;
pub use cluster::*;
pub use logger::*;
pub use process::*;

// Domain types used in port signatures, so adapters can implement ports
// without depending on `backup-harness-domain` directly.
pub use backup_harness_domain::{JobDetails, JobStatus, RestoreJobStatus};

#[cfg(test)]
mod tests {
    use super::*;
    use backup_harness_domain::domain_crate_version;
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
                in_deps = line == "[dependencies]" || line == "[dev-dependencies]";
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
    fn ports_depends_only_on_domain_and_shared() {
        let deps = workspace_deps();
        let allowed = ["backup-harness-domain", "backup-harness-shared"];

        for dep in &deps {
            assert!(
                allowed.contains(&dep.as_str()),
                "unexpected dependency found: {dep}"
            );
        }
        for expected in allowed {
            assert!(
                deps.iter().any(|dep| dep == expected),
                "missing dependency: {expected}"
            );
        }
    }

    #[test]
    fn ports_can_use_domain_and_shared() {
        assert!(!ports_crate_version().is_empty());
        assert!(!domain_crate_version().is_empty());
        assert!(!shared_crate_version().is_empty());
    }
}
