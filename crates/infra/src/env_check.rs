//! Environment validation helpers for CLI surfaces.

use backup_harness_config::{HarnessEnv, resolve_connection_profile};
use backup_harness_domain::ConnectionProfile;
use backup_harness_shared::ErrorEnvelope;
use serde::Serialize;
use std::collections::BTreeMap;

/// Infra-level error type (shared error envelope).
pub type InfraError = ErrorEnvelope;

/// Infra-level result type.
pub type InfraResult<T> = Result<T, InfraError>;

/// Validate that the provided env parameters parse.
pub fn validate_env_parsing(env: &BTreeMap<String, String>) -> InfraResult<()> {
    HarnessEnv::from_map(env).map_err(ErrorEnvelope::from)?;
    Ok(())
}

/// What `bh env` prints: the resolved profile and the known parameters that were set.
///
/// Secrets serialize as `<redacted>`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentSummary {
    /// Resolved connection profile.
    pub profile: ConnectionProfile,
    /// Known parameter names that had a value.
    pub parameters_set: Vec<String>,
}

/// Parse `env` and resolve the connection profile it describes.
pub fn describe_environment(env: &BTreeMap<String, String>) -> InfraResult<EnvironmentSummary> {
    let parsed = HarnessEnv::from_map(env).map_err(ErrorEnvelope::from)?;
    let parameters_set = backup_harness_config::KNOWN_ENV_VARS
        .iter()
        .filter(|name| env.get(**name).is_some_and(|value| !value.trim().is_empty()))
        .map(|name| (*name).to_string())
        .collect();
    Ok(EnvironmentSummary {
        profile: resolve_connection_profile(&parsed),
        parameters_set,
    })
}
