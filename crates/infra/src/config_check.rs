//! Config loading helpers for CLI surfaces.

use crate::{InfraError, InfraResult};
use backup_harness_config::{
    HarnessEnv, harness_config_schema, load_harness_config_from_path, to_pretty_json,
    to_pretty_toml,
};
use backup_harness_shared::{ErrorClass, ErrorCode};
use std::collections::BTreeMap;
use std::path::Path;

/// Load and validate the effective config, returning deterministic pretty JSON.
pub fn load_effective_config_json(
    env: &BTreeMap<String, String>,
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
) -> InfraResult<String> {
    let env = HarnessEnv::from_map(env).map_err(InfraError::from)?;
    let config = load_harness_config_from_path(config_path, overrides_json, &env)?;
    to_pretty_json(&config)
}

/// Same as [`load_effective_config_json`], rendered as TOML.
pub fn load_effective_config_toml(
    env: &BTreeMap<String, String>,
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
) -> InfraResult<String> {
    let env = HarnessEnv::from_map(env).map_err(InfraError::from)?;
    let config = load_harness_config_from_path(config_path, overrides_json, &env)?;
    to_pretty_toml(&config)
}

/// JSON Schema of the config file, pretty-printed.
pub fn config_schema_json() -> InfraResult<String> {
    let mut output = serde_json::to_string_pretty(&harness_config_schema()).map_err(|error| {
        InfraError::unexpected(
            ErrorCode::internal(),
            format!("failed to serialize config schema: {error}"),
            ErrorClass::NonRetriable,
        )
    })?;
    output.push('\n');
    Ok(output)
}
