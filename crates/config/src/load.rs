//! Config loading helpers (env + file + overrides).
//!
//! The loader is responsible for deterministic merge order and surfacing
//! user-facing errors as typed `ErrorEnvelope`s.

use crate::dotenv::merge_env_file;
use crate::env::{HarnessEnv, apply_env_overrides, std_env_map};
use crate::schema::{HarnessConfig, ValidatedHarnessConfig};
use backup_harness_shared::{ErrorClass, ErrorCode, ErrorEnvelope};
use std::collections::BTreeMap;
use std::path::Path;

/// Serialization format of a config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.json` (also used when there is no extension).
    Json,
    /// `.toml`.
    Toml,
    /// `.yaml` / `.yml`.
    Yaml,
}

impl ConfigFormat {
    /// Detect the format from a file extension.
    pub fn detect(path: &Path) -> Result<Self, ErrorEnvelope> {
        let ext = path
            .extension()
            .and_then(|value| value.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            None | Some("json") => Ok(Self::Json),
            Some("toml") => Ok(Self::Toml),
            Some("yaml" | "yml") => Ok(Self::Yaml),
            Some(other) => Err(ErrorEnvelope::expected(
                ErrorCode::new("config", "unsupported_format"),
                "unsupported config format; use .json, .toml or .yaml",
            )
            .with_metadata("extension", other.to_string())),
        }
    }
}

/// Load the harness config from sources using a deterministic precedence order.
///
/// Precedence (highest wins):
/// - env overrides (`HarnessEnv`)
/// - overrides JSON (partial config)
/// - config text (file content)
/// - defaults (`HarnessConfig::default()`)
pub fn load_harness_config_from_sources(
    config_text: Option<(&str, ConfigFormat)>,
    overrides_json: Option<&str>,
    env: &HarnessEnv,
) -> Result<ValidatedHarnessConfig, ErrorEnvelope> {
    let mut config = match config_text {
        None => HarnessConfig::default(),
        Some((input, format)) => parse_config_unvalidated(input, format)?,
    };

    if let Some(input) = overrides_json {
        config = apply_overrides_json(config, input)?;
    }

    // env is applied last and also validates/normalizes the resulting config.
    apply_env_overrides(config, env)
}

/// Load the harness config from an optional file path.
pub fn load_harness_config_from_path(
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
    env: &HarnessEnv,
) -> Result<ValidatedHarnessConfig, ErrorEnvelope> {
    match config_path {
        None => load_harness_config_from_sources(None, overrides_json, env),
        Some(path) => {
            let text = read_config_file(path)?;
            let format = ConfigFormat::detect(path)?;
            load_harness_config_from_sources(Some((&text, format)), overrides_json, env)
                .map_err(|error| error.with_metadata("path", path.to_string_lossy().to_string()))
        },
    }
}

/// Collect env parameters: process env first, then absent keys from `env_file`.
pub fn collect_env_map(env_file: Option<&Path>) -> Result<BTreeMap<String, String>, ErrorEnvelope> {
    let mut map = std_env_map();
    if let Some(path) = env_file {
        merge_env_file(&mut map, path)?;
    }
    Ok(map)
}

/// Load env parameters and the harness config from the process environment,
/// an optional `.env` file and an optional config file.
pub fn load_harness_config_std_env(
    config_path: Option<&Path>,
    env_file: Option<&Path>,
    overrides_json: Option<&str>,
) -> Result<(HarnessEnv, ValidatedHarnessConfig), ErrorEnvelope> {
    let map = collect_env_map(env_file)?;
    let env = HarnessEnv::from_map(&map).map_err(ErrorEnvelope::from)?;
    let config = load_harness_config_from_path(config_path, overrides_json, &env)?;
    Ok((env, config))
}

/// Serialize the config as deterministic pretty JSON (with trailing newline).
pub fn to_pretty_json(config: &HarnessConfig) -> Result<String, ErrorEnvelope> {
    let mut output = serde_json::to_string_pretty(config).map_err(|error| {
        ErrorEnvelope::unexpected(
            ErrorCode::internal(),
            format!("failed to serialize config: {error}"),
            ErrorClass::NonRetriable,
        )
    })?;
    output.push('\n');
    Ok(output)
}

/// Serialize the config as deterministic pretty TOML (with trailing newline).
pub fn to_pretty_toml(config: &HarnessConfig) -> Result<String, ErrorEnvelope> {
    let mut output = toml::to_string_pretty(config).map_err(|error| {
        ErrorEnvelope::unexpected(
            ErrorCode::new("config", "serialize_toml"),
            format!("failed to serialize config TOML: {error}"),
            ErrorClass::NonRetriable,
        )
    })?;
    output.push('\n');
    Ok(output)
}

fn parse_config_unvalidated(
    input: &str,
    format: ConfigFormat,
) -> Result<HarnessConfig, ErrorEnvelope> {
    match format {
        ConfigFormat::Json => serde_json::from_str(input).map_err(|error| {
            ErrorEnvelope::expected(
                ErrorCode::new("config", "invalid_json"),
                format!("invalid config JSON: {error}"),
            )
            .with_metadata("source", "config")
        }),
        ConfigFormat::Toml => toml::from_str(input).map_err(|error| {
            ErrorEnvelope::expected(
                ErrorCode::new("config", "invalid_toml"),
                format!("invalid config TOML: {error}"),
            )
            .with_metadata("source", "config")
        }),
        ConfigFormat::Yaml => serde_yaml_ng::from_str(input).map_err(|error| {
            ErrorEnvelope::expected(
                ErrorCode::new("config", "invalid_yaml"),
                format!("invalid config YAML: {error}"),
            )
            .with_metadata("source", "config")
        }),
    }
}

/// Deep-merge a partial JSON object over the config.
///
/// Objects merge key by key; any other value replaces the target. Unknown keys
/// are rejected when the merged document is read back.
fn apply_overrides_json(
    config: HarnessConfig,
    input: &str,
) -> Result<HarnessConfig, ErrorEnvelope> {
    let invalid = |message: String| {
        ErrorEnvelope::expected(ErrorCode::new("config", "invalid_json"), message)
            .with_metadata("source", "overrides")
    };
    let overrides: serde_json::Value = serde_json::from_str(input)
        .map_err(|error| invalid(format!("invalid overrides JSON: {error}")))?;
    if !overrides.is_object() {
        return Err(invalid("overrides JSON must be an object".to_string()));
    }

    let mut merged = serde_json::to_value(&config).map_err(|error| {
        ErrorEnvelope::unexpected(
            ErrorCode::internal(),
            format!("failed to serialize config: {error}"),
            ErrorClass::NonRetriable,
        )
    })?;
    merge_json(&mut merged, overrides);
    serde_json::from_value(merged)
        .map_err(|error| invalid(format!("invalid overrides JSON: {error}")))
}

fn merge_json(target: &mut serde_json::Value, patch: serde_json::Value) {
    match (target, patch) {
        (serde_json::Value::Object(target), serde_json::Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(&key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        target.insert(key, value);
                    },
                }
            }
        },
        (target, patch) => *target = patch,
    }
}

fn read_config_file(path: &Path) -> Result<String, ErrorEnvelope> {
    std::fs::read_to_string(path).map_err(|error| {
        let code = match error.kind() {
            std::io::ErrorKind::NotFound => ErrorCode::new("config", "config_file_not_found"),
            std::io::ErrorKind::PermissionDenied => {
                ErrorCode::new("config", "config_file_permission_denied")
            },
            _ => ErrorCode::new("config", "config_file_io"),
        };

        ErrorEnvelope::expected(code, format!("failed to read config file: {error}"))
            .with_metadata("path", path.to_string_lossy().to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::io::Write;

    #[test]
    fn override_precedence_is_deterministic() -> Result<(), Box<dyn Error>> {
        let config_json = r#"{ "version": 1, "commands": { "backupParallel": 4 } }"#;
        let overrides_json = r#"{ "commands": { "backupParallel": 6, "benchThreads": 5 } }"#;
        let env = HarnessEnv {
            backup_parallel: Some(12),
            ..HarnessEnv::default()
        };

        let config = load_harness_config_from_sources(
            Some((config_json, ConfigFormat::Json)),
            Some(overrides_json),
            &env,
        )?;
        assert_eq!(config.commands.backup_parallel, 12);
        assert_eq!(config.commands.bench_threads, 5);
        assert_eq!(config.commands.restore_parallel, 8);
        Ok(())
    }

    #[test]
    fn serialization_is_deterministic() -> Result<(), Box<dyn Error>> {
        let config = load_harness_config_from_sources(None, None, &HarnessEnv::default())?;
        assert_eq!(to_pretty_json(&config)?, to_pretty_json(&config)?);
        let toml = to_pretty_toml(&config)?;
        assert!(toml.ends_with('\n'));
        let reparsed = load_harness_config_from_sources(
            Some((&toml, ConfigFormat::Toml)),
            None,
            &HarnessEnv::default(),
        )?;
        assert_eq!(reparsed.as_ref(), config.as_ref());
        Ok(())
    }

    #[test]
    fn yaml_files_are_supported() -> Result<(), Box<dyn Error>> {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile()?;
        file.write_all(b"paths:\n  backupRoot: /data\nprocess:\n  timeoutMs: 60000\n")?;
        file.flush()?;

        let config = load_harness_config_from_path(Some(file.path()), None, &HarnessEnv::default())?;
        assert_eq!(&*config.paths.backup_root, "/data");
        assert_eq!(config.process.timeout_ms, Some(60_000));
        Ok(())
    }

    #[test]
    fn unknown_override_keys_fail() -> Result<(), Box<dyn Error>> {
        let error = load_harness_config_from_sources(
            None,
            Some(r#"{ "commands": { "parallelism": 3 } }"#),
            &HarnessEnv::default(),
        )
        .err()
        .ok_or_else(|| std::io::Error::other("expected overrides error"))?;
        assert_eq!(error.code, ErrorCode::new("config", "invalid_json"));
        assert_eq!(
            error.metadata.get("source").map(String::as_str),
            Some("overrides")
        );
        Ok(())
    }

    #[test]
    fn invalid_config_value_overridden_by_valid_env_succeeds() -> Result<(), Box<dyn Error>> {
        let config_json = r#"{ "commands": { "restoreParallel": 0 } }"#;
        let env = HarnessEnv {
            restore_parallel: Some(2),
            ..HarnessEnv::default()
        };
        let config =
            load_harness_config_from_sources(Some((config_json, ConfigFormat::Json)), None, &env)?;
        assert_eq!(config.commands.restore_parallel, 2);
        Ok(())
    }

    #[test]
    fn missing_file_and_unknown_extension_are_expected_errors() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let missing = dir.path().join("absent.toml");
        let error = load_harness_config_from_path(Some(&missing), None, &HarnessEnv::default())
            .err()
            .ok_or_else(|| std::io::Error::other("expected missing file"))?;
        assert_eq!(error.code, ErrorCode::new("config", "config_file_not_found"));

        let ini = dir.path().join("config.ini");
        std::fs::write(&ini, "x=1")?;
        let error = load_harness_config_from_path(Some(&ini), None, &HarnessEnv::default())
            .err()
            .ok_or_else(|| std::io::Error::other("expected unsupported format"))?;
        assert_eq!(error.code, ErrorCode::new("config", "unsupported_format"));
        Ok(())
    }

    #[test]
    fn env_file_fills_absent_parameters() -> Result<(), Box<dyn Error>> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(b"BH_TEST_ONLY_UNUSED=1\nASDB_IP=10.9.8.7\n")?;
        file.flush()?;
        let map = collect_env_map(Some(file.path()))?;
        // ASDB_IP may already be exported in the test environment; either way it is present.
        assert!(map.contains_key("ASDB_IP"));
        assert!(map.contains_key("BH_TEST_ONLY_UNUSED"));
        Ok(())
    }
}
