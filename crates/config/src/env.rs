//! Environment variable parsing and env-to-config merging.
//!
//! This module keeps env parsing:
//! - strict (invalid values fail fast)
//! - safe (secret values are redacted in error metadata)
//!
//! Two families of variables are read. The CI job parameters (`qa_environment`,
//! `ASDB_IP`, `LOCAL_TLS_ENABLED`, ...) describe the cluster under test and feed
//! [`crate::resolve_connection_profile`]. The `BH_*` variables override fields
//! of [`HarnessConfig`].

use crate::schema::{HarnessConfig, LogFormat, ValidatedHarnessConfig};
use backup_harness_shared::{ErrorCode, ErrorEnvelope, REDACTED_VALUE, SecretString, is_secret_key};
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

/// Env var: target environment; `GCP` selects the cloud cluster.
pub const ENV_QA_ENVIRONMENT: &str = "qa_environment";
/// Env var: workspace name used in the cloud cluster host.
pub const ENV_WORKSPACE: &str = "ENV_WORKSPACE";
/// Env var: `true` when three local nodes are addressed explicitly.
pub const ENV_LOCAL_MULTI_NODE: &str = "IS_RUNNING_ON_LOCAL_3_NODES_ENV";
/// Env var: seed host of the multi-node cluster.
pub const ENV_ASDB_IP: &str = "ASDB_IP";
/// Env var: service port of the multi-node cluster.
pub const ENV_ASDB_PORT: &str = "ASDB_PORT";
/// Env var: database user.
pub const ENV_ASDB_USER: &str = "ASDB_USER";
/// Env var: database password.
pub const ENV_ASDB_PASSWORD: &str = "ASDB_PASSWORD";
/// Env var: TLS on the multi-node cluster.
pub const ENV_LOCAL_TLS_ENABLED: &str = "LOCAL_TLS_ENABLED";
/// Env var: TLS on the single local node.
pub const ENV_TLS_ENABLED: &str = "TLS_ENABLED";
/// Env var: host of the single local node.
pub const ENV_AEROSPIKE_SOURCE_IP: &str = "AEROSPIKE_SOURCE_IP";
/// Env var: CA bundle for TLS connections.
pub const ENV_CA_PEM_PATH: &str = "CA_AEROSPIKE_COM_PEM_PATH";
/// Env var: gateway address the XDR source uses to reach the tools.
pub const ENV_LOCAL_SLAVE_GATEWAY: &str = "LOCAL_SLAVE_GATEWAY";
/// Env var: secret agent host (an `http://` prefix is tolerated).
pub const ENV_SECRET_AGENT_IP: &str = "SECRET_AGENT_IP";
/// Env var: secret agent port.
pub const ENV_SECRET_AGENT_PORT: &str = "SECRET_AGENT_PORT";
/// Env var: service account key for GCS targets.
pub const ENV_GCP_SA_KEY_FILE: &str = "GCP_SA_KEY_FILE";
/// Env var: `asbackup --parallel`.
pub const ENV_BACKUP_PARALLEL: &str = "BACKUP_PARALLEL";
/// Env var: `asrestore --parallel`.
pub const ENV_RESTORE_PARALLEL: &str = "RESTORE_PARALLEL";
/// Env var: `asrestore --parallel` (CI parameter spelling).
pub const ENV_RESTORE_PARALLEL_ALIAS: &str = "CONFIG_RESTORE_PARALLEL";

/// Env var: backup service base URL.
pub const ENV_BACKUP_SERVICE_URL: &str = "BH_BACKUP_SERVICE_URL";
/// Env var: backup service base URL (CI parameter spelling).
pub const ENV_BACKUP_SERVICE_URL_ALIAS: &str = "BACKUP_SERVICE_URL";
/// Env var: bearer token for the backup service.
pub const ENV_BACKUP_SERVICE_TOKEN: &str = "BH_BACKUP_SERVICE_TOKEN";
/// Env var: backup service request timeout in milliseconds.
pub const ENV_BACKUP_SERVICE_TIMEOUT_MS: &str = "BH_BACKUP_SERVICE_TIMEOUT_MS";
/// Env var: backup service retry attempts.
pub const ENV_BACKUP_SERVICE_RETRY_MAX_ATTEMPTS: &str = "BH_BACKUP_SERVICE_RETRY_MAX_ATTEMPTS";
/// Env var: subprocess timeout in milliseconds.
pub const ENV_PROCESS_TIMEOUT_MS: &str = "BH_PROCESS_TIMEOUT_MS";
/// Env var: `asbackup` working directory.
pub const ENV_ASBACKUP_DIR: &str = "BH_ASBACKUP_DIR";
/// Env var: `asrestore` working directory.
pub const ENV_ASRESTORE_DIR: &str = "BH_ASRESTORE_DIR";
/// Env var: classic tools working directory.
pub const ENV_ABS_TOOLS_DIR: &str = "BH_ABS_TOOLS_DIR";
/// Env var: parent of relative backup directories.
pub const ENV_BACKUP_ROOT: &str = "BH_BACKUP_ROOT";
/// Env var: log format (`text` or `json`).
pub const ENV_LOG_FORMAT: &str = "BH_LOG_FORMAT";
/// Env var: minimum log level.
pub const ENV_LOG_LEVEL: &str = "BH_LOG_LEVEL";
/// Env var: IANA zone for start times with an unknown zone token.
pub const ENV_REPORT_FALLBACK_ZONE: &str = "BH_REPORT_FALLBACK_ZONE";

/// Every variable [`HarnessEnv`] reads.
pub const KNOWN_ENV_VARS: &[&str] = &[
    ENV_QA_ENVIRONMENT,
    ENV_WORKSPACE,
    ENV_LOCAL_MULTI_NODE,
    ENV_ASDB_IP,
    ENV_ASDB_PORT,
    ENV_ASDB_USER,
    ENV_ASDB_PASSWORD,
    ENV_LOCAL_TLS_ENABLED,
    ENV_TLS_ENABLED,
    ENV_AEROSPIKE_SOURCE_IP,
    ENV_CA_PEM_PATH,
    ENV_LOCAL_SLAVE_GATEWAY,
    ENV_SECRET_AGENT_IP,
    ENV_SECRET_AGENT_PORT,
    ENV_GCP_SA_KEY_FILE,
    ENV_BACKUP_PARALLEL,
    ENV_RESTORE_PARALLEL,
    ENV_RESTORE_PARALLEL_ALIAS,
    ENV_BACKUP_SERVICE_URL,
    ENV_BACKUP_SERVICE_URL_ALIAS,
    ENV_BACKUP_SERVICE_TOKEN,
    ENV_BACKUP_SERVICE_TIMEOUT_MS,
    ENV_BACKUP_SERVICE_RETRY_MAX_ATTEMPTS,
    ENV_PROCESS_TIMEOUT_MS,
    ENV_ASBACKUP_DIR,
    ENV_ASRESTORE_DIR,
    ENV_ABS_TOOLS_DIR,
    ENV_BACKUP_ROOT,
    ENV_LOG_FORMAT,
    ENV_LOG_LEVEL,
    ENV_REPORT_FALLBACK_ZONE,
];

/// Typed env-derived parameters and config overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarnessEnv {
    /// Raw `qa_environment` value.
    pub qa_environment: Option<Box<str>>,
    /// Cloud workspace name.
    pub workspace: Option<Box<str>>,
    /// Three local nodes addressed explicitly.
    pub local_multi_node: Option<bool>,
    /// Multi-node seed host.
    pub asdb_ip: Option<Box<str>>,
    /// Multi-node service port.
    pub asdb_port: Option<u16>,
    /// Database user.
    pub asdb_user: Option<Box<str>>,
    /// Database password.
    pub asdb_password: Option<SecretString>,
    /// TLS on the multi-node cluster.
    pub local_tls_enabled: Option<bool>,
    /// TLS on the single local node.
    pub tls_enabled: Option<bool>,
    /// Single local node host.
    pub aerospike_source_ip: Option<Box<str>>,
    /// CA bundle for TLS.
    pub ca_pem_path: Option<Box<str>>,
    /// XDR gateway address.
    pub local_slave_gateway: Option<Box<str>>,
    /// Secret agent host.
    pub secret_agent_ip: Option<Box<str>>,
    /// Secret agent port.
    pub secret_agent_port: Option<u16>,
    /// GCS service account key path.
    pub gcp_sa_key_file: Option<Box<str>>,
    /// Bearer token for the backup service.
    pub backup_service_token: Option<SecretString>,

    /// Override for `commands.backupParallel`.
    pub backup_parallel: Option<u32>,
    /// Override for `commands.restoreParallel`.
    pub restore_parallel: Option<u32>,
    /// Override for `backupService.baseUrl`.
    pub backup_service_url: Option<Box<str>>,
    /// Override for `backupService.timeoutMs`.
    pub backup_service_timeout_ms: Option<u64>,
    /// Override for `backupService.retry.maxAttempts`.
    pub backup_service_retry_max_attempts: Option<u32>,
    /// Override for `process.timeoutMs`.
    pub process_timeout_ms: Option<u64>,
    /// Override for `paths.asbackupDir`.
    pub asbackup_dir: Option<Box<str>>,
    /// Override for `paths.asrestoreDir`.
    pub asrestore_dir: Option<Box<str>>,
    /// Override for `paths.absToolsDir`.
    pub abs_tools_dir: Option<Box<str>>,
    /// Override for `paths.backupRoot`.
    pub backup_root: Option<Box<str>>,
    /// Override for `logging.format`.
    pub log_format: Option<LogFormat>,
    /// Override for `logging.level`.
    pub log_level: Option<Box<str>>,
    /// Override for `report.fallbackTimeZone`.
    pub report_fallback_zone: Option<Box<str>>,
}

impl HarnessEnv {
    /// Parse env values from a key/value map (useful for tests and fixtures).
    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self, EnvParseError> {
        Ok(Self {
            qa_environment: parse_optional_trimmed_string(map, ENV_QA_ENVIRONMENT)?,
            workspace: parse_optional_trimmed_string(map, ENV_WORKSPACE)?,
            local_multi_node: parse_optional_bool(map, ENV_LOCAL_MULTI_NODE)?,
            asdb_ip: parse_optional_trimmed_string(map, ENV_ASDB_IP)?,
            asdb_port: parse_optional_u16(map, ENV_ASDB_PORT)?,
            asdb_user: parse_optional_trimmed_string(map, ENV_ASDB_USER)?,
            asdb_password: parse_optional_secret(map, ENV_ASDB_PASSWORD)?,
            local_tls_enabled: parse_optional_bool(map, ENV_LOCAL_TLS_ENABLED)?,
            tls_enabled: parse_optional_bool(map, ENV_TLS_ENABLED)?,
            aerospike_source_ip: parse_optional_trimmed_string(map, ENV_AEROSPIKE_SOURCE_IP)?,
            ca_pem_path: parse_optional_trimmed_string(map, ENV_CA_PEM_PATH)?,
            local_slave_gateway: parse_optional_trimmed_string(map, ENV_LOCAL_SLAVE_GATEWAY)?,
            secret_agent_ip: parse_optional_trimmed_string(map, ENV_SECRET_AGENT_IP)?,
            secret_agent_port: parse_optional_u16(map, ENV_SECRET_AGENT_PORT)?,
            gcp_sa_key_file: parse_optional_trimmed_string(map, ENV_GCP_SA_KEY_FILE)?,
            backup_service_token: parse_optional_secret(map, ENV_BACKUP_SERVICE_TOKEN)?,
            backup_parallel: parse_optional_u32(map, ENV_BACKUP_PARALLEL)?,
            restore_parallel: parse_optional_u32_any(
                map,
                &[ENV_RESTORE_PARALLEL, ENV_RESTORE_PARALLEL_ALIAS],
            )?,
            backup_service_url: parse_optional_url_string_any(
                map,
                &[ENV_BACKUP_SERVICE_URL, ENV_BACKUP_SERVICE_URL_ALIAS],
            )?,
            backup_service_timeout_ms: parse_optional_u64(map, ENV_BACKUP_SERVICE_TIMEOUT_MS)?,
            backup_service_retry_max_attempts: parse_optional_u32(
                map,
                ENV_BACKUP_SERVICE_RETRY_MAX_ATTEMPTS,
            )?,
            process_timeout_ms: parse_optional_u64(map, ENV_PROCESS_TIMEOUT_MS)?,
            asbackup_dir: parse_optional_trimmed_string(map, ENV_ASBACKUP_DIR)?,
            asrestore_dir: parse_optional_trimmed_string(map, ENV_ASRESTORE_DIR)?,
            abs_tools_dir: parse_optional_trimmed_string(map, ENV_ABS_TOOLS_DIR)?,
            backup_root: parse_optional_trimmed_string(map, ENV_BACKUP_ROOT)?,
            log_format: parse_optional_log_format(map, ENV_LOG_FORMAT)?,
            log_level: parse_optional_trimmed_string(map, ENV_LOG_LEVEL)?,
            report_fallback_zone: parse_optional_trimmed_string(map, ENV_REPORT_FALLBACK_ZONE)?,
        })
    }

    /// Parse env values from the process environment.
    pub fn from_std_env() -> Result<Self, EnvParseError> {
        Self::from_map(&std_env_map())
    }
}

/// Snapshot of every [`KNOWN_ENV_VARS`] entry present in the process environment.
#[must_use]
pub fn std_env_map() -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for name in KNOWN_ENV_VARS {
        if let Ok(value) = std::env::var(name) {
            map.insert((*name).to_string(), value);
        }
    }
    map
}

/// Apply env overrides to a base config (env wins over file/default values).
pub fn apply_env_overrides(
    base: HarnessConfig,
    env: &HarnessEnv,
) -> Result<ValidatedHarnessConfig, ErrorEnvelope> {
    let mut config = base;
    apply_paths_env_overrides(&mut config, env);
    apply_runtime_env_overrides(&mut config, env);

    config.validate_and_normalize().map_err(Into::into)
}

fn apply_paths_env_overrides(config: &mut HarnessConfig, env: &HarnessEnv) {
    set_box_str(&mut config.paths.asbackup_dir, env.asbackup_dir.as_deref());
    set_box_str(&mut config.paths.asrestore_dir, env.asrestore_dir.as_deref());
    set_box_str(&mut config.paths.abs_tools_dir, env.abs_tools_dir.as_deref());
    set_box_str(&mut config.paths.backup_root, env.backup_root.as_deref());
}

fn apply_runtime_env_overrides(config: &mut HarnessConfig, env: &HarnessEnv) {
    if env.process_timeout_ms.is_some() {
        config.process.timeout_ms = env.process_timeout_ms;
    }
    if let Some(url) = env.backup_service_url.as_deref() {
        config.backup_service.base_url = Some(url.into());
    }
    set_copy(
        &mut config.backup_service.timeout_ms,
        env.backup_service_timeout_ms,
    );
    set_copy(
        &mut config.backup_service.retry.max_attempts,
        env.backup_service_retry_max_attempts,
    );
    set_copy(&mut config.commands.backup_parallel, env.backup_parallel);
    set_copy(&mut config.commands.restore_parallel, env.restore_parallel);
    set_copy(&mut config.logging.format, env.log_format);
    set_box_str(&mut config.logging.level, env.log_level.as_deref());
    set_box_str(
        &mut config.report.fallback_time_zone,
        env.report_fallback_zone.as_deref(),
    );
}

fn set_copy<T: Copy>(field: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *field = value;
    }
}

fn set_box_str(field: &mut Box<str>, value: Option<&str>) {
    if let Some(value) = value {
        *field = value.into();
    }
}

/// Validation failures when parsing env variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvParseError {
    /// An env var was present but empty after trimming.
    EmptyValue {
        /// Env var name.
        var: &'static str,
    },
    /// A secret env var was present but empty after trimming.
    EmptySecret {
        /// Env var name.
        var: &'static str,
    },
    /// Boolean env var had an invalid value.
    InvalidBool {
        /// Env var name.
        var: &'static str,
        /// Raw input value.
        value: String,
    },
    /// Integer env var had an invalid value.
    InvalidInt {
        /// Env var name.
        var: &'static str,
        /// Raw input value.
        value: String,
    },
    /// URL env var had an invalid value.
    InvalidUrl {
        /// Env var name.
        var: &'static str,
        /// Raw input value.
        value: String,
    },
    /// Enum env var had an invalid value.
    InvalidEnum {
        /// Env var name.
        var: &'static str,
        /// Raw input value.
        value: String,
    },
}

impl EnvParseError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::EmptyValue { .. } | Self::EmptySecret { .. } => {
                ErrorCode::new("config", "empty_env_var")
            },
            Self::InvalidBool { .. } => ErrorCode::new("config", "invalid_env_bool"),
            Self::InvalidInt { .. } => ErrorCode::new("config", "invalid_env_int"),
            Self::InvalidUrl { .. } => ErrorCode::new("config", "invalid_env_url"),
            Self::InvalidEnum { .. } => ErrorCode::new("config", "invalid_env_enum"),
        }
    }
}

impl fmt::Display for EnvParseError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyValue { var } | Self::EmptySecret { var } => {
                write!(formatter, "{var} must be non-empty")
            },
            Self::InvalidBool { var, .. } => write!(formatter, "{var} must be a boolean"),
            Self::InvalidInt { var, .. } => write!(formatter, "{var} must be an integer"),
            Self::InvalidUrl { var, .. } => write!(formatter, "{var} must be a valid URL"),
            Self::InvalidEnum { var, .. } => write!(formatter, "{var} has an unsupported value"),
        }
    }
}

impl std::error::Error for EnvParseError {}

impl From<EnvParseError> for ErrorEnvelope {
    fn from(error: EnvParseError) -> Self {
        let code = error.error_code();
        let message = error.to_string();
        let envelope = Self::expected(code, message);

        match error {
            EnvParseError::EmptyValue { var } | EnvParseError::EmptySecret { var } => {
                envelope.with_metadata("env_var", var)
            },
            EnvParseError::InvalidBool { var, value }
            | EnvParseError::InvalidInt { var, value }
            | EnvParseError::InvalidUrl { var, value }
            | EnvParseError::InvalidEnum { var, value } => envelope
                .with_metadata("env_var", var)
                .with_metadata("value", redact_value(var, &value)),
        }
    }
}

fn parse_optional_trimmed_string(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<Box<str>>, EnvParseError> {
    let Some(raw) = map.get(var) else {
        return Ok(None);
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(EnvParseError::EmptyValue { var });
    }

    Ok(Some(trimmed.to_owned().into_boxed_str()))
}

fn parse_optional_secret(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<SecretString>, EnvParseError> {
    let Some(raw) = map.get(var) else {
        return Ok(None);
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(EnvParseError::EmptySecret { var });
    }

    Ok(Some(SecretString::new(trimmed.to_owned())))
}

fn parse_optional_number<T: std::str::FromStr>(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<T>, EnvParseError> {
    let Some(raw) = map.get(var) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(EnvParseError::EmptyValue { var });
    }

    trimmed
        .parse::<T>()
        .map(Some)
        .map_err(|_| EnvParseError::InvalidInt {
            var,
            value: raw.clone(),
        })
}

fn parse_optional_u64(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<u64>, EnvParseError> {
    parse_optional_number(map, var)
}

fn parse_optional_u32(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<u32>, EnvParseError> {
    parse_optional_number(map, var)
}

fn parse_optional_u16(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<u16>, EnvParseError> {
    parse_optional_number(map, var)
}

fn parse_optional_u32_any(
    map: &BTreeMap<String, String>,
    vars: &[&'static str],
) -> Result<Option<u32>, EnvParseError> {
    for var in vars {
        if map.contains_key(*var) {
            return parse_optional_u32(map, var);
        }
    }
    Ok(None)
}

fn parse_optional_bool(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<bool>, EnvParseError> {
    let Some(raw) = map.get(var) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(EnvParseError::EmptyValue { var });
    }

    match trimmed.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(Some(true)),
        "false" | "0" | "no" | "off" => Ok(Some(false)),
        _ => Err(EnvParseError::InvalidBool {
            var,
            value: raw.clone(),
        }),
    }
}

fn parse_optional_log_format(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<LogFormat>, EnvParseError> {
    let Some(raw) = map.get(var) else {
        return Ok(None);
    };
    if raw.trim().is_empty() {
        return Err(EnvParseError::EmptyValue { var });
    }

    LogFormat::parse(raw)
        .map(Some)
        .ok_or_else(|| EnvParseError::InvalidEnum {
            var,
            value: raw.clone(),
        })
}

fn parse_optional_url_string(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<Box<str>>, EnvParseError> {
    let Some(raw) = map.get(var) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(EnvParseError::EmptyValue { var });
    }

    let parsed = Url::parse(trimmed).map_err(|_| EnvParseError::InvalidUrl {
        var,
        value: raw.clone(),
    })?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(EnvParseError::InvalidUrl {
            var,
            value: raw.clone(),
        });
    }

    Ok(Some(trimmed.to_owned().into_boxed_str()))
}

fn parse_optional_url_string_any(
    map: &BTreeMap<String, String>,
    vars: &[&'static str],
) -> Result<Option<Box<str>>, EnvParseError> {
    for var in vars {
        if map.contains_key(*var) {
            return parse_optional_url_string(map, var);
        }
    }
    Ok(None)
}

fn redact_value(var: &str, value: &str) -> String {
    if is_secret_key(var) {
        REDACTED_VALUE.to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    fn map_of(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect()
    }

    #[test]
    fn missing_values_default_to_none() -> Result<(), Box<dyn Error>> {
        let env = HarnessEnv::from_map(&BTreeMap::new())?;
        assert_eq!(env, HarnessEnv::default());
        Ok(())
    }

    #[test]
    fn bools_accept_common_spellings() -> Result<(), Box<dyn Error>> {
        for (raw, expected) in [("true", true), ("YES", true), ("1", true), ("off", false)] {
            let env = HarnessEnv::from_map(&map_of(&[(ENV_LOCAL_MULTI_NODE, raw)]))?;
            assert_eq!(env.local_multi_node, Some(expected), "{raw}");
        }
        let error = HarnessEnv::from_map(&map_of(&[(ENV_LOCAL_TLS_ENABLED, "maybe")])).err();
        assert!(matches!(error, Some(EnvParseError::InvalidBool { .. })));
        Ok(())
    }

    #[test]
    fn ports_must_fit_u16() {
        let error = HarnessEnv::from_map(&map_of(&[(ENV_ASDB_PORT, "70000")])).err();
        assert!(matches!(error, Some(EnvParseError::InvalidInt { .. })));
    }

    #[test]
    fn url_validation_accepts_http_and_https() -> Result<(), Box<dyn Error>> {
        let env = HarnessEnv::from_map(&map_of(&[(
            ENV_BACKUP_SERVICE_URL_ALIAS,
            "http://localhost:8080",
        )]))?;
        assert_eq!(
            env.backup_service_url.as_deref(),
            Some("http://localhost:8080")
        );

        let error =
            HarnessEnv::from_map(&map_of(&[(ENV_BACKUP_SERVICE_URL, "ftp://example.com")])).err();
        assert!(matches!(error, Some(EnvParseError::InvalidUrl { .. })));
        Ok(())
    }

    #[test]
    fn primary_name_wins_over_alias() -> Result<(), Box<dyn Error>> {
        let env = HarnessEnv::from_map(&map_of(&[
            (ENV_RESTORE_PARALLEL, "4"),
            (ENV_RESTORE_PARALLEL_ALIAS, "16"),
        ]))?;
        assert_eq!(env.restore_parallel, Some(4));
        Ok(())
    }

    #[test]
    fn secret_values_are_redacted_in_error_metadata() -> Result<(), Box<dyn Error>> {
        let error = HarnessEnv::from_map(&map_of(&[(ENV_BACKUP_SERVICE_TOKEN, "   ")])).err();
        let envelope: ErrorEnvelope = error
            .ok_or_else(|| std::io::Error::other("expected secret error"))?
            .into();

        assert_eq!(envelope.code, ErrorCode::new("config", "empty_env_var"));
        assert_eq!(
            envelope.metadata.get("env_var").map(String::as_str),
            Some(ENV_BACKUP_SERVICE_TOKEN)
        );
        assert!(!envelope.metadata.contains_key("value"));
        Ok(())
    }

    #[test]
    fn env_overrides_win_over_config() -> Result<(), Box<dyn Error>> {
        let env = HarnessEnv::from_map(&map_of(&[
            (ENV_BACKUP_PARALLEL, "16"),
            (ENV_PROCESS_TIMEOUT_MS, "90000"),
            (ENV_LOG_FORMAT, "JSON"),
            (ENV_REPORT_FALLBACK_ZONE, "Europe/Paris"),
        ]))?;
        let config = apply_env_overrides(HarnessConfig::default(), &env)?;
        assert_eq!(config.commands.backup_parallel, 16);
        assert_eq!(config.commands.restore_parallel, 8);
        assert_eq!(config.process.timeout_ms, Some(90_000));
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.fallback_zone(), chrono_tz::Europe::Paris);
        Ok(())
    }

    #[test]
    fn invalid_override_fails_validation() {
        let env = HarnessEnv {
            backup_parallel: Some(0),
            ..HarnessEnv::default()
        };
        let error = apply_env_overrides(HarnessConfig::default(), &env).err();
        assert_eq!(
            error.map(|error| error.code),
            Some(ErrorCode::new("config", "invalid_limit"))
        );
    }
}
