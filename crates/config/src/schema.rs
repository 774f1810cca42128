//! Harness configuration schema, defaults, validation, and normalization.
//!
//! - Deserialization uses `serde` (JSON, TOML or YAML).
//! - Validation is manual and returns typed errors mapped to `ErrorEnvelope`.
//! - Normalization trims paths and lower-cases enum-like strings.

use backup_harness_domain::ReportOptions;
use backup_harness_shared::{ErrorCode, ErrorEnvelope, PollPolicy, RetryPolicy};
use chrono_tz::Tz;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use url::Url;

/// Sanitizes a URL for error messages by stripping credentials.
fn sanitize_url_for_error(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            if parsed.password().is_some() || !parsed.username().is_empty() {
                if parsed.set_username("").is_err() {
                    return "[invalid url: invalid username]".to_string();
                }
                if parsed.set_password(None).is_err() {
                    return "[invalid url: invalid password]".to_string();
                }
            }
            parsed.to_string()
        },
        Err(error) => format!("[invalid url: {error}]"),
    }
}

/// Current supported configuration schema version.
pub const CURRENT_CONFIG_VERSION: u32 = 1;

/// Directory the `asbackup` CLI is run from.
pub const DEFAULT_ASBACKUP_DIR: &str =
    "../devops/install/cli-backup/aerospike-backup-cli/cmd/asbackup";
/// Directory the `asrestore` CLI is run from.
pub const DEFAULT_ASRESTORE_DIR: &str =
    "../devops/install/cli-backup/aerospike-backup-cli/cmd/asrestore";
/// Directory the classic backup tools are run from.
pub const DEFAULT_ABS_TOOLS_DIR: &str = "../devops/install/abs";
/// Parent of relative backup directories.
pub const DEFAULT_BACKUP_ROOT: &str = "/tmp";
/// Default `--parallel` for backup and restore.
pub const DEFAULT_PARALLEL: u32 = 8;

const PROCESS_TIMEOUT_MIN_MS: u64 = 1_000;
const PROCESS_TIMEOUT_MAX_MS: u64 = 86_400_000;

const POLL_DELAY_MIN_MS: u64 = 0;
const POLL_DELAY_MAX_MS: u64 = 600_000;
const POLL_INTERVAL_MIN_MS: u64 = 10;
const POLL_INTERVAL_MAX_MS: u64 = 600_000;
const POLL_TIMEOUT_MIN_MS: u64 = 100;
const POLL_TIMEOUT_MAX_MS: u64 = 86_400_000;

const SERVICE_TIMEOUT_MIN_MS: u64 = 1_000;
const SERVICE_TIMEOUT_MAX_MS: u64 = 600_000;

const RETRY_MAX_ATTEMPTS_MIN: u32 = 1;
const RETRY_MAX_ATTEMPTS_MAX: u32 = 10;
const RETRY_BASE_DELAY_MIN_MS: u64 = 1;
const RETRY_BASE_DELAY_MAX_MS: u64 = 60_000;
const RETRY_MAX_DELAY_MIN_MS: u64 = 1;
const RETRY_MAX_DELAY_MAX_MS: u64 = 600_000;
const RETRY_JITTER_RATIO_PCT_MIN: u32 = 0;
const RETRY_JITTER_RATIO_PCT_MAX: u32 = 100;

const PARALLEL_MIN: u32 = 1;
const PARALLEL_MAX: u32 = 1_024;
const BENCH_BATCH_SIZE_MIN: u32 = 1;
const BENCH_BATCH_SIZE_MAX: u32 = 100_000;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Top-level harness configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct HarnessConfig {
    /// Schema version for forward-compatible migrations.
    pub version: u32,
    /// Tool locations and the backup root.
    pub paths: PathsConfig,
    /// Subprocess settings.
    pub process: ProcessConfig,
    /// Wait schedules.
    pub polling: PollingConfig,
    /// Backup service client settings.
    pub backup_service: BackupServiceConfig,
    /// Command builder defaults.
    pub commands: CommandsConfig,
    /// Log output.
    pub logging: LoggingConfig,
    /// Report parsing.
    pub report: ReportConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            version: CURRENT_CONFIG_VERSION,
            paths: PathsConfig::default(),
            process: ProcessConfig::default(),
            polling: PollingConfig::default(),
            backup_service: BackupServiceConfig::default(),
            commands: CommandsConfig::default(),
            logging: LoggingConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

impl HarnessConfig {
    /// Validate and normalize the config.
    pub fn validate_and_normalize(mut self) -> Result<ValidatedHarnessConfig, ConfigSchemaError> {
        self.validate_version()?;

        self.paths.normalize_and_validate()?;
        self.process.validate()?;
        self.polling.validate()?;
        self.backup_service.normalize();
        self.backup_service.validate()?;
        self.commands.validate()?;
        self.logging.normalize_and_validate()?;
        let fallback_zone = self.report.normalize_and_parse()?;

        Ok(ValidatedHarnessConfig {
            raw: self,
            fallback_zone,
        })
    }

    const fn validate_version(&self) -> Result<(), ConfigSchemaError> {
        if self.version != CURRENT_CONFIG_VERSION {
            return Err(ConfigSchemaError::UnsupportedVersion {
                found: self.version,
                supported: CURRENT_CONFIG_VERSION,
            });
        }
        Ok(())
    }
}

/// Validated config wrapper carrying parsed values.
#[derive(Debug, Clone)]
pub struct ValidatedHarnessConfig {
    raw: HarnessConfig,
    fallback_zone: Tz,
}

impl ValidatedHarnessConfig {
    /// Zone applied to report start times with an unknown zone token.
    #[must_use]
    pub const fn fallback_zone(&self) -> Tz {
        self.fallback_zone
    }

    /// Report parser options derived from the config.
    #[must_use]
    pub const fn report_options(&self, ignore_errors: bool) -> ReportOptions {
        ReportOptions {
            ignore_errors,
            fallback_zone: self.fallback_zone,
        }
    }

    /// Subprocess timeout, if one is configured.
    #[must_use]
    pub fn process_timeout(&self) -> Option<Duration> {
        self.raw.process.timeout_ms.map(Duration::from_millis)
    }

    /// Borrow the raw config.
    #[must_use]
    pub const fn as_ref(&self) -> &HarnessConfig {
        &self.raw
    }

    /// Consume the wrapper and return the raw config.
    #[must_use]
    pub fn into_inner(self) -> HarnessConfig {
        self.raw
    }
}

impl AsRef<HarnessConfig> for ValidatedHarnessConfig {
    fn as_ref(&self) -> &HarnessConfig {
        &self.raw
    }
}

impl std::ops::Deref for ValidatedHarnessConfig {
    type Target = HarnessConfig;

    fn deref(&self) -> &Self::Target {
        &self.raw
    }
}

/// Parse a harness config from a JSON string, applying validation and normalization.
pub fn parse_harness_config_json(input: &str) -> Result<ValidatedHarnessConfig, ErrorEnvelope> {
    let config: HarnessConfig = serde_json::from_str(input).map_err(|error| {
        ErrorEnvelope::expected(
            ErrorCode::new("config", "invalid_json"),
            format!("invalid config JSON: {error}"),
        )
    })?;

    config.validate_and_normalize().map_err(Into::into)
}

/// Parse a harness config from a TOML string, applying validation and normalization.
pub fn parse_harness_config_toml(input: &str) -> Result<ValidatedHarnessConfig, ErrorEnvelope> {
    let config: HarnessConfig = toml::from_str(input).map_err(|error| {
        ErrorEnvelope::expected(
            ErrorCode::new("config", "invalid_toml"),
            format!("invalid config TOML: {error}"),
        )
    })?;

    config.validate_and_normalize().map_err(Into::into)
}

/// JSON Schema describing [`HarnessConfig`].
#[must_use]
pub fn harness_config_schema() -> schemars::Schema {
    schemars::schema_for!(HarnessConfig)
}

/// Tool locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct PathsConfig {
    /// Working directory for `asbackup`.
    pub asbackup_dir: Box<str>,
    /// Working directory for `asrestore`.
    pub asrestore_dir: Box<str>,
    /// Working directory for the classic tools.
    pub abs_tools_dir: Box<str>,
    /// Parent of relative backup directories.
    pub backup_root: Box<str>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            asbackup_dir: DEFAULT_ASBACKUP_DIR.into(),
            asrestore_dir: DEFAULT_ASRESTORE_DIR.into(),
            abs_tools_dir: DEFAULT_ABS_TOOLS_DIR.into(),
            backup_root: DEFAULT_BACKUP_ROOT.into(),
        }
    }
}

impl PathsConfig {
    fn normalize_and_validate(&mut self) -> Result<(), ConfigSchemaError> {
        for (field, value) in [
            ("asbackupDir", &mut self.asbackup_dir),
            ("asrestoreDir", &mut self.asrestore_dir),
            ("absToolsDir", &mut self.abs_tools_dir),
            ("backupRoot", &mut self.backup_root),
        ] {
            normalize_boxed_str(value);
            if value.is_empty() {
                return Err(ConfigSchemaError::EmptyValue {
                    section: "paths",
                    field,
                });
            }
        }
        if self.backup_root.len() > 1 {
            let trimmed = self.backup_root.trim_end_matches('/');
            self.backup_root = trimmed.into();
        }
        Ok(())
    }
}

/// Subprocess settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct ProcessConfig {
    /// Kill tools running longer than this; unbounded when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl ProcessConfig {
    fn validate(&self) -> Result<(), ConfigSchemaError> {
        if let Some(timeout_ms) = self.timeout_ms {
            validate_timeout_ms(
                "process",
                "timeoutMs",
                timeout_ms,
                PROCESS_TIMEOUT_MIN_MS,
                PROCESS_TIMEOUT_MAX_MS,
            )?;
        }
        Ok(())
    }
}

/// One polling schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PollWindowConfig {
    /// Delay before the first probe (ms).
    pub delay_ms: u64,
    /// Delay between probes (ms).
    pub interval_ms: u64,
    /// Upper bound for the whole wait (ms).
    pub timeout_ms: u64,
}

impl PollWindowConfig {
    const fn new(delay_ms: u64, interval_ms: u64, timeout_ms: u64) -> Self {
        Self {
            delay_ms,
            interval_ms,
            timeout_ms,
        }
    }

    /// Runtime polling policy.
    #[must_use]
    pub const fn policy(&self) -> PollPolicy {
        PollPolicy::new(
            Duration::from_millis(self.delay_ms),
            Duration::from_millis(self.interval_ms),
            Duration::from_millis(self.timeout_ms),
        )
    }

    fn validate(&self, section: &'static str) -> Result<(), ConfigSchemaError> {
        validate_timeout_ms(
            section,
            "delayMs",
            self.delay_ms,
            POLL_DELAY_MIN_MS,
            POLL_DELAY_MAX_MS,
        )?;
        validate_timeout_ms(
            section,
            "intervalMs",
            self.interval_ms,
            POLL_INTERVAL_MIN_MS,
            POLL_INTERVAL_MAX_MS,
        )?;
        validate_timeout_ms(
            section,
            "timeoutMs",
            self.timeout_ms,
            POLL_TIMEOUT_MIN_MS,
            POLL_TIMEOUT_MAX_MS,
        )
    }
}

/// Wait schedules for the scenario stages and service jobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct PollingConfig {
    /// Waiting for seeded records to become visible.
    pub seed: PollWindowConfig,
    /// Waiting for a truncated set to empty.
    pub truncate: PollWindowConfig,
    /// Waiting for restored records to become visible.
    pub restore: PollWindowConfig,
    /// Waiting for a service job to leave `RUNNING`.
    pub job: PollWindowConfig,
    /// Waiting for a service restore to finish.
    pub restore_job: PollWindowConfig,
    /// Probe interval while waiting for a service restore to fail (ms).
    pub restore_failure_interval_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            seed: PollWindowConfig::new(0, 1_000, 60_000),
            truncate: PollWindowConfig::new(500, 3_000, 30_000),
            restore: PollWindowConfig::new(0, 1_000, 60_000),
            job: PollWindowConfig::new(0, 1_000, 120_000),
            restore_job: PollWindowConfig::new(0, 1_000, 120_000),
            restore_failure_interval_ms: 2_000,
        }
    }
}

impl PollingConfig {
    fn validate(&self) -> Result<(), ConfigSchemaError> {
        self.seed.validate("polling.seed")?;
        self.truncate.validate("polling.truncate")?;
        self.restore.validate("polling.restore")?;
        self.job.validate("polling.job")?;
        self.restore_job.validate("polling.restoreJob")?;
        validate_timeout_ms(
            "polling",
            "restoreFailureIntervalMs",
            self.restore_failure_interval_ms,
            POLL_INTERVAL_MIN_MS,
            POLL_INTERVAL_MAX_MS,
        )
    }

    /// Schedule for [`PollingConfig::restore_failure_interval_ms`] bounded like `restore_job`.
    #[must_use]
    pub const fn restore_failure(&self) -> PollPolicy {
        PollPolicy::new(
            Duration::ZERO,
            Duration::from_millis(self.restore_failure_interval_ms),
            Duration::from_millis(self.restore_job.timeout_ms),
        )
    }
}

/// Backup service REST client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct BackupServiceConfig {
    /// Service base URL; job commands are unavailable without one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<Box<str>>,
    /// Per-request timeout (ms).
    pub timeout_ms: u64,
    /// Retry policy for transient failures.
    pub retry: RetryConfig,
}

impl Default for BackupServiceConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: 30_000,
            retry: RetryConfig::default(),
        }
    }
}

impl BackupServiceConfig {
    fn normalize(&mut self) {
        normalize_optional_trimmed(&mut self.base_url);
        if let Some(url) = self.base_url.as_mut() {
            let trimmed = url.trim_end_matches('/');
            *url = trimmed.into();
        }
    }

    fn validate(&self) -> Result<(), ConfigSchemaError> {
        if let Some(url) = self.base_url.as_deref() {
            validate_http_url("backupService", "baseUrl", url)?;
        }
        validate_timeout_ms(
            "backupService",
            "timeoutMs",
            self.timeout_ms,
            SERVICE_TIMEOUT_MIN_MS,
            SERVICE_TIMEOUT_MAX_MS,
        )?;
        self.retry.validate()
    }
}

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct RetryConfig {
    /// Maximum attempts (including the first attempt).
    pub max_attempts: u32,
    /// Base delay for exponential backoff (ms).
    pub base_delay_ms: u64,
    /// Maximum delay cap for backoff (ms).
    pub max_delay_ms: u64,
    /// Jitter ratio as a percentage (0..=100).
    pub jitter_ratio_pct: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 250,
            max_delay_ms: 5_000,
            jitter_ratio_pct: 20,
        }
    }
}

impl RetryConfig {
    /// Runtime retry policy.
    #[must_use]
    pub const fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay_ms: self.base_delay_ms,
            max_delay_ms: self.max_delay_ms,
            jitter_ratio_pct: self.jitter_ratio_pct,
        }
    }

    fn validate(&self) -> Result<(), ConfigSchemaError> {
        validate_limit_u32(
            "backupService.retry",
            "maxAttempts",
            self.max_attempts,
            RETRY_MAX_ATTEMPTS_MIN,
            RETRY_MAX_ATTEMPTS_MAX,
        )?;
        validate_timeout_ms(
            "backupService.retry",
            "baseDelayMs",
            self.base_delay_ms,
            RETRY_BASE_DELAY_MIN_MS,
            RETRY_BASE_DELAY_MAX_MS,
        )?;
        validate_timeout_ms(
            "backupService.retry",
            "maxDelayMs",
            self.max_delay_ms,
            RETRY_MAX_DELAY_MIN_MS,
            RETRY_MAX_DELAY_MAX_MS,
        )?;
        if self.max_delay_ms < self.base_delay_ms {
            return Err(ConfigSchemaError::LimitOutOfRange {
                section: "backupService.retry",
                field: "maxDelayMs",
                value: self.max_delay_ms,
                min: self.base_delay_ms,
                max: RETRY_MAX_DELAY_MAX_MS,
            });
        }
        validate_limit_u32(
            "backupService.retry",
            "jitterRatioPct",
            self.jitter_ratio_pct,
            RETRY_JITTER_RATIO_PCT_MIN,
            RETRY_JITTER_RATIO_PCT_MAX,
        )
    }
}

/// Defaults baked into generated commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct CommandsConfig {
    /// `asbackup --parallel`.
    pub backup_parallel: u32,
    /// `asrestore --parallel`.
    pub restore_parallel: u32,
    /// `asbench --threads`.
    pub bench_threads: u32,
    /// `asbench --batch-size`.
    pub bench_batch_size: u32,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            backup_parallel: DEFAULT_PARALLEL,
            restore_parallel: DEFAULT_PARALLEL,
            bench_threads: 20,
            bench_batch_size: 100,
        }
    }
}

impl CommandsConfig {
    fn validate(&self) -> Result<(), ConfigSchemaError> {
        validate_limit_u32(
            "commands",
            "backupParallel",
            self.backup_parallel,
            PARALLEL_MIN,
            PARALLEL_MAX,
        )?;
        validate_limit_u32(
            "commands",
            "restoreParallel",
            self.restore_parallel,
            PARALLEL_MIN,
            PARALLEL_MAX,
        )?;
        validate_limit_u32(
            "commands",
            "benchThreads",
            self.bench_threads,
            PARALLEL_MIN,
            PARALLEL_MAX,
        )?;
        validate_limit_u32(
            "commands",
            "benchBatchSize",
            self.bench_batch_size,
            BENCH_BATCH_SIZE_MIN,
            BENCH_BATCH_SIZE_MAX,
        )
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    /// Stable identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
        }
    }

    /// Parse a format name (case-insensitive).
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct LoggingConfig {
    /// Line format.
    pub format: LogFormat,
    /// Minimum level (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: Box<str>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            level: "info".into(),
        }
    }
}

impl LoggingConfig {
    fn normalize_and_validate(&mut self) -> Result<(), ConfigSchemaError> {
        let level = self.level.trim().to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigSchemaError::InvalidEnum {
                section: "logging",
                field: "level",
                value: self.level.to_string(),
            });
        }
        self.level = level.into_boxed_str();
        Ok(())
    }
}

/// Report parsing settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct ReportConfig {
    /// IANA zone for start times whose zone token is not recognized.
    pub fallback_time_zone: Box<str>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            fallback_time_zone: "UTC".into(),
        }
    }
}

impl ReportConfig {
    fn normalize_and_parse(&mut self) -> Result<Tz, ConfigSchemaError> {
        normalize_boxed_str(&mut self.fallback_time_zone);
        self.fallback_time_zone
            .parse::<Tz>()
            .map_err(|_| ConfigSchemaError::InvalidEnum {
                section: "report",
                field: "fallbackTimeZone",
                value: self.fallback_time_zone.to_string(),
            })
    }
}

/// Typed validation errors for the configuration schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSchemaError {
    /// The config version is not supported by this binary.
    UnsupportedVersion {
        /// Version found in the config.
        found: u32,
        /// Version supported by this crate.
        supported: u32,
    },
    /// A timeout or delay value is out of bounds.
    TimeoutOutOfRange {
        /// Schema section (e.g. `polling.seed`).
        section: &'static str,
        /// Field name in the config file (e.g. `timeoutMs`).
        field: &'static str,
        /// Value provided (ms).
        value_ms: u64,
        /// Minimum allowed value (ms).
        min_ms: u64,
        /// Maximum allowed value (ms).
        max_ms: u64,
    },
    /// A numeric limit is out of bounds.
    LimitOutOfRange {
        /// Schema section (e.g. `commands`).
        section: &'static str,
        /// Field name in the config file (e.g. `backupParallel`).
        field: &'static str,
        /// Value provided.
        value: u64,
        /// Minimum allowed value.
        min: u64,
        /// Maximum allowed value.
        max: u64,
    },
    /// A URL entry is invalid.
    InvalidUrl {
        /// Schema section (e.g. `backupService`).
        section: &'static str,
        /// Field name in the config file (e.g. `baseUrl`).
        field: &'static str,
        /// Invalid URL value.
        url: String,
    },
    /// A required string is empty after trimming.
    EmptyValue {
        /// Schema section.
        section: &'static str,
        /// Field name in the config file.
        field: &'static str,
    },
    /// A value is not one of the accepted names.
    InvalidEnum {
        /// Schema section.
        section: &'static str,
        /// Field name in the config file.
        field: &'static str,
        /// Value provided.
        value: String,
    },
}

impl ConfigSchemaError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::UnsupportedVersion { .. } => ErrorCode::new("config", "unsupported_version"),
            Self::TimeoutOutOfRange { .. } => ErrorCode::new("config", "invalid_timeout"),
            Self::LimitOutOfRange { .. } => ErrorCode::new("config", "invalid_limit"),
            Self::InvalidUrl { .. } => ErrorCode::new("config", "invalid_url"),
            Self::EmptyValue { .. } => ErrorCode::new("config", "empty_value"),
            Self::InvalidEnum { .. } => ErrorCode::new("config", "invalid_enum"),
        }
    }
}

impl fmt::Display for ConfigSchemaError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedVersion { found, supported } => {
                write!(
                    formatter,
                    "unsupported config version: {found} (supported: {supported})"
                )
            },
            Self::TimeoutOutOfRange {
                section,
                field,
                value_ms,
                min_ms,
                max_ms,
            } => write!(
                formatter,
                "{section}.{field} must be within [{min_ms}, {max_ms}] ms (got {value_ms})"
            ),
            Self::LimitOutOfRange {
                section,
                field,
                value,
                min,
                max,
            } => write!(
                formatter,
                "{section}.{field} must be within [{min}, {max}] (got {value})"
            ),
            Self::InvalidUrl { section, field, .. } => {
                write!(formatter, "invalid URL for {section}.{field}")
            },
            Self::EmptyValue { section, field } => {
                write!(formatter, "{section}.{field} must be non-empty")
            },
            Self::InvalidEnum {
                section,
                field,
                value,
            } => write!(formatter, "{section}.{field} has an unsupported value `{value}`"),
        }
    }
}

impl std::error::Error for ConfigSchemaError {}

impl From<ConfigSchemaError> for ErrorEnvelope {
    fn from(error: ConfigSchemaError) -> Self {
        let code = error.error_code();
        let message = error.to_string();
        let mut envelope = Self::expected(code, message);

        match error {
            ConfigSchemaError::UnsupportedVersion { found, supported } => {
                envelope = envelope
                    .with_metadata("found", found.to_string())
                    .with_metadata("supported", supported.to_string());
            },
            ConfigSchemaError::TimeoutOutOfRange {
                section,
                field,
                value_ms,
                min_ms,
                max_ms,
            } => {
                envelope = envelope
                    .with_metadata("section", section)
                    .with_metadata("field", field)
                    .with_metadata("value_ms", value_ms.to_string())
                    .with_metadata("min_ms", min_ms.to_string())
                    .with_metadata("max_ms", max_ms.to_string());
            },
            ConfigSchemaError::LimitOutOfRange {
                section,
                field,
                value,
                min,
                max,
            } => {
                envelope = envelope
                    .with_metadata("section", section)
                    .with_metadata("field", field)
                    .with_metadata("value", value.to_string())
                    .with_metadata("min", min.to_string())
                    .with_metadata("max", max.to_string());
            },
            ConfigSchemaError::InvalidUrl {
                section,
                field,
                url,
            } => {
                envelope = envelope
                    .with_metadata("section", section)
                    .with_metadata("field", field)
                    .with_metadata("url", sanitize_url_for_error(&url));
            },
            ConfigSchemaError::EmptyValue { section, field } => {
                envelope = envelope
                    .with_metadata("section", section)
                    .with_metadata("field", field);
            },
            ConfigSchemaError::InvalidEnum {
                section,
                field,
                value,
            } => {
                envelope = envelope
                    .with_metadata("section", section)
                    .with_metadata("field", field)
                    .with_metadata("value", value);
            },
        }

        envelope
    }
}

const fn validate_timeout_ms(
    section: &'static str,
    field: &'static str,
    value_ms: u64,
    min_ms: u64,
    max_ms: u64,
) -> Result<(), ConfigSchemaError> {
    if value_ms < min_ms || value_ms > max_ms {
        return Err(ConfigSchemaError::TimeoutOutOfRange {
            section,
            field,
            value_ms,
            min_ms,
            max_ms,
        });
    }
    Ok(())
}

fn validate_http_url(
    section: &'static str,
    field: &'static str,
    value: &str,
) -> Result<(), ConfigSchemaError> {
    let parsed = Url::parse(value).map_err(|_| ConfigSchemaError::InvalidUrl {
        section,
        field,
        url: value.to_owned(),
    })?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(ConfigSchemaError::InvalidUrl {
            section,
            field,
            url: value.to_owned(),
        });
    }

    Ok(())
}

fn validate_limit_u32(
    section: &'static str,
    field: &'static str,
    value: u32,
    min: u32,
    max: u32,
) -> Result<(), ConfigSchemaError> {
    if value < min || value > max {
        return Err(ConfigSchemaError::LimitOutOfRange {
            section,
            field,
            value: u64::from(value),
            min: u64::from(min),
            max: u64::from(max),
        });
    }
    Ok(())
}

fn normalize_optional_trimmed(value: &mut Option<Box<str>>) {
    if let Some(inner) = value.as_ref() {
        let trimmed = inner.trim();
        if trimmed.is_empty() {
            *value = None;
        } else if trimmed.len() != inner.len() {
            *value = Some(trimmed.into());
        }
    }
}

fn normalize_boxed_str(value: &mut Box<str>) {
    let trimmed = value.trim();
    if trimmed.len() != value.len() {
        *value = trimmed.into();
    }
}
