//! # backup-harness-config
//!
//! Configuration schema, CI parameter parsing and environment resolution.
//! This crate depends on `domain` and `shared` only.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

/// `.env` file loading.
pub mod dotenv;
/// Environment variable parsing and merging.
pub mod env;
/// Cluster environment and connection profile resolution.
pub mod environment;
/// Config loading helpers (env + file + overrides).
pub mod load;
/// Configuration schema types and helpers.
pub mod schema;

pub use dotenv::{DotenvError, merge_env_file, read_env_file};
pub use env::{EnvParseError, HarnessEnv, KNOWN_ENV_VARS, apply_env_overrides, std_env_map};
pub use environment::{resolve_connection_profile, resolve_environment};
pub use load::{
    ConfigFormat, collect_env_map, load_harness_config_from_path,
    load_harness_config_from_sources, load_harness_config_std_env, to_pretty_json, to_pretty_toml,
};
pub use schema::{
    BackupServiceConfig, CURRENT_CONFIG_VERSION, CommandsConfig, ConfigSchemaError,
    HarnessConfig, LogFormat, LoggingConfig, PathsConfig, PollWindowConfig, PollingConfig,
    ProcessConfig, ReportConfig, RetryConfig, ValidatedHarnessConfig, harness_config_schema,
    parse_harness_config_json, parse_harness_config_toml,
};

/// Returns the config crate version.
#[must_use]
pub const fn config_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
