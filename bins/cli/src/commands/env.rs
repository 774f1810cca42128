//! `bh env`.

use crate::error::{CliError, ExitCode, infra_exit_code};
use crate::format::OutputMode;
use crate::{CliOutput, format_error_output, success_output};
use backup_harness_infra::describe_environment;
use std::collections::BTreeMap;

/// Show the connection profile resolved from `env`. Secrets print as `<redacted>`.
pub fn run_env(mode: OutputMode, env: &BTreeMap<String, String>) -> Result<CliOutput, CliError> {
    match describe_environment(env) {
        Ok(summary) => success_output(mode, "env", "ok", &summary, ExitCode::Ok),
        Err(error) => Ok(format_error_output(mode, &error, infra_exit_code(&error))),
    }
}
