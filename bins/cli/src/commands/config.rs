//! `bh config show|check|schema`.

use crate::error::{CliError, ExitCode};
use crate::format::OutputMode;
use crate::{CliOutput, format_error_output, log_info};
use backup_harness_infra::{
    config_schema_json, load_effective_config_json, load_effective_config_toml,
    validate_env_parsing,
};
use std::collections::BTreeMap;
use std::path::Path;

/// Print the effective config: TOML in text mode, JSON otherwise.
pub fn run_config_show(
    mode: OutputMode,
    env: &BTreeMap<String, String>,
    path: Option<&Path>,
) -> Result<CliOutput, CliError> {
    let config_json = match load_effective_config_json(env, path, None) {
        Ok(config) => config,
        Err(error) => return Ok(format_error_output(mode, &error, ExitCode::InvalidInput)),
    };

    let mut stderr = String::new();
    log_info(&mut stderr, "config show completed", mode.no_progress);

    let stdout = if mode.is_ndjson() || mode.is_json() {
        let config_value: serde_json::Value = serde_json::from_str(config_json.trim())?;
        let payload = serde_json::json!({
            "status": "ok",
            "kind": "config",
            "configPath": path.map(|value| value.to_string_lossy().to_string()),
            "effectiveConfig": config_value,
        });
        let mut output = if mode.is_ndjson() {
            serde_json::to_string(&payload)?
        } else {
            serde_json::to_string_pretty(&payload)?
        };
        output.push('\n');
        output
    } else {
        let config_toml = match load_effective_config_toml(env, path, None) {
            Ok(config) => config,
            Err(error) => return Ok(format_error_output(mode, &error, ExitCode::InvalidInput)),
        };
        let mut out = String::from("status: ok\nconfig:\n");
        out.push_str(&config_toml);
        out
    };

    Ok(CliOutput {
        stdout,
        stderr,
        exit_code: ExitCode::Ok,
    })
}

/// Validate env parameters and the config file without printing the config.
pub fn run_config_check(
    mode: OutputMode,
    env: &BTreeMap<String, String>,
    path: Option<&Path>,
) -> Result<CliOutput, CliError> {
    if let Err(error) = validate_env_parsing(env) {
        return Ok(format_error_output(mode, &error, ExitCode::InvalidInput));
    }
    if let Err(error) = load_effective_config_json(env, path, None) {
        return Ok(format_error_output(mode, &error, ExitCode::InvalidInput));
    }

    let mut stderr = String::new();
    log_info(&mut stderr, "config check completed", mode.no_progress);

    let stdout = if mode.is_ndjson() || mode.is_json() {
        let payload = serde_json::json!({
            "status": "ok",
            "kind": "config",
            "configPath": path.map(|value| value.to_string_lossy().to_string()),
        });
        let mut output = if mode.is_ndjson() {
            serde_json::to_string(&payload)?
        } else {
            serde_json::to_string_pretty(&payload)?
        };
        output.push('\n');
        output
    } else {
        path.map_or_else(
            || "status: ok\nconfig: ok\n".to_string(),
            |path| format!("status: ok\nconfig: ok\npath: {}\n", path.to_string_lossy()),
        )
    };

    Ok(CliOutput {
        stdout,
        stderr,
        exit_code: ExitCode::Ok,
    })
}

/// Print the config JSON Schema in every output mode.
pub fn run_config_schema(mode: OutputMode) -> Result<CliOutput, CliError> {
    let schema = match config_schema_json() {
        Ok(schema) => schema,
        Err(error) => return Ok(format_error_output(mode, &error, ExitCode::Internal)),
    };
    Ok(CliOutput {
        stdout: schema,
        stderr: String::new(),
        exit_code: ExitCode::Ok,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::OutputFormat;

    fn mode(format: OutputFormat) -> OutputMode {
        OutputMode {
            format,
            no_progress: true,
        }
    }

    #[test]
    fn show_renders_toml_in_text_mode() -> Result<(), CliError> {
        let env = BTreeMap::from([("BH_BACKUP_ROOT".to_string(), "/srv/backups".to_string())]);
        let output = run_config_show(mode(OutputFormat::Text), &env, None)?;
        assert!(output.stdout.starts_with("status: ok\nconfig:\n"));
        assert!(output.stdout.contains("backupRoot = \"/srv/backups\""));
        Ok(())
    }

    #[test]
    fn check_rejects_bad_env_values() -> Result<(), CliError> {
        let env = BTreeMap::from([("LOCAL_TLS_ENABLED".to_string(), "maybe".to_string())]);
        let output = run_config_check(mode(OutputFormat::Json), &env, None)?;
        assert_eq!(output.exit_code, ExitCode::InvalidInput);
        assert!(output.stdout.contains("\"status\": \"error\""));
        Ok(())
    }
}
