//! `asbackup` / `asrestore` command handlers.

use crate::error::{CliError, ExitCode, infra_exit_code};
use crate::format::OutputMode;
use crate::{CliOutput, format_error_output, success_output};
use backup_harness_infra::{
    BackupRequest, CommandOutcome, HarnessRuntime, RestoreRequest, ValidateTarget,
    parse_flag_pairs, run_backup_local, run_estimate_local, run_restore_local, run_validate_local,
};
use serde::Serialize;

/// Arguments of `bh backup`.
#[derive(Debug)]
pub struct BackupCommandInput<'a> {
    pub namespace: &'a str,
    pub dir: Option<&'a str>,
    pub sets: &'a [String],
    pub parallel: Option<u32>,
    pub dry_run: bool,
    pub flags: &'a [String],
    pub ignore_errors: bool,
}

/// Arguments of `bh restore`.
#[derive(Debug)]
pub struct RestoreCommandInput<'a> {
    pub namespace: &'a str,
    pub dir: Option<&'a str>,
    pub dry_run: bool,
    pub flags: &'a [String],
    pub ignore_errors: bool,
}

pub fn run_backup(
    mode: OutputMode,
    runtime: &HarnessRuntime,
    input: BackupCommandInput<'_>,
) -> Result<CliOutput, CliError> {
    let flags = match parse_flag_pairs(input.flags) {
        Ok(flags) => flags,
        Err(error) => return Ok(format_error_output(mode, &error, infra_exit_code(&error))),
    };
    let request = BackupRequest {
        namespace: input.namespace.to_string(),
        dir: input.dir.map(str::to_string),
        sets: input.sets.to_vec(),
        parallel: input.parallel,
        flags,
        dry_run: input.dry_run,
        ignore_errors: input.ignore_errors,
    };
    match run_backup_local(runtime, &request) {
        Ok(outcome) => outcome_output(mode, "backup", &outcome),
        Err(error) => Ok(format_error_output(mode, &error, infra_exit_code(&error))),
    }
}

pub fn run_restore(
    mode: OutputMode,
    runtime: &HarnessRuntime,
    input: RestoreCommandInput<'_>,
) -> Result<CliOutput, CliError> {
    let flags = match parse_flag_pairs(input.flags) {
        Ok(flags) => flags,
        Err(error) => return Ok(format_error_output(mode, &error, infra_exit_code(&error))),
    };
    let request = RestoreRequest {
        namespace: input.namespace.to_string(),
        dir: input.dir.map(str::to_string),
        flags,
        dry_run: input.dry_run,
        ignore_errors: input.ignore_errors,
    };
    match run_restore_local(runtime, &request) {
        Ok(outcome) => outcome_output(mode, "restore", &outcome),
        Err(error) => Ok(format_error_output(mode, &error, infra_exit_code(&error))),
    }
}

pub fn run_estimate(
    mode: OutputMode,
    runtime: &HarnessRuntime,
    namespace: &str,
) -> Result<CliOutput, CliError> {
    match run_estimate_local(runtime, namespace) {
        Ok(estimate) => success_output(mode, "estimate", "ok", &estimate, ExitCode::Ok),
        Err(error) => Ok(format_error_output(mode, &error, infra_exit_code(&error))),
    }
}

/// Validate backup files. A report with error markers exits with the failure code.
pub fn run_validate(
    mode: OutputMode,
    runtime: &HarnessRuntime,
    file: Option<&str>,
    dir: Option<&str>,
    dir_list: Option<&[String]>,
) -> Result<CliOutput, CliError> {
    let target = match (file, dir, dir_list) {
        (Some(file), None, None) => ValidateTarget::File(file.to_string()),
        (None, Some(dir), None) => ValidateTarget::Dir(dir.to_string()),
        (None, None, Some(dirs)) if !dirs.is_empty() => ValidateTarget::DirList(dirs.to_vec()),
        _ => {
            return Err(CliError::InvalidInput(
                "pass exactly one of --file, --dir or --dir-list".to_string(),
            ));
        },
    };
    match run_validate_local(runtime, &target) {
        Ok(report) if report.has_errors => {
            success_output(mode, "validation", "failed", &report, ExitCode::Failure)
        },
        Ok(report) => success_output(mode, "validation", "ok", &report, ExitCode::Ok),
        Err(error) => Ok(format_error_output(mode, &error, infra_exit_code(&error))),
    }
}

fn outcome_output<T: Serialize>(
    mode: OutputMode,
    kind: &str,
    outcome: &CommandOutcome<T>,
) -> Result<CliOutput, CliError> {
    let status = match outcome {
        CommandOutcome::Planned { .. } => "planned",
        CommandOutcome::Completed { .. } => "ok",
    };
    success_output(mode, kind, status, outcome, ExitCode::Ok)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::OutputFormat;

    fn runtime() -> Result<HarnessRuntime, Box<dyn std::error::Error>> {
        Ok(HarnessRuntime::load(&Default::default(), None, None)?.with_logger(None))
    }

    fn json_mode() -> OutputMode {
        OutputMode {
            format: OutputFormat::Json,
            no_progress: true,
        }
    }

    #[test]
    fn dry_run_backup_prints_the_planned_command() -> Result<(), Box<dyn std::error::Error>> {
        let flags = vec!["compress=zstd".to_string()];
        let output = run_backup(
            json_mode(),
            &runtime()?,
            BackupCommandInput {
                namespace: "test",
                dir: Some("nightly"),
                sets: &[],
                parallel: Some(8),
                dry_run: true,
                flags: &flags,
                ignore_errors: false,
            },
        )?;
        let value: serde_json::Value = serde_json::from_str(output.stdout.trim())?;
        assert_eq!(value["status"], "planned");
        let command = value["result"]["command"].as_str().unwrap_or_default();
        assert!(command.contains("--parallel 8"), "{command}");
        assert!(command.contains("--compress zstd"), "{command}");
        assert_eq!(output.exit_code, ExitCode::Ok);
        Ok(())
    }

    #[test]
    fn malformed_flags_are_invalid_input() -> Result<(), Box<dyn std::error::Error>> {
        let flags = vec!["compress".to_string()];
        let output = run_restore(
            json_mode(),
            &runtime()?,
            RestoreCommandInput {
                namespace: "test",
                dir: None,
                dry_run: true,
                flags: &flags,
                ignore_errors: false,
            },
        )?;
        assert_eq!(output.exit_code, ExitCode::InvalidInput);
        assert!(output.stdout.contains("core:invalid_input"));
        Ok(())
    }
}
