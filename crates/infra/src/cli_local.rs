//! Local CLI orchestration helpers.
//!
//! Each entry point builds its ports from a [`HarnessRuntime`], runs the app
//! use case on a current-thread runtime and returns a serializable outcome.

use crate::{HarnessRuntime, InfraError, InfraResult};
use backup_harness_app::{
    BackupRunOptions, CliBackup, CliRestore, CommandLine, Flag, ScenarioInput, run_scenario,
};
use backup_harness_domain::{
    BackupResult, EstimateResult, MutationMode, RestoreResult, ScenarioReport, ValidationReport,
};
use backup_harness_ports::ProcessOutput;
use backup_harness_shared::{ErrorCode, REDACTED, RequestContext};
use serde::Serialize;
use std::future::Future;

/// Result of a command that may only have been planned.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CommandOutcome<T> {
    /// `--dry-run`: the command that would run, password redacted.
    Planned {
        /// Shell form of the command.
        command: String,
    },
    /// The command ran and its report parsed.
    Completed {
        /// Parsed report.
        report: T,
    },
}

/// Inputs of `bh backup`.
#[derive(Debug, Clone, Default)]
pub struct BackupRequest {
    /// Namespace to back up.
    pub namespace: String,
    /// Directory under the backup root; none backs up without `--directory`.
    pub dir: Option<String>,
    /// `--set` filter.
    pub sets: Vec<String>,
    /// `--parallel` override.
    pub parallel: Option<u32>,
    /// Extra `--name value` flags.
    pub flags: Vec<(String, String)>,
    /// Only print the command.
    pub dry_run: bool,
    /// Parse even when the output reports `ERROR`.
    pub ignore_errors: bool,
}

/// Inputs of `bh restore`.
#[derive(Debug, Clone, Default)]
pub struct RestoreRequest {
    /// Namespace to restore into.
    pub namespace: String,
    /// Directory under the backup root.
    pub dir: Option<String>,
    /// Extra `--name value` flags.
    pub flags: Vec<(String, String)>,
    /// Only print the command.
    pub dry_run: bool,
    /// Parse even when the output reports `ERROR`.
    pub ignore_errors: bool,
}

/// Backup files checked by `bh validate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidateTarget {
    /// One backup file.
    File(String),
    /// One backup directory.
    Dir(String),
    /// Several backup directories.
    DirList(Vec<String>),
}

/// Report kinds accepted by `bh parse`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    /// `asbackup` summary.
    Backup,
    /// `asrestore` summary.
    Restore,
    /// `asbackup --estimate` output.
    Estimate,
    /// `asrestore --validate` output.
    Validation,
}

/// A parsed report of any kind.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "report", rename_all = "snake_case")]
pub enum ParsedReport {
    /// Backup summary.
    Backup(BackupResult),
    /// Restore summary.
    Restore(RestoreResult),
    /// Estimate.
    Estimate(EstimateResult),
    /// Validation report.
    Validation(ValidationReport),
}

/// Inputs of `bh scenario run`.
#[derive(Debug, Clone)]
pub struct ScenarioRequest {
    /// Namespace under test.
    pub namespace: String,
    /// Set under test.
    pub set: String,
    /// Records to seed.
    pub records: u64,
    /// How data is disturbed before the restore.
    pub mode: MutationMode,
}

/// Run or plan `asbackup`.
pub fn run_backup_local(
    runtime: &HarnessRuntime,
    request: &BackupRequest,
) -> InfraResult<CommandOutcome<BackupResult>> {
    let settings = runtime.tool_settings();
    let mut backup = match (&request.dir, request.parallel) {
        (Some(dir), Some(parallel)) => {
            CliBackup::on_parallel(&settings, &request.namespace, dir, parallel)
        },
        (Some(dir), None) => CliBackup::on_dir(&settings, &request.namespace, dir),
        (None, parallel) => {
            let backup = CliBackup::on(&settings, &request.namespace);
            match parallel {
                Some(parallel) => backup.replace_flag("parallel", parallel),
                None => backup,
            }
        },
    };
    if !request.sets.is_empty() {
        backup = backup.sets(&request.sets);
    }
    for (name, value) in &request.flags {
        backup = backup.custom_flag(name, value);
    }
    if request.dry_run {
        return Ok(planned(backup.command()));
    }
    let options = BackupRunOptions {
        ignore_errors: request.ignore_errors,
        ..BackupRunOptions::default()
    };
    run_async_with_ctx(RequestContext::new_request(), |ctx| async move {
        let deps = runtime.tool_deps(&ctx);
        let report = backup.run(&ctx, &deps, options).await?;
        Ok(CommandOutcome::Completed { report })
    })
}

/// Run or plan `asrestore`.
pub fn run_restore_local(
    runtime: &HarnessRuntime,
    request: &RestoreRequest,
) -> InfraResult<CommandOutcome<RestoreResult>> {
    let settings = runtime.tool_settings();
    let mut restore = match &request.dir {
        Some(dir) => CliRestore::on_dir(&settings, &request.namespace, &settings.backup_path(dir)),
        None => CliRestore::on(&settings, &request.namespace),
    };
    for (name, value) in &request.flags {
        restore = restore.custom_flag(name, value);
    }
    if request.dry_run {
        return Ok(planned(restore.command()));
    }
    let ignore_errors = request.ignore_errors;
    run_async_with_ctx(RequestContext::new_request(), |ctx| async move {
        let deps = runtime.tool_deps(&ctx);
        let report = restore.run(&ctx, &deps, ignore_errors).await?;
        Ok(CommandOutcome::Completed { report })
    })
}

/// Estimate the backup size of `namespace`.
pub fn run_estimate_local(runtime: &HarnessRuntime, namespace: &str) -> InfraResult<EstimateResult> {
    let backup = CliBackup::on(&runtime.tool_settings(), namespace);
    run_async_with_ctx(RequestContext::new_request(), |ctx| async move {
        let deps = runtime.tool_deps(&ctx);
        backup.estimate(&ctx, &deps, true).await
    })
}

/// Validate backup files with `asrestore --validate`.
pub fn run_validate_local(
    runtime: &HarnessRuntime,
    target: &ValidateTarget,
) -> InfraResult<ValidationReport> {
    let restore = CliRestore::bare(&runtime.tool_settings());
    let restore = match target {
        ValidateTarget::File(file) => restore.validate_file(file),
        ValidateTarget::Dir(dir) => restore.validate_directory(dir),
        ValidateTarget::DirList(dirs) => restore.validate_directory_list(dirs),
    };
    run_async_with_ctx(RequestContext::new_request(), |ctx| async move {
        let deps = runtime.tool_deps(&ctx);
        restore.validate(&ctx, &deps).await
    })
}

/// Parse saved tool output.
///
/// Text without an `Exit Code:` line is treated as the output of a run that
/// exited with 0.
pub fn parse_report(
    runtime: &HarnessRuntime,
    kind: ReportKind,
    text: &str,
    ignore_errors: bool,
) -> InfraResult<ParsedReport> {
    let text = if text.contains("Exit Code:") {
        text.to_string()
    } else {
        ProcessOutput {
            stdout: text.to_string(),
            ..ProcessOutput::default()
        }
        .combined()
    };
    let options = runtime.config().report_options(ignore_errors);
    let parsed = match kind {
        ReportKind::Backup => ParsedReport::Backup(BackupResult::parse(&text, options)?),
        ReportKind::Restore => ParsedReport::Restore(RestoreResult::parse(&text, options)?),
        ReportKind::Estimate => ParsedReport::Estimate(EstimateResult::parse(&text)?),
        ReportKind::Validation => ParsedReport::Validation(ValidationReport::parse(&text)?),
    };
    Ok(parsed)
}

/// Run the seed, backup, disturb, restore and assert scenario.
pub fn run_scenario_local(
    runtime: &HarnessRuntime,
    request: &ScenarioRequest,
) -> InfraResult<ScenarioReport> {
    if request.records == 0 {
        return Err(InfraError::expected(
            ErrorCode::invalid_input(),
            "records must be greater than zero",
        ));
    }
    let mut input = ScenarioInput::new(&request.namespace, &request.set, request.records);
    input.mode = request.mode;
    run_async_with_ctx(RequestContext::new_request(), |ctx| async move {
        let deps = runtime.scenario_deps(&ctx);
        Ok(run_scenario(&ctx, &deps, &input).await)
    })
}

/// Parse `name=value` pairs given as `--flag name=value`.
pub fn parse_flag_pairs<I, S>(pairs: I) -> InfraResult<Vec<(String, String)>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    pairs
        .into_iter()
        .map(|pair| {
            let pair = pair.as_ref();
            match pair.split_once('=') {
                Some((name, value)) if !name.trim().is_empty() => {
                    Ok((name.trim().trim_start_matches('-').to_string(), value.to_string()))
                },
                _ => Err(InfraError::expected(
                    ErrorCode::invalid_input(),
                    format!("expected name=value, got `{pair}`"),
                )),
            }
        })
        .collect()
}

fn planned<T>(command: &CommandLine) -> CommandOutcome<T> {
    let mut shown = command.clone();
    shown.rewrite_flag("password", |flag| Flag {
        value: flag.value.as_ref().map(|_| REDACTED.to_string()),
        ..flag.clone()
    });
    CommandOutcome::Planned {
        command: shown.to_shell(),
    }
}

pub(crate) fn run_async_with_ctx<F, T>(
    ctx: RequestContext,
    op: impl FnOnce(RequestContext) -> F,
) -> InfraResult<T>
where
    F: Future<Output = Result<T, InfraError>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(InfraError::from)?;
    runtime.block_on(async { op(ctx).await })
}
