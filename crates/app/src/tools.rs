//! Where the external tools live and how builders reach the cluster.

use crate::argv::CommandLine;
use backup_harness_domain::{ConnectionProfile, ReportOptions};
use backup_harness_ports::{CommandSpec, LogFields, LoggerPort, ProcessOutput, ProcessRunner};
use backup_harness_shared::{ErrorCode, ErrorEnvelope, RequestContext, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Ports a builder needs to execute.
#[derive(Clone)]
pub struct ToolDeps {
    /// Subprocess runner.
    pub runner: Arc<dyn ProcessRunner>,
    /// Optional logger.
    pub logger: Option<Arc<dyn LoggerPort>>,
}

impl ToolDeps {
    /// Deps without logging.
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            runner,
            logger: None,
        }
    }

    /// Attach a logger.
    #[must_use]
    pub fn with_logger(mut self, logger: Arc<dyn LoggerPort>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub(crate) fn info(&self, event: &str, message: &str, fields: LogFields) {
        if let Some(logger) = &self.logger {
            logger.info(event, message, Some(fields));
        }
    }
}

/// Inputs shared by every command builder.
///
/// Built once by the composition root; builders copy what they need.
#[derive(Debug, Clone)]
pub struct ToolSettings {
    /// Resolved connection profile.
    pub profile: ConnectionProfile,
    /// Directory holding `./asbackup`.
    pub asbackup_dir: PathBuf,
    /// Directory holding `./asrestore`.
    pub asrestore_dir: PathBuf,
    /// Directory of the classic `asbackup`/`asrestore` tools.
    pub abs_tools_dir: PathBuf,
    /// Parent of relative backup directories.
    pub backup_root: String,
    /// Default `asbackup --parallel`.
    pub backup_parallel: u32,
    /// Default `asrestore --parallel`.
    pub restore_parallel: u32,
    /// Upper bound for one tool run.
    pub timeout: Option<Duration>,
    /// Parser options; `ignore_errors` is set per run.
    pub report: ReportOptions,
}

impl ToolSettings {
    /// Defaults for a single local node.
    pub fn local() -> Self {
        Self {
            profile: ConnectionProfile::local(),
            asbackup_dir: PathBuf::from("."),
            asrestore_dir: PathBuf::from("."),
            abs_tools_dir: PathBuf::from("."),
            backup_root: "/tmp".to_string(),
            backup_parallel: crate::cli_backup::DEFAULT_PARALLEL,
            restore_parallel: crate::cli_restore::DEFAULT_PARALLEL,
            timeout: None,
            report: ReportOptions::default(),
        }
    }

    /// `<backup_root>/<dir>`.
    pub fn backup_path(&self, dir: &str) -> String {
        format!("{}/{dir}", self.backup_root.trim_end_matches('/'))
    }

    pub(crate) fn report_options(&self, ignore_errors: bool) -> ReportOptions {
        ReportOptions {
            ignore_errors,
            ..self.report
        }
    }
}

/// Run `command` from `dir` as `cd <dir>; [pwd;] <cmd>`.
pub(crate) async fn run_from(
    runner: &dyn ProcessRunner,
    ctx: &RequestContext,
    command: &CommandLine,
    dir: &Path,
    print_workdir: bool,
    timeout: Option<Duration>,
) -> Result<ProcessOutput> {
    let spec = CommandSpec::shell(command.to_shell());
    let spec = if print_workdir {
        spec.in_dir(dir)
    } else {
        spec.in_dir_quiet(dir)
    };
    Ok(runner.run(ctx, spec.with_optional_timeout(timeout)).await?)
}

/// `rm -rf <dir>` then `mkdir -p <dir>`.
pub(crate) async fn clean_directory(
    runner: &dyn ProcessRunner,
    ctx: &RequestContext,
    dir: &str,
) -> Result<()> {
    if dir.trim().is_empty() || dir.trim() == "/" {
        return Err(ErrorEnvelope::expected(
            ErrorCode::invalid_input(),
            "refusing to clean an empty or root directory",
        )
        .with_metadata("path", dir));
    }
    run_checked(runner, ctx, ["rm", "-rf", dir]).await?;
    run_checked(runner, ctx, ["mkdir", "-p", dir]).await
}

async fn run_checked(
    runner: &dyn ProcessRunner,
    ctx: &RequestContext,
    argv: [&str; 3],
) -> Result<()> {
    let spec = CommandSpec::argv(argv);
    let display = spec.display();
    let output = runner.run(ctx, spec).await?;
    if output.success() {
        return Ok(());
    }
    Err(ErrorEnvelope::expected(
        ErrorCode::io(),
        format!("`{display}` exited with code {}", output.exit_code),
    )
    .with_output_tail(&output.combined()))
}
