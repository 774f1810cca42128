//! Builders for the classic `asbackup`/`asrestore` tools shipped with the
//! backup service.

use crate::argv::CommandLine;
use crate::tools::{ToolDeps, ToolSettings, clean_directory, run_from};
use backup_harness_ports::{ProcessOutput, log_fields};
use backup_harness_shared::{ErrorCode, ErrorEnvelope, RequestContext, Result};
use serde_json::Value;

/// Classic `asbackup` invocation.
#[derive(Debug, Clone)]
pub struct AsBackup {
    directory: String,
    command: CommandLine,
    settings: ToolSettings,
}

impl AsBackup {
    /// `asbackup --namespace <ns> --directory <dir> --user .. --password .. -r`.
    pub fn new(settings: &ToolSettings, namespace: &str, directory: &str) -> Self {
        let mut command = CommandLine::new("asbackup");
        command
            .push("namespace", namespace)
            .push("directory", directory)
            .push("user", &settings.profile.user)
            .push("password", settings.profile.password.expose())
            .push_switch("-r");
        Self {
            directory: directory.to_string(),
            command,
            settings: settings.clone(),
        }
    }

    /// `--compress <mode>`.
    #[must_use]
    pub fn compress(mut self, mode: &str) -> Self {
        self.command.push("compress", mode);
        self
    }

    /// `--compression-level <level>`; zero keeps the tool default.
    #[must_use]
    pub fn compression_level(mut self, level: u32) -> Self {
        if level != 0 {
            self.command.push("compression-level", level);
        }
        self
    }

    /// `--encrypt <mode>`.
    #[must_use]
    pub fn encrypt(mut self, mode: &str) -> Self {
        self.command.push("encrypt", mode);
        self
    }

    /// `--encryption-key-file <file>`.
    #[must_use]
    pub fn encryption_key_file(mut self, file: &str) -> Self {
        self.command.push("encryption-key-file", file);
        self
    }

    /// Command line as built so far.
    pub const fn command(&self) -> &CommandLine {
        &self.command
    }

    /// Clean the target directory, then run from the tool directory.
    pub async fn run(&self, ctx: &RequestContext, deps: &ToolDeps) -> Result<ProcessOutput> {
        ctx.ensure_not_cancelled("asbackup.run")?;
        deps.info(
            "asbackup.run",
            "Run classic asbackup",
            log_fields([("directory", Value::from(self.directory.as_str()))]),
        );
        clean_directory(deps.runner.as_ref(), ctx, &self.directory).await?;
        run_checked(deps, ctx, &self.command, &self.settings, "asbackup").await
    }
}

/// Classic `asrestore` invocation.
#[derive(Debug, Clone)]
pub struct AsRestore {
    command: CommandLine,
    settings: ToolSettings,
}

impl AsRestore {
    /// `asrestore --namespace <ns> --directory <dir> --user .. --password ..`.
    pub fn new(settings: &ToolSettings, namespace: &str, directory: &str) -> Self {
        let mut command = CommandLine::new("asrestore");
        command
            .push("namespace", namespace)
            .push("directory", directory)
            .push("user", &settings.profile.user)
            .push("password", settings.profile.password.expose());
        Self {
            command,
            settings: settings.clone(),
        }
    }

    /// `--compress <mode>`.
    #[must_use]
    pub fn compress(mut self, mode: &str) -> Self {
        self.command.push("compress", mode);
        self
    }

    /// `--encrypt <mode>`.
    #[must_use]
    pub fn encrypt(mut self, mode: &str) -> Self {
        self.command.push("encrypt", mode);
        self
    }

    /// `--encryption-key-file <file>`.
    #[must_use]
    pub fn encryption_key_file(mut self, file: &str) -> Self {
        self.command.push("encryption-key-file", file);
        self
    }

    /// Command line as built so far.
    pub const fn command(&self) -> &CommandLine {
        &self.command
    }

    /// Run from the tool directory.
    pub async fn run(&self, ctx: &RequestContext, deps: &ToolDeps) -> Result<ProcessOutput> {
        ctx.ensure_not_cancelled("asrestore.run")?;
        deps.info(
            "asrestore.run",
            "Run classic asrestore",
            log_fields([("command", Value::from(self.command.to_shell()))]),
        );
        run_checked(deps, ctx, &self.command, &self.settings, "asrestore").await
    }
}

async fn run_checked(
    deps: &ToolDeps,
    ctx: &RequestContext,
    command: &CommandLine,
    settings: &ToolSettings,
    tool: &'static str,
) -> Result<ProcessOutput> {
    let output = run_from(
        deps.runner.as_ref(),
        ctx,
        command,
        &settings.abs_tools_dir,
        true,
        settings.timeout,
    )
    .await?;
    if output.success() {
        return Ok(output);
    }
    Err(ErrorEnvelope::expected(
        ErrorCode::new(tool, "failed"),
        format!("{tool} exited with code {}", output.exit_code),
    )
    .with_output_tail(&output.combined()))
}
