//! `bh`: backup/restore harness CLI.

mod commands;
mod error;
mod format;
mod logging;

use backup_harness_domain::MutationMode;
use backup_harness_infra::{
    HarnessRuntime, InfraError, InfraResult, collect_env_map, mask_text, redact_if_secret,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use commands::{
    ParseCommandInput, run_backup, run_config_check, run_config_schema, run_config_show, run_env,
    run_estimate, run_jobs_cancel, run_jobs_resume, run_jobs_status, run_jobs_wait_restore,
    run_parse, run_restore, run_scenario, run_validate,
};
use error::{CliError, ExitCode, infra_exit_code};
use format::{OutputArgs, OutputMode, render_success};
use logging::{LogFormatArg, init_tracing};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "bh",
    version,
    about = "Aerospike backup/restore test harness",
    long_about = None
)]
struct Cli {
    #[command(flatten)]
    output: OutputArgs,

    #[command(flatten)]
    harness: HarnessArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Flags shared by every command that loads the harness config.
#[derive(Debug, Args)]
struct HarnessArgs {
    /// Config file (TOML, JSON or YAML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// `KEY=VALUE` file filling env parameters the process env does not set.
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,
    /// Log line format.
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormatArg>,
    /// Log level (`error`, `warn`, `info`, `debug`, `trace`).
    #[arg(long, global = true)]
    log_level: Option<String>,
}

impl HarnessArgs {
    /// Env parameters with the logging flags layered on top.
    fn env_map(&self) -> InfraResult<BTreeMap<String, String>> {
        let mut map = collect_env_map(self.env_file.as_deref())?;
        if let Some(format) = self.log_format {
            map.insert("BH_LOG_FORMAT".to_string(), format.as_str().to_string());
        }
        if let Some(level) = &self.log_level {
            map.insert("BH_LOG_LEVEL".to_string(), level.clone());
        }
        Ok(map)
    }

    fn runtime(&self) -> InfraResult<HarnessRuntime> {
        let runtime = HarnessRuntime::load(&self.env_map()?, self.config.as_deref(), None)?;
        init_tracing(&runtime);
        Ok(runtime)
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run `asbackup` for a namespace.
    Backup {
        /// Namespace to back up.
        #[arg(long)]
        namespace: String,
        /// Directory under the backup root.
        #[arg(long)]
        dir: Option<String>,
        /// Set filter (repeatable).
        #[arg(long = "set")]
        sets: Vec<String>,
        /// Parallel scan threads.
        #[arg(long)]
        parallel: Option<u32>,
        /// Print the command instead of running it.
        #[arg(long)]
        dry_run: bool,
        /// Extra tool flag as `name=value` (repeatable).
        #[arg(long = "flag")]
        flags: Vec<String>,
        /// Parse the report even when the tool logged errors.
        #[arg(long)]
        ignore_errors: bool,
    },
    /// Run `asrestore` for a namespace.
    Restore {
        /// Namespace to restore into.
        #[arg(long)]
        namespace: String,
        /// Directory under the backup root.
        #[arg(long)]
        dir: Option<String>,
        /// Print the command instead of running it.
        #[arg(long)]
        dry_run: bool,
        /// Extra tool flag as `name=value` (repeatable).
        #[arg(long = "flag")]
        flags: Vec<String>,
        /// Parse the report even when the tool logged errors.
        #[arg(long)]
        ignore_errors: bool,
    },
    /// Estimate the backup size of a namespace.
    Estimate {
        /// Namespace to estimate.
        #[arg(long)]
        namespace: String,
    },
    /// Validate backup files with `asrestore --validate`.
    #[command(group(
        clap::ArgGroup::new("target")
            .required(true)
            .args(["file", "dir", "dir_list"])
    ))]
    Validate {
        /// One backup file.
        #[arg(long)]
        file: Option<String>,
        /// One backup directory.
        #[arg(long)]
        dir: Option<String>,
        /// Comma-separated backup directories.
        #[arg(long, value_delimiter = ',')]
        dir_list: Option<Vec<String>>,
    },
    /// Parse saved tool output.
    Parse {
        /// Report kind.
        #[arg(value_enum)]
        kind: ParseKind,
        /// Input file; `-` or nothing reads stdin.
        input: Option<PathBuf>,
        /// Parse even when the output reports `ERROR`.
        #[arg(long)]
        ignore_errors: bool,
    },
    /// End-to-end backup/restore scenarios.
    Scenario {
        #[command(subcommand)]
        command: ScenarioCommands,
    },
    /// Config-related commands.
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Show the resolved environment and connection profile.
    Env,
    /// Backup service job commands.
    Jobs {
        #[command(subcommand)]
        command: JobsCommands,
    },
}

#[derive(Debug, Subcommand)]
enum ScenarioCommands {
    /// Seed, back up, truncate or mutate, restore and compare counts.
    Run {
        /// Namespace under test.
        #[arg(long)]
        namespace: String,
        /// Set under test.
        #[arg(long)]
        set: String,
        /// Records to seed.
        #[arg(long)]
        records: u64,
        /// `truncate` or `mutate`.
        #[arg(long, default_value = "truncate")]
        mode: MutationMode,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigCommands {
    /// Print the effective config.
    Show,
    /// Validate the config and env parameters.
    Check,
    /// Print the config JSON Schema.
    Schema,
}

#[derive(Debug, Subcommand)]
enum JobsCommands {
    /// Show job details.
    Status {
        /// Job id.
        job_id: String,
    },
    /// Cancel a job.
    Cancel {
        /// Job id.
        job_id: String,
    },
    /// Resume a job and wait until it leaves `RUNNING`.
    Resume {
        /// Job id.
        job_id: String,
    },
    /// Wait until a restore job is `DONE`.
    WaitRestore {
        /// Restore job id.
        job_id: String,
    },
}

/// Report kinds accepted by `bh parse`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum ParseKind {
    Backup,
    Restore,
    Estimate,
    Validation,
}

#[derive(Debug)]
pub(crate) struct CliOutput {
    stdout: String,
    stderr: String,
    exit_code: ExitCode,
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    let mode = OutputMode::from_args(&cli.output);

    match run(&cli.command, &cli.harness, mode) {
        Ok(output) => match write_output(&output) {
            Ok(()) => std::process::ExitCode::from(output.exit_code.as_u8()),
            Err(error) => exit_with_error(&error),
        },
        Err(error) => exit_with_error(&error),
    }
}

fn exit_with_error(error: &CliError) -> std::process::ExitCode {
    let _ = writeln!(io::stderr(), "error: {error}");
    std::process::ExitCode::from(error.exit_code().as_u8())
}

fn run(command: &Commands, harness: &HarnessArgs, mode: OutputMode) -> Result<CliOutput, CliError> {
    match command {
        Commands::Config { command } => {
            let env = match harness.env_map() {
                Ok(env) => env,
                Err(error) => return Ok(format_error_output(mode, &error, infra_exit_code(&error))),
            };
            match command {
                ConfigCommands::Show => run_config_show(mode, &env, harness.config.as_deref()),
                ConfigCommands::Check => run_config_check(mode, &env, harness.config.as_deref()),
                ConfigCommands::Schema => run_config_schema(mode),
            }
        },
        Commands::Env => match harness.env_map() {
            Ok(env) => run_env(mode, &env),
            Err(error) => Ok(format_error_output(mode, &error, infra_exit_code(&error))),
        },
        _ => {
            let runtime = match harness.runtime() {
                Ok(runtime) => runtime,
                Err(error) => return Ok(format_error_output(mode, &error, infra_exit_code(&error))),
            };
            tracing::debug!(
                environment = ?runtime.profile().environment,
                "harness runtime loaded"
            );
            run_with_runtime(command, &runtime, mode)
        },
    }
}

fn run_with_runtime(
    command: &Commands,
    runtime: &HarnessRuntime,
    mode: OutputMode,
) -> Result<CliOutput, CliError> {
    match command {
        Commands::Backup {
            namespace,
            dir,
            sets,
            parallel,
            dry_run,
            flags,
            ignore_errors,
        } => run_backup(
            mode,
            runtime,
            commands::BackupCommandInput {
                namespace,
                dir: dir.as_deref(),
                sets,
                parallel: *parallel,
                dry_run: *dry_run,
                flags,
                ignore_errors: *ignore_errors,
            },
        ),
        Commands::Restore {
            namespace,
            dir,
            dry_run,
            flags,
            ignore_errors,
        } => run_restore(
            mode,
            runtime,
            commands::RestoreCommandInput {
                namespace,
                dir: dir.as_deref(),
                dry_run: *dry_run,
                flags,
                ignore_errors: *ignore_errors,
            },
        ),
        Commands::Estimate { namespace } => run_estimate(mode, runtime, namespace),
        Commands::Validate {
            file,
            dir,
            dir_list,
        } => run_validate(mode, runtime, file.as_deref(), dir.as_deref(), dir_list.as_deref()),
        Commands::Parse {
            kind,
            input,
            ignore_errors,
        } => run_parse(
            mode,
            runtime,
            &ParseCommandInput {
                kind: *kind,
                input: input.as_deref(),
                ignore_errors: *ignore_errors,
            },
        ),
        Commands::Scenario {
            command:
                ScenarioCommands::Run {
                    namespace,
                    set,
                    records,
                    mode: mutation,
                },
        } => run_scenario(mode, runtime, namespace, set, *records, *mutation),
        Commands::Jobs { command } => match command {
            JobsCommands::Status { job_id } => run_jobs_status(mode, runtime, job_id),
            JobsCommands::Cancel { job_id } => run_jobs_cancel(mode, runtime, job_id),
            JobsCommands::Resume { job_id } => run_jobs_resume(mode, runtime, job_id),
            JobsCommands::WaitRestore { job_id } => run_jobs_wait_restore(mode, runtime, job_id),
        },
        Commands::Config { .. } | Commands::Env => Err(CliError::InvalidInput(
            "command does not need a harness runtime".to_string(),
        )),
    }
}

/// Render `payload` as a successful command result.
pub(crate) fn success_output<T: Serialize>(
    mode: OutputMode,
    kind: &str,
    status: &str,
    payload: &T,
    exit_code: ExitCode,
) -> Result<CliOutput, CliError> {
    let mut stderr = String::new();
    log_info(&mut stderr, &format!("{kind} completed"), mode.no_progress);
    Ok(CliOutput {
        stdout: render_success(mode, kind, status, payload)?,
        stderr,
        exit_code,
    })
}

/// Render a harness error. Secret-looking metadata is redacted and free
/// text is masked.
pub(crate) fn format_error_output(
    mode: OutputMode,
    error: &InfraError,
    exit_code: ExitCode,
) -> CliOutput {
    let meta: BTreeMap<String, String> = error
        .metadata
        .iter()
        .map(|(key, value)| (key.clone(), mask_text(&redact_if_secret(key, value))))
        .collect();
    let message = mask_text(&error.message);

    let mut stderr = String::new();
    log_info(&mut stderr, "command failed", mode.no_progress);

    let stdout = if mode.is_ndjson() || mode.is_json() {
        let mut payload = serde_json::json!({
            "status": "error",
            "error": {
                "code": error.code.to_string(),
                "message": message,
                "kind": error.kind.to_string(),
                "class": error.class,
                "meta": meta,
            },
        });
        let rendered = if mode.is_ndjson() {
            payload["type"] = serde_json::Value::String("error".to_string());
            serde_json::to_string(&payload)
        } else {
            serde_json::to_string_pretty(&payload)
        };
        let mut output = rendered.unwrap_or_else(|_| {
            "{\"status\":\"error\",\"error\":{\"code\":\"core:internal\",\"message\":\"internal error\"}}"
                .to_string()
        });
        output.push('\n');
        output
    } else {
        let mut out = format!(
            "status: error\ncode: {}\nmessage: {message}\nkind: {}\n",
            error.code, error.kind
        );
        if !meta.is_empty() {
            out.push_str("meta:\n");
            for (key, value) in &meta {
                out.push_str("  ");
                out.push_str(key);
                out.push_str(": ");
                out.push_str(value);
                out.push('\n');
            }
        }
        out
    };

    CliOutput {
        stdout,
        stderr,
        exit_code,
    }
}

fn log_info(stderr: &mut String, message: &str, no_progress: bool) {
    if no_progress {
        return;
    }
    stderr.push_str("info: ");
    stderr.push_str(message);
    stderr.push('\n');
}

fn write_output(output: &CliOutput) -> Result<(), CliError> {
    let mut stdout = io::stdout();
    stdout.write_all(output.stdout.as_bytes())?;

    if !output.stderr.is_empty() {
        let mut stderr = io::stderr();
        stderr.write_all(output.stderr.as_bytes())?;
        stderr.flush()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::OutputFormat;
    use backup_harness_shared::ErrorCode;
    use clap::CommandFactory;

    fn mode(format: OutputFormat) -> OutputMode {
        OutputMode::from_args(&OutputArgs {
            output: Some(format),
            no_progress: true,
        })
    }

    #[test]
    fn version_flag_is_supported() {
        let result = Cli::command().try_get_matches_from(["bh", "--version"]);
        let is_version = matches!(
            result,
            Err(error) if error.kind() == clap::error::ErrorKind::DisplayVersion
        );

        assert!(is_version, "expected clap to render version");
    }

    #[test]
    fn command_tree_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn validate_needs_exactly_one_target() {
        assert!(Cli::try_parse_from(["bh", "validate"]).is_err());
        assert!(Cli::try_parse_from(["bh", "validate", "--file", "a.asb", "--dir", "d"]).is_err());
        let parsed = Cli::try_parse_from(["bh", "validate", "--dir-list", "a,b"]);
        assert!(matches!(
            parsed.map(|cli| cli.command),
            Ok(Commands::Validate { dir_list: Some(dirs), .. }) if dirs == ["a", "b"]
        ));
    }

    #[test]
    fn scenario_mode_parses() -> Result<(), clap::Error> {
        let cli = Cli::try_parse_from([
            "bh", "scenario", "run", "--namespace", "test", "--set", "users", "--records", "10",
            "--mode", "mutate",
        ])?;
        assert!(matches!(
            cli.command,
            Commands::Scenario {
                command: ScenarioCommands::Run {
                    mode: MutationMode::Mutate,
                    records: 10,
                    ..
                }
            }
        ));
        Ok(())
    }

    #[test]
    fn global_flags_work_after_the_subcommand() -> Result<(), clap::Error> {
        let cli = Cli::try_parse_from([
            "bh", "env", "--output", "json", "--log-format", "json", "--log-level", "debug",
        ])?;
        assert_eq!(cli.harness.log_format, Some(LogFormatArg::Json));
        assert_eq!(cli.harness.log_level.as_deref(), Some("debug"));
        assert!(OutputMode::from_args(&cli.output).is_json());
        Ok(())
    }

    #[test]
    fn error_output_redacts_secret_metadata() -> Result<(), Box<dyn std::error::Error>> {
        let error = InfraError::expected(ErrorCode::new("config", "invalid_env"), "bad value")
            .with_metadata("ASDB_PASSWORD", "hunter2")
            .with_metadata("key", "BH_LOG_LEVEL");
        let output = format_error_output(mode(OutputFormat::Json), &error, ExitCode::InvalidInput);
        assert!(!output.stdout.contains("hunter2"));

        let value: serde_json::Value = serde_json::from_str(output.stdout.trim())?;
        assert_eq!(value["status"], "error");
        assert_eq!(value["error"]["code"], "config:invalid_env");
        assert_eq!(value["error"]["meta"]["ASDB_PASSWORD"], "<redacted>");
        assert_eq!(output.exit_code, ExitCode::InvalidInput);
        Ok(())
    }

    #[test]
    fn error_text_lists_metadata() {
        let error = InfraError::expected(ErrorCode::new("report", "missing_field"), "no records")
            .with_metadata("field", "Records Read");
        let output = format_error_output(mode(OutputFormat::Text), &error, ExitCode::Failure);
        assert!(output.stdout.starts_with("status: error\ncode: report:missing_field\n"));
        assert!(output.stdout.contains("  field: Records Read\n"));
        assert!(output.stderr.is_empty());
    }

    #[test]
    fn exit_codes_for_errors() -> Result<(), Box<dyn std::error::Error>> {
        let io_error = CliError::Io(io::Error::other("io"));
        let serialization_error = match serde_json::from_str::<serde_json::Value>("not-json") {
            Ok(_) => return Err("expected serialization error".into()),
            Err(error) => CliError::Serialization(error),
        };
        assert_eq!(io_error.exit_code(), ExitCode::Io);
        assert_eq!(serialization_error.exit_code(), ExitCode::Internal);
        assert_eq!(
            CliError::InvalidInput("x".to_string()).exit_code(),
            ExitCode::InvalidInput
        );
        Ok(())
    }
}
