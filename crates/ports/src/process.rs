//! Subprocess execution boundary contract.

use crate::BoxFuture;
use backup_harness_shared::{ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, mask_text};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// What to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// Script passed to `/bin/sh -c`.
    Shell(String),
    /// Program followed by its arguments, executed without a shell.
    Argv(Vec<String>),
}

/// A command plus where and for how long to run it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Command to execute.
    pub invocation: Invocation,
    /// Working directory.
    pub workdir: Option<PathBuf>,
    /// Print the working directory before the command output.
    ///
    /// Shell commands then run as `cd <dir>; pwd; <cmd>`.
    pub print_workdir: bool,
    /// Kill the child when it runs longer than this.
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    /// Shell script command.
    #[must_use]
    pub fn shell(script: impl Into<String>) -> Self {
        Self::from_invocation(Invocation::Shell(script.into()))
    }

    /// Argument vector command.
    #[must_use]
    pub fn argv<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_invocation(Invocation::Argv(args.into_iter().map(Into::into).collect()))
    }

    const fn from_invocation(invocation: Invocation) -> Self {
        Self {
            invocation,
            workdir: None,
            print_workdir: false,
            timeout: None,
        }
    }

    /// Run from `dir`, echoing it first (`cd <dir>; pwd; <cmd>`).
    #[must_use]
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self.print_workdir = true;
        self
    }

    /// Run from `dir` without echoing it.
    #[must_use]
    pub fn in_dir_quiet(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self.print_workdir = false;
        self
    }

    /// Bound the run time.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Optional variant of [`CommandSpec::with_timeout`].
    #[must_use]
    pub const fn with_optional_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Program name for logs and errors.
    #[must_use]
    pub fn program(&self) -> &str {
        match &self.invocation {
            Invocation::Shell(script) => script.split_whitespace().next().unwrap_or("sh"),
            Invocation::Argv(args) => args.first().map_or("", String::as_str),
        }
    }

    /// Command text with secrets masked, safe to log.
    #[must_use]
    pub fn display(&self) -> String {
        mask_text(&self.command_text())
    }

    /// Command text as a shell would see it, including the `cd` prefix.
    #[must_use]
    pub fn command_text(&self) -> String {
        let body = match &self.invocation {
            Invocation::Shell(script) => script.clone(),
            Invocation::Argv(args) => args
                .iter()
                .map(|arg| shell_quote(arg))
                .collect::<Vec<_>>()
                .join(" "),
        };
        match (&self.workdir, self.print_workdir) {
            (Some(dir), true) => format!("cd {}; pwd; {body}", dir.display()),
            (Some(dir), false) => format!("cd {}; {body}", dir.display()),
            (None, _) => body,
        }
    }

    /// Working directory, if any.
    #[must_use]
    pub fn workdir(&self) -> Option<&Path> {
        self.workdir.as_deref()
    }
}

/// Quote one argument for display or `/bin/sh`.
#[must_use]
pub fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || "-_./:=,@%+".contains(ch));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
    /// Exit code; `-1` when the process was terminated by a signal.
    pub exit_code: i32,
}

impl ProcessOutput {
    /// Stdout, then stderr, then an `Exit Code: <n>` line.
    ///
    /// Report parsers read the exit code from this trailer.
    #[must_use]
    pub fn combined(&self) -> String {
        let mut text = String::with_capacity(self.stdout.len() + self.stderr.len() + 16);
        for part in [&self.stdout, &self.stderr] {
            if part.is_empty() {
                continue;
            }
            text.push_str(part);
            if !part.ends_with('\n') {
                text.push('\n');
            }
        }
        text.push_str("Exit Code: ");
        text.push_str(&self.exit_code.to_string());
        text.push('\n');
        text
    }

    /// True when the exit code is zero.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Failures to run a process at all. A non-zero exit is not one of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessError {
    /// The process could not be started.
    Spawn {
        /// Program that failed to start.
        program: String,
        /// OS error text.
        message: String,
    },
    /// The process exceeded its timeout and was killed.
    Timeout {
        /// Program that timed out.
        program: String,
        /// Configured timeout.
        timeout_ms: u64,
    },
    /// The request was cancelled and the process was killed.
    Cancelled {
        /// Program that was running.
        program: String,
    },
    /// Reading the process output failed.
    Io {
        /// Program that was running.
        program: String,
        /// OS error text.
        message: String,
    },
}

impl ProcessError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::Spawn { .. } => ErrorCode::new("process", "spawn"),
            Self::Timeout { .. } => ErrorCode::new("process", "timeout"),
            Self::Cancelled { .. } => ErrorCode::new("process", "cancelled"),
            Self::Io { .. } => ErrorCode::new("process", "io"),
        }
    }

    /// Program the error refers to.
    #[must_use]
    pub fn program(&self) -> &str {
        match self {
            Self::Spawn { program, .. }
            | Self::Timeout { program, .. }
            | Self::Cancelled { program }
            | Self::Io { program, .. } => program,
        }
    }
}

impl fmt::Display for ProcessError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn { program, message } => {
                write!(formatter, "failed to start `{program}`: {message}")
            },
            Self::Timeout {
                program,
                timeout_ms,
            } => write!(formatter, "`{program}` did not finish within {timeout_ms}ms"),
            Self::Cancelled { program } => write!(formatter, "`{program}` was cancelled"),
            Self::Io { program, message } => {
                write!(formatter, "failed to read output of `{program}`: {message}")
            },
        }
    }
}

impl std::error::Error for ProcessError {}

impl From<ProcessError> for ErrorEnvelope {
    fn from(error: ProcessError) -> Self {
        let code = error.error_code();
        let message = error.to_string();
        let program = error.program().to_string();
        let envelope = match &error {
            ProcessError::Timeout { timeout_ms, .. } => {
                Self::expected_with_class(code, message, ErrorClass::Retriable)
                    .with_metadata("timeout_ms", timeout_ms.to_string())
            },
            ProcessError::Cancelled { .. } => Self::cancelled(message),
            ProcessError::Spawn { .. } | ProcessError::Io { .. } => {
                Self::unexpected(code, message, ErrorClass::NonRetriable)
            },
        };
        envelope.with_metadata("program", program)
    }
}

/// Boundary contract for running external tools.
pub trait ProcessRunner: Send + Sync {
    /// Run a command to completion and capture its output.
    fn run(
        &self,
        ctx: &RequestContext,
        spec: CommandSpec,
    ) -> BoxFuture<'_, Result<ProcessOutput, ProcessError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_appends_exit_code_trailer() {
        let output = ProcessOutput {
            stdout: "Records Read: 3".to_string(),
            stderr: "warning: slow\n".to_string(),
            exit_code: 2,
        };
        assert_eq!(
            output.combined(),
            "Records Read: 3\nwarning: slow\nExit Code: 2\n"
        );
        assert!(!output.success());
        assert_eq!(ProcessOutput::default().combined(), "Exit Code: 0\n");
    }

    #[test]
    fn command_text_includes_workdir_prefix() {
        let spec = CommandSpec::shell("./asbackup --namespace test").in_dir("/opt/tools");
        assert_eq!(
            spec.command_text(),
            "cd /opt/tools; pwd; ./asbackup --namespace test"
        );

        let quiet = CommandSpec::shell("./asbackup --estimate").in_dir_quiet("/opt/tools");
        assert_eq!(quiet.command_text(), "cd /opt/tools; ./asbackup --estimate");
    }

    #[test]
    fn argv_is_quoted_for_display() {
        let spec = CommandSpec::argv(["asinfo", "-v", "sets/test users"]);
        assert_eq!(spec.command_text(), "asinfo -v 'sets/test users'");
        assert_eq!(spec.program(), "asinfo");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn display_masks_secrets() {
        let spec = CommandSpec::argv(["asbackup", "--s3-secret-access-key", "abcdefghijklmnopqrstuvwxyz"]);
        assert!(!spec.display().contains("abcdefghij"));

        let spec = CommandSpec::argv([
            "asinfo",
            "-U",
            "admin",
            "-P",
            "hunter2",
            "--azure-account-key",
            "AKEYSECRET",
            "--encryption-key-secret=ENCSECRET",
            "--password",
            "pa ss",
        ]);
        let display = spec.display();
        for secret in ["hunter2", "AKEYSECRET", "ENCSECRET", "pa ss", "ss'"] {
            assert!(!display.contains(secret), "{secret} in {display}");
        }
        assert!(spec.command_text().contains("hunter2"));
    }

    #[test]
    fn errors_map_to_envelopes() {
        let timeout: ErrorEnvelope = ProcessError::Timeout {
            program: "asbench".to_string(),
            timeout_ms: 500,
        }
        .into();
        assert_eq!(timeout.code, ErrorCode::new("process", "timeout"));
        assert_eq!(timeout.class, ErrorClass::Retriable);
        assert_eq!(
            timeout.metadata.get("program").map(String::as_str),
            Some("asbench")
        );

        let cancelled: ErrorEnvelope = ProcessError::Cancelled {
            program: "asbench".to_string(),
        }
        .into();
        assert!(cancelled.is_cancelled());
    }
}
