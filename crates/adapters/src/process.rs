//! Subprocess runner backed by `tokio::process`.
//!
//! Stdout and stderr are drained concurrently so a chatty child never blocks
//! on a full pipe. Output is decoded lossily; bytes that are not UTF-8 become
//! `U+FFFD`. On unix each child leads its own process group, and the whole
//! group is killed when the timeout elapses or the request is cancelled, so
//! tools started by a shell wrapper die with it.

use backup_harness_ports::{
    BoxFuture, CommandSpec, Invocation, LoggerPort, ProcessError, ProcessOutput, ProcessRunner,
    log_fields,
};
use backup_harness_shared::RequestContext;
use futures_util::StreamExt;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncRead;
use tokio::process::{Child, Command};
use tokio_util::codec::{BytesCodec, FramedRead};

const DEFAULT_SHELL: &str = "/bin/sh";

/// Runs [`CommandSpec`]s as local child processes.
#[derive(Clone)]
pub struct ShellProcessRunner {
    shell: Box<str>,
    logger: Option<Arc<dyn LoggerPort>>,
}

impl Default for ShellProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ShellProcessRunner {
    /// Runner using `/bin/sh` for shell invocations.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shell: DEFAULT_SHELL.into(),
            logger: None,
        }
    }

    /// Use another shell binary for [`Invocation::Shell`].
    #[must_use]
    pub fn with_shell(mut self, shell: impl Into<Box<str>>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Log start and finish of every command.
    #[must_use]
    pub fn with_logger(mut self, logger: Arc<dyn LoggerPort>) -> Self {
        self.logger = Some(logger);
        self
    }

    fn command(&self, spec: &CommandSpec) -> Result<Command, ProcessError> {
        let mut command = match &spec.invocation {
            // The shell form carries its own `cd <dir>; pwd;` prefix.
            Invocation::Shell(_) => {
                let mut command = Command::new(self.shell.as_ref());
                command.arg("-c").arg(spec.command_text());
                command
            },
            Invocation::Argv(args) => {
                let Some((program, rest)) = args.split_first() else {
                    return Err(ProcessError::Spawn {
                        program: String::new(),
                        message: "empty argument vector".to_string(),
                    });
                };
                let mut command = Command::new(program);
                command.args(rest);
                if let Some(dir) = spec.workdir() {
                    command.current_dir(dir);
                }
                command
            },
        };
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);
        Ok(command)
    }

    async fn execute(
        &self,
        ctx: &RequestContext,
        spec: CommandSpec,
    ) -> Result<ProcessOutput, ProcessError> {
        let program = spec.program().to_string();
        if ctx.is_cancelled() {
            return Err(ProcessError::Cancelled { program });
        }

        if let Some(logger) = &self.logger {
            logger.debug(
                "process.start",
                "running command",
                Some(log_fields([
                    ("program", program.clone()),
                    ("command", spec.display()),
                ])),
            );
        }

        let started = Instant::now();
        let mut child = self.command(&spec)?.spawn().map_err(|error| ProcessError::Spawn {
            program: program.clone(),
            message: error.to_string(),
        })?;

        let finish = {
            let run = collect_output(&mut child);
            tokio::pin!(run);
            tokio::select! {
                result = &mut run => Finish::Exited(result),
                () = ctx.cancelled() => Finish::Cancelled,
                () = deadline(spec.timeout) => Finish::TimedOut,
            }
        };

        let result = match finish {
            Finish::Exited(result) => result.map_err(|message| ProcessError::Io {
                program: program.clone(),
                message,
            }),
            Finish::Cancelled => {
                self.kill(&mut child, &program).await;
                Err(ProcessError::Cancelled {
                    program: program.clone(),
                })
            },
            Finish::TimedOut => {
                self.kill(&mut child, &program).await;
                Err(ProcessError::Timeout {
                    program: program.clone(),
                    timeout_ms: spec.timeout.map_or(0, duration_ms),
                })
            },
        };

        if let Some(logger) = &self.logger {
            let elapsed_ms = duration_ms(started.elapsed());
            match &result {
                Ok(output) => logger.debug(
                    "process.finished",
                    "command finished",
                    Some(log_fields([
                        ("program", serde_json::Value::from(program)),
                        ("exitCode", serde_json::Value::from(output.exit_code)),
                        ("durationMs", serde_json::Value::from(elapsed_ms)),
                    ])),
                ),
                Err(error) => logger.warn(
                    "process.failed",
                    &error.to_string(),
                    Some(log_fields([
                        ("program", serde_json::Value::from(program)),
                        ("durationMs", serde_json::Value::from(elapsed_ms)),
                    ])),
                ),
            }
        }
        result
    }

    async fn kill(&self, child: &mut Child, program: &str) {
        #[cfg(unix)]
        self.kill_group(child, program);
        if let Err(error) = child.kill().await
            && let Some(logger) = &self.logger
        {
            logger.warn(
                "process.kill_failed",
                &format!("failed to kill `{program}`: {error}"),
                None,
            );
        }
    }

    /// SIGKILL the child's process group, reaching grandchildren of a shell.
    #[cfg(unix)]
    fn kill_group(&self, child: &Child, program: &str) {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        let Some(pid) = child.id().and_then(|pid| i32::try_from(pid).ok()) else {
            return;
        };
        if let Err(error) = killpg(Pid::from_raw(pid), Signal::SIGKILL)
            && let Some(logger) = &self.logger
        {
            logger.warn(
                "process.kill_failed",
                &format!("failed to kill process group of `{program}`: {error}"),
                None,
            );
        }
    }
}

impl ProcessRunner for ShellProcessRunner {
    fn run(
        &self,
        ctx: &RequestContext,
        spec: CommandSpec,
    ) -> BoxFuture<'_, Result<ProcessOutput, ProcessError>> {
        let ctx = ctx.clone();
        Box::pin(async move { self.execute(&ctx, spec).await })
    }
}

enum Finish {
    Exited(Result<ProcessOutput, String>),
    Cancelled,
    TimedOut,
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

async fn deadline(timeout: Option<Duration>) {
    match timeout {
        Some(timeout) => tokio::time::sleep(timeout).await,
        None => std::future::pending::<()>().await,
    }
}

async fn collect_output(child: &mut Child) -> Result<ProcessOutput, String> {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let (stdout, stderr) = tokio::join!(read_text(stdout), read_text(stderr));
    let status = child.wait().await.map_err(|error| error.to_string())?;
    Ok(ProcessOutput {
        stdout: stdout?,
        stderr: stderr?,
        // Signal termination carries no code.
        exit_code: status.code().unwrap_or(-1),
    })
}

async fn read_text<R>(reader: Option<R>) -> Result<String, String>
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return Ok(String::new());
    };
    let mut chunks = FramedRead::new(reader, BytesCodec::new());
    let mut bytes = Vec::new();
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.map_err(|error| error.to_string())?;
        bytes.extend_from_slice(&chunk);
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
