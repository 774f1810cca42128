//! `asbench` load generator builder.

use crate::argv::{CommandLine, Flag};
use crate::tools::{ToolDeps, ToolSettings};
use backup_harness_ports::{CommandSpec, ProcessOutput, log_fields};
use backup_harness_shared::{ErrorCode, ErrorEnvelope, RequestContext, Result};
use serde_json::Value;

/// Default `--threads`.
pub const DEFAULT_THREADS: u32 = 20;
/// Default `--batch-size`.
pub const DEFAULT_BATCH_SIZE: u32 = 100;

/// Insert workload against one set.
///
/// Connection arguments are appended when the command is rendered, so the
/// optional workload flags always precede them.
#[derive(Debug, Clone)]
pub struct AsBench {
    command: CommandLine,
    threads: u32,
    batch_size: u32,
    settings: ToolSettings,
}

impl AsBench {
    /// `asbench --workload I` for `namespace`/`set`.
    pub fn insert(settings: &ToolSettings, namespace: &str, set: &str) -> Self {
        let profile = &settings.profile;
        let mut command = CommandLine::new("asbench");
        command
            .push("workload", "I")
            .push("-U", &profile.user)
            .push_flag(Flag::attached("-P", profile.password.expose()))
            .push("namespace", namespace)
            .push("set", set);
        Self {
            command,
            threads: DEFAULT_THREADS,
            batch_size: DEFAULT_BATCH_SIZE,
            settings: settings.clone(),
        }
    }

    /// `--duration <seconds>`.
    #[must_use]
    pub fn duration(mut self, seconds: u64) -> Self {
        self.command.push("duration", seconds);
        self
    }

    /// `--keys <n>`.
    #[must_use]
    pub fn keys(mut self, keys: u64) -> Self {
        self.command.push("keys", keys);
        self
    }

    /// `--throughput <tps>`.
    #[must_use]
    pub fn throughput(mut self, tps: u64) -> Self {
        self.command.push("throughput", tps);
        self
    }

    /// `--start-key <key>`.
    #[must_use]
    pub fn start_key(mut self, key: u64) -> Self {
        self.command.push("start-key", key);
        self
    }

    /// One blob bin of `bytes` bytes (`--object-spec B<bytes>`).
    #[must_use]
    pub fn object_size(mut self, bytes: u32) -> Self {
        self.command.push("object-spec", format!("B{bytes}"));
        self
    }

    /// Raw `--object-spec`.
    #[must_use]
    pub fn object_spec(mut self, spec: &str) -> Self {
        self.command.push("object-spec", spec);
        self
    }

    /// `--threads`; defaults to [`DEFAULT_THREADS`].
    #[must_use]
    pub const fn threads(mut self, threads: u32) -> Self {
        self.threads = threads;
        self
    }

    /// `--batch-size`; defaults to [`DEFAULT_BATCH_SIZE`].
    #[must_use]
    pub const fn batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// `--send-key`.
    #[must_use]
    pub fn send_key(mut self) -> Self {
        self.command.push_switch("send-key");
        self
    }

    /// Full command line including the connection tail.
    pub fn command(&self) -> CommandLine {
        let mut command = self.command.clone();
        command
            .push("threads", self.threads)
            .push("batch-size", self.batch_size)
            .extend_tokens(
                self.settings
                    .profile
                    .bench_connection_args()
                    .iter()
                    .map(String::as_str),
            );
        command
    }

    /// Run the workload; a non-zero exit is an error.
    pub async fn run(&self, ctx: &RequestContext, deps: &ToolDeps) -> Result<ProcessOutput> {
        ctx.ensure_not_cancelled("asbench.run")?;
        let command = self.command();
        deps.info(
            "asbench.run",
            "Run asbench",
            log_fields([("command", Value::from(command.to_shell()))]),
        );
        let spec = CommandSpec::argv(command.to_argv()).with_optional_timeout(self.settings.timeout);
        let output = deps.runner.run(ctx, spec).await?;
        if output.success() {
            return Ok(output);
        }
        Err(ErrorEnvelope::expected(
            ErrorCode::new("asbench", "failed"),
            format!("asbench exited with code {}", output.exit_code),
        )
        .with_output_tail(&output.combined()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backup_harness_domain::{ConnectionProfile, Environment, TlsSettings};
    use backup_harness_testkit::{ScriptedProcessRunner, fixtures};
    use std::sync::Arc;

    #[test]
    fn local_command_ends_with_port() {
        let bench = AsBench::insert(&ToolSettings::local(), "test", "users")
            .keys(1000)
            .start_key(10)
            .object_size(512);
        assert_eq!(
            bench.command().to_shell(),
            "asbench --workload I -U tester -Ppsw --namespace test --set users --keys 1000 \
             --start-key 10 --object-spec B512 --threads 20 --batch-size 100 --port 3000"
        );
    }

    #[test]
    fn cloud_adds_tls_tail() {
        let mut settings = ToolSettings::local();
        settings.profile = ConnectionProfile {
            environment: Environment::Cloud,
            host: "asd.qa.ecosys.internal".to_string(),
            port: 4333,
            tls: Some(TlsSettings {
                name: "asd.aerospike.com".to_string(),
                ca_file: "/ca.pem".to_string(),
            }),
            ..ConnectionProfile::local()
        };
        let command = AsBench::insert(&settings, "test", "users")
            .threads(4)
            .batch_size(10)
            .send_key()
            .command();
        assert_eq!(
            command.to_shell(),
            "asbench --workload I -U tester -Ppsw --namespace test --set users --send-key \
             --threads 4 --batch-size 10 -h asd.qa.ecosys.internal:asd.aerospike.com:4333 \
             --tls-cafile=/ca.pem --tls-name=asd.aerospike.com --tls-enable --port 4333"
        );
    }

    #[tokio::test]
    async fn failed_run_is_an_error() {
        let runner = Arc::new(ScriptedProcessRunner::new());
        runner.respond("asbench", fixtures::exit(1, "connection refused"));
        let deps = ToolDeps::new(runner);

        let error = AsBench::insert(&ToolSettings::local(), "test", "users")
            .keys(10)
            .run(&RequestContext::new_request(), &deps)
            .await
            .err();
        assert_eq!(
            error.map(|error| error.code),
            Some(ErrorCode::new("asbench", "failed"))
        );
    }
}
