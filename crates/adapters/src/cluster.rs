//! Cluster adapter driving `asinfo`, `asbench` and `aql` through a [`ProcessRunner`].
//!
//! Counts are aggregated over every node listed by the seed's `services`
//! response, so replica copies are folded back into logical counts.

use backup_harness_domain::{
    ConnectionProfile, ReportError, cluster_size, master_objects, peer_addresses,
    per_node_logical_count, replication_factor, set_object_count,
};
use backup_harness_ports::{
    BoxFuture, ClusterPort, CommandSpec, ProcessRunner, RecordBins, SeedRequest,
};
use backup_harness_shared::{ErrorCode, ErrorEnvelope, RequestContext, Result};
use std::sync::Arc;
use std::time::Duration;

/// Default `asbench` worker threads.
pub const DEFAULT_BENCH_THREADS: u32 = 20;
/// Default `asbench` batch size.
pub const DEFAULT_BENCH_BATCH_SIZE: u32 = 100;

/// Load generator knobs for [`ClusterPort::seed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BenchSettings {
    /// `--threads`.
    pub threads: u32,
    /// `--batch-size`.
    pub batch_size: u32,
}

impl Default for BenchSettings {
    fn default() -> Self {
        Self {
            threads: DEFAULT_BENCH_THREADS,
            batch_size: DEFAULT_BENCH_BATCH_SIZE,
        }
    }
}

/// [`ClusterPort`] over the command-line tools.
#[derive(Clone)]
pub struct AsinfoCluster {
    runner: Arc<dyn ProcessRunner>,
    profile: ConnectionProfile,
    bench: BenchSettings,
    timeout: Option<Duration>,
}

impl AsinfoCluster {
    /// Cluster reached through `profile`.
    #[must_use]
    pub fn new(runner: Arc<dyn ProcessRunner>, profile: ConnectionProfile) -> Self {
        Self {
            runner,
            profile,
            bench: BenchSettings::default(),
            timeout: None,
        }
    }

    /// Override the load generator settings.
    #[must_use]
    pub const fn with_bench(mut self, bench: BenchSettings) -> Self {
        self.bench = bench;
        self
    }

    /// Bound every tool invocation.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// `asbench` argv writing `request` with the insert workload.
    #[must_use]
    pub fn seed_command(&self, request: &SeedRequest) -> CommandSpec {
        let mut args = vec![
            "asbench".to_string(),
            "--workload".to_string(),
            "I".to_string(),
            "-U".to_string(),
            self.profile.user.clone(),
            format!("-P{}", self.profile.password.expose()),
            "--namespace".to_string(),
            request.namespace.clone(),
            "--set".to_string(),
            request.set.clone(),
            "--keys".to_string(),
            request.records.to_string(),
            "--start-key".to_string(),
            request.start_key.to_string(),
        ];
        if let Some(size) = request.object_size {
            args.push("--object-spec".to_string());
            args.push(format!("B{size}"));
        }
        args.extend([
            "--threads".to_string(),
            self.bench.threads.to_string(),
            "--batch-size".to_string(),
            self.bench.batch_size.to_string(),
        ]);
        args.extend(self.profile.bench_connection_args());
        CommandSpec::argv(args).with_optional_timeout(self.timeout)
    }

    /// `asinfo -v <command>` against one node.
    #[must_use]
    pub fn info_command(&self, node: Option<(&str, u16)>, command: &str) -> CommandSpec {
        let profile = node.map_or_else(
            || self.profile.clone(),
            |(host, port)| ConnectionProfile {
                host: host.to_string(),
                port,
                ..self.profile.clone()
            },
        );
        let mut args = vec!["asinfo".to_string()];
        args.extend(profile.info_connection_args());
        args.push("-v".to_string());
        args.push(command.to_string());
        CommandSpec::argv(args).with_optional_timeout(self.timeout)
    }

    /// `aql` argv selecting one record by integer key, JSON output.
    #[must_use]
    pub fn record_command(&self, namespace: &str, set: &str, key: u64) -> CommandSpec {
        let mut args = vec!["aql".to_string()];
        args.extend(self.profile.info_connection_args());
        args.extend([
            "-o".to_string(),
            "json".to_string(),
            "-c".to_string(),
            format!("SELECT * FROM {namespace}.{set} WHERE PK = {key}"),
        ]);
        CommandSpec::argv(args).with_optional_timeout(self.timeout)
    }

    async fn run_checked(
        &self,
        ctx: &RequestContext,
        spec: CommandSpec,
        failure: &'static str,
    ) -> Result<String> {
        let display = spec.display();
        let output = self.runner.run(ctx, spec).await?;
        if !output.success() {
            return Err(ErrorEnvelope::expected(
                ErrorCode::new("cluster", failure),
                format!("command exited with code {}", output.exit_code),
            )
            .with_metadata("command", display)
            .with_metadata("exit_code", output.exit_code.to_string())
            .with_output_tail(&output.combined()));
        }
        Ok(output.stdout.trim().to_string())
    }

    async fn info(
        &self,
        ctx: &RequestContext,
        node: Option<(&str, u16)>,
        command: &str,
    ) -> Result<String> {
        self.run_checked(ctx, self.info_command(node, command), "info_failed")
            .await
    }

    /// Seed node plus every peer it reports.
    async fn nodes(&self, ctx: &RequestContext) -> Result<Vec<(String, u16)>> {
        let mut nodes = vec![(self.profile.host.clone(), self.profile.port)];
        for peer in peer_addresses(&self.info(ctx, None, "services").await?) {
            if !nodes.contains(&peer) {
                nodes.push(peer);
            }
        }
        Ok(nodes)
    }

    async fn sum_over_nodes<F>(
        &self,
        ctx: &RequestContext,
        command: &str,
        parse: F,
    ) -> Result<u64>
    where
        F: Fn(&str) -> Result<u64, ReportError>,
    {
        let mut total = 0u64;
        for (host, port) in self.nodes(ctx).await? {
            ctx.ensure_not_cancelled("cluster.sum_over_nodes")?;
            let info = self.info(ctx, Some((&host, port)), command).await?;
            total = total.saturating_add(parse(&info)?);
        }
        Ok(total)
    }
}

impl ClusterPort for AsinfoCluster {
    fn seed(&self, ctx: &RequestContext, request: SeedRequest) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("cluster.seed")?;
            let spec = self.seed_command(&request);
            self.run_checked(&ctx, spec, "seed_failed")
                .await
                .map(|_| ())
                .map_err(|error| {
                    error
                        .with_metadata("namespace", request.namespace)
                        .with_metadata("set", request.set)
                })
        })
    }

    fn truncate_set(
        &self,
        ctx: &RequestContext,
        namespace: &str,
        set: &str,
    ) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        let command = format!("truncate:namespace={namespace};set={set}");
        Box::pin(async move {
            let response = self.info(&ctx, None, &command).await?;
            if response.eq_ignore_ascii_case("ok") {
                Ok(())
            } else {
                Err(ErrorEnvelope::expected(
                    ErrorCode::new("cluster", "truncate_rejected"),
                    format!("truncate was rejected: {response}"),
                )
                .with_metadata("command", command))
            }
        })
    }

    fn read_record(
        &self,
        ctx: &RequestContext,
        namespace: &str,
        set: &str,
        key: u64,
    ) -> BoxFuture<'_, Result<Option<RecordBins>>> {
        let ctx = ctx.clone();
        let spec = self.record_command(namespace, set, key);
        Box::pin(async move {
            let display = spec.display();
            let output = self.runner.run(&ctx, spec).await?;
            let combined = output.combined();
            if combined.contains(RECORD_NOT_FOUND) {
                return Ok(None);
            }
            if !output.success() {
                return Err(ErrorEnvelope::expected(
                    ErrorCode::new("cluster", "record_read_failed"),
                    format!("command exited with code {}", output.exit_code),
                )
                .with_metadata("command", display)
                .with_output_tail(&combined));
            }
            parse_aql_record(&output.stdout).map_err(|error| {
                error
                    .with_metadata("command", display)
                    .with_output_tail(&combined)
            })
        })
    }

    fn set_object_count(
        &self,
        ctx: &RequestContext,
        namespace: &str,
        set: &str,
    ) -> BoxFuture<'_, Result<u64>> {
        let ctx = ctx.clone();
        let namespace = namespace.to_string();
        let set = set.to_string();
        Box::pin(async move {
            let raw = self
                .sum_over_nodes(&ctx, "sets", |info| set_object_count(info, &namespace, &set))
                .await?;
            let factor = replication_factor(
                &self
                    .info(&ctx, None, &format!("get-config:context=namespace;id={namespace}"))
                    .await?,
            )?;
            let nodes = cluster_size(&self.info(&ctx, None, "statistics").await?)?;
            Ok(per_node_logical_count(raw, factor, nodes))
        })
    }

    fn namespace_object_count(
        &self,
        ctx: &RequestContext,
        namespace: &str,
    ) -> BoxFuture<'_, Result<u64>> {
        let ctx = ctx.clone();
        let command = format!("namespace/{namespace}");
        Box::pin(async move { self.sum_over_nodes(&ctx, &command, master_objects).await })
    }

    fn replication_factor(
        &self,
        ctx: &RequestContext,
        namespace: &str,
    ) -> BoxFuture<'_, Result<u64>> {
        let ctx = ctx.clone();
        let command = format!("get-config:context=namespace;id={namespace}");
        Box::pin(async move {
            let info = self.info(&ctx, None, &command).await?;
            Ok(replication_factor(&info)?)
        })
    }
}

const RECORD_NOT_FOUND: &str = "RECORD_NOT_FOUND";

/// Bins of the first row in `aql -o json` output.
///
/// The output is a list of result sets; the first holds the selected rows,
/// the last the statement status. `PK` and `{meta}` columns are dropped.
fn parse_aql_record(stdout: &str) -> Result<Option<RecordBins>> {
    let invalid = |message: String| {
        ErrorEnvelope::expected(ErrorCode::new("cluster", "record_parse"), message)
    };
    let start = stdout
        .find('[')
        .ok_or_else(|| invalid("no JSON result in aql output".to_string()))?;
    let value = serde_json::Deserializer::from_str(stdout.get(start..).unwrap_or_default())
        .into_iter::<serde_json::Value>()
        .next()
        .ok_or_else(|| invalid("empty aql output".to_string()))?
        .map_err(|error| invalid(format!("invalid aql JSON: {error}")))?;

    let row = value
        .as_array()
        .and_then(|sets| sets.first())
        .and_then(serde_json::Value::as_array)
        .and_then(|rows| rows.first())
        .and_then(serde_json::Value::as_object);
    Ok(row.map(|row| {
        row.iter()
            .filter(|(bin, _)| *bin != "PK" && !bin.starts_with('{'))
            .map(|(bin, value)| (bin.clone(), value.clone()))
            .collect()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use backup_harness_ports::{Invocation, ProcessError, ProcessOutput};

    /// Answers `asinfo` calls by matching the `-v` command.
    #[derive(Default)]
    struct InfoScript {
        responses: Vec<(String, String)>,
    }

    impl InfoScript {
        fn with(mut self, host: &str, command: &str, response: &str) -> Self {
            self.responses
                .push((format!("{host}|{command}"), response.to_string()));
            self
        }
    }

    impl ProcessRunner for InfoScript {
        fn run(
            &self,
            _ctx: &RequestContext,
            spec: CommandSpec,
        ) -> BoxFuture<'_, Result<ProcessOutput, ProcessError>> {
            Box::pin(async move {
                let Invocation::Argv(args) = spec.invocation else {
                    return Ok(ProcessOutput::default());
                };
                let host = args
                    .iter()
                    .position(|arg| arg == "-h")
                    .and_then(|index| args.get(index + 1))
                    .cloned()
                    .unwrap_or_default();
                let command = args.last().cloned().unwrap_or_default();
                let key = format!("{host}|{command}");
                let stdout = self
                    .responses
                    .iter()
                    .find(|(candidate, _)| *candidate == key)
                    .map(|(_, response)| response.clone());
                Ok(stdout.map_or_else(
                    || ProcessOutput {
                        stderr: format!("no script for {key}"),
                        exit_code: 1,
                        ..ProcessOutput::default()
                    },
                    |stdout| ProcessOutput {
                        stdout,
                        ..ProcessOutput::default()
                    },
                ))
            })
        }
    }

    fn two_node_script() -> InfoScript {
        InfoScript::default()
            .with("localhost", "services", "10.0.0.2:3000")
            .with("localhost", "sets", "ns=test:set=users:objects=100:tombstones=0;")
            .with("10.0.0.2", "sets", "ns=test:set=users:objects=100:tombstones=0;")
            .with(
                "localhost",
                "get-config:context=namespace;id=test",
                "replication-factor=2;memory-size=1",
            )
            .with("localhost", "statistics", "cluster_size=2;uptime=5")
            .with("localhost", "namespace/test", "objects=100;master_objects=60;")
            .with("10.0.0.2", "namespace/test", "objects=100;master_objects=40;")
            .with("localhost", "truncate:namespace=test;set=users", "ok")
    }

    #[tokio::test]
    async fn counts_fold_replicas_across_nodes() -> Result<()> {
        let cluster = AsinfoCluster::new(Arc::new(two_node_script()), ConnectionProfile::local());
        let ctx = RequestContext::new_request();
        assert_eq!(cluster.set_object_count(&ctx, "test", "users").await?, 100);
        assert_eq!(cluster.namespace_object_count(&ctx, "test").await?, 100);
        assert_eq!(cluster.replication_factor(&ctx, "test").await?, 2);
        cluster.truncate_set(&ctx, "test", "users").await?;
        Ok(())
    }

    #[tokio::test]
    async fn failed_info_carries_output_tail() {
        let cluster = AsinfoCluster::new(Arc::new(InfoScript::default()), ConnectionProfile::local());
        let ctx = RequestContext::new_request();
        let error = cluster.replication_factor(&ctx, "test").await.err();
        assert_eq!(
            error.map(|error| error.code),
            Some(ErrorCode::new("cluster", "info_failed"))
        );
    }

    #[test]
    fn aql_rows_become_bins() -> Result<()> {
        let stdout = "[\n  [\n    {\n      \"PK\": 7,\n      \"{gen}\": 2,\n      \"testbin\": \"abc\"\n    }\n  ],\n  [\n    { \"Status\": 0 }\n  ]\n]\n";
        let bins = parse_aql_record(stdout)?;
        assert_eq!(
            bins,
            Some(RecordBins::from([(
                "testbin".to_string(),
                serde_json::Value::from("abc")
            )]))
        );
        assert_eq!(parse_aql_record("[ [], [ { \"Status\": 0 } ] ]")?, None);
        assert!(parse_aql_record("Error: not json").is_err());
        Ok(())
    }

    #[tokio::test]
    async fn missing_record_reads_as_none() -> Result<()> {
        let cluster = AsinfoCluster::new(Arc::new(InfoScript::default()), ConnectionProfile::local());
        let spec = cluster.record_command("test", "users", 3);
        assert_eq!(
            spec.command_text(),
            "aql -U tester -P psw -h localhost -p 3000 -o json -c 'SELECT * FROM test.users WHERE PK = 3'"
        );

        let cluster = AsinfoCluster::new(Arc::new(NotFound), ConnectionProfile::local());
        let ctx = RequestContext::new_request();
        assert_eq!(cluster.read_record(&ctx, "test", "users", 3).await?, None);
        Ok(())
    }

    struct NotFound;

    impl ProcessRunner for NotFound {
        fn run(
            &self,
            _ctx: &RequestContext,
            _spec: CommandSpec,
        ) -> BoxFuture<'_, Result<ProcessOutput, ProcessError>> {
            Box::pin(async {
                Ok(ProcessOutput {
                    stdout: "Error: (2) AEROSPIKE_ERR_RECORD_NOT_FOUND\n".to_string(),
                    exit_code: 1,
                    ..ProcessOutput::default()
                })
            })
        }
    }

    #[test]
    fn seed_command_uses_insert_workload() {
        let cluster = AsinfoCluster::new(Arc::new(InfoScript::default()), ConnectionProfile::local())
            .with_bench(BenchSettings {
                threads: 4,
                batch_size: 10,
            });
        let spec = cluster.seed_command(
            &SeedRequest {
                object_size: Some(1024),
                ..SeedRequest::new("test", "users", 500)
            }
            .starting_at(500),
        );
        assert_eq!(
            spec.command_text(),
            "asbench --workload I -U tester -Ppsw --namespace test --set users --keys 500 \
             --start-key 500 --object-spec B1024 --threads 4 --batch-size 10 --port 3000"
        );
    }
}
