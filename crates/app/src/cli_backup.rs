//! `asbackup` command builder.
//!
//! Factories pick the connection form from the injected
//! [`ConnectionProfile`](backup_harness_domain::ConnectionProfile): TLS
//! clusters get the `--host`/`--tls-*` form, a plain multi-node cluster only
//! the `--host` seed.

use crate::argv::{CommandLine, Flag};
use crate::macros::{list_setters, switch_setters, value_setters};
use crate::tools::{ToolDeps, ToolSettings, clean_directory, run_from};
use backup_harness_domain::{BackupResult, Environment, EstimateResult};
use backup_harness_ports::{ProcessOutput, log_fields};
use backup_harness_shared::{RequestContext, Result};
use serde_json::Value;

/// Default `--parallel`.
pub const DEFAULT_PARALLEL: u32 = 8;
/// Key file name passed to `--encryption-key-file`.
pub const ENCRYPTION_KEY_FILE: &str = "encryptionKey";

/// Options of [`CliBackup::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackupRunOptions {
    /// Empty the backup directory first.
    pub clean_backup_dir: bool,
    /// Parse even when the output contains `ERROR`.
    pub ignore_errors: bool,
}

impl Default for BackupRunOptions {
    fn default() -> Self {
        Self {
            clean_backup_dir: true,
            ignore_errors: false,
        }
    }
}

/// Builder for one `asbackup` invocation.
#[derive(Debug, Clone)]
pub struct CliBackup {
    namespace: String,
    backup_dir: Option<String>,
    command: CommandLine,
    settings: ToolSettings,
}

impl CliBackup {
    /// Back up `namespace` without a directory.
    pub fn on(settings: &ToolSettings, namespace: &str) -> Self {
        Self::standard(settings, namespace, None, None)
    }

    /// Back up `namespace` into `<backup_root>/<dir>`.
    pub fn on_dir(settings: &ToolSettings, namespace: &str, dir: &str) -> Self {
        Self::standard(settings, namespace, Some(settings.backup_path(dir)), None)
    }

    /// [`CliBackup::on_dir`] with an explicit `--parallel`.
    pub fn on_parallel(settings: &ToolSettings, namespace: &str, dir: &str, parallel: u32) -> Self {
        Self::standard(
            settings,
            namespace,
            Some(settings.backup_path(dir)),
            Some(parallel),
        )
    }

    /// Back up into `dir` used verbatim.
    pub fn on_exact_dir(settings: &ToolSettings, namespace: &str, dir: &str) -> Self {
        Self::standard(settings, namespace, Some(dir.to_string()), None)
    }

    /// `asbackup xdr` base command.
    pub fn xdr(settings: &ToolSettings, namespace: &str, dir: &str) -> Self {
        let backup_dir = settings.backup_path(dir);
        let profile = &settings.profile;
        let mut command = CommandLine::new("./asbackup");
        command
            .push_word("xdr")
            .push("namespace", namespace)
            .push("user", &profile.user)
            .push("password", profile.password.expose())
            .push("directory", &backup_dir);
        if profile.environment == Environment::LocalMultiNode && !profile.tls_enabled() {
            command.push("host", profile.host_spec());
        }
        Self {
            namespace: namespace.to_string(),
            backup_dir: Some(backup_dir),
            command,
            settings: settings.clone(),
        }
    }

    /// XDR backup fed by data center `dc` on `local_port`.
    ///
    /// TLS clusters also get the seed host and CA flags.
    pub fn on_with_xdr(
        settings: &ToolSettings,
        namespace: &str,
        dir: &str,
        dc: &str,
        local_port: u16,
    ) -> Self {
        let mut backup = Self::xdr(settings, namespace, dir)
            .local_address()
            .dc(dc)
            .local_port(local_port)
            .remove_files();
        let profile = &settings.profile;
        if let Some(ca_file) = profile.tls_ca_file() {
            backup
                .command
                .push("host", profile.host_spec())
                .push_flag(Flag::equals("tls-cafile", ca_file))
                .push_switch("tls-enable");
        }
        backup
    }

    fn standard(
        settings: &ToolSettings,
        namespace: &str,
        backup_dir: Option<String>,
        parallel: Option<u32>,
    ) -> Self {
        let profile = &settings.profile;
        let mut command = CommandLine::new("./asbackup");
        if let (Environment::Cloud, Some(ca_file)) = (profile.environment, profile.tls_ca_file()) {
            command
                .push("user", &profile.user)
                .push("password", profile.password.expose());
            if let Some(dir) = &backup_dir {
                command.push("directory", dir);
            }
            command
                .push("namespace", namespace)
                .push_switch("remove-files")
                .push("host", profile.host_spec())
                .push_flag(Flag::equals("tls-cafile", ca_file))
                .push_switch("tls-enable");
            if let Some(parallel) = parallel {
                command.push("parallel", parallel);
            }
        } else {
            command
                .push("namespace", namespace)
                .push("user", &profile.user)
                .push("password", profile.password.expose())
                .push("parallel", parallel.unwrap_or(settings.backup_parallel));
            if let Some(dir) = &backup_dir {
                command.push("directory", dir);
            }
            if profile.environment == Environment::LocalMultiNode {
                command.push("host", profile.host_spec());
            }
        }
        Self {
            namespace: namespace.to_string(),
            backup_dir,
            command,
            settings: settings.clone(),
        }
    }

    /// Command line as built so far.
    pub const fn command(&self) -> &CommandLine {
        &self.command
    }

    /// Backup directory, when one was given.
    pub fn backup_dir(&self) -> Option<&str> {
        self.backup_dir.as_deref()
    }

    value_setters! {
        records_per_second => "records-per-second";
        total_timeout => "total-timeout";
        socket_timeout => "socket-timeout";
        nice => "nice";
        bandwidth => "bandwidth";
        file_limit => "file-limit";
        encryption_mode => "encrypt";
        encryption_key_secret => "encryption-key-secret";
        compress_mode => "compress";
        compression_level => "compression-level";
        estimate_samples => "estimate-samples";
        after_digest => "after-digest";
        modified_after => "modified-after";
        modified_before => "modified-before";
        partition_list => "partition-list";
        filter_expression => "filter-exp";
        parallel => "parallel";
        parallel_write => "parallel-write";
        node_list => "node-list";
        info_polling_period => "info-poling-period";
        s3_endpoint_override => "s3-endpoint-override";
        s3_region => "s3-region";
        s3_profile => "s3-profile";
        s3_bucket_name => "s3-bucket-name";
        s3_access_key_id => "s3-access-key-id";
        s3_secret_access_key => "s3-secret-access-key";
        azure_account_name => "azure-account-name";
        azure_account_key => "azure-account-key";
        azure_container_name => "azure-container-name";
        azure_endpoint => "azure-endpoint";
        azure_tenant_id => "azure-tenant-id";
        azure_client_secret => "azure-client-secret";
        azure_client_id => "azure-client-id";
        gcp_bucket_name => "gcp-bucket-name";
        gcp_endpoint_override => "gcp-endpoint-override";
        host => "host";
        port => "port";
        tls_cafile => "tls-cafile";
        namespace => "namespace";
        user => "user";
        password => "password";
        directory => "directory";
        dc => "dc";
        local_address_value => "local-address";
        local_port => "local-port";
        rewind => "rewind";
        read_timeout => "read-timeout";
        write_timeout => "write-timeout";
        start_timeout => "start-timeout";
        max_throughput => "max-throughput";
        results_queue_size => "results-queue-size";
        ack_queue_size => "ack-queue-size";
        max_connections => "max-connections";
        max_retries => "max-retries";
    }

    switch_setters! {
        no_bins => "no-bins";
        no_ttl_only => "no-ttl-only";
        estimate_flag => "estimate";
        compact => "compact";
        remove_files => "remove-files";
        remove_artifacts => "remove-artifacts";
        enable_tls => "tls-enable";
        stop_xdr_flag => "stop-xdr";
        unblock_mrt => "unblock-mrt";
        verbose => "verbose";
    }

    list_setters! {
        sets => "set";
        bin_list => "bin-list";
    }

    /// `--encryption-key-file encryptionKey`.
    #[must_use]
    pub fn encryption_key_file(mut self) -> Self {
        self.command.push("encryption-key-file", ENCRYPTION_KEY_FILE);
        self
    }

    /// `--local-address` taken from the connection profile.
    #[must_use]
    pub fn local_address(self) -> Self {
        let address = self.settings.profile.local_address.clone();
        self.local_address_value(address)
    }

    /// `--gcp-key-path` taken from the connection profile, when configured.
    #[must_use]
    pub fn gcp_key_path(mut self) -> Self {
        if let Some(path) = self.settings.profile.gcp_key_path.clone() {
            self.command.push("gcp-key-path", path);
        }
        self
    }

    /// Secret agent flags taken from the connection profile, when configured.
    #[must_use]
    pub fn secret_agent(mut self) -> Self {
        if let Some(agent) = self.settings.profile.secret_agent.clone() {
            self.command
                .push("sa-port", agent.port)
                .push("sa-connection-type", "tcp")
                .push("sa-address", agent.address)
                .push_switch("sa-is-base64");
        }
        self
    }

    /// `--<flag> <value>`.
    #[must_use]
    pub fn custom_flag(mut self, flag: &str, value: impl ToString) -> Self {
        self.command.push(flag, value.to_string());
        self
    }

    /// Remove every `--<flag>` and its value.
    #[must_use]
    pub fn remove_flag(mut self, flag: &str) -> Self {
        self.command.remove_flag(flag);
        self
    }

    /// Replace `--<flag>` with a single `--<flag> <value>`.
    #[must_use]
    pub fn replace_flag(mut self, flag: &str, value: impl ToString) -> Self {
        self.command.replace_flag(flag, value.to_string());
        self
    }

    /// Turn `--directory X` into `--output-file X/<name>.asb`.
    #[must_use]
    pub fn output_file(mut self, name: &str) -> Self {
        self.command.rewrite_flag("directory", |flag| {
            let dir = flag.value.as_deref().unwrap_or_default();
            Flag::space("output-file", format!("{dir}/{name}.asb"))
        });
        self
    }

    /// Run and parse the report.
    pub async fn run(
        &self,
        ctx: &RequestContext,
        deps: &ToolDeps,
        options: BackupRunOptions,
    ) -> Result<BackupResult> {
        let output = self.execute(ctx, deps, options.clean_backup_dir).await?;
        let report = self.settings.report_options(options.ignore_errors);
        let result = BackupResult::parse(&output.combined(), report)?;
        Ok(result.with_backup_dir(self.backup_dir.clone().unwrap_or_default()))
    }

    /// Run without parsing.
    pub async fn run_raw(
        &self,
        ctx: &RequestContext,
        deps: &ToolDeps,
        clean_backup_dir: bool,
    ) -> Result<ProcessOutput> {
        self.execute(ctx, deps, clean_backup_dir).await
    }

    async fn execute(
        &self,
        ctx: &RequestContext,
        deps: &ToolDeps,
        clean_backup_dir: bool,
    ) -> Result<ProcessOutput> {
        ctx.ensure_not_cancelled("cli_backup.run")?;
        deps.info(
            "cli_backup.run",
            "Run asbackup",
            log_fields([
                ("namespace", Value::from(self.namespace.as_str())),
                ("directory", Value::from(self.backup_dir.as_deref().unwrap_or(""))),
            ]),
        );
        if clean_backup_dir && let Some(dir) = &self.backup_dir {
            clean_directory(deps.runner.as_ref(), ctx, dir).await?;
        }
        run_from(
            deps.runner.as_ref(),
            ctx,
            &self.command,
            &self.settings.asbackup_dir,
            true,
            self.settings.timeout,
        )
        .await
    }

    /// Run with `--estimate`, optionally dropping `--directory`.
    pub async fn estimate(
        mut self,
        ctx: &RequestContext,
        deps: &ToolDeps,
        remove_directory: bool,
    ) -> Result<EstimateResult> {
        self = self.estimate_flag();
        if remove_directory {
            self.command.remove_flag("directory");
        }
        deps.info(
            "cli_backup.estimate",
            "Run estimation",
            log_fields([("namespace", Value::from(self.namespace.as_str()))]),
        );
        let output = self.run_quiet(ctx, deps).await?;
        Ok(EstimateResult::parse(&output.combined())?)
    }

    /// `--stop-xdr --dc <dc> --local-address ..`; returns the raw output.
    pub async fn stop_xdr(
        self,
        ctx: &RequestContext,
        deps: &ToolDeps,
        dc: &str,
    ) -> Result<ProcessOutput> {
        let backup = self.stop_xdr_flag().dc(dc).local_address();
        deps.info(
            "cli_backup.stop_xdr",
            "Stopping xdr",
            log_fields([("dc", Value::from(dc))]),
        );
        backup.run_quiet(ctx, deps).await
    }

    /// `--unblock-mrt --local-address ..`; returns the raw output.
    pub async fn unblock_mrt_writes(
        self,
        ctx: &RequestContext,
        deps: &ToolDeps,
    ) -> Result<ProcessOutput> {
        let backup = self.unblock_mrt().local_address();
        deps.info(
            "cli_backup.unblock_mrt",
            "Unblocking mrt writes",
            log_fields([("namespace", Value::from(backup.namespace.as_str()))]),
        );
        backup.run_quiet(ctx, deps).await
    }

    async fn run_quiet(&self, ctx: &RequestContext, deps: &ToolDeps) -> Result<ProcessOutput> {
        run_from(
            deps.runner.as_ref(),
            ctx,
            &self.command,
            &self.settings.asbackup_dir,
            false,
            self.settings.timeout,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backup_harness_domain::{ConnectionProfile, TlsSettings};
    use backup_harness_ports::Invocation;
    use backup_harness_shared::ErrorCode;
    use backup_harness_testkit::{ScriptedProcessRunner, fixtures};
    use std::sync::Arc;

    fn cloud_settings() -> ToolSettings {
        let mut settings = ToolSettings::local();
        settings.profile = ConnectionProfile {
            environment: Environment::Cloud,
            host: "asd.qa.ecosys.internal".to_string(),
            port: 4333,
            tls: Some(TlsSettings {
                name: "asd.aerospike.com".to_string(),
                ca_file: "/certs/ca.pem".to_string(),
            }),
            local_address: "10.0.0.1".to_string(),
            ..ConnectionProfile::local()
        };
        settings
    }

    fn shell_text(runner: &ScriptedProcessRunner, index: usize) -> String {
        runner
            .calls()
            .get(index)
            .map(|spec| match &spec.invocation {
                Invocation::Shell(script) => script.clone(),
                Invocation::Argv(args) => args.join(" "),
            })
            .unwrap_or_default()
    }

    #[test]
    fn local_base_command() {
        let backup = CliBackup::on_dir(&ToolSettings::local(), "test", "dir1");
        assert_eq!(
            backup.command().to_shell(),
            "./asbackup --namespace test --user tester --password psw --parallel 8 --directory /tmp/dir1"
        );
        let bare = CliBackup::on(&ToolSettings::local(), "test");
        assert!(!bare.command().has_flag("directory"));
    }

    #[test]
    fn multi_node_adds_seed_host() {
        let mut settings = ToolSettings::local();
        settings.profile.environment = Environment::LocalMultiNode;
        settings.profile.host = "10.1.1.1".to_string();
        let backup = CliBackup::on_exact_dir(&settings, "test", "/data/b");
        assert_eq!(backup.command().value_of("host"), Some("10.1.1.1:asd.aerospike.com:3000"));
        assert_eq!(backup.command().value_of("directory"), Some("/data/b"));
    }

    #[test]
    fn cloud_uses_tls_form() {
        let backup = CliBackup::on_dir(&cloud_settings(), "test", "dir1");
        assert_eq!(
            backup.command().to_shell(),
            "./asbackup --user tester --password psw --directory /tmp/dir1 --namespace test \
             --remove-files --host asd.qa.ecosys.internal:asd.aerospike.com:4333 \
             --tls-cafile=/certs/ca.pem --tls-enable"
        );
    }

    #[test]
    fn xdr_factory_adds_dc_and_local_endpoint() {
        let backup = CliBackup::on_with_xdr(&ToolSettings::local(), "test", "x", "dc1", 8080);
        assert_eq!(
            backup.command().to_shell(),
            "./asbackup xdr --namespace test --user tester --password psw --directory /tmp/x \
             --local-address host.docker.internal --dc dc1 --local-port 8080 --remove-files"
        );
        assert!(!backup.command().has_flag("parallel"));

        let tls = CliBackup::on_with_xdr(&cloud_settings(), "test", "x", "dc1", 8080);
        assert_eq!(tls.command().value_of("local-address"), Some("10.0.0.1"));
        assert_eq!(tls.command().value_of("tls-cafile"), Some("/certs/ca.pem"));
    }

    #[test]
    fn output_file_replaces_directory() {
        let backup = CliBackup::on_dir(&ToolSettings::local(), "test", "dir1")
            .sets(["a", "b"])
            .output_file("single");
        assert!(!backup.command().has_flag("directory"));
        assert_eq!(backup.command().value_of("output-file"), Some("/tmp/dir1/single.asb"));
        assert_eq!(backup.command().value_of("set"), Some("a,b"));
    }

    #[test]
    fn remove_flag_strips_every_style() {
        let backup = CliBackup::on_dir(&cloud_settings(), "test", "d")
            .namespace("second")
            .remove_flag("namespace")
            .remove_flag("tls-cafile");
        let text = backup.command().to_shell();
        assert!(!text.contains("--namespace"));
        assert!(!text.contains("--tls-cafile"));
        assert!(text.contains("--remove-files --host"));
    }

    #[tokio::test]
    async fn run_cleans_directory_and_parses_report() -> Result<()> {
        let runner = Arc::new(ScriptedProcessRunner::new());
        runner.respond("./asbackup", fixtures::ok(&fixtures::backup_report(100)));
        let deps = ToolDeps::new(runner.clone());

        let backup = CliBackup::on_dir(&ToolSettings::local(), "test", "dir1");
        let result = backup
            .run(&RequestContext::new_request(), &deps, BackupRunOptions::default())
            .await?;

        assert_eq!(result.records_read, 100);
        assert_eq!(result.backup_dir, "/tmp/dir1");
        assert_eq!(shell_text(&runner, 0), "rm -rf /tmp/dir1");
        assert_eq!(shell_text(&runner, 1), "mkdir -p /tmp/dir1");
        assert!(shell_text(&runner, 2).starts_with("./asbackup --namespace test"));
        assert_eq!(
            runner.calls().get(2).and_then(|spec| spec.workdir.clone()),
            Some(ToolSettings::local().asbackup_dir)
        );
        Ok(())
    }

    #[tokio::test]
    async fn error_marker_fails_unless_ignored() -> Result<()> {
        let runner = Arc::new(ScriptedProcessRunner::new());
        let report = format!("ERROR retrying node\n{}", fixtures::backup_report(5));
        runner.respond("./asbackup", fixtures::ok(&report));
        let deps = ToolDeps::new(runner);
        let ctx = RequestContext::new_request();
        let backup = CliBackup::on(&ToolSettings::local(), "test");

        let failure = backup.run(&ctx, &deps, BackupRunOptions::default()).await.err();
        assert_eq!(
            failure.map(|error| error.code),
            Some(ErrorCode::new("report", "backup_process"))
        );

        let options = BackupRunOptions {
            clean_backup_dir: false,
            ignore_errors: true,
        };
        assert_eq!(backup.run(&ctx, &deps, options).await?.records_read, 5);
        Ok(())
    }

    #[tokio::test]
    async fn estimate_drops_directory() -> Result<()> {
        let runner = Arc::new(ScriptedProcessRunner::new());
        runner.respond("--estimate", fixtures::ok("File size (bytes): 2048\n"));
        let deps = ToolDeps::new(runner.clone());

        let estimate = CliBackup::on_dir(&ToolSettings::local(), "test", "d")
            .estimate(&RequestContext::new_request(), &deps, true)
            .await?;
        assert_eq!(estimate.estimated_bytes, 2048);
        let text = shell_text(&runner, 0);
        assert!(text.ends_with("--parallel 8 --estimate"));
        assert_eq!(runner.calls().first().map(|spec| spec.print_workdir), Some(false));
        Ok(())
    }
}
