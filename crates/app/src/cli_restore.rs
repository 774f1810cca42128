//! `asrestore` command builder.

use crate::argv::{CommandLine, Flag};
use crate::macros::{list_setters, switch_setters, value_setters};
use crate::tools::{ToolDeps, ToolSettings, run_from};
use backup_harness_domain::{Environment, RestoreResult, ValidationReport};
use backup_harness_ports::log_fields;
use backup_harness_shared::{RequestContext, Result};
use serde_json::Value;

/// Default `--parallel`.
pub const DEFAULT_PARALLEL: u32 = 8;

/// Builder for one `asrestore` invocation.
#[derive(Debug, Clone)]
pub struct CliRestore {
    namespace: String,
    command: CommandLine,
    settings: ToolSettings,
}

impl CliRestore {
    /// Restore `namespace` without a directory.
    pub fn on(settings: &ToolSettings, namespace: &str) -> Self {
        Self::standard(settings, namespace, None, None)
    }

    /// Restore `namespace` from `dir`.
    pub fn on_dir(settings: &ToolSettings, namespace: &str, dir: &str) -> Self {
        Self::standard(settings, namespace, Some(dir), None)
    }

    /// [`CliRestore::on_dir`] with an explicit `--parallel`.
    pub fn on_parallel(settings: &ToolSettings, namespace: &str, dir: &str, parallel: u32) -> Self {
        Self::standard(settings, namespace, Some(dir), Some(parallel))
    }

    /// Restore `source` into `destination` (`--namespace source,destination`).
    pub fn on_mapped(settings: &ToolSettings, source: &str, destination: &str, dir: &str) -> Self {
        Self::standard(settings, &format!("{source},{destination}"), Some(dir), None)
    }

    /// No namespace and no directory; the caller supplies everything.
    pub fn bare(settings: &ToolSettings) -> Self {
        let profile = &settings.profile;
        let mut command = CommandLine::new("./asrestore");
        command
            .push("parallel", settings.restore_parallel)
            .push("user", &profile.user)
            .push("password", profile.password.expose());
        Self {
            namespace: String::new(),
            command,
            settings: settings.clone(),
        }
    }

    /// The TLS form regardless of environment.
    pub fn on_tls(settings: &ToolSettings, namespace: &str, dir: &str) -> Self {
        let mut restore = Self {
            namespace: namespace.to_string(),
            command: CommandLine::new("./asrestore"),
            settings: settings.clone(),
        };
        restore.push_tls_form(Some(dir));
        restore
    }

    fn standard(
        settings: &ToolSettings,
        namespace: &str,
        dir: Option<&str>,
        parallel: Option<u32>,
    ) -> Self {
        let profile = &settings.profile;
        let mut restore = Self {
            namespace: namespace.to_string(),
            command: CommandLine::new("./asrestore"),
            settings: settings.clone(),
        };
        if profile.environment == Environment::Cloud && profile.tls_enabled() {
            restore.push_tls_form(dir);
            if let Some(parallel) = parallel {
                restore.command.push("parallel", parallel);
            }
            return restore;
        }
        restore
            .command
            .push("namespace", namespace)
            .push("parallel", parallel.unwrap_or(settings.restore_parallel))
            .push("user", &profile.user)
            .push("password", profile.password.expose());
        if let Some(dir) = dir.filter(|dir| !dir.is_empty()) {
            restore.command.push("directory", dir);
        }
        if profile.environment == Environment::LocalMultiNode {
            restore.command.push("host", profile.host_spec());
        }
        restore
    }

    fn push_tls_form(&mut self, dir: Option<&str>) {
        let profile = &self.settings.profile;
        self.command
            .push("user", &profile.user)
            .push("password", profile.password.expose());
        if let Some(dir) = dir.filter(|dir| !dir.is_empty()) {
            self.command.push("directory", dir);
        }
        self.command
            .push("namespace", &self.namespace)
            .push("host", profile.host_spec());
        if let Some(ca_file) = profile.tls_ca_file() {
            self.command.push_flag(Flag::equals("tls-cafile", ca_file));
        }
        self.command
            .push_flag(Flag::equals("tls-name", profile.tls_name()))
            .push_switch("tls-enable");
    }

    /// Command line as built so far.
    pub const fn command(&self) -> &CommandLine {
        &self.command
    }

    value_setters! {
        extra_ttl => "extra-ttl";
        nice => "nice";
        bandwidth => "bandwidth";
        max_async_batches => "max-async-batches";
        batch_size => "batch-size";
        encryption_mode => "encrypt";
        encryption_key_secret => "encryption-key-secret";
        compress_mode => "compress";
        records_per_second => "records-per-second";
        total_timeout => "total-timeout";
        socket_timeout => "socket-timeout";
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
        parallel => "parallel";
        port => "port";
        host => "host";
        tls_cafile => "tls-cafile";
        namespace => "namespace";
        user => "user";
        password => "password";
        parent_directory => "parent-directory";
        retry_max_retries => "retry-max-retries";
        max_retries => "max-retries";
    }

    switch_setters! {
        no_records => "no-records";
        no_udfs => "no-udfs";
        no_indexes => "no-indexes";
        no_generation => "no-generation";
        unique => "unique";
        replace => "replace";
        disable_batch_writes => "disable-batch-writes";
        ignore_record_error => "ignore-record-error";
        enable_tls => "tls-enable";
    }

    list_setters! {
        sets => "set";
        bin_list => "bin-list";
    }

    /// `--encryption-key-file encryptionKey`.
    #[must_use]
    pub fn encryption_key_file(mut self) -> Self {
        self.command
            .push("encryption-key-file", crate::cli_backup::ENCRYPTION_KEY_FILE);
        self
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
                .push("sa-is-base64", "true");
        }
        self
    }

    /// `--directory-list a,b`, optionally dropping `--directory`.
    #[must_use]
    pub fn directory_list<I, S>(mut self, remove_directory: bool, dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.command
            .push("directory-list", crate::macros::join_csv(dirs));
        if remove_directory {
            self.command.remove_flag("directory");
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

    /// Replace the command with `./asrestore --input-file <file> --validate`.
    #[must_use]
    pub fn validate_file(self, file: &str) -> Self {
        self.validation_command("input-file", file.to_string())
    }

    /// Replace the command with `./asrestore --directory <dir> --validate`.
    #[must_use]
    pub fn validate_directory(self, dir: &str) -> Self {
        self.validation_command("directory", dir.to_string())
    }

    /// Replace the command with `./asrestore --directory-list a,b --validate`.
    #[must_use]
    pub fn validate_directory_list<I, S>(self, dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.validation_command("directory-list", crate::macros::join_csv(dirs))
    }

    fn validation_command(mut self, flag: &str, value: String) -> Self {
        self.command
            .clear_args()
            .push(flag, value)
            .push_switch("validate");
        self
    }

    /// Run and parse the restore report.
    pub async fn run(
        &self,
        ctx: &RequestContext,
        deps: &ToolDeps,
        ignore_errors: bool,
    ) -> Result<RestoreResult> {
        ctx.ensure_not_cancelled("cli_restore.run")?;
        deps.info(
            "cli_restore.run",
            "Run asrestore",
            log_fields([("namespace", Value::from(self.namespace.as_str()))]),
        );
        let output = run_from(
            deps.runner.as_ref(),
            ctx,
            &self.command,
            &self.settings.asrestore_dir,
            true,
            self.settings.timeout,
        )
        .await?;
        let report = self.settings.report_options(ignore_errors);
        Ok(RestoreResult::parse(&output.combined(), report)?)
    }

    /// Run in validation mode and parse the validation report.
    pub async fn validate(&self, ctx: &RequestContext, deps: &ToolDeps) -> Result<ValidationReport> {
        ctx.ensure_not_cancelled("cli_restore.validate")?;
        deps.info(
            "cli_restore.validate",
            "Validate backup files",
            log_fields([("command", Value::from(self.command.to_shell()))]),
        );
        let output = run_from(
            deps.runner.as_ref(),
            ctx,
            &self.command,
            &self.settings.asrestore_dir,
            true,
            self.settings.timeout,
        )
        .await?;
        Ok(ValidationReport::parse(&output.combined())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backup_harness_domain::{ConnectionProfile, TlsSettings};
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
            ..ConnectionProfile::local()
        };
        settings
    }

    #[test]
    fn local_factories() {
        let settings = ToolSettings::local();
        assert_eq!(
            CliRestore::on_dir(&settings, "test", "/tmp/b").command().to_shell(),
            "./asrestore --namespace test --parallel 8 --user tester --password psw --directory /tmp/b"
        );
        assert!(!CliRestore::on(&settings, "test").command().has_flag("directory"));
        assert_eq!(
            CliRestore::on_mapped(&settings, "src", "dst", "/tmp/b")
                .command()
                .value_of("namespace"),
            Some("src,dst")
        );
        let bare = CliRestore::bare(&settings);
        assert!(!bare.command().has_flag("namespace"));
        assert!(!bare.command().has_flag("directory"));
    }

    #[test]
    fn cloud_uses_tls_form() {
        let restore = CliRestore::on_dir(&cloud_settings(), "test", "/tmp/b");
        assert_eq!(
            restore.command().to_shell(),
            "./asrestore --user tester --password psw --directory /tmp/b --namespace test \
             --host asd.qa.ecosys.internal:asd.aerospike.com:4333 --tls-cafile=/certs/ca.pem \
             --tls-name=asd.aerospike.com --tls-enable"
        );
    }

    #[test]
    fn directory_list_can_drop_directory() {
        let settings = ToolSettings::local();
        let restore = CliRestore::on_dir(&settings, "test", "/tmp/b").directory_list(true, ["/a", "/b"]);
        assert!(!restore.command().has_flag("directory"));
        assert_eq!(restore.command().value_of("directory-list"), Some("/a,/b"));

        let kept = CliRestore::on_dir(&settings, "test", "/tmp/b").directory_list(false, ["/a"]);
        assert!(kept.command().has_flag("directory"));
    }

    #[test]
    fn validation_replaces_the_command() {
        let settings = ToolSettings::local();
        let restore = CliRestore::on_dir(&settings, "test", "/tmp/b").unique();
        assert_eq!(
            restore.clone().validate_file("/tmp/b/x.asb").command().to_shell(),
            "./asrestore --input-file /tmp/b/x.asb --validate"
        );
        assert_eq!(
            restore.clone().validate_directory("/tmp/b").command().to_shell(),
            "./asrestore --directory /tmp/b --validate"
        );
        assert_eq!(
            restore.validate_directory_list(["/a", "/b"]).command().to_shell(),
            "./asrestore --directory-list /a,/b --validate"
        );
    }

    #[tokio::test]
    async fn run_parses_restore_report() -> Result<()> {
        let runner = Arc::new(ScriptedProcessRunner::new());
        runner.respond("./asrestore", fixtures::ok(&fixtures::restore_report(90, 10)));
        let deps = ToolDeps::new(runner);

        let result = CliRestore::on_dir(&ToolSettings::local(), "test", "/tmp/b")
            .run(&RequestContext::new_request(), &deps, false)
            .await?;
        assert_eq!(result.inserted_records, 90);
        assert_eq!(result.records_on_cluster(), 100);
        Ok(())
    }

    #[tokio::test]
    async fn restore_error_marker_is_reported() {
        let runner = Arc::new(ScriptedProcessRunner::new());
        let output = format!("ERROR failed to connect\n{}", fixtures::restore_report(1, 0));
        runner.respond("./asrestore", fixtures::ok(&output));
        let deps = ToolDeps::new(runner);

        let error = CliRestore::on(&ToolSettings::local(), "test")
            .run(&RequestContext::new_request(), &deps, false)
            .await
            .err();
        assert_eq!(
            error.map(|error| error.code),
            Some(ErrorCode::new("report", "restore_process"))
        );
    }

    #[tokio::test]
    async fn validate_parses_report() -> Result<()> {
        let runner = Arc::new(ScriptedProcessRunner::new());
        runner.respond("--validate", fixtures::ok(&fixtures::validation_report(12)));
        let deps = ToolDeps::new(runner);

        let report = CliRestore::bare(&ToolSettings::local())
            .validate_directory("/tmp/b")
            .validate(&RequestContext::new_request(), &deps)
            .await?;
        assert_eq!(report.records_read, 12);
        Ok(())
    }
}
