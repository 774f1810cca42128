//! Composition root: turns the validated config and env into wired ports.

use crate::observability::{build_logger, scope_logger};
use crate::{InfraError, InfraResult};
use backup_harness_adapters::{
    AsinfoCluster, BenchSettings, HttpBackupService, HttpBackupServiceConfig, ShellProcessRunner,
};
use backup_harness_app::{JobDeps, JobWaits, ScenarioDeps, ScenarioPolicies, ToolDeps, ToolSettings};
use backup_harness_config::{
    HarnessEnv, ValidatedHarnessConfig, load_harness_config_from_path, resolve_connection_profile,
};
use backup_harness_domain::ConnectionProfile;
use backup_harness_ports::{BackupServicePort, ClusterPort, LoggerPort, ProcessRunner};
use backup_harness_shared::{ErrorCode, RequestContext, WaitGroupRegistry};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Everything a CLI command needs, resolved once per process.
///
/// Clients are built here and handed to the app layer; nothing downstream
/// reads the process environment.
#[derive(Clone)]
pub struct HarnessRuntime {
    env: HarnessEnv,
    config: ValidatedHarnessConfig,
    profile: ConnectionProfile,
    logger: Option<Arc<dyn LoggerPort>>,
    runner: Arc<dyn ProcessRunner>,
    cluster: Option<Arc<dyn ClusterPort>>,
    backup_service: Option<Arc<dyn BackupServicePort>>,
    wait_groups: Arc<WaitGroupRegistry>,
}

impl HarnessRuntime {
    /// Parse collected env parameters, load the config file, then wire the defaults.
    pub fn load(
        env: &BTreeMap<String, String>,
        config_path: Option<&Path>,
        overrides_json: Option<&str>,
    ) -> InfraResult<Self> {
        let env = HarnessEnv::from_map(env).map_err(InfraError::from)?;
        let config = load_harness_config_from_path(config_path, overrides_json, &env)?;
        Ok(Self::from_parts(env, config))
    }

    /// Wire an already loaded env and config.
    #[must_use]
    pub fn from_parts(env: HarnessEnv, config: ValidatedHarnessConfig) -> Self {
        let profile = resolve_connection_profile(&env);
        let logger = build_logger(&config.logging);
        let mut runner = ShellProcessRunner::new();
        if let Some(logger) = &logger {
            runner = runner.with_logger(Arc::clone(logger));
        }
        Self {
            env,
            config,
            profile,
            logger,
            runner: Arc::new(runner),
            cluster: None,
            backup_service: None,
            wait_groups: Arc::new(WaitGroupRegistry::new()),
        }
    }

    /// Replace the subprocess runner.
    #[must_use]
    pub fn with_runner(mut self, runner: Arc<dyn ProcessRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Replace the cluster adapter built from the runner.
    #[must_use]
    pub fn with_cluster(mut self, cluster: Arc<dyn ClusterPort>) -> Self {
        self.cluster = Some(cluster);
        self
    }

    /// Replace the HTTP backup service client.
    #[must_use]
    pub fn with_backup_service(mut self, service: Arc<dyn BackupServicePort>) -> Self {
        self.backup_service = Some(service);
        self
    }

    /// Replace the logger.
    #[must_use]
    pub fn with_logger(mut self, logger: Option<Arc<dyn LoggerPort>>) -> Self {
        self.logger = logger;
        self
    }

    /// Parsed env parameters.
    #[must_use]
    pub const fn env(&self) -> &HarnessEnv {
        &self.env
    }

    /// Effective config.
    #[must_use]
    pub const fn config(&self) -> &ValidatedHarnessConfig {
        &self.config
    }

    /// Resolved connection profile.
    #[must_use]
    pub const fn profile(&self) -> &ConnectionProfile {
        &self.profile
    }

    /// Wait groups shared by every participant of this process.
    #[must_use]
    pub fn wait_groups(&self) -> Arc<WaitGroupRegistry> {
        Arc::clone(&self.wait_groups)
    }

    /// Logger scoped to `ctx`'s correlation id.
    #[must_use]
    pub fn logger_for(&self, ctx: &RequestContext) -> Option<Arc<dyn LoggerPort>> {
        scope_logger(self.logger.as_ref(), ctx)
    }

    /// Builder inputs derived from the config and profile.
    #[must_use]
    pub fn tool_settings(&self) -> ToolSettings {
        let paths = &self.config.paths;
        ToolSettings {
            profile: self.profile.clone(),
            asbackup_dir: PathBuf::from(paths.asbackup_dir.as_ref()),
            asrestore_dir: PathBuf::from(paths.asrestore_dir.as_ref()),
            abs_tools_dir: PathBuf::from(paths.abs_tools_dir.as_ref()),
            backup_root: paths.backup_root.to_string(),
            backup_parallel: self.config.commands.backup_parallel,
            restore_parallel: self.config.commands.restore_parallel,
            timeout: self.config.process_timeout(),
            report: self.config.report_options(false),
        }
    }

    /// Runner plus the request-scoped logger.
    #[must_use]
    pub fn tool_deps(&self, ctx: &RequestContext) -> ToolDeps {
        ToolDeps {
            runner: Arc::clone(&self.runner),
            logger: self.logger_for(ctx),
        }
    }

    /// Cluster adapter; `asinfo`/`asbench` over the runner unless replaced.
    #[must_use]
    pub fn cluster(&self) -> Arc<dyn ClusterPort> {
        if let Some(cluster) = &self.cluster {
            return Arc::clone(cluster);
        }
        let commands = &self.config.commands;
        Arc::new(
            AsinfoCluster::new(Arc::clone(&self.runner), self.profile.clone())
                .with_bench(BenchSettings {
                    threads: commands.bench_threads,
                    batch_size: commands.bench_batch_size,
                })
                .with_timeout(self.config.process_timeout()),
        )
    }

    /// Scenario wiring with the configured polling windows.
    #[must_use]
    pub fn scenario_deps(&self, ctx: &RequestContext) -> ScenarioDeps {
        let polling = &self.config.polling;
        ScenarioDeps {
            cluster: self.cluster(),
            tools: self.tool_deps(ctx),
            settings: self.tool_settings(),
            policies: ScenarioPolicies {
                seed: polling.seed.policy(),
                truncate: polling.truncate.policy(),
                restore: polling.restore.policy(),
            },
            logger: self.logger_for(ctx),
        }
    }

    /// Job helper wiring; fails when no backup service URL is configured.
    pub fn job_deps(&self, ctx: &RequestContext) -> InfraResult<JobDeps> {
        let polling = &self.config.polling;
        Ok(JobDeps {
            service: self.backup_service()?,
            logger: self.logger_for(ctx),
            waits: JobWaits {
                job: polling.job.policy(),
                restore: polling.restore_job.policy(),
                restore_failure: polling.restore_failure(),
                retry: self.config.backup_service.retry.policy(),
            },
        })
    }

    fn backup_service(&self) -> InfraResult<Arc<dyn BackupServicePort>> {
        if let Some(service) = &self.backup_service {
            return Ok(Arc::clone(service));
        }
        let service = &self.config.backup_service;
        let Some(base_url) = service.base_url.clone() else {
            return Err(InfraError::expected(
                ErrorCode::new("config", "backup_service_unconfigured"),
                "backupService.baseUrl is not set",
            ));
        };
        let client = HttpBackupService::new(&HttpBackupServiceConfig {
            base_url,
            token: self.env.backup_service_token.clone(),
            timeout_ms: service.timeout_ms,
            retry: service.retry.policy(),
        })?;
        Ok(Arc::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backup_harness_config::HarnessConfig;
    use backup_harness_domain::Environment;
    use std::time::Duration;

    fn runtime(pairs: &[(&str, &str)], overrides: Option<&str>) -> InfraResult<HarnessRuntime> {
        let map: BTreeMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        HarnessRuntime::load(&map, None, overrides)
    }

    #[test]
    fn settings_follow_config_and_env() -> InfraResult<()> {
        let runtime = runtime(
            &[("BH_BACKUP_ROOT", "/data/backups/"), ("BACKUP_PARALLEL", "4")],
            Some(r#"{"process":{"timeoutMs":60000},"paths":{"asbackupDir":"/opt/asbackup"}}"#),
        )?;
        let settings = runtime.tool_settings();

        assert_eq!(settings.backup_root, "/data/backups");
        assert_eq!(settings.backup_parallel, 4);
        assert_eq!(settings.asbackup_dir, PathBuf::from("/opt/asbackup"));
        assert_eq!(settings.timeout, Some(Duration::from_secs(60)));
        assert_eq!(settings.profile.environment, Environment::Local);
        Ok(())
    }

    #[test]
    fn cloud_profile_is_resolved_once() -> InfraResult<()> {
        let runtime = runtime(&[("qa_environment", "GCP"), ("ENV_WORKSPACE", "qa1")], None)?;
        assert_eq!(runtime.profile().environment, Environment::Cloud);
        assert_eq!(runtime.tool_settings().profile, *runtime.profile());
        Ok(())
    }

    #[test]
    fn job_deps_need_a_service_url() -> InfraResult<()> {
        let runtime = runtime(&[], None)?;
        let error = runtime.job_deps(&RequestContext::new_request()).err();
        assert_eq!(
            error.map(|error| error.code),
            Some(ErrorCode::new("config", "backup_service_unconfigured"))
        );

        let configured = runtime_with_url()?;
        let deps = configured.job_deps(&RequestContext::new_request())?;
        assert_eq!(deps.waits.restore_failure.poll_interval, Duration::from_secs(2));
        Ok(())
    }

    fn runtime_with_url() -> InfraResult<HarnessRuntime> {
        let mut config = HarnessConfig::default();
        config.backup_service.base_url = Some("http://localhost:8080".into());
        let env = HarnessEnv::default();
        let config = backup_harness_config::apply_env_overrides(config, &env)?;
        Ok(HarnessRuntime::from_parts(env, config))
    }

    #[test]
    fn wait_groups_are_shared_between_clones() -> InfraResult<()> {
        let runtime = runtime(&[], None)?;
        let clone = runtime.clone();
        runtime.wait_groups().group("suite").register();
        assert_eq!(clone.wait_groups().names(), vec!["suite".to_string()]);
        Ok(())
    }
}
