//! Contract-style tests for port traits using in-memory adapters.

use backup_harness_domain::ScenarioStage;
use backup_harness_ports::{
    BackupServicePort, ClusterPort, CommandSpec, JobStatus, LoggerPort, ProcessRunner,
    SeedRequest,
};
use backup_harness_shared::{RequestContext, Result};
use backup_harness_testkit::{
    InMemoryBackupService, InMemoryCluster, NoopLogger, ScriptedProcessRunner, fixtures, seeded_bins,
};
use std::sync::Arc;

#[tokio::test]
async fn cluster_port_contract_smoke() -> Result<()> {
    let ctx = RequestContext::new_request();
    let cluster: Arc<dyn ClusterPort> = Arc::new(InMemoryCluster::new());

    cluster.seed(&ctx, SeedRequest::new("test", "users", 25)).await?;
    assert_eq!(cluster.set_object_count(&ctx, "test", "users").await?, 25);
    assert_eq!(cluster.set_object_count(&ctx, "test", "nobody").await?, 0);
    assert_eq!(cluster.replication_factor(&ctx, "test").await?, 1);
    assert_eq!(
        cluster.read_record(&ctx, "test", "users", 24).await?,
        Some(seeded_bins(24, None))
    );
    assert_eq!(cluster.read_record(&ctx, "test", "users", 25).await?, None);

    cluster.truncate_set(&ctx, "test", "users").await?;
    assert_eq!(cluster.namespace_object_count(&ctx, "test").await?, 0);
    Ok(())
}

#[tokio::test]
async fn cancelled_context_stops_cluster_calls() {
    let ctx = RequestContext::new_request();
    ctx.cancel();
    let cluster = InMemoryCluster::new();

    let error = cluster
        .seed(&ctx, SeedRequest::new("test", "users", 1))
        .await
        .err();
    assert!(error.is_some_and(|error| error.is_cancelled()));
    assert_eq!(cluster.count("test", "users"), 0);
}

#[tokio::test]
async fn backup_service_port_contract_smoke() -> Result<()> {
    let ctx = RequestContext::new_request();
    let service = InMemoryBackupService::new();
    service.script_restore("r-1", [JobStatus::Running, JobStatus::Done]);

    let port: &dyn BackupServicePort = &service;
    assert_eq!(port.restore_status(&ctx, "r-1").await?.status, JobStatus::Running);
    let done = port.restore_status(&ctx, "r-1").await?;
    assert_eq!(done.status, JobStatus::Done);
    assert_eq!(done.error, None);

    port.cancel_job(&ctx, "job-9").await?;
    assert_eq!(service.cancelled(), vec!["job-9".to_string()]);
    Ok(())
}

#[tokio::test]
async fn process_runner_contract_smoke() -> Result<()> {
    let ctx = RequestContext::new_request();
    let runner = ScriptedProcessRunner::new();
    runner.respond("./asbackup", fixtures::ok(&fixtures::backup_report(3)));

    let port: &dyn ProcessRunner = &runner;
    let output = port
        .run(&ctx, CommandSpec::shell("./asbackup --namespace test").in_dir("/opt"))
        .await?;
    assert!(output.combined().ends_with("Exit Code: 0\n"));
    assert_eq!(runner.commands(), vec!["cd /opt; pwd; ./asbackup --namespace test"]);
    Ok(())
}

#[test]
fn noop_logger_accepts_stage_events() {
    let logger = NoopLogger;
    for stage in ScenarioStage::ORDER {
        logger.info(&format!("scenario.{stage}.start"), "stage", None);
    }
    let child = logger.child(backup_harness_ports::log_fields([("run", "r")]));
    child.warn("scenario.done", "done", None);
}
