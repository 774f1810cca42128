//! Waiting on backup service jobs.

use backup_harness_ports::{
    BackupServicePort, JobDetails, JobStatus, LoggerPort, RestoreJobStatus, log_fields,
};
use backup_harness_shared::{
    ErrorCode, ErrorEnvelope, PollPolicy, RequestContext, Result, RetryPolicy, poll_until,
    retry_async,
};
use std::sync::Arc;
use std::time::Duration;

/// Schedules used while waiting on jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobWaits {
    /// Waiting for a job to leave `RUNNING`.
    pub job: PollPolicy,
    /// Waiting for a restore to finish.
    pub restore: PollPolicy,
    /// Waiting for a restore to fail.
    pub restore_failure: PollPolicy,
    /// Retries of single `get_job` calls.
    pub retry: RetryPolicy,
}

impl Default for JobWaits {
    fn default() -> Self {
        Self {
            job: PollPolicy::restore_job(),
            restore: PollPolicy::restore_job(),
            restore_failure: PollPolicy::new(
                Duration::ZERO,
                Duration::from_secs(2),
                Duration::from_secs(120),
            ),
            retry: RetryPolicy::default(),
        }
    }
}

/// Dependencies of the job helpers.
#[derive(Clone)]
pub struct JobDeps {
    /// Backup service client.
    pub service: Arc<dyn BackupServicePort>,
    /// Optional logger.
    pub logger: Option<Arc<dyn LoggerPort>>,
    /// Poll and retry schedules.
    pub waits: JobWaits,
}

impl JobDeps {
    /// Deps with default schedules and no logger.
    pub fn new(service: Arc<dyn BackupServicePort>) -> Self {
        Self {
            service,
            logger: None,
            waits: JobWaits::default(),
        }
    }
}

/// `get_job` retried per [`JobWaits::retry`].
pub async fn get_job(ctx: &RequestContext, deps: &JobDeps, job_id: &str) -> Result<JobDetails> {
    retry_async(ctx, deps.waits.retry, "jobs.get_job", || {
        deps.service.get_job(ctx, job_id)
    })
    .await
}

/// Poll until the job leaves `RUNNING` and return its final details.
pub async fn wait_for_job_status(
    ctx: &RequestContext,
    deps: &JobDeps,
    job_id: &str,
) -> Result<JobDetails> {
    let details = poll_until(ctx, deps.waits.job, "jobs.wait_for_job_status", || async move {
        let details = get_job(ctx, deps, job_id).await?;
        Ok(details.status.is_terminal().then_some(details))
    })
    .await?;
    log_status(deps, "jobs.job.finished", job_id, &details.status);
    Ok(details)
}

/// Ask the service to cancel a job.
pub async fn cancel_job(ctx: &RequestContext, deps: &JobDeps, job_id: &str) -> Result<()> {
    ctx.ensure_not_cancelled("jobs.cancel_job")?;
    deps.service.cancel_job(ctx, job_id).await?;
    if let Some(logger) = &deps.logger {
        logger.info(
            "jobs.job.cancelled",
            "Job cancel accepted",
            Some(log_fields([("job_id", job_id)])),
        );
    }
    Ok(())
}

/// Resume a job and wait until it finishes.
pub async fn resume_job(ctx: &RequestContext, deps: &JobDeps, job_id: &str) -> Result<JobDetails> {
    ctx.ensure_not_cancelled("jobs.resume_job")?;
    deps.service.resume_job(ctx, job_id).await?;
    wait_for_job_status(ctx, deps, job_id).await
}

/// Poll a restore until it is `DONE`. A `FAILED` restore is an error.
pub async fn wait_for_restore(
    ctx: &RequestContext,
    deps: &JobDeps,
    job_id: &str,
) -> Result<RestoreJobStatus> {
    let status = poll_until(ctx, deps.waits.restore, "jobs.wait_for_restore", || async move {
        let status = deps.service.restore_status(ctx, job_id).await?;
        match status.status {
            JobStatus::Done => Ok(Some(status)),
            JobStatus::Failed => Err(restore_failed(job_id, &status)),
            _ => Ok(None),
        }
    })
    .await?;
    log_status(deps, "jobs.restore.finished", job_id, &status.status);
    Ok(status)
}

/// Poll a restore until it is `FAILED`.
pub async fn wait_for_restore_failure(
    ctx: &RequestContext,
    deps: &JobDeps,
    job_id: &str,
) -> Result<RestoreJobStatus> {
    poll_until(
        ctx,
        deps.waits.restore_failure,
        "jobs.wait_for_restore_failure",
        || async move {
            let status = deps.service.restore_status(ctx, job_id).await?;
            Ok((status.status == JobStatus::Failed).then_some(status))
        },
    )
    .await
}

fn restore_failed(job_id: &str, status: &RestoreJobStatus) -> ErrorEnvelope {
    ErrorEnvelope::expected(
        ErrorCode::new("jobs", "restore_failed"),
        status
            .error
            .clone()
            .unwrap_or_else(|| "restore job failed".to_string()),
    )
    .with_metadata("job_id", job_id)
}

fn log_status(deps: &JobDeps, event: &str, job_id: &str, status: &JobStatus) {
    if let Some(logger) = &deps.logger {
        logger.info(
            event,
            "Job reached a final status",
            Some(log_fields([("job_id", job_id), ("status", status.as_str())])),
        );
    }
}
