//! Backup service job commands.

use crate::cli_local::run_async_with_ctx;
use crate::{HarnessRuntime, InfraResult};
use backup_harness_app::{cancel_job, get_job, resume_job, wait_for_restore};
use backup_harness_domain::{JobDetails, RestoreJobStatus};
use backup_harness_shared::RequestContext;

/// Current details of `job_id`.
pub fn read_job_status(runtime: &HarnessRuntime, job_id: &str) -> InfraResult<JobDetails> {
    run_async_with_ctx(RequestContext::new_request(), |ctx| async move {
        let deps = runtime.job_deps(&ctx)?;
        get_job(&ctx, &deps, job_id).await
    })
}

/// Cancel `job_id` and return its details afterwards.
pub fn cancel_job_status(runtime: &HarnessRuntime, job_id: &str) -> InfraResult<JobDetails> {
    run_async_with_ctx(RequestContext::new_request(), |ctx| async move {
        let deps = runtime.job_deps(&ctx)?;
        cancel_job(&ctx, &deps, job_id).await?;
        get_job(&ctx, &deps, job_id).await
    })
}

/// Resume `job_id` and wait until it leaves `RUNNING`.
pub fn resume_job_status(runtime: &HarnessRuntime, job_id: &str) -> InfraResult<JobDetails> {
    run_async_with_ctx(RequestContext::new_request(), |ctx| async move {
        let deps = runtime.job_deps(&ctx)?;
        resume_job(&ctx, &deps, job_id).await
    })
}

/// Wait until restore `job_id` is `DONE`.
pub fn wait_restore_status(runtime: &HarnessRuntime, job_id: &str) -> InfraResult<RestoreJobStatus> {
    run_async_with_ctx(RequestContext::new_request(), |ctx| async move {
        let deps = runtime.job_deps(&ctx)?;
        wait_for_restore(&ctx, &deps, job_id).await
    })
}
