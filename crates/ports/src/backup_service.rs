//! Backup service REST boundary contract.

use crate::BoxFuture;
use backup_harness_domain::{JobDetails, RestoreJobStatus};
use backup_harness_shared::{RequestContext, Result};

/// Boundary contract for the backup service job API.
pub trait BackupServicePort: Send + Sync {
    /// `GET /v1/job/{id}`.
    fn get_job(&self, ctx: &RequestContext, job_id: &str) -> BoxFuture<'_, Result<JobDetails>>;

    /// `POST /v1/job/cancel/{id}`; the service answers `202 Accepted`.
    fn cancel_job(&self, ctx: &RequestContext, job_id: &str) -> BoxFuture<'_, Result<()>>;

    /// `POST /v1/job/resume/{id}`; the service answers `200 OK`.
    fn resume_job(&self, ctx: &RequestContext, job_id: &str) -> BoxFuture<'_, Result<()>>;

    /// `GET /v1/restore/status/{jobId}`.
    fn restore_status(
        &self,
        ctx: &RequestContext,
        job_id: &str,
    ) -> BoxFuture<'_, Result<RestoreJobStatus>>;
}
