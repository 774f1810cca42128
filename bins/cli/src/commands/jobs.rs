//! Job command handlers.

use crate::error::{CliError, ExitCode, infra_exit_code};
use crate::format::OutputMode;
use crate::{CliOutput, format_error_output, success_output};
use backup_harness_infra::{
    HarnessRuntime, cancel_job_status, read_job_status, resume_job_status, wait_restore_status,
};

/// Run the jobs status command.
pub fn run_jobs_status(
    mode: OutputMode,
    runtime: &HarnessRuntime,
    job_id: &str,
) -> Result<CliOutput, CliError> {
    match read_job_status(runtime, job_id) {
        Ok(job) => success_output(mode, "job", "ok", &job, ExitCode::Ok),
        Err(error) => Ok(format_error_output(mode, &error, infra_exit_code(&error))),
    }
}

/// Run the jobs cancel command.
pub fn run_jobs_cancel(
    mode: OutputMode,
    runtime: &HarnessRuntime,
    job_id: &str,
) -> Result<CliOutput, CliError> {
    match cancel_job_status(runtime, job_id) {
        Ok(job) => success_output(mode, "job", "ok", &job, ExitCode::Ok),
        Err(error) => Ok(format_error_output(mode, &error, infra_exit_code(&error))),
    }
}

/// Run the jobs resume command.
pub fn run_jobs_resume(
    mode: OutputMode,
    runtime: &HarnessRuntime,
    job_id: &str,
) -> Result<CliOutput, CliError> {
    match resume_job_status(runtime, job_id) {
        Ok(job) => success_output(mode, "job", "ok", &job, ExitCode::Ok),
        Err(error) => Ok(format_error_output(mode, &error, infra_exit_code(&error))),
    }
}

pub fn run_jobs_wait_restore(
    mode: OutputMode,
    runtime: &HarnessRuntime,
    job_id: &str,
) -> Result<CliOutput, CliError> {
    match wait_restore_status(runtime, job_id) {
        Ok(status) => success_output(mode, "restore_job", "ok", &status, ExitCode::Ok),
        Err(error) => Ok(format_error_output(mode, &error, infra_exit_code(&error))),
    }
}
