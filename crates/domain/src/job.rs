//! Backup service job model.
//!
//! The service has reported statuses in several spellings over time
//! (`RUNNING`, `Running`, `JobStatusRunning`); all of them map to the same
//! [`JobStatus`] variant.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a backup service job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobStatus {
    /// Still in progress.
    Running,
    /// Finished successfully.
    Done,
    /// Finished with an error.
    Failed,
    /// Cancelled by a caller.
    Cancelled,
    /// Any status this harness does not know.
    Unknown(String),
}

impl JobStatus {
    /// True for every status other than [`JobStatus::Running`].
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Canonical upper-case spelling.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Running => "RUNNING",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
            Self::Unknown(raw) => raw,
        }
    }
}

impl From<String> for JobStatus {
    fn from(raw: String) -> Self {
        let trimmed = raw.trim();
        let bare = trimmed.strip_prefix("JobStatus").unwrap_or(trimmed);
        match bare.to_ascii_uppercase().as_str() {
            "RUNNING" | "IN_PROGRESS" => Self::Running,
            "DONE" | "COMPLETED" => Self::Done,
            "FAILED" | "ERROR" => Self::Failed,
            "CANCELLED" | "CANCELED" => Self::Cancelled,
            _ => Self::Unknown(raw),
        }
    }
}

impl From<&str> for JobStatus {
    fn from(raw: &str) -> Self {
        Self::from(raw.to_string())
    }
}

impl From<JobStatus> for String {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Unknown(raw) => raw,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// `GET /v1/job/{id}` response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDetails {
    /// Job identifier.
    pub id: String,
    /// Current status.
    pub status: JobStatus,
    /// Job kind reported by the service (backup, restore, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_type: Option<String>,
    /// Error message for failed jobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `GET /v1/restore/status/{jobId}` response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreJobStatus {
    /// Current status.
    pub status: JobStatus,
    /// Records read so far.
    #[serde(default)]
    pub read_records: u64,
    /// Records written.
    #[serde(default)]
    pub inserted_records: u64,
    /// Records that already existed.
    #[serde(default)]
    pub existed_records: u64,
    /// Records skipped by filters.
    #[serde(default)]
    pub skipped_records: u64,
    /// Records ignored after errors.
    #[serde(default)]
    pub ignored_records: u64,
    /// Records not written because the cluster copy was fresher.
    #[serde(default)]
    pub fresher_records: u64,
    /// Expired records.
    #[serde(default)]
    pub expired_records: u64,
    /// Bytes restored.
    #[serde(default)]
    pub total_bytes: u64,
    /// Secondary indexes restored.
    #[serde(default)]
    pub index_count: u64,
    /// UDFs restored.
    #[serde(default)]
    pub udf_count: u64,
    /// Error message for failed restores.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
