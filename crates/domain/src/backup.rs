//! Typed `asbackup` summary.

use crate::duration::ReportDuration;
use crate::report::{
    ReportError, ReportOptions, contains_error_marker, parse_number, required, required_number,
};
use crate::start_time::parse_start_time;
use serde::{Deserialize, Serialize};

const START_TIME: &str = "Start Time:";
const DURATION: &str = "Duration:";
const RECORDS_READ: &str = "Records Read:";
const RECORDS_RECEIVED: &str = "Records Received:";
const SINDEX_READ: &str = "sIndex Read:";
const UDFS_READ: &str = "UDFs Read:";
const BYTES_WRITTEN: &str = "Bytes Written:";
const FILES_WRITTEN: &str = "Files Written:";
const EXIT_CODE: &str = "Exit Code:";

/// Parsed result of one `asbackup` invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupResult {
    /// Start time as epoch milliseconds (UTC).
    pub start_time_ms: i64,
    /// Wall-clock duration.
    pub duration: ReportDuration,
    /// Records read (or received, for XDR backups).
    pub records_read: u64,
    /// Secondary indexes read.
    pub sindex_read: u64,
    /// UDFs read.
    pub udfs_read: u64,
    /// Bytes written to the backup target.
    pub bytes_written: u64,
    /// Backup files written.
    pub files_written: u64,
    /// Exit code synthesized by the process runner.
    pub exit_code: i32,
    /// Directory the backup was written to; empty when not known.
    #[serde(default)]
    pub backup_dir: String,
    /// Raw tool output.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub full_log: String,
}

impl BackupResult {
    /// Parse combined `asbackup` output.
    ///
    /// Fails with [`ReportError::BackupProcess`] when the output contains
    /// `ERROR` and `options.ignore_errors` is false.
    pub fn parse(output: &str, options: ReportOptions) -> Result<Self, ReportError> {
        if !options.ignore_errors && contains_error_marker(output) {
            return Err(ReportError::BackupProcess {
                output: output.to_string(),
            });
        }

        let records_read = required(output, RECORDS_READ)
            .or_else(|_| required(output, RECORDS_RECEIVED))
            .map_err(|_| ReportError::MissingField {
                key: format!("{RECORDS_READ} / {RECORDS_RECEIVED}"),
            })
            .and_then(|value| parse_number(RECORDS_READ, value))?;
        let bytes_written = required(output, BYTES_WRITTEN)?;
        let bytes_written = bytes_written.strip_suffix(" bytes").unwrap_or(bytes_written);

        Ok(Self {
            start_time_ms: parse_start_time(required(output, START_TIME)?, options.fallback_zone)?
                .timestamp_millis(),
            duration: ReportDuration::parse(required(output, DURATION)?)?,
            records_read,
            sindex_read: required_number(output, SINDEX_READ)?,
            udfs_read: required_number(output, UDFS_READ)?,
            bytes_written: parse_number(BYTES_WRITTEN, bytes_written.trim())?,
            files_written: required_number(output, FILES_WRITTEN)?,
            exit_code: required_number(output, EXIT_CODE)?,
            backup_dir: String::new(),
            full_log: output.to_string(),
        })
    }

    /// Record the directory the backup was written to.
    #[must_use]
    pub fn with_backup_dir(mut self, dir: impl Into<String>) -> Self {
        self.backup_dir = dir.into();
        self
    }

    /// Duration in milliseconds.
    #[must_use]
    pub const fn duration_millis(&self) -> f64 {
        self.duration.as_millis_f64()
    }

    /// True when the tool exited cleanly.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}
