//! Typed `asrestore` summary.

use crate::duration::ReportDuration;
use crate::report::{
    ReportError, ReportOptions, contains_error_marker, extract_value, parse_number, required,
    required_number,
};
use crate::start_time::parse_start_time;
use serde::{Deserialize, Serialize};

const TOTAL_BYTES_READ: &str = "Total Bytes Read:";

/// Parsed result of one `asrestore` invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreResult {
    /// Start time as epoch milliseconds (UTC).
    pub start_time_ms: i64,
    /// Wall-clock duration.
    pub duration: ReportDuration,
    /// Records read from the backup.
    pub records_read: u64,
    /// Secondary indexes read.
    pub sindex_read: u64,
    /// UDFs read.
    pub udfs_read: u64,
    /// Records skipped because they had expired.
    pub expired_records: u64,
    /// Records skipped by filters.
    pub skipped_records: u64,
    /// Records ignored after write errors.
    pub ignored_records: u64,
    /// Records not written because the cluster copy was fresher.
    pub fresher_records: u64,
    /// Records that already existed.
    pub existed_records: u64,
    /// Records inserted.
    pub inserted_records: u64,
    /// Bytes read; 0 when the tool did not print it (XDR restores).
    pub total_bytes_read: u64,
    /// Exit code synthesized by the process runner.
    pub exit_code: i32,
    /// Raw tool output.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub full_log: String,
}

impl RestoreResult {
    /// Parse combined `asrestore` output.
    ///
    /// Fails with [`ReportError::RestoreProcess`] when the output contains
    /// `ERROR` and `options.ignore_errors` is false.
    pub fn parse(output: &str, options: ReportOptions) -> Result<Self, ReportError> {
        if !options.ignore_errors && contains_error_marker(output) {
            return Err(ReportError::RestoreProcess {
                output: output.to_string(),
            });
        }

        let total_bytes_read = match extract_value(output, TOTAL_BYTES_READ) {
            Some(value) if !value.is_empty() => parse_number(TOTAL_BYTES_READ, value)?,
            _ => 0,
        };

        Ok(Self {
            start_time_ms: parse_start_time(required(output, "Start Time:")?, options.fallback_zone)?
                .timestamp_millis(),
            duration: ReportDuration::parse(required(output, "Duration:")?)?,
            records_read: required_number(output, "Records Read:")?,
            sindex_read: required_number(output, "sIndex Read:")?,
            udfs_read: required_number(output, "UDFs Read:")?,
            expired_records: required_number(output, "Expired Records:")?,
            skipped_records: required_number(output, "Skipped Records:")?,
            ignored_records: required_number(output, "Ignored Records:")?,
            fresher_records: required_number(output, "Fresher Records:")?,
            existed_records: required_number(output, "Existed Records:")?,
            inserted_records: required_number(output, "Inserted Records:")?,
            total_bytes_read,
            exit_code: required_number(output, "Exit Code:")?,
            full_log: output.to_string(),
        })
    }

    /// Duration in milliseconds.
    #[must_use]
    pub const fn duration_millis(&self) -> f64 {
        self.duration.as_millis_f64()
    }

    /// Records that ended up on the cluster: inserted plus already existing.
    #[must_use]
    pub const fn records_on_cluster(&self) -> u64 {
        self.inserted_records.saturating_add(self.existed_records)
    }

    /// True when the tool exited cleanly.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}
