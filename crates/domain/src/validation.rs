//! `asrestore --validate` report.

use crate::report::{
    ReportError, contains_error_marker, extract_value, parse_number, required_number,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Header printed above the validation summary.
pub const VALIDATION_HEADER: &str = "Validation report";

static FOUND_FILES: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r#"msg="found asb files" number=(\d+)"#));

/// Parsed validation summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    /// Records read from the backup files.
    pub records_read: u64,
    /// Secondary indexes read.
    pub sindex_read: u64,
    /// UDFs read.
    pub udfs_read: u64,
    /// Bytes read; 0 when not printed.
    pub total_bytes_read: u64,
    /// Exit code synthesized by the process runner.
    pub exit_code: i32,
    /// Number of backup files the tool discovered, when logged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files_found: Option<u64>,
    /// True when the output carried an `ERROR` marker.
    pub has_errors: bool,
    /// Raw tool output.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub full_log: String,
}

impl ValidationReport {
    /// Parse validation output.
    ///
    /// Error markers do not fail parsing; they are surfaced as `has_errors`
    /// so callers can assert on invalid backups.
    pub fn parse(output: &str) -> Result<Self, ReportError> {
        if !output.contains(VALIDATION_HEADER) {
            return Err(ReportError::MissingField {
                key: VALIDATION_HEADER.to_string(),
            });
        }
        let total_bytes_read = match extract_value(output, "Total Bytes Read:") {
            Some(value) if !value.is_empty() => parse_number("Total Bytes Read:", value)?,
            _ => 0,
        };
        let files_found = FOUND_FILES
            .as_ref()
            .ok()
            .and_then(|pattern| pattern.captures(output))
            .and_then(|captures| captures.get(1))
            .map(|value| parse_number("found asb files", value.as_str()))
            .transpose()?;

        Ok(Self {
            records_read: required_number(output, "Records Read:")?,
            sindex_read: required_number(output, "sIndex Read:")?,
            udfs_read: required_number(output, "UDFs Read:")?,
            total_bytes_read,
            exit_code: required_number(output, "Exit Code:")?,
            files_found,
            has_errors: contains_error_marker(output),
            full_log: output.to_string(),
        })
    }

    /// True when the tool exited cleanly and reported no errors.
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.exit_code == 0 && !self.has_errors
    }
}
