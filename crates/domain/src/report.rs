//! Line-oriented report scanning shared by all result types.
//!
//! The CLI tools print a summary block of `Key: Value` lines. A value is
//! taken from the first line that *starts with* the key, as the text after
//! the first `:` of that line, trimmed.

use backup_harness_shared::{ErrorCode, ErrorEnvelope};
use std::fmt;

/// Marker whose presence means the tool reported a failure.
pub const ERROR_MARKER: &str = "ERROR";

/// Options shared by every report parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportOptions {
    /// Parse even when the output contains [`ERROR_MARKER`].
    pub ignore_errors: bool,
    /// Zone applied to start times whose zone token is not recognized.
    pub fallback_zone: chrono_tz::Tz,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            ignore_errors: false,
            fallback_zone: chrono_tz::UTC,
        }
    }
}

impl ReportOptions {
    /// Default options with error suppression toggled.
    #[must_use]
    pub fn ignoring_errors(ignore_errors: bool) -> Self {
        Self {
            ignore_errors,
            ..Self::default()
        }
    }
}

/// Failures raised while turning tool output into a typed result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportError {
    /// `asbackup` output contained an error marker.
    BackupProcess {
        /// Full tool output.
        output: String,
    },
    /// `asrestore` output contained an error marker.
    RestoreProcess {
        /// Full tool output.
        output: String,
    },
    /// `--estimate` output contained an error marker.
    EstimationProcess {
        /// Full tool output.
        output: String,
    },
    /// A required `Key:` line is absent.
    MissingField {
        /// Key (or keys, joined with ` / `) that were searched.
        key: String,
    },
    /// A numeric field did not parse.
    InvalidNumber {
        /// Key of the offending line.
        key: String,
        /// Raw value.
        value: String,
    },
    /// A duration did not parse or used an unknown unit.
    InvalidDuration {
        /// Raw value.
        value: String,
    },
    /// A start time did not match `EEE, d MMM yyyy HH:mm:ss zone`.
    InvalidStartTime {
        /// Raw value.
        value: String,
    },
}

impl ReportError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::BackupProcess { .. } => ErrorCode::new("report", "backup_process"),
            Self::RestoreProcess { .. } => ErrorCode::new("report", "restore_process"),
            Self::EstimationProcess { .. } => ErrorCode::new("report", "estimation_process"),
            Self::MissingField { .. } => ErrorCode::new("report", "missing_field"),
            Self::InvalidNumber { .. } => ErrorCode::new("report", "invalid_number"),
            Self::InvalidDuration { .. } => ErrorCode::new("report", "invalid_duration"),
            Self::InvalidStartTime { .. } => ErrorCode::new("report", "invalid_start_time"),
        }
    }

    /// True when the tool itself reported a failure (as opposed to a format drift).
    #[must_use]
    pub const fn is_process_failure(&self) -> bool {
        matches!(
            self,
            Self::BackupProcess { .. } | Self::RestoreProcess { .. } | Self::EstimationProcess { .. }
        )
    }
}

impl fmt::Display for ReportError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BackupProcess { .. } => {
                formatter.write_str("an error occurred during the backup process")
            },
            Self::RestoreProcess { .. } => {
                formatter.write_str("an error occurred during the restore process")
            },
            Self::EstimationProcess { .. } => {
                formatter.write_str("an error occurred during the estimation process")
            },
            Self::MissingField { key } => write!(formatter, "report line `{key}` not found"),
            Self::InvalidNumber { key, value } => {
                write!(formatter, "report line `{key}` has non-numeric value `{value}`")
            },
            Self::InvalidDuration { value } => write!(formatter, "unsupported duration `{value}`"),
            Self::InvalidStartTime { value } => write!(formatter, "unsupported start time `{value}`"),
        }
    }
}

impl std::error::Error for ReportError {}

impl From<ReportError> for ErrorEnvelope {
    fn from(error: ReportError) -> Self {
        let envelope = Self::expected(error.error_code(), error.to_string());
        match error {
            ReportError::BackupProcess { output }
            | ReportError::RestoreProcess { output }
            | ReportError::EstimationProcess { output } => envelope.with_output_tail(&output),
            ReportError::MissingField { key } => envelope.with_metadata("key", key),
            ReportError::InvalidNumber { key, value } => {
                envelope.with_metadata("key", key).with_metadata("value", value)
            },
            ReportError::InvalidDuration { value } | ReportError::InvalidStartTime { value } => {
                envelope.with_metadata("value", value)
            },
        }
    }
}

/// Return the value of the first line starting with `key`.
///
/// The value is everything after the first `:` on that line, trimmed. Lines
/// that start with the key but carry nothing after the colon are skipped.
///
/// ```
/// use backup_harness_domain::extract_value;
///
/// let output = "Records Read: 42\nExit Code: 0\n";
/// assert_eq!(extract_value(output, "Records Read:"), Some("42"));
/// assert_eq!(extract_value(output, "UDFs Read:"), None);
/// ```
#[must_use]
pub fn extract_value<'a>(output: &'a str, key: &str) -> Option<&'a str> {
    output
        .split('\n')
        .filter(|line| line.starts_with(key))
        .find_map(|line| {
            let (_, value) = line.split_once(':')?;
            (!value.is_empty()).then_some(value.trim())
        })
}

/// True when `output` carries the tool failure marker.
#[must_use]
pub fn contains_error_marker(output: &str) -> bool {
    output.contains(ERROR_MARKER)
}

pub(crate) fn required<'a>(output: &'a str, key: &str) -> Result<&'a str, ReportError> {
    extract_value(output, key)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ReportError::MissingField {
            key: key.to_string(),
        })
}

pub(crate) fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ReportError> {
    value.parse::<T>().map_err(|_| ReportError::InvalidNumber {
        key: key.to_string(),
        value: value.to_string(),
    })
}

pub(crate) fn required_number<T: std::str::FromStr>(
    output: &str,
    key: &str,
) -> Result<T, ReportError> {
    parse_number(key, required(output, key)?)
}
