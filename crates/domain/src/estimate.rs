//! `asbackup --estimate` output.

use crate::report::{ReportError, contains_error_marker, parse_number};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

const FILE_SIZE_KEY: &str = "File size (bytes):";

static FILE_SIZE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"File size \(bytes\):\s+(\S+)"));

/// Estimated backup size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateResult {
    /// Estimated size of the backup in bytes.
    pub estimated_bytes: u64,
    /// Raw tool output.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub full_log: String,
}

impl EstimateResult {
    /// Parse estimation output. Any `ERROR` marker fails the estimation.
    pub fn parse(output: &str) -> Result<Self, ReportError> {
        if contains_error_marker(output) {
            return Err(ReportError::EstimationProcess {
                output: output.to_string(),
            });
        }
        let missing = || ReportError::MissingField {
            key: FILE_SIZE_KEY.to_string(),
        };
        let pattern = FILE_SIZE.as_ref().map_err(|_| missing())?;
        let value = pattern
            .captures(output)
            .and_then(|captures| captures.get(1))
            .ok_or_else(missing)?;

        Ok(Self {
            estimated_bytes: parse_number(FILE_SIZE_KEY, value.as_str())?,
            full_log: output.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_file_size_line() -> Result<(), ReportError> {
        let output = "level=INFO msg=\"estimate\"\nFile size (bytes):   1048576\nEstimated in 2s\n";
        let estimate = EstimateResult::parse(output)?;
        assert_eq!(estimate.estimated_bytes, 1_048_576);
        Ok(())
    }

    #[test]
    fn error_marker_fails_estimation() {
        let output = "ERROR namespace not found\nFile size (bytes): 10\n";
        assert!(matches!(
            EstimateResult::parse(output),
            Err(ReportError::EstimationProcess { .. })
        ));
    }

    #[test]
    fn missing_or_bad_size_is_reported() {
        assert!(matches!(
            EstimateResult::parse("nothing here"),
            Err(ReportError::MissingField { .. })
        ));
        assert!(matches!(
            EstimateResult::parse("File size (bytes): lots\n"),
            Err(ReportError::InvalidNumber { .. })
        ));
    }
}
