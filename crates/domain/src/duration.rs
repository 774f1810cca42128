//! Report durations (`Duration: 1m2.5s`).

use crate::report::ReportError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A duration as printed by the tools, with its value in milliseconds.
///
/// Accepted forms are a sequence of `<number><unit>` terms with units
/// `h`, `m`, `s`, `ms`, `us`/`µs` and `ns` (`500ms`, `2s`, `1m`, `1m2.5s`).
/// Any other unit, a bare number, or an empty value is rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDuration {
    raw: String,
    millis: f64,
}

impl ReportDuration {
    /// Parse a duration value.
    pub fn parse(raw: &str) -> Result<Self, ReportError> {
        let trimmed = raw.trim();
        let invalid = || ReportError::InvalidDuration {
            value: trimmed.to_string(),
        };
        if trimmed.is_empty() {
            return Err(invalid());
        }

        let mut millis = 0.0_f64;
        let mut rest = trimmed;
        while !rest.is_empty() {
            let number_len = rest
                .find(|ch: char| !(ch.is_ascii_digit() || ch == '.'))
                .ok_or_else(invalid)?;
            let (number, tail) = rest.split_at(number_len);
            let value: f64 = number.parse().map_err(|_| invalid())?;

            let unit_len = tail
                .find(|ch: char| ch.is_ascii_digit() || ch == '.')
                .unwrap_or(tail.len());
            let (unit, next) = tail.split_at(unit_len);
            millis += value * unit_millis(unit).ok_or_else(invalid)?;
            rest = next;
        }

        Ok(Self {
            raw: trimmed.to_string(),
            millis,
        })
    }

    /// Value in milliseconds.
    #[must_use]
    pub const fn as_millis_f64(&self) -> f64 {
        self.millis
    }

    /// Value as printed by the tool.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for ReportDuration {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.raw)
    }
}

fn unit_millis(unit: &str) -> Option<f64> {
    match unit {
        "h" => Some(3_600_000.0),
        "m" => Some(60_000.0),
        "s" => Some(1_000.0),
        "ms" => Some(1.0),
        "us" | "µs" | "μs" => Some(0.001),
        "ns" => Some(0.000_001),
        _ => None,
    }
}
