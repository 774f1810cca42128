//! Structured logging boundary contract.

use backup_harness_shared::ErrorEnvelope;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    /// Debug.
    Debug,
    /// Info.
    Info,
    /// Warn.
    Warn,
    /// Error.
    Error,
}

impl LogLevel {
    /// Lower-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// True when an event at `level` passes a `self` threshold.
    #[must_use]
    pub fn allows(self, level: Self) -> bool {
        level >= self
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "debug" | "trace" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown log level `{other}`")),
        }
    }
}

/// Additional event fields.
pub type LogFields = BTreeMap<Box<str>, serde_json::Value>;

/// Build [`LogFields`] from key/value pairs.
pub fn log_fields<I, K, V>(pairs: I) -> LogFields
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<Box<str>>,
    V: Into<serde_json::Value>,
{
    pairs
        .into_iter()
        .map(|(key, value)| (key.into(), value.into()))
        .collect()
}

/// Structured log event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    /// Stable event name.
    pub event: Box<str>,
    /// Severity.
    pub level: LogLevel,
    /// Human-readable message (safe, redacted).
    pub message: Box<str>,
    /// Optional structured fields.
    pub fields: Option<LogFields>,
    /// Optional error payload.
    pub error: Option<serde_json::Value>,
}

impl LogEvent {
    /// Event without fields or error.
    #[must_use]
    pub fn new(event: &str, level: LogLevel, message: &str) -> Self {
        Self {
            event: event.into(),
            level,
            message: message.into(),
            fields: None,
            error: None,
        }
    }

    /// Attach fields.
    #[must_use]
    pub fn with_fields(mut self, fields: LogFields) -> Self {
        self.fields = Some(fields);
        self
    }

    /// Attach an error envelope as the error payload.
    #[must_use]
    pub fn with_error(mut self, error: &ErrorEnvelope) -> Self {
        self.error = serde_json::to_value(error).ok();
        self
    }
}

/// Boundary contract for structured logging.
pub trait LoggerPort: Send + Sync {
    /// Emit a structured event.
    fn log(&self, event: LogEvent);

    /// Create a child logger with base fields applied to every event.
    fn child(&self, fields: LogFields) -> Box<dyn LoggerPort>;

    /// Convenience: debug event.
    fn debug(&self, event: &str, message: &str, fields: Option<LogFields>) {
        self.log(LogEvent {
            fields,
            ..LogEvent::new(event, LogLevel::Debug, message)
        });
    }

    /// Convenience: info event.
    fn info(&self, event: &str, message: &str, fields: Option<LogFields>) {
        self.log(LogEvent {
            fields,
            ..LogEvent::new(event, LogLevel::Info, message)
        });
    }

    /// Convenience: warn event.
    fn warn(&self, event: &str, message: &str, fields: Option<LogFields>) {
        self.log(LogEvent {
            fields,
            ..LogEvent::new(event, LogLevel::Warn, message)
        });
    }

    /// Convenience: error event.
    fn error(&self, event: &str, message: &str, fields: Option<LogFields>) {
        self.log(LogEvent {
            fields,
            ..LogEvent::new(event, LogLevel::Error, message)
        });
    }

    /// Convenience: error event carrying an envelope.
    fn failure(&self, event: &str, message: &str, fields: Option<LogFields>, error: &ErrorEnvelope) {
        self.log(
            LogEvent {
                fields,
                ..LogEvent::new(event, LogLevel::Error, message)
            }
            .with_error(error),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backup_harness_shared::ErrorCode;

    #[test]
    fn level_threshold_orders_by_severity() {
        assert!(LogLevel::Info.allows(LogLevel::Error));
        assert!(LogLevel::Info.allows(LogLevel::Info));
        assert!(!LogLevel::Warn.allows(LogLevel::Debug));
        assert_eq!("WARNING".parse(), Ok(LogLevel::Warn));
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn builds_fields_and_error_payload() {
        let fields = log_fields([("namespace", "test"), ("set", "users")]);
        let event = LogEvent::new("scenario.seed.start", LogLevel::Info, "seeding")
            .with_fields(fields)
            .with_error(&ErrorEnvelope::expected(ErrorCode::timeout(), "slow"));
        assert_eq!(
            event
                .fields
                .as_ref()
                .and_then(|fields| fields.get("namespace"))
                .and_then(serde_json::Value::as_str),
            Some("test")
        );
        assert_eq!(
            event
                .error
                .as_ref()
                .and_then(|error| error.get("message"))
                .and_then(serde_json::Value::as_str),
            Some("slow")
        );
    }
}
