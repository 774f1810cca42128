//! Logger selection for CLI runs.

use backup_harness_adapters::{JsonLogger, LogSink, StderrLogSink, TracingLogger};
use backup_harness_config::{LogFormat, LoggingConfig};
use backup_harness_ports::{LogFields, LogLevel, LoggerPort};
use backup_harness_shared::RequestContext;
use serde_json::Value;
use std::sync::Arc;

/// Logger for the configured format.
///
/// `json` writes one line per event to stderr; `text` forwards to `tracing`,
/// which the binary formats and filters.
#[must_use]
pub fn build_logger(config: &LoggingConfig) -> Option<Arc<dyn LoggerPort>> {
    match config.format {
        LogFormat::Json => {
            let sink: Arc<dyn LogSink> = Arc::new(StderrLogSink);
            let level = config.level.parse::<LogLevel>().unwrap_or(LogLevel::Info);
            Some(Arc::new(JsonLogger::new(sink).with_min_level(level)))
        },
        LogFormat::Text => Some(Arc::new(TracingLogger::new())),
    }
}

/// Child logger tagged with the request's correlation id.
#[must_use]
pub fn scope_logger(
    logger: Option<&Arc<dyn LoggerPort>>,
    ctx: &RequestContext,
) -> Option<Arc<dyn LoggerPort>> {
    let logger = logger?;
    let mut fields = LogFields::new();
    fields.insert(
        "correlationId".to_owned().into_boxed_str(),
        Value::String(ctx.correlation_id().as_str().to_string()),
    );
    Some(Arc::from(logger.child(fields)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_formats_produce_a_logger() {
        let text = LoggingConfig::default();
        assert!(build_logger(&text).is_some());

        let json = LoggingConfig {
            format: LogFormat::Json,
            level: "warn".into(),
        };
        assert!(build_logger(&json).is_some());
    }

    #[test]
    fn scoping_without_a_logger_is_a_no_op() {
        let ctx = RequestContext::new_request();
        assert!(scope_logger(None, &ctx).is_none());
    }
}
