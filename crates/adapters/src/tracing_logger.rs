//! Logger adapter forwarding events to `tracing`.
//!
//! Field names are dynamic, so structured fields travel as one JSON-encoded
//! `fields` value next to the stable `event` name.

use crate::logger::redact_value;
use backup_harness_ports::{LogEvent, LogFields, LogLevel, LoggerPort};
use backup_harness_shared::mask_text;
use serde_json::Value;

const TARGET: &str = "backup_harness";

/// Logger that emits through the globally installed `tracing` subscriber.
#[derive(Debug, Clone, Default)]
pub struct TracingLogger {
    base_fields: LogFields,
}

impl TracingLogger {
    /// Logger without base fields.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set base fields applied to every event.
    #[must_use]
    pub fn with_base_fields(mut self, fields: LogFields) -> Self {
        self.base_fields = fields;
        self
    }

    fn encode_fields(&self, extra: Option<LogFields>) -> String {
        let mut fields = self.base_fields.clone();
        if let Some(extra) = extra {
            fields.extend(extra);
        }
        if fields.is_empty() {
            return String::new();
        }
        let mut value = Value::Object(
            fields
                .into_iter()
                .map(|(key, value)| (key.into_string(), value))
                .collect(),
        );
        redact_value(&mut value);
        value.to_string()
    }
}

impl LoggerPort for TracingLogger {
    fn log(&self, event: LogEvent) {
        let fields = self.encode_fields(event.fields);
        let error = event
            .error
            .map(|mut error| {
                redact_value(&mut error);
                error.to_string()
            })
            .unwrap_or_default();
        let message = mask_text(&event.message);
        let name = event.event.as_ref();

        match event.level {
            LogLevel::Debug => {
                tracing::debug!(target: TARGET, event = name, fields = %fields, error = %error, "{message}");
            },
            LogLevel::Info => {
                tracing::info!(target: TARGET, event = name, fields = %fields, error = %error, "{message}");
            },
            LogLevel::Warn => {
                tracing::warn!(target: TARGET, event = name, fields = %fields, error = %error, "{message}");
            },
            LogLevel::Error => {
                tracing::error!(target: TARGET, event = name, fields = %fields, error = %error, "{message}");
            },
        }
    }

    fn child(&self, fields: LogFields) -> Box<dyn LoggerPort> {
        let mut merged = self.base_fields.clone();
        merged.extend(fields);
        Box::new(Self {
            base_fields: merged,
        })
    }
}
