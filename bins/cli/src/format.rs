//! Output format helpers for CLI commands.

use crate::error::CliError;
use clap::{Args, ValueEnum};
use serde::Serialize;
use serde_json::Value;
use std::fmt::Write as _;

/// Output format choices for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-friendly `key: value` lines.
    #[default]
    Text,
    /// Pretty JSON document.
    Json,
    /// One JSON object per line.
    Ndjson,
}

/// Output-related CLI flags.
#[derive(Debug, Args)]
pub struct OutputArgs {
    /// Output format for command responses.
    #[arg(long, global = true, value_enum)]
    pub output: Option<OutputFormat>,
    /// Suppress `info:` progress lines on stderr.
    #[arg(long, global = true)]
    pub no_progress: bool,
}

/// Output mode derived from CLI flags.
#[derive(Debug, Clone, Copy)]
pub struct OutputMode {
    pub format: OutputFormat,
    pub no_progress: bool,
}

impl OutputMode {
    /// Build output mode from CLI flags.
    #[must_use]
    pub fn from_args(args: &OutputArgs) -> Self {
        Self {
            format: args.output.unwrap_or_default(),
            no_progress: args.no_progress,
        }
    }

    /// Returns true when JSON output is requested.
    #[must_use]
    pub const fn is_json(self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Returns true when NDJSON output is requested.
    #[must_use]
    pub const fn is_ndjson(self) -> bool {
        matches!(self.format, OutputFormat::Ndjson)
    }
}

/// Render a successful payload of `kind`.
///
/// JSON wraps it as `{"status", "kind", "result"}`; NDJSON emits the same
/// object on one line with `"type": "summary"`; text flattens it to
/// `key: value` lines.
pub fn render_success<T: Serialize>(
    mode: OutputMode,
    kind: &str,
    status: &str,
    payload: &T,
) -> Result<String, CliError> {
    let value = serde_json::to_value(payload)?;
    if mode.is_ndjson() {
        let line = serde_json::json!({
            "type": "summary",
            "status": status,
            "kind": kind,
            "result": value,
        });
        let mut out = serde_json::to_string(&line)?;
        out.push('\n');
        return Ok(out);
    }
    if mode.is_json() {
        let document = serde_json::json!({
            "status": status,
            "kind": kind,
            "result": value,
        });
        let mut out = serde_json::to_string_pretty(&document)?;
        out.push('\n');
        return Ok(out);
    }
    let mut out = format!("status: {status}\nkind: {kind}\n");
    flatten_text(&mut out, "", &value);
    Ok(out)
}

fn flatten_text(out: &mut String, prefix: &str, value: &Value) {
    match value {
        Value::Object(map) => {
            for (key, value) in map {
                let key = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_text(out, &key, value);
            }
        },
        Value::Array(items) if items.iter().all(|item| !item.is_object()) => {
            let joined = items
                .iter()
                .map(scalar_text)
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(out, "{prefix}: {joined}");
        },
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                flatten_text(out, &format!("{prefix}[{index}]"), item);
            }
        },
        scalar => {
            let _ = writeln!(out, "{prefix}: {}", scalar_text(scalar));
        },
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => "none".to_string(),
        other => other.to_string(),
    }
}
