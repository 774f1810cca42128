//! `tracing` subscriber setup.

use backup_harness_infra::HarnessRuntime;
use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

/// Log line format override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    /// Human-readable lines.
    Text,
    /// One JSON object per line.
    Json,
}

impl LogFormatArg {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
        }
    }
}

const FILTER_ENV: &str = "BH_LOG";

/// Filter from `BH_LOG`, then `RUST_LOG`, then the configured level.
fn env_filter(level: &str) -> EnvFilter {
    std::env::var(FILTER_ENV)
        .ok()
        .or_else(|| std::env::var("RUST_LOG").ok())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(level))
}

/// Install the global subscriber on stderr. A second call is a no-op.
pub fn init_tracing(runtime: &HarnessRuntime) {
    let logging = &runtime.config().logging;
    let filter = env_filter(&logging.level);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    let _ = if logging.format.as_str() == LogFormatArg::Json.as_str() {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
