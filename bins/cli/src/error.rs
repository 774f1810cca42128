use backup_harness_infra::InfraError;
use backup_harness_shared::{ErrorCode, ErrorKind};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Ok = 0,
    Internal = 1,
    InvalidInput = 2,
    Io = 3,
    Failure = 4,
}

impl ExitCode {
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Exit code for an error returned by the harness.
///
/// Report, assertion, tool and wait failures are 4; process and I/O
/// failures are 3; other expected errors are invalid input.
#[must_use]
pub fn infra_exit_code(error: &InfraError) -> ExitCode {
    let namespace = error.code.namespace();
    if namespace == "report"
        || namespace == "scenario"
        || namespace == "jobs"
        || error.code.code() == "failed"
        || error.code == ErrorCode::assertion_failed()
        || error.is_timeout()
    {
        return ExitCode::Failure;
    }
    if namespace == "process" || error.code == ErrorCode::io() {
        return ExitCode::Io;
    }
    match error.kind {
        ErrorKind::Expected => ExitCode::InvalidInput,
        ErrorKind::Invariant => ExitCode::Failure,
        ErrorKind::Unexpected => ExitCode::Internal,
    }
}

#[derive(Debug)]
pub enum CliError {
    InvalidInput(String),
    Io(std::io::Error),
    Input(anyhow::Error),
    Serialization(serde_json::Error),
}

impl CliError {
    #[must_use]
    pub const fn exit_code(&self) -> ExitCode {
        match self {
            Self::InvalidInput(_) => ExitCode::InvalidInput,
            Self::Io(_) | Self::Input(_) => ExitCode::Io,
            Self::Serialization(_) => ExitCode::Internal,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput(message) => write!(formatter, "invalid input: {message}"),
            Self::Io(error) => write!(formatter, "io error: {error}"),
            Self::Input(error) => write!(formatter, "{error:#}"),
            Self::Serialization(error) => write!(formatter, "serialization error: {error}"),
        }
    }
}

impl std::error::Error for CliError {}

impl From<std::io::Error> for CliError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error)
    }
}

impl From<anyhow::Error> for CliError {
    fn from(error: anyhow::Error) -> Self {
        Self::Input(error)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error)
    }
}
