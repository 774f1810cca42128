//! `.env` / properties file loading.
//!
//! File values only fill keys that are still absent, so whatever was collected
//! first (process env, explicit overrides) keeps precedence.

use backup_harness_shared::{ErrorCode, ErrorEnvelope};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Failures while reading a `.env` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DotenvError {
    /// The file does not exist.
    NotFound {
        /// File path.
        path: String,
    },
    /// A line could not be parsed.
    Parse {
        /// File path.
        path: String,
        /// Offending line.
        line: String,
        /// Byte offset of the error within the line.
        index: usize,
    },
    /// The file could not be read.
    Io {
        /// File path.
        path: String,
        /// OS error text.
        message: String,
    },
}

impl DotenvError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::new("config", "env_file_not_found"),
            Self::Parse { .. } => ErrorCode::new("config", "invalid_env_file"),
            Self::Io { .. } => ErrorCode::new("config", "env_file_io"),
        }
    }

    fn from_dotenvy(path: &Path, error: dotenvy::Error) -> Self {
        let path = path.to_string_lossy().to_string();
        match error {
            dotenvy::Error::LineParse(line, index) => Self::Parse { path, line, index },
            other if other.not_found() => Self::NotFound { path },
            other => Self::Io {
                path,
                message: other.to_string(),
            },
        }
    }
}

impl fmt::Display for DotenvError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { path } => write!(formatter, "env file {path} not found"),
            Self::Parse { path, index, .. } => {
                write!(formatter, "env file {path} has an invalid line (at byte {index})")
            },
            Self::Io { path, message } => {
                write!(formatter, "failed to read env file {path}: {message}")
            },
        }
    }
}

impl std::error::Error for DotenvError {}

impl From<DotenvError> for ErrorEnvelope {
    fn from(error: DotenvError) -> Self {
        let code = error.error_code();
        let message = error.to_string();
        let envelope = Self::expected(code, message);
        match error {
            DotenvError::NotFound { path } | DotenvError::Io { path, .. } => {
                envelope.with_metadata("path", path)
            },
            // The line may hold a secret; only its position is reported.
            DotenvError::Parse { path, index, .. } => envelope
                .with_metadata("path", path)
                .with_metadata("index", index.to_string()),
        }
    }
}

/// Read `KEY=VALUE` pairs from `path`.
///
/// Supports `#` comments, single or double quotes and an `export ` prefix.
pub fn read_env_file(path: &Path) -> Result<BTreeMap<String, String>, DotenvError> {
    let iter =
        dotenvy::from_path_iter(path).map_err(|error| DotenvError::from_dotenvy(path, error))?;
    let mut values = BTreeMap::new();
    for item in iter {
        let (key, value) = item.map_err(|error| DotenvError::from_dotenvy(path, error))?;
        values.entry(key).or_insert(value);
    }
    Ok(values)
}

/// Fill absent keys of `map` from the file at `path`; returns how many keys were added.
pub fn merge_env_file(
    map: &mut BTreeMap<String, String>,
    path: &Path,
) -> Result<usize, DotenvError> {
    let mut added = 0;
    for (key, value) in read_env_file(path)? {
        if !map.contains_key(&key) {
            map.insert(key, value);
            added += 1;
        }
    }
    Ok(added)
}
