//! Result helpers for shared error handling.

use crate::errors::ErrorEnvelope;

/// Shared result type used across the workspace.
pub type Result<T, E = ErrorEnvelope> = std::result::Result<T, E>;

/// Extension helpers for results carrying an [`ErrorEnvelope`].
pub trait ResultExt<T> {
    /// Attach a metadata entry to the error, if any.
    fn with_context(self, key: &'static str, value: impl Into<String>) -> Result<T>;

    /// Attach lazily computed metadata to the error, if any.
    fn with_context_lazy<F>(self, key: &'static str, value: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<ErrorEnvelope>,
{
    fn with_context(self, key: &'static str, value: impl Into<String>) -> Result<T> {
        self.map_err(|error| error.into().with_metadata(key, value))
    }

    fn with_context_lazy<F>(self, key: &'static str, value: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|error| error.into().with_metadata(key, value()))
    }
}
