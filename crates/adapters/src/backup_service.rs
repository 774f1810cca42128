//! Backup service REST adapter.

use backup_harness_ports::{BackupServicePort, BoxFuture, JobDetails, RestoreJobStatus};
use backup_harness_shared::{
    ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result, RetryPolicy, SecretString,
    retry_async,
};
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// HTTP backup service adapter configuration.
#[derive(Debug, Clone)]
pub struct HttpBackupServiceConfig {
    /// Service root, e.g. `http://localhost:8080`.
    pub base_url: Box<str>,
    /// Optional bearer token.
    pub token: Option<SecretString>,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Retry policy for idempotent reads.
    pub retry: RetryPolicy,
}

/// Failures talking to the backup service.
#[derive(Debug, thiserror::Error)]
pub enum BackupServiceError {
    /// Client construction failed.
    #[error("invalid backup service client configuration: {0}")]
    Config(String),
    /// Connect/transport failure.
    #[error("backup service unreachable: {0}")]
    Transport(#[source] reqwest::Error),
    /// The request timed out.
    #[error("backup service request timed out")]
    Timeout,
    /// The service answered with an unexpected status.
    #[error("backup service answered {status} for {operation}, expected {expected}")]
    Status {
        /// Operation name.
        operation: &'static str,
        /// Received status.
        status: u16,
        /// Expected status.
        expected: u16,
        /// Response body (trimmed).
        body: String,
    },
    /// The body did not match the expected model.
    #[error("failed to decode backup service response: {0}")]
    Decode(#[source] serde_json::Error),
    /// The request was cancelled.
    #[error("backup service request cancelled")]
    Cancelled,
}

impl BackupServiceError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::Config(_) => ErrorCode::invalid_input(),
            Self::Transport(_) => ErrorCode::dependency_unavailable(),
            Self::Timeout => ErrorCode::timeout(),
            Self::Status { status: 404, .. } => ErrorCode::not_found(),
            Self::Status { status: 401 | 403, .. } => ErrorCode::permission_denied(),
            Self::Status { status: 429, .. } => ErrorCode::rate_limited(),
            Self::Status { .. } => ErrorCode::new("backup_service", "unexpected_status"),
            Self::Decode(_) => ErrorCode::new("backup_service", "invalid_response"),
            Self::Cancelled => ErrorCode::cancelled(),
        }
    }

    fn class(&self) -> ErrorClass {
        match self {
            Self::Transport(_) | Self::Timeout => ErrorClass::Retriable,
            Self::Status { status, .. } if *status == 429 || *status >= 500 => {
                ErrorClass::Retriable
            },
            _ => ErrorClass::NonRetriable,
        }
    }
}

impl From<BackupServiceError> for ErrorEnvelope {
    fn from(error: BackupServiceError) -> Self {
        let code = error.error_code();
        let class = error.class();
        let message = error.to_string();
        match error {
            BackupServiceError::Cancelled => Self::cancelled(message),
            BackupServiceError::Config(_) => Self::expected(code, message),
            BackupServiceError::Status {
                operation,
                status,
                body,
                ..
            } => Self::expected_with_class(code, message, class)
                .with_metadata("operation", operation)
                .with_metadata("status", status.to_string())
                .with_output_tail(&body),
            BackupServiceError::Transport(_)
            | BackupServiceError::Timeout
            | BackupServiceError::Decode(_) => Self::unexpected(code, message, class),
        }
    }
}

/// [`BackupServicePort`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBackupService {
    client: reqwest::Client,
    base_url: Box<str>,
    retry: RetryPolicy,
}

impl HttpBackupService {
    /// Build the client; the token is sent as a sensitive bearer header.
    pub fn new(config: &HttpBackupServiceConfig) -> Result<Self> {
        let base_url = config.base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(BackupServiceError::Config("base url must be non-empty".to_string()).into());
        }
        if config.timeout_ms == 0 {
            return Err(
                BackupServiceError::Config("timeout must be greater than zero".to_string()).into(),
            );
        }

        let mut headers = HeaderMap::new();
        if let Some(token) = &config.token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose()))
                .map_err(|_| {
                    BackupServiceError::Config("token contains invalid header characters".into())
                })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .default_headers(headers)
            .build()
            .map_err(|error| BackupServiceError::Config(error.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            retry: config.retry,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send(
        &self,
        ctx: &RequestContext,
        request: reqwest::RequestBuilder,
        operation: &'static str,
        expected: StatusCode,
    ) -> Result<Vec<u8>, BackupServiceError> {
        if ctx.is_cancelled() {
            return Err(BackupServiceError::Cancelled);
        }
        let response = tokio::select! {
            () = ctx.cancelled() => return Err(BackupServiceError::Cancelled),
            result = request.send() => result.map_err(map_transport)?,
        };
        let status = response.status();
        let body = tokio::select! {
            () = ctx.cancelled() => return Err(BackupServiceError::Cancelled),
            result = response.bytes() => result.map_err(map_transport)?,
        };
        if status != expected {
            return Err(BackupServiceError::Status {
                operation,
                status: status.as_u16(),
                expected: expected.as_u16(),
                body: String::from_utf8_lossy(&body).trim().to_string(),
            });
        }
        Ok(body.to_vec())
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        ctx: &RequestContext,
        path: String,
        operation: &'static str,
    ) -> Result<T> {
        retry_async(ctx, self.retry, operation, || {
            let request = self.client.get(self.url(&path));
            async move {
                let body = self.send(ctx, request, operation, StatusCode::OK).await?;
                serde_json::from_slice(&body)
                    .map_err(|error| ErrorEnvelope::from(BackupServiceError::Decode(error)))
            }
        })
        .await
        .map_err(|error| error.with_metadata("path", path.clone()))
    }

    async fn post_expecting(
        &self,
        ctx: &RequestContext,
        path: String,
        operation: &'static str,
        expected: StatusCode,
    ) -> Result<()> {
        let request = self.client.post(self.url(&path));
        self.send(ctx, request, operation, expected)
            .await
            .map(|_| ())
            .map_err(|error| ErrorEnvelope::from(error).with_metadata("path", path))
    }
}

impl BackupServicePort for HttpBackupService {
    fn get_job(&self, ctx: &RequestContext, job_id: &str) -> BoxFuture<'_, Result<JobDetails>> {
        let ctx = ctx.clone();
        let path = format!("/v1/job/{job_id}");
        Box::pin(async move { self.get_json(&ctx, path, "backup_service.get_job").await })
    }

    fn cancel_job(&self, ctx: &RequestContext, job_id: &str) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        let path = format!("/v1/job/cancel/{job_id}");
        Box::pin(async move {
            self.post_expecting(&ctx, path, "backup_service.cancel_job", StatusCode::ACCEPTED)
                .await
        })
    }

    fn resume_job(&self, ctx: &RequestContext, job_id: &str) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        let path = format!("/v1/job/resume/{job_id}");
        Box::pin(async move {
            self.post_expecting(&ctx, path, "backup_service.resume_job", StatusCode::OK)
                .await
        })
    }

    fn restore_status(
        &self,
        ctx: &RequestContext,
        job_id: &str,
    ) -> BoxFuture<'_, Result<RestoreJobStatus>> {
        let ctx = ctx.clone();
        let path = format!("/v1/restore/status/{job_id}");
        Box::pin(async move {
            self.get_json(&ctx, path, "backup_service.restore_status")
                .await
        })
    }
}

fn map_transport(error: reqwest::Error) -> BackupServiceError {
    if error.is_timeout() {
        BackupServiceError::Timeout
    } else {
        BackupServiceError::Transport(error)
    }
}
