//! Error types for scrapeflow
//!
//! This module provides error handling for the library, including:
//! - Domain-specific error types (request validation, credentials, jobs)
//! - Liveness-probe faults with transience classification
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for scrapeflow operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for scrapeflow
///
/// This is the primary error type used throughout the library. Each variant
/// includes contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Request validation failed before a job was created
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Credential bundle was empty or not parseable
    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    /// No job is registered under the given id
    #[error("job {id} not found")]
    JobNotFound {
        /// The job id that was not found
        id: i64,
    },

    /// The job has no result yet and the wait timed out
    #[error("job {id} has not finished yet")]
    ResultPending {
        /// The job id that is still in flight
        id: i64,
    },

    /// A progress subscriber fell behind the bounded live buffer
    #[error("subscriber lagged behind the event buffer and was disconnected")]
    SlowConsumer,

    /// Shutdown in progress - not accepting new jobs
    #[error("shutdown in progress: not accepting new jobs")]
    ShuttingDown,

    /// Liveness probe failed
    #[error("liveness probe failed: {0}")]
    Probe(#[from] ProbeError),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Liveness-probe faults
///
/// `Timeout` and `Transport` are transient: the Auth Manager retries them
/// exactly once per classification. `UnexpectedResponse` is a definitive
/// answer from the target service and is never retried.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Probe did not answer within the configured window
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),

    /// Transport-level failure (DNS, connect, TLS, reset)
    #[error("probe transport failure: {0}")]
    Transport(String),

    /// The target service answered with something the probe cannot classify
    #[error("probe received unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl ProbeError {
    /// Whether a single immediate retry is worthwhile
    pub fn is_transient(&self) -> bool {
        matches!(self, ProbeError::Timeout(_) | ProbeError::Transport(_))
    }
}

/// API error response format
///
/// This structure is returned by API endpoints when an error occurs.
/// It follows a standard format with machine-readable error codes,
/// human-readable messages, and optional contextual details.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "job_not_found",
///     "message": "job 123 not found",
///     "details": {
///       "job_id": 123
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "job_not_found", "invalid_request")
    ///
    /// Clients can use this for programmatic error handling.
    pub code: String,

    /// Human-readable error message
    ///
    /// This is suitable for displaying to end users.
    pub message: String,

    /// Optional additional context about the error
    ///
    /// This can include fields like job_id, validation details, etc.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create an API error with additional details
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    /// Create a "not found" error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new("not_found", format!("{} not found", resource.into()))
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("invalid_request", message)
    }

    /// Create a "conflict" error
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("conflict", message)
    }

    /// Create an "internal server error"
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }

    /// Create an "unauthorized" error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("unauthorized", message)
    }

    /// Create a "service unavailable" error
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new("service_unavailable", message)
    }
}

/// Convert errors to HTTP status codes for API responses
///
/// This trait maps domain errors to appropriate HTTP status codes.
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - client supplied an unusable payload
            Error::InvalidRequest(_) => 400,
            Error::InvalidCredential(_) => 400,

            // 404 Not Found
            Error::JobNotFound { .. } => 404,

            // 409 Conflict - resource exists but is not in a servable state
            Error::ResultPending { .. } => 409,
            Error::SlowConsumer => 409,

            // 502 Bad Gateway - upstream target service misbehaved
            Error::Probe(_) => 502,
            Error::Network(_) => 502,

            // 503 Service Unavailable
            Error::ShuttingDown => 503,

            // 500 Internal Server Error
            Error::Serialization(_) => 500,
            Error::Io(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Other(_) => 500,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::InvalidRequest(_) => "invalid_request",
            Error::InvalidCredential(_) => "invalid_credential",
            Error::JobNotFound { .. } => "job_not_found",
            Error::ResultPending { .. } => "result_pending",
            Error::SlowConsumer => "slow_consumer",
            Error::ShuttingDown => "shutting_down",
            Error::Probe(_) => "probe_failed",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::Io(_) => "io_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let code = err.error_code().to_string();
        let message = err.to_string();
        match err {
            Error::JobNotFound { id } | Error::ResultPending { id } => {
                ApiError::with_details(code, message, serde_json::json!({ "job_id": id }))
            }
            _ => ApiError::new(code, message),
        }
    }
}
