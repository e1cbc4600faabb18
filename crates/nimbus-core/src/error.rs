//! Error types for Nimbus operations.
//!
//! Every failure surfaced by the SDK is an [`Error`] tagged with an [`ErrorKind`], so
//! callers can branch on the class of failure without matching on message text.

use serde::Serialize;
use thiserror::Error;

/// Main error type for Nimbus operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A caller-supplied value violated a precondition; no request was sent.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The HTTP call itself failed (connection, timeout, body read).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The server answered with a non-2xx status code.
    #[error("HTTP {status}: {message}")]
    HttpStatus {
        /// Response status code
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// The server response violated the API contract (missing operation, state, ...).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The server reported a terminal failure for an asynchronous operation.
    #[error("Operation {operation_id} failed: {message}")]
    OperationFailed {
        /// Identifier of the failed operation
        operation_id: String,
        /// Server supplied message
        message: String,
    },

    /// The caller cancelled the call or its deadline elapsed.
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// A lookup found no matching resource.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid endpoint
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Caller precondition violated before any network call.
    InvalidArgument,
    /// HTTP or network layer failure.
    Transport,
    /// Server response missing expected fields.
    Protocol,
    /// Server reported a terminal operation failure.
    OperationFailed,
    /// Caller-driven cancellation or deadline.
    Cancelled,
    /// Lookup with no match.
    NotFound,
    /// Client or SDK configuration problem.
    Config,
}

/// Specialized result type for Nimbus operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Structured error response for serialization.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorResponse {
    /// Error details
    pub error: ErrorDetail,
    /// Optional operation ID the error relates to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
}

/// Error detail structure.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorDetail {
    /// Error code for programmatic handling
    pub code: String,
    /// Error kind
    pub kind: ErrorKind,
    /// Human-readable error message
    pub message: String,
}

impl Error {
    /// Returns the kind this error belongs to.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Transport(_) | Self::HttpStatus { .. } => ErrorKind::Transport,
            Self::Protocol(_) => ErrorKind::Protocol,
            Self::OperationFailed { .. } => ErrorKind::OperationFailed,
            Self::Cancelled(_) => ErrorKind::Cancelled,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::ConfigError(_) | Self::InvalidEndpoint(_) => ErrorKind::Config,
        }
    }

    /// Returns the error code for this error type.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::HttpStatus { .. } => "HTTP_STATUS",
            Self::Protocol(_) => "PROTOCOL_ERROR",
            Self::OperationFailed { .. } => "OPERATION_FAILED",
            Self::Cancelled(_) => "CANCELLED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::InvalidEndpoint(_) => "INVALID_ENDPOINT",
        }
    }

    /// Returns the HTTP status code when the server rejected the request.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns true for lookups with no match and HTTP 404 responses.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::HttpStatus { status: 404, .. })
    }

    /// Returns true if the caller cancelled the call.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// Converts the error into an `ErrorResponse`.
    #[must_use]
    pub fn into_error_response(self) -> ErrorResponse {
        let operation_id = match &self {
            Self::OperationFailed { operation_id, .. } => Some(operation_id.clone()),
            _ => None,
        };

        ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                kind: self.kind(),
                message: self.to_string(),
            },
            operation_id,
        }
    }

    /// Returns true if this error should be logged as a serious error.
    #[must_use]
    pub const fn should_log(&self) -> bool {
        matches!(
            self,
            Self::Protocol(_) | Self::ConfigError(_) | Self::OperationFailed { .. }
        )
    }
}

// Conversions from external error types
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Transport(format!("request timed out: {err}"))
        } else if err.is_connect() {
            Self::Transport(format!("connection failed: {err}"))
        } else if err.is_builder() {
            Self::ConfigError(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidEndpoint(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::ConfigError(err.to_string())
    }
}
