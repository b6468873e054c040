//! Shared error vocabulary
//!
//! - **`CommonError`**: decoding failures raised by the foundation tier
//!   (JWT claims, base64 segments, JSON payloads).
//! - **`ErrorClassification`**: retryability and severity interface that
//!   module-specific errors such as the API pipeline's `ApiError` implement,
//!   so callers can make retry and alerting decisions without matching on
//!   concrete variants.
//! - **`ErrorSeverity`**: unified severity level for logging.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Standard result type using CommonError
pub type CommonResult<T> = Result<T, CommonError>;

/// Errors raised by the foundation tier
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommonError {
    /// Input could not be decoded in the named format
    #[error("Serialization error ({format}): {message}")]
    Serialization { format: &'static str, message: String },
}

impl CommonError {
    /// Serialization error tagged with the format being processed
    pub fn serialization_format(format: &'static str, message: impl Into<String>) -> Self {
        Self::Serialization { format, message: message.into() }
    }
}

/// Classification interface implemented by every error type in the workspace
pub trait ErrorClassification {
    /// Check if this error is retryable
    ///
    /// Retryable errors are transient: rate limiting, an open circuit
    /// breaker or temporary backend unavailability.
    fn is_retryable(&self) -> bool;

    /// Get the error severity level
    ///
    /// Used for logging and alerting decisions.
    fn severity(&self) -> ErrorSeverity;

    /// Check if this is a critical error requiring immediate attention
    fn is_critical(&self) -> bool;

    /// Get the suggested retry delay if applicable
    fn retry_after(&self) -> Option<Duration>;
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    Error,
    /// Critical, immediate action required
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

impl From<serde_json::Error> for CommonError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization_format("JSON", err.to_string())
    }
}

impl From<base64::DecodeError> for CommonError {
    fn from(err: base64::DecodeError) -> Self {
        Self::serialization_format("base64", err.to_string())
    }
}
