//! API-specific error types
//!
//! Provides the failure taxonomy of the request pipeline with retry metadata
//! for callers.

use std::time::Duration;

use crmdesk_common::error::{ErrorClassification, ErrorSeverity};
use crmdesk_domain::CrmError;
use thiserror::Error;

/// Categories of API errors for caller-side handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorCategory {
    /// No identity, or the identity could not issue a token
    Authentication,
    /// Quota exhausted or breaker open - retry after the cooldown
    RateLimit,
    /// Server errors (5xx)
    Server,
    /// Client errors (4xx) - non-retryable
    Client,
    /// Network/connection errors
    Network,
    /// Configuration errors and malformed payloads - non-retryable
    Config,
}

/// API operation errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("Authentication required: {reason}")]
    AuthenticationRequired { reason: String },

    #[error("Timed out after {waited:?} waiting for authentication")]
    AuthenticationTimeout { waited: Duration },

    #[error("Circuit breaker open, retry in {retry_after:?}")]
    CircuitOpen { retry_after: Duration },

    #[error("Rate limited after {attempts} attempts: {message}")]
    RateLimited { attempts: u32, message: String },

    #[error("{message}")]
    RequestFailed { status: Option<u16>, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request body: {0}")]
    InvalidRequest(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    pub fn authentication_required(reason: impl Into<String>) -> Self {
        Self::AuthenticationRequired { reason: reason.into() }
    }

    pub fn request_failed(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::RequestFailed { status, message: message.into() }
    }

    /// Get the error category for this error
    pub fn category(&self) -> ApiErrorCategory {
        match self {
            Self::AuthenticationRequired { .. } | Self::AuthenticationTimeout { .. } => {
                ApiErrorCategory::Authentication
            }
            Self::CircuitOpen { .. } | Self::RateLimited { .. } => ApiErrorCategory::RateLimit,
            Self::RequestFailed { status: None, .. } => ApiErrorCategory::Network,
            Self::RequestFailed { status: Some(401 | 403), .. } => {
                ApiErrorCategory::Authentication
            }
            Self::RequestFailed { status: Some(code), .. } if *code >= 500 => {
                ApiErrorCategory::Server
            }
            Self::RequestFailed { .. } => ApiErrorCategory::Client,
            Self::Config(_) | Self::InvalidRequest(_) | Self::InvalidResponse(_) => {
                ApiErrorCategory::Config
            }
        }
    }

    /// Check if a caller may reasonably try the same call again later
    ///
    /// The pipeline itself only retries quota failures; this reports whether
    /// an outer layer (a UI refresh, a background job) should.
    pub fn should_retry(&self) -> bool {
        match self {
            Self::AuthenticationTimeout { .. } => true,
            Self::AuthenticationRequired { .. } => false,
            _ => matches!(
                self.category(),
                ApiErrorCategory::RateLimit | ApiErrorCategory::Server | ApiErrorCategory::Network
            ),
        }
    }

    /// Suggested wait before trying again, when known
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::CircuitOpen { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    /// HTTP status of the failed response, if there was one
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RequestFailed { status, .. } => *status,
            Self::RateLimited { .. } => Some(429),
            _ => None,
        }
    }
}

impl ErrorClassification for ApiError {
    fn is_retryable(&self) -> bool {
        self.should_retry()
    }

    fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ApiErrorCategory::RateLimit | ApiErrorCategory::Authentication => {
                ErrorSeverity::Warning
            }
            ApiErrorCategory::Client | ApiErrorCategory::Network | ApiErrorCategory::Server => {
                ErrorSeverity::Error
            }
            ApiErrorCategory::Config => ErrorSeverity::Critical,
        }
    }

    fn is_critical(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    fn retry_after(&self) -> Option<Duration> {
        ApiError::retry_after(self)
    }
}

impl From<CrmError> for ApiError {
    fn from(err: CrmError) -> Self {
        match err {
            CrmError::Config(msg) => Self::Config(msg),
        }
    }
}
