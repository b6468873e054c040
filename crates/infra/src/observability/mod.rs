//! Logging setup and structured log helpers for the API pipeline
//!
//! - [`init_tracing`] installs the process-wide `tracing` subscriber
//! - [`log_call_outcome`] emits one structured event per API call
//! - [`error_label`] maps [`ApiError`] to stable labels for log fields
//! - [`duration_ms`] renders durations as integer log fields
//!
//! Bearer tokens are never passed to any of these helpers.

use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::api::ApiError;

/// Install a `tracing` subscriber
///
/// The filter comes from `RUST_LOG`, falling back to `default_filter`
/// (typically `"info"`). With `json` set, events are written as JSON lines.
///
/// Returns `false` if a global subscriber was already installed, so calling
/// this more than once is harmless.
pub fn init_tracing(default_filter: &str, json: bool) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if json {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };
    installed.is_ok()
}

/// Log the outcome of an API call with structured fields.
///
/// `endpoint` is the path relative to the base URL and must not carry
/// credentials.
#[inline]
pub fn log_call_outcome<T>(
    endpoint: &str,
    method: &str,
    elapsed: Duration,
    outcome: &Result<T, ApiError>,
) {
    let duration_ms = duration_ms(elapsed);

    match outcome {
        Ok(_) => info!(endpoint, method, duration_ms, "api_call_success"),
        Err(err) => warn!(
            endpoint,
            method,
            duration_ms,
            error_type = error_label(err),
            status = err.status(),
            error = %err,
            "api_call_failure"
        ),
    }
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`
#[inline]
pub fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Convert an `ApiError` into a stable label suitable for logging.
#[inline]
pub fn error_label(error: &ApiError) -> &'static str {
    match error {
        ApiError::AuthenticationRequired { .. } => "authentication_required",
        ApiError::AuthenticationTimeout { .. } => "authentication_timeout",
        ApiError::CircuitOpen { .. } => "circuit_open",
        ApiError::RateLimited { .. } => "rate_limited",
        ApiError::RequestFailed { status: None, .. } => "network",
        ApiError::RequestFailed { .. } => "request_failed",
        ApiError::Config(_) => "config",
        ApiError::InvalidRequest(_) => "invalid_request",
        ApiError::InvalidResponse(_) => "invalid_response",
    }
}
