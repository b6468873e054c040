//! Failure classification for API responses
//!
//! Decides whether a failed call is a quota failure (retried with backoff,
//! trips the circuit breaker once retries are exhausted) or anything else
//! (fails immediately).

use serde_json::Value;

/// Error codes the backend uses for quota exhaustion
const QUOTA_CODES: &[&str] = &["resource-exhausted", "RESOURCE_EXHAUSTED", "quota-exceeded"];

/// Substrings that mark a message as a quota failure
const QUOTA_MARKERS: &[&str] = &["quota", "rate limit"];

/// Kind of a failed call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Quota or rate-limit failure
    Quota,
    /// Any other failure
    Other,
}

/// Classify a non-2xx response
///
/// Quota when the status is 429, when the body carries a known quota code in
/// `code` or `error.status`, or when the error message mentions a quota or
/// rate limit.
pub fn classify_response(status: u16, body: &[u8]) -> FailureKind {
    if status == 429 {
        return FailureKind::Quota;
    }

    let parsed = serde_json::from_slice::<Value>(body).ok();
    if let Some(value) = &parsed {
        let code = value
            .get("code")
            .and_then(Value::as_str)
            .or_else(|| value.pointer("/error/status").and_then(Value::as_str));
        if code.is_some_and(|code| QUOTA_CODES.contains(&code)) {
            return FailureKind::Quota;
        }
    }

    let message = match &parsed {
        Some(value) => body_message(value),
        None => std::str::from_utf8(body).ok().map(str::to_owned),
    };
    message.map_or(FailureKind::Other, |message| classify_message(&message))
}

/// Classify a bare error message (transport failures, plain-text bodies)
pub fn classify_message(message: &str) -> FailureKind {
    let lowered = message.to_lowercase();
    if QUOTA_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        FailureKind::Quota
    } else {
        FailureKind::Other
    }
}

/// Human-readable message for a failed response
///
/// Uses the body's `message` (or `error.message`) field, falling back to
/// `"API call failed with status N"`.
pub fn error_message(status: u16, body: &[u8]) -> String {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|value| body_message(&value))
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| format!("API call failed with status {status}"))
}

fn body_message(value: &Value) -> Option<String> {
    value
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| value.pointer("/error/message").and_then(Value::as_str))
        .map(str::to_owned)
}
