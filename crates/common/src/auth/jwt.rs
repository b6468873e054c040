//! Minimal JWT claim decoding
//!
//! Only the `exp` claim is read, to schedule token refreshes. The signature is
//! not verified; the token is opaque to this side and validated by the API.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;

use crate::error::{CommonError, CommonResult};

#[derive(Debug, Deserialize)]
struct ExpiryClaims {
    exp: Option<serde_json::Number>,
}

/// Decode the `exp` claim of a JWT and return it in epoch milliseconds
///
/// # Errors
/// Returns a serialization error when the token is not three dot-separated
/// segments, the payload is not base64url JSON, or `exp` is missing or
/// negative.
pub fn decode_expiry_ms(token: &str) -> CommonResult<u64> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(CommonError::serialization_format("JWT", "expected three segments"));
    }

    let payload = URL_SAFE_NO_PAD.decode(parts[1].trim_end_matches('='))?;
    let claims: ExpiryClaims = serde_json::from_slice(&payload)?;

    let exp = claims
        .exp
        .ok_or_else(|| CommonError::serialization_format("JWT", "missing exp claim"))?;

    let seconds = if let Some(secs) = exp.as_u64() {
        secs as f64
    } else {
        exp.as_f64().filter(|secs| *secs >= 0.0).ok_or_else(|| {
            CommonError::serialization_format("JWT", "exp claim must be non-negative")
        })?
    };

    let millis = seconds * 1000.0;
    if !millis.is_finite() || millis >= u64::MAX as f64 {
        return Err(CommonError::serialization_format("JWT", "exp claim out of range"));
    }
    Ok(millis as u64)
}
