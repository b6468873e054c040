//! Bearer token types
//!
//! A [`CachedToken`] is the unit the token cache stores: the opaque token
//! string, the identity it was issued for and the absolute expiry. It is
//! replaced wholesale on refresh and never mutated in place.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Bearer token with its owner and absolute expiry
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedToken {
    /// Opaque bearer token sent in the `Authorization` header
    pub value: String,

    /// Uid of the identity the token was issued for
    pub owner: String,

    /// Expiry in milliseconds since the UNIX epoch
    pub expires_at_epoch_ms: u64,
}

impl CachedToken {
    #[must_use]
    pub fn new(value: impl Into<String>, owner: impl Into<String>, expires_at_epoch_ms: u64) -> Self {
        Self { value: value.into(), owner: owner.into(), expires_at_epoch_ms }
    }

    /// Check whether the token may be used at `now_ms`
    ///
    /// A token is usable only while `now + buffer < expires_at`; inside the
    /// buffer window it must be refreshed before use.
    #[must_use]
    pub fn is_usable_at(&self, now_ms: u64, refresh_buffer_ms: u64) -> bool {
        now_ms.saturating_add(refresh_buffer_ms) < self.expires_at_epoch_ms
    }

    /// Check whether the token was issued for `uid`
    #[must_use]
    pub fn is_owned_by(&self, uid: &str) -> bool {
        self.owner == uid
    }

    /// Milliseconds until expiry (zero once expired)
    #[must_use]
    pub fn millis_until_expiry(&self, now_ms: u64) -> u64 {
        self.expires_at_epoch_ms.saturating_sub(now_ms)
    }

    /// Expiry as a UTC timestamp, `None` if out of chrono's range
    #[must_use]
    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        let millis = i64::try_from(self.expires_at_epoch_ms).ok()?;
        Utc.timestamp_millis_opt(millis).single()
    }
}

// Token values never appear in logs.
impl fmt::Debug for CachedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedToken")
            .field("value", &"[REDACTED]")
            .field("owner", &self.owner)
            .field("expires_at_epoch_ms", &self.expires_at_epoch_ms)
            .finish()
    }
}
