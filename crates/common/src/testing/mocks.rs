//! Mock implementations of common traits
//!
//! Provides mock objects for testing purposes.

// Allow missing error/panic docs for test mocks - they are designed to be simple
// and errors are clearly indicated by their return types
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use parking_lot::Mutex;

use crate::auth::{Identity, IdentityError};

/// Build an unsigned JWT whose payload carries `exp` (seconds since epoch)
pub fn jwt_with_exp(exp_secs: u64) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{exp_secs}}}"#));
    format!("{header}.{payload}.signature")
}

/// Mock identity for testing
///
/// Issues a configurable token and records how often it was asked.
#[derive(Debug, Clone)]
pub struct MockIdentity {
    uid: String,
    token: Arc<Mutex<String>>,
    failure: Arc<Mutex<Option<IdentityError>>>,
    fetches: Arc<AtomicUsize>,
    forced: Arc<AtomicUsize>,
}

impl MockIdentity {
    /// Create a mock identity issuing `token`
    pub fn new(uid: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            token: Arc::new(Mutex::new(token.into())),
            failure: Arc::new(Mutex::new(None)),
            fetches: Arc::new(AtomicUsize::new(0)),
            forced: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Change the token issued by subsequent fetches
    pub fn set_token(&self, token: impl Into<String>) {
        *self.token.lock() = token.into();
    }

    /// Make subsequent fetches fail with `error`
    pub fn fail_with(&self, error: IdentityError) {
        *self.failure.lock() = Some(error);
    }

    /// Number of `get_token` calls so far
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Number of `get_token(true)` calls so far
    pub fn force_refresh_requests(&self) -> usize {
        self.forced.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Identity for MockIdentity {
    fn uid(&self) -> &str {
        &self.uid
    }

    async fn get_token(&self, force_refresh: bool) -> Result<String, IdentityError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if force_refresh {
            self.forced.fetch_add(1, Ordering::SeqCst);
        }
        if let Some(error) = self.failure.lock().clone() {
            return Err(error);
        }
        Ok(self.token.lock().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_identity_counts_fetches() {
        let identity = MockIdentity::new("uid-1", "first");
        assert_eq!(identity.get_token(false).await.unwrap(), "first");

        identity.set_token("second");
        assert_eq!(identity.get_token(true).await.unwrap(), "second");
        assert_eq!(identity.fetch_count(), 2);
        assert_eq!(identity.force_refresh_requests(), 1);
    }

    #[tokio::test]
    async fn test_mock_identity_failure() {
        let identity = MockIdentity::new("uid-1", "token");
        identity.fail_with(IdentityError::SignedOut);
        assert_eq!(identity.get_token(false).await, Err(IdentityError::SignedOut));
    }
}
