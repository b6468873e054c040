//! Traits for identity operations
//!
//! These traits abstract the external identity provider (sign-in state and
//! ID-token issuance) so the request pipeline can be driven by an in-process
//! session, a provider SDK adapter, or a test double.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;

/// Errors reported by an identity or identity provider
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdentityError {
    /// The identity could not issue a token
    #[error("Token unavailable: {0}")]
    TokenUnavailable(String),

    /// The identity signed out
    #[error("Identity signed out")]
    SignedOut,

    /// The provider stopped publishing identity changes
    #[error("Identity source closed")]
    SourceClosed,

    /// Any other provider failure
    #[error("Identity provider error: {0}")]
    Provider(String),
}

/// A signed-in identity able to issue bearer tokens
#[async_trait]
pub trait Identity: Send + Sync {
    /// Stable identifier of the signed-in user
    fn uid(&self) -> &str;

    /// Issue an ID token
    ///
    /// # Arguments
    /// * `force_refresh` - Bypass the provider's own token cache
    ///
    /// # Errors
    /// Returns error if the provider cannot issue a token
    async fn get_token(&self, force_refresh: bool) -> Result<String, IdentityError>;
}

/// Source of the current identity and of identity-change notifications
pub trait IdentityProvider: Send + Sync {
    /// The identity signed in right now, if any
    fn current_identity(&self) -> Option<Arc<dyn Identity>>;

    /// Register for identity changes; dropping the subscription unregisters
    fn subscribe(&self) -> IdentitySubscription;

    /// Number of live subscriptions
    fn listener_count(&self) -> usize;

    /// Sign the current identity out; providers without local session
    /// state ignore this
    fn sign_out(&self) {}
}

/// Receiver side of identity-change notifications
pub struct IdentitySubscription {
    receiver: watch::Receiver<Option<Arc<dyn Identity>>>,
}

impl IdentitySubscription {
    pub fn new(receiver: watch::Receiver<Option<Arc<dyn Identity>>>) -> Self {
        Self { receiver }
    }

    /// Latest published identity, marking it as seen
    pub fn current(&mut self) -> Option<Arc<dyn Identity>> {
        self.receiver.borrow_and_update().clone()
    }

    /// Wait for the next identity change and return the new value
    ///
    /// # Errors
    /// Returns [`IdentityError::SourceClosed`] once the provider is gone
    pub async fn changed(&mut self) -> Result<Option<Arc<dyn Identity>>, IdentityError> {
        self.receiver.changed().await.map_err(|_| IdentityError::SourceClosed)?;
        Ok(self.receiver.borrow_and_update().clone())
    }
}

impl fmt::Debug for IdentitySubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let uid = self.receiver.borrow().as_ref().map(|identity| identity.uid().to_string());
        f.debug_struct("IdentitySubscription").field("current_uid", &uid).finish()
    }
}
