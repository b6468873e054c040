//! In-process identity session
//!
//! Holds the currently signed-in identity and broadcasts changes to every
//! subscriber through a `tokio::sync::watch` channel.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use super::traits::{Identity, IdentityProvider, IdentitySubscription};

/// Identity provider backed by a watch channel
///
/// Cloning shares the session.
#[derive(Clone)]
pub struct IdentitySession {
    sender: Arc<watch::Sender<Option<Arc<dyn Identity>>>>,
}

impl IdentitySession {
    /// Create a session with nobody signed in
    #[must_use]
    pub fn new() -> Self {
        let (sender, _receiver) = watch::channel(None);
        Self { sender: Arc::new(sender) }
    }

    /// Create a session with `identity` already signed in
    #[must_use]
    pub fn signed_in(identity: Arc<dyn Identity>) -> Self {
        let session = Self::new();
        session.sign_in(identity);
        session
    }

    /// Publish `identity` as the signed-in user
    pub fn sign_in(&self, identity: Arc<dyn Identity>) {
        info!(uid = identity.uid(), "Identity signed in");
        self.sender.send_replace(Some(identity));
    }

    /// Clear the signed-in user and notify subscribers
    pub fn sign_out(&self) {
        if self.sender.send_replace(None).is_some() {
            info!("Identity signed out");
        }
    }
}

impl Default for IdentitySession {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityProvider for IdentitySession {
    fn current_identity(&self) -> Option<Arc<dyn Identity>> {
        self.sender.borrow().clone()
    }

    fn subscribe(&self) -> IdentitySubscription {
        IdentitySubscription::new(self.sender.subscribe())
    }

    fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }

    fn sign_out(&self) {
        IdentitySession::sign_out(self);
    }
}

impl fmt::Debug for IdentitySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let uid = self.sender.borrow().as_ref().map(|identity| identity.uid().to_string());
        f.debug_struct("IdentitySession")
            .field("current_uid", &uid)
            .field("listeners", &self.sender.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockIdentity;

    #[test]
    fn test_new_session_is_signed_out() {
        let session = IdentitySession::new();
        assert!(session.current_identity().is_none());
        assert_eq!(session.listener_count(), 0);
    }

    #[test]
    fn test_sign_in_and_out() {
        let session = IdentitySession::new();
        session.sign_in(Arc::new(MockIdentity::new("uid-1", "token")));
        assert_eq!(session.current_identity().map(|i| i.uid().to_string()), Some("uid-1".into()));

        session.sign_out();
        assert!(session.current_identity().is_none());
    }

    #[test]
    fn test_dropping_subscription_unregisters() {
        let session = IdentitySession::new();
        let first = session.subscribe();
        let second = session.subscribe();
        assert_eq!(session.listener_count(), 2);

        drop(first);
        assert_eq!(session.listener_count(), 1);
        drop(second);
        assert_eq!(session.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_subscription_sees_sign_in() {
        let session = IdentitySession::new();
        let mut subscription = session.subscribe();
        assert!(subscription.current().is_none());

        let publisher = session.clone();
        tokio::spawn(async move {
            publisher.sign_in(Arc::new(MockIdentity::new("uid-7", "token")));
        });

        let identity = subscription.changed().await.unwrap();
        assert_eq!(identity.map(|i| i.uid().to_string()), Some("uid-7".to_string()));
    }

    #[tokio::test]
    async fn test_subscription_sees_sign_out() {
        let session = IdentitySession::signed_in(Arc::new(MockIdentity::new("uid-1", "t")));
        let mut subscription = session.subscribe();
        assert!(subscription.current().is_some());

        session.sign_out();
        assert!(subscription.changed().await.unwrap().is_none());
    }
}
