//! API authentication state
//!
//! Resolves the signed-in identity (waiting a bounded time for one to
//! appear) and its bearer token for the request pipeline.

use std::sync::Arc;
use std::time::Duration;

use crmdesk_common::auth::{
    Identity, IdentityError, IdentityProvider, TokenManager, TokenManagerConfig,
};
use crmdesk_common::resilience::SharedClock;
use crmdesk_domain::AuthSettings;
use tracing::{debug, info, warn};

use super::errors::ApiError;
use crate::observability::duration_ms;

/// Identity provider plus token cache, shared by every call of a client
pub struct AuthSessionState {
    provider: Arc<dyn IdentityProvider>,
    tokens: TokenManager,
    wait_timeout: Duration,
}

impl AuthSessionState {
    pub fn new(provider: Arc<dyn IdentityProvider>, settings: AuthSettings, clock: SharedClock) -> Self {
        let config = TokenManagerConfig {
            refresh_buffer_ms: settings.refresh_buffer_ms,
            fallback_lifetime_ms: settings.fallback_lifetime_ms,
        };
        Self {
            provider,
            tokens: TokenManager::with_clock(config, clock),
            wait_timeout: settings.wait_timeout(),
        }
    }

    /// Current identity, waiting up to the configured timeout for a sign-in
    ///
    /// # Errors
    /// - `AuthenticationRequired` when a sign-out is published or the
    ///   provider goes away while waiting
    /// - `AuthenticationTimeout` when nobody signs in within the timeout
    pub async fn identity(&self) -> Result<Arc<dyn Identity>, ApiError> {
        // Subscribe before reading so a sign-in between the two is not missed
        let mut subscription = self.provider.subscribe();
        if let Some(identity) = subscription.current() {
            return Ok(identity);
        }

        debug!(timeout_ms = duration_ms(self.wait_timeout), "Waiting for identity");
        let waited = tokio::time::timeout(self.wait_timeout, async {
            match subscription.changed().await {
                Ok(Some(identity)) => Ok(identity),
                Ok(None) => Err(ApiError::authentication_required("identity signed out")),
                Err(IdentityError::SourceClosed) => {
                    Err(ApiError::authentication_required("identity source closed"))
                }
                Err(e) => Err(ApiError::authentication_required(e.to_string())),
            }
        })
        .await;
        drop(subscription);

        match waited {
            Ok(Ok(identity)) => Ok(identity),
            Ok(Err(e)) => {
                self.tokens.invalidate();
                Err(e)
            }
            Err(_) => {
                warn!(waited_ms = duration_ms(self.wait_timeout), "Identity wait timed out");
                self.tokens.invalidate();
                Err(ApiError::AuthenticationTimeout { waited: self.wait_timeout })
            }
        }
    }

    /// Bearer token for `identity`, served from the cache when still fresh
    ///
    /// # Errors
    /// Returns `AuthenticationRequired` if the identity cannot issue a token
    pub async fn token_for(&self, identity: &dyn Identity) -> Result<String, ApiError> {
        self.tokens.resolve(identity).await.map_err(|e| {
            warn!(uid = identity.uid(), error = %e, "Token fetch failed");
            ApiError::authentication_required(e.to_string())
        })
    }

    /// Drop the cached token so the next call fetches a fresh one
    pub fn invalidate_token(&self) {
        self.tokens.invalidate();
    }

    /// Sign the identity out and forget its token
    pub fn sign_out(&self) {
        self.provider.sign_out();
        self.tokens.invalidate();
        info!("Signed out of API session");
    }

    /// Whether the provider has a signed-in identity right now
    pub fn is_authenticated(&self) -> bool {
        self.provider.current_identity().is_some()
    }

    /// Token cache shared by every clone of the client
    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    /// Identity source this session waits on
    pub fn provider(&self) -> &Arc<dyn IdentityProvider> {
        &self.provider
    }

    /// Upper bound on waiting for a sign-in
    pub fn wait_timeout(&self) -> Duration {
        self.wait_timeout
    }
}

impl std::fmt::Debug for AuthSessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSessionState")
            .field("tokens", &self.tokens)
            .field("wait_timeout", &self.wait_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crmdesk_common::auth::IdentitySession;
    use crmdesk_common::testing::{jwt_with_exp, MockClock, MockIdentity};

    use super::*;

    fn state(session: &IdentitySession) -> AuthSessionState {
        AuthSessionState::new(
            Arc::new(session.clone()),
            AuthSettings::default(),
            Arc::new(MockClock::with_epoch_millis(0)),
        )
    }

    #[tokio::test]
    async fn test_identity_returned_immediately_when_signed_in() {
        let session = IdentitySession::signed_in(Arc::new(MockIdentity::new("uid-1", "t")));
        let state = state(&session);

        let identity = state.identity().await.unwrap();
        assert_eq!(identity.uid(), "uid-1");
        assert_eq!(session.listener_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_identity_wait_resolves_on_sign_in() {
        let session = IdentitySession::new();
        let state = state(&session);

        let publisher = session.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1_200)).await;
            publisher.sign_in(Arc::new(MockIdentity::new("late", "t")));
        });

        let identity = state.identity().await.unwrap();
        assert_eq!(identity.uid(), "late");
        assert_eq!(session.listener_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_identity_wait_times_out() {
        let session = IdentitySession::new();
        let state = state(&session);
        let started = tokio::time::Instant::now();

        let err = state.identity().await.err().unwrap();

        assert_eq!(err, ApiError::AuthenticationTimeout { waited: Duration::from_millis(5_000) });
        assert!(started.elapsed() >= Duration::from_millis(5_000));
        assert_eq!(session.listener_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_out_while_waiting_requires_authentication() {
        let session = IdentitySession::signed_in(Arc::new(MockIdentity::new("uid-1", "t")));
        session.sign_out();
        let state = state(&session);

        let publisher = session.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            publisher.sign_in(Arc::new(MockIdentity::new("uid-2", "t")));
            publisher.sign_out();
        });

        // Both publishes land before the waiter polls, so it observes the
        // final signed-out value.
        let err = state.identity().await.err().unwrap();
        assert!(matches!(err, ApiError::AuthenticationRequired { .. }), "got {err:?}");
        assert_eq!(session.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_token_failure_maps_to_authentication_required() {
        let identity = MockIdentity::new("uid-1", "t");
        identity.fail_with(IdentityError::TokenUnavailable("offline".into()));
        let state = state(&IdentitySession::new());

        let err = state.token_for(&identity).await.unwrap_err();
        assert!(matches!(err, ApiError::AuthenticationRequired { ref reason } if reason.contains("offline")));
    }

    #[tokio::test]
    async fn test_sign_out_clears_session_and_token() {
        let identity = Arc::new(MockIdentity::new("uid-1", jwt_with_exp(3_600)));
        let session = IdentitySession::signed_in(identity.clone());
        let state = state(&session);

        state.token_for(identity.as_ref()).await.unwrap();
        assert!(state.tokens().current().is_some());
        assert!(state.is_authenticated());

        state.sign_out();
        assert!(state.tokens().current().is_none());
        assert!(!state.is_authenticated());
    }
}
