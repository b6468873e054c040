//! Bearer token cache
//!
//! Manages the ID-token lifecycle for the request pipeline:
//! - Reuse of the cached token while it is outside the refresh buffer
//! - Refresh from the identity when missing, stale, or issued for another user
//! - Expiry taken from the token's `exp` claim, with a fixed fallback lifetime
//! - Explicit invalidation on sign-out or rejected credentials
//!
//! The cache lock is never held across the token fetch; concurrent refreshes
//! are tolerated and the last writer wins.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::jwt::decode_expiry_ms;
use super::traits::{Identity, IdentityError};
use super::types::CachedToken;
use crate::resilience::{SharedClock, SystemClock};

/// Default refresh buffer (5 minutes)
pub const DEFAULT_REFRESH_BUFFER_MS: u64 = 5 * 60 * 1000;

/// Lifetime assumed when a token carries no decodable expiry (55 minutes)
pub const DEFAULT_FALLBACK_LIFETIME_MS: u64 = 55 * 60 * 1000;

/// Token cache configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenManagerConfig {
    /// Refresh tokens this many milliseconds before expiry
    pub refresh_buffer_ms: u64,
    /// Lifetime assigned to tokens whose `exp` claim cannot be read
    pub fallback_lifetime_ms: u64,
}

impl Default for TokenManagerConfig {
    fn default() -> Self {
        Self {
            refresh_buffer_ms: DEFAULT_REFRESH_BUFFER_MS,
            fallback_lifetime_ms: DEFAULT_FALLBACK_LIFETIME_MS,
        }
    }
}

/// Token cache shared by every call of a client
pub struct TokenManager {
    config: TokenManagerConfig,
    clock: SharedClock,
    current: RwLock<Option<CachedToken>>,
}

impl TokenManager {
    /// Create a token manager on the system clock
    #[must_use]
    pub fn new(config: TokenManagerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a token manager on a custom clock (useful for testing)
    #[must_use]
    pub fn with_clock(config: TokenManagerConfig, clock: SharedClock) -> Self {
        Self { config, clock, current: RwLock::new(None) }
    }

    /// Return a usable bearer token for `identity`
    ///
    /// Serves the cached token when it belongs to `identity` and is outside
    /// the refresh buffer; otherwise fetches a new one and replaces the cache.
    ///
    /// # Errors
    /// Returns the identity's error if it cannot issue a token
    pub async fn resolve(&self, identity: &dyn Identity) -> Result<String, IdentityError> {
        let now_ms = self.clock.millis_since_epoch();

        if let Some(token) = self.usable_for(identity.uid(), now_ms) {
            debug!(uid = identity.uid(), "Reusing cached token");
            return Ok(token.value);
        }

        let value = identity.get_token(false).await?;
        let issued_at_ms = self.clock.millis_since_epoch();
        let expires_at_epoch_ms = match decode_expiry_ms(&value) {
            Ok(expiry) => expiry,
            Err(e) => {
                warn!(error = %e, "Token expiry not decodable, using fallback lifetime");
                issued_at_ms.saturating_add(self.config.fallback_lifetime_ms)
            }
        };

        let token = CachedToken::new(value, identity.uid(), expires_at_epoch_ms);
        info!(
            uid = identity.uid(),
            expires_in_ms = token.millis_until_expiry(issued_at_ms),
            "Token refreshed"
        );
        let value = token.value.clone();
        self.store(token);
        Ok(value)
    }

    /// Replace the cached token wholesale
    pub fn store(&self, token: CachedToken) {
        *self.current.write() = Some(token);
    }

    /// Drop the cached token
    pub fn invalidate(&self) {
        if self.current.write().take().is_some() {
            debug!("Cached token invalidated");
        }
    }

    /// Snapshot of the cached token, if any
    #[must_use]
    pub fn current(&self) -> Option<CachedToken> {
        self.current.read().clone()
    }

    /// Check whether a usable token is cached for `uid`
    #[must_use]
    pub fn has_usable_token(&self, uid: &str) -> bool {
        self.usable_for(uid, self.clock.millis_since_epoch()).is_some()
    }

    #[must_use]
    pub fn config(&self) -> TokenManagerConfig {
        self.config
    }

    fn usable_for(&self, uid: &str, now_ms: u64) -> Option<CachedToken> {
        self.current
            .read()
            .as_ref()
            .filter(|token| {
                token.is_owned_by(uid) && token.is_usable_at(now_ms, self.config.refresh_buffer_ms)
            })
            .cloned()
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("config", &self.config)
            .field("current", &*self.current.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::token_manager.
    use super::*;
    use crate::resilience::MockClock;
    use crate::testing::{jwt_with_exp, MockIdentity};

    fn manager(clock: &MockClock) -> TokenManager {
        TokenManager::with_clock(TokenManagerConfig::default(), Arc::new(clock.clone()))
    }

    /// Validates the token reuse scenario.
    ///
    /// Assertions:
    /// - Confirms a second resolve within the validity window does not fetch.
    #[tokio::test]
    async fn test_reuses_token_outside_buffer() {
        let clock = MockClock::with_epoch_millis(1_000_000);
        let manager = manager(&clock);
        let identity = MockIdentity::new("uid-1", jwt_with_exp(1_000 + 3_600));

        let first = manager.resolve(&identity).await.unwrap();
        clock.advance_millis(60_000);
        let second = manager.resolve(&identity).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(identity.fetch_count(), 1);
        assert_eq!(identity.force_refresh_requests(), 0);
    }

    /// Validates the refresh-buffer boundary.
    ///
    /// Assertions:
    /// - `expires_at - now == buffer - 1` triggers a fetch.
    /// - `expires_at - now == buffer + 1` reuses the cache.
    #[tokio::test]
    async fn test_refresh_boundary() {
        let exp_ms = 10_000_000;
        let buffer = DEFAULT_REFRESH_BUFFER_MS;

        let clock = MockClock::with_epoch_millis(exp_ms - buffer - 1);
        let manager = manager(&clock);
        manager.store(CachedToken::new("cached", "uid-1", exp_ms));
        let identity = MockIdentity::new("uid-1", jwt_with_exp(20_000));

        assert_eq!(manager.resolve(&identity).await.unwrap(), "cached");
        assert_eq!(identity.fetch_count(), 0);

        clock.advance_millis(2);
        let refreshed = manager.resolve(&identity).await.unwrap();
        assert_ne!(refreshed, "cached");
        assert_eq!(identity.fetch_count(), 1);
        assert_eq!(manager.current().map(|t| t.expires_at_epoch_ms), Some(20_000_000));
    }

    #[tokio::test]
    async fn test_fallback_lifetime_for_opaque_token() {
        let clock = MockClock::with_epoch_millis(5_000);
        let manager = manager(&clock);
        let identity = MockIdentity::new("uid-1", "opaque-token");

        manager.resolve(&identity).await.unwrap();

        let cached = manager.current().unwrap();
        assert_eq!(cached.expires_at_epoch_ms, 5_000 + DEFAULT_FALLBACK_LIFETIME_MS);
        assert_eq!(cached.owner, "uid-1");
    }

    #[tokio::test]
    async fn test_token_not_shared_across_identities() {
        let clock = MockClock::with_epoch_millis(1_000);
        let manager = manager(&clock);
        let alice = MockIdentity::new("alice", "alice-token");
        let bob = MockIdentity::new("bob", "bob-token");

        assert_eq!(manager.resolve(&alice).await.unwrap(), "alice-token");
        assert_eq!(manager.resolve(&bob).await.unwrap(), "bob-token");
        assert_eq!(bob.fetch_count(), 1);
        assert!(!manager.has_usable_token("alice"));
    }

    #[tokio::test]
    async fn test_invalidate_forces_fetch() {
        let clock = MockClock::with_epoch_millis(1_000);
        let manager = manager(&clock);
        let identity = MockIdentity::new("uid-1", "token");

        manager.resolve(&identity).await.unwrap();
        manager.invalidate();
        assert!(manager.current().is_none());

        manager.resolve(&identity).await.unwrap();
        assert_eq!(identity.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_cache_untouched() {
        let clock = MockClock::with_epoch_millis(1_000);
        let manager = manager(&clock);
        let identity = MockIdentity::new("uid-1", "token");
        identity.fail_with(IdentityError::TokenUnavailable("offline".into()));

        let result = manager.resolve(&identity).await;
        assert_eq!(result, Err(IdentityError::TokenUnavailable("offline".into())));
        assert!(manager.current().is_none());
    }
}
