//! Modular common utilities shared across crmdesk crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: errors, token types, JWT claim decoding
//! - `runtime`: async infrastructure (resilience, identity session, token
//!   manager)
//! - `test-utils`: mock identities and token helpers for downstream tests
//! - `observability`: tracing (pulled in by `runtime`)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod error;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod auth;
#[cfg(feature = "runtime")]
pub mod resilience;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(any(feature = "test-utils", test))]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "runtime")]
pub use auth::{
    CachedToken, Identity, IdentityError, IdentityProvider, IdentitySession,
    IdentitySubscription, TokenManager, TokenManagerConfig,
};
#[cfg(feature = "foundation")]
pub use error::{CommonError, CommonResult, ErrorClassification, ErrorSeverity};
#[cfg(feature = "runtime")]
pub use resilience::{
    policies, BackoffStrategy, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics,
    CircuitState, Clock, MockClock, ResilienceError, ResilienceResult, RetryConfig,
    RetryConfigBuilder, RetryDecision, RetryError, RetryExecutor, RetryOutcome, RetryPolicy,
    RetryResult, SharedClock, SystemClock,
};
