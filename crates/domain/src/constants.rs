//! Defaults for the authenticated API pipeline.

/// Retries after the initial attempt for quota failures.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Delay before the first retry; doubles on every subsequent retry.
pub const DEFAULT_INITIAL_RETRY_DELAY_MS: u64 = 1_000;

/// How long the quota circuit breaker stays open.
pub const DEFAULT_BREAKER_COOLDOWN_MS: u64 = 60_000;

/// Upper bound on waiting for an identity to become available.
pub const DEFAULT_AUTH_WAIT_TIMEOUT_MS: u64 = 5_000;

/// Tokens are refreshed this long before they expire.
pub const DEFAULT_TOKEN_REFRESH_BUFFER_MS: u64 = 5 * 60 * 1_000;

/// Lifetime assumed for tokens whose `exp` claim cannot be decoded.
pub const FALLBACK_TOKEN_LIFETIME_MS: u64 = 55 * 60 * 1_000;

/// Per-request transport timeout.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Base URL used when running against a local backend.
pub const DEFAULT_LOCAL_BASE_URL: &str = "http://localhost:5000/api";
