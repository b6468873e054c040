//! Identity and bearer-token infrastructure
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ IdentityProvider │  current identity + change notifications
//! └────────┬─────────┘
//!          │ (IdentitySession: watch-channel implementation)
//!          ▼
//! ┌──────────────────┐
//! │     Identity     │  uid + ID-token issuance
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │   TokenManager   │  cached token, refreshed near expiry
//! └──────────────────┘
//! ```
//!
//! # Module Organization
//!
//! - **[`traits`]**: `Identity`, `IdentityProvider`, `IdentitySubscription`
//! - **[`session`]**: `IdentitySession`, the in-process provider
//! - **[`types`]**: `CachedToken`
//! - **[`jwt`]**: `exp` claim decoding
//! - **[`token_manager`]**: the token cache

pub mod jwt;
pub mod session;
pub mod token_manager;
pub mod traits;
pub mod types;

pub use jwt::decode_expiry_ms;
pub use session::IdentitySession;
pub use token_manager::{TokenManager, TokenManagerConfig};
pub use traits::{Identity, IdentityError, IdentityProvider, IdentitySubscription};
pub use types::CachedToken;
