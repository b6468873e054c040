//! Testing utilities and helpers
//!
//! - **[`mocks`]**: Mock identity and unsigned JWT builder
//! - [`MockClock`] re-exported from `resilience` for driving cooldowns and
//!   token expiry
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use crmdesk_common::auth::{IdentityProvider, IdentitySession};
//! use crmdesk_common::testing::{jwt_with_exp, MockClock, MockIdentity};
//!
//! let clock = MockClock::with_epoch_millis(1_000);
//! let identity = Arc::new(MockIdentity::new("uid-1", jwt_with_exp(3_600)));
//! let session = IdentitySession::signed_in(identity);
//! assert!(session.current_identity().is_some());
//! clock.advance_millis(500);
//! ```

pub mod mocks;

pub use mocks::{jwt_with_exp, MockIdentity};

pub use crate::resilience::{Clock, MockClock, SystemClock};
