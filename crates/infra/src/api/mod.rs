//! Authenticated API client
//!
//! This module provides the request pipeline every REST call of the CRM goes
//! through.
//!
//! # Architecture
//!
//! - Transport behind the [`crate::http::Transport`] trait (reqwest in
//!   production, scripted fakes in tests)
//! - Identity from an injected `IdentityProvider`, bearer token cached until
//!   shortly before expiry
//! - Quota failures retried with exponential backoff, then the circuit breaker
//!   opens for a cooldown
//! - Every other failure surfaces after one attempt
//! - Timeout on every request

pub mod auth;
pub mod classify;
pub mod client;
pub mod errors;

pub use auth::AuthSessionState;
pub use classify::{classify_message, classify_response, error_message, FailureKind};
pub use client::{ApiClient, ApiClientBuilder, REQUEST_ID_HEADER};
pub use errors::{ApiError, ApiErrorCategory};
