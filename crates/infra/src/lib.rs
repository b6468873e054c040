//! # crmdesk Infrastructure
//!
//! Impure parts of the crmdesk API pipeline.
//!
//! This crate contains:
//! - The reqwest-backed HTTP transport
//! - The authenticated API client (token cache, quota retry, circuit breaker)
//! - Configuration loading from the environment and files
//! - Tracing setup and structured logging helpers
//!
//! ## Architecture
//! - Builds on the resilience and auth primitives in `crmdesk-common`
//! - Reads configuration types from `crmdesk-domain`
//! - Contains all "impure" code (network, filesystem, environment)

pub mod api;
pub mod config;
pub mod http;
pub mod observability;

// Re-export commonly used items
pub use api::{ApiClient, ApiClientBuilder, ApiError, ApiErrorCategory};
pub use http::{HttpTransport, Transport, TransportError, TransportRequest, TransportResponse};
pub use observability::init_tracing;
