//! # crmdesk Domain
//!
//! Domain types shared by the crmdesk crates.
//!
//! This crate contains:
//! - Domain error types and Result definitions
//! - Configuration structures for the API pipeline
//! - Pipeline constants
//!
//! ## Architecture
//! - No dependencies on other crmdesk crates
//! - Only external dependencies allowed
//! - Pure data structures, no I/O

pub mod config;
pub mod constants;
pub mod errors;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
