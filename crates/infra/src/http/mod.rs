//! HTTP transport
//!
//! Single-shot request execution. Retry and circuit breaking live in the API
//! pipeline above this layer.

pub mod client;

pub use client::{
    HttpTransport, HttpTransportBuilder, Transport, TransportError, TransportRequest,
    TransportResponse,
};
