//! Resilience patterns for fault tolerance and error handling
//!
//! This module provides **generic, reusable** resilience patterns:
//! - **Circuit Breaker**: a cooldown breaker that the caller trips for the
//!   failures it considers overload signals (e.g. quota exhaustion)
//! - **Retry Logic**: policy-driven retries with deterministic exponential
//!   backoff
//!
//! Both are generic over the operation's error type and take a [`Clock`] or
//! tokio's timer so tests can control time.

pub mod circuit_breaker;
pub mod retry;

// Re-export circuit breaker types
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics, CircuitState, Clock, MockClock,
    ResilienceError, ResilienceResult, SharedClock, SystemClock,
};
// Re-export retry types
pub use retry::{
    policies, BackoffStrategy, RetryConfig, RetryConfigBuilder, RetryDecision, RetryError,
    RetryExecutor, RetryOutcome, RetryPolicy, RetryResult,
};
