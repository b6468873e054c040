//! Cooldown circuit breaker
//!
//! A two-state breaker (CLOSED/OPEN) that is opened explicitly by the caller
//! when a tripping failure is observed and closes by itself once the cooldown
//! has elapsed. Unlike a failure-counting breaker it never opens on its own:
//! the caller decides which errors trip it, so unrelated failures pass
//! through without touching the state.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

//==============================================================================
// Time Abstraction for Testability
//==============================================================================

/// Trait for time operations to enable deterministic testing
///
/// Production code uses [`SystemClock`]; tests drive [`MockClock`] forward
/// to exercise cooldowns and token expiry without real delays.
pub trait Clock: Send + Sync + 'static {
    /// Get current instant (monotonic time)
    fn now(&self) -> Instant;

    /// Get current system time (wall clock)
    fn system_time(&self) -> SystemTime;

    /// Get milliseconds since UNIX epoch
    fn millis_since_epoch(&self) -> u64 {
        u64::try_from(self.system_time().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis())
            .unwrap_or(u64::MAX)
    }
}

/// Type-erased clock shared between the breaker and the token manager
pub type SharedClock = Arc<dyn Clock>;

/// Real system clock implementation for production use
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }
}

impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn system_time(&self) -> SystemTime {
        (**self).system_time()
    }
}

/// Mock clock for deterministic testing
///
/// Monotonic and wall-clock readings advance together; the wall clock starts
/// at the UNIX epoch unless a start time is given.
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    epoch: SystemTime,
    elapsed: Arc<Mutex<Duration>>,
}

impl MockClock {
    /// Create a new mock clock starting at the current instant
    pub fn new() -> Self {
        Self { start: Instant::now(), epoch: UNIX_EPOCH, elapsed: Arc::new(Mutex::new(Duration::ZERO)) }
    }

    /// Create a mock clock whose wall clock reads `millis` since the epoch
    pub fn with_epoch_millis(millis: u64) -> Self {
        Self {
            start: Instant::now(),
            epoch: UNIX_EPOCH + Duration::from_millis(millis),
            elapsed: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Advance the mock clock by a duration
    pub fn advance(&self, duration: Duration) {
        *self.elapsed.lock() += duration;
    }

    /// Advance the mock clock by milliseconds (convenience method)
    pub fn advance_millis(&self, millis: u64) {
        self.advance(Duration::from_millis(millis));
    }

    /// Get the current elapsed time
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed()
    }

    fn system_time(&self) -> SystemTime {
        self.epoch + self.elapsed()
    }
}

//==============================================================================
// Error Types
//==============================================================================

/// Errors that can occur in resilience operations
///
/// Generic over the wrapped operation error so the original failure is
/// preserved when it passes through the breaker.
#[derive(Debug, Error)]
pub enum ResilienceError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Circuit breaker is open, rejecting calls
    #[error("Circuit breaker is open, retry in {retry_after:?}")]
    CircuitOpen { retry_after: Duration },

    /// The underlying operation failed
    #[error("Operation failed: {source}")]
    OperationFailed {
        #[source]
        source: E,
    },

    /// Configuration error
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },
}

/// Result type for resilience operations
pub type ResilienceResult<T, E> = Result<T, ResilienceError<E>>;

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, allowing requests
    Closed,
    /// Circuit is open, rejecting requests until the cooldown elapses
    Open,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
        }
    }
}

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// How long the circuit stays open after being tripped
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self { cooldown: Duration::from_secs(60) }
    }
}

impl CircuitBreakerConfig {
    /// Configuration with the given cooldown
    pub fn with_cooldown(cooldown: Duration) -> Self {
        Self { cooldown }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.cooldown.is_zero() {
            return Err("cooldown must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Circuit breaker metrics for monitoring
#[derive(Debug, Clone)]
pub struct CircuitBreakerMetrics {
    pub state: CircuitState,
    pub times_opened: u64,
    pub rejected_calls: u64,
    pub total_calls: u64,
    pub opened_at: Option<Instant>,
    pub remaining_cooldown: Option<Duration>,
}

#[derive(Debug, Clone, Copy)]
struct BreakerStatus {
    state: CircuitState,
    opened_at: Option<Instant>,
}

/// Cooldown circuit breaker
///
/// Cloning shares the underlying state, so every clone observes the same
/// open/closed status.
pub struct CircuitBreaker<C: Clock = SystemClock> {
    config: CircuitBreakerConfig,
    status: Arc<RwLock<BreakerStatus>>,
    times_opened: Arc<AtomicU64>,
    rejected_calls: Arc<AtomicU64>,
    total_calls: Arc<AtomicU64>,
    clock: Arc<C>,
}

impl<C: Clock> fmt::Debug for CircuitBreaker<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("state", &self.status.read().state)
            .field("times_opened", &self.times_opened.load(Ordering::Acquire))
            .finish()
    }
}

impl<C: Clock> Clone for CircuitBreaker<C> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            status: Arc::clone(&self.status),
            times_opened: Arc::clone(&self.times_opened),
            rejected_calls: Arc::clone(&self.rejected_calls),
            total_calls: Arc::clone(&self.total_calls),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl CircuitBreaker<SystemClock> {
    /// Create a new circuit breaker using the system clock
    ///
    /// # Errors
    /// Returns an error string if the configuration is invalid
    pub fn new(config: CircuitBreakerConfig) -> Result<Self, String> {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> CircuitBreaker<C> {
    /// Create a new circuit breaker with a custom clock (useful for testing)
    ///
    /// # Errors
    /// Returns an error string if the configuration is invalid
    pub fn with_clock(config: CircuitBreakerConfig, clock: C) -> Result<Self, String> {
        config.validate()?;

        Ok(Self {
            config,
            status: Arc::new(RwLock::new(BreakerStatus {
                state: CircuitState::Closed,
                opened_at: None,
            })),
            times_opened: Arc::new(AtomicU64::new(0)),
            rejected_calls: Arc::new(AtomicU64::new(0)),
            total_calls: Arc::new(AtomicU64::new(0)),
            clock: Arc::new(clock),
        })
    }

    /// Configured cooldown
    pub fn cooldown(&self) -> Duration {
        self.config.cooldown
    }

    /// Time left before an open circuit closes, `None` when closed
    ///
    /// Closes the circuit as a side effect when the cooldown has elapsed.
    pub fn remaining_cooldown(&self) -> Option<Duration> {
        self.refresh();
        let status = *self.status.read();
        match (status.state, status.opened_at) {
            (CircuitState::Open, Some(opened_at)) => {
                let elapsed = self.clock.now().saturating_duration_since(opened_at);
                Some(self.config.cooldown.saturating_sub(elapsed))
            }
            _ => None,
        }
    }

    /// Check if the circuit breaker allows execution
    ///
    /// Returns `false` while open and the cooldown hasn't elapsed. Once it
    /// has, the circuit transitions to closed and `true` is returned.
    pub fn can_execute(&self) -> bool {
        self.refresh() == CircuitState::Closed
    }

    /// Execute an operation with circuit breaker protection
    ///
    /// Rejects immediately while open. Otherwise runs the operation; an error
    /// for which `trips` returns `true` opens the circuit, any other error is
    /// passed through without changing the state.
    #[instrument(skip(self, trips, operation), fields(state = %self.state()))]
    pub async fn execute<F, Fut, T, E, P>(&self, trips: P, operation: F) -> ResilienceResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
        P: FnOnce(&E) -> bool,
    {
        if let Some(retry_after) = self.remaining_cooldown() {
            self.rejected_calls.fetch_add(1, Ordering::Relaxed);
            debug!(?retry_after, "Circuit breaker rejecting call");
            return Err(ResilienceError::CircuitOpen { retry_after });
        }

        self.total_calls.fetch_add(1, Ordering::Relaxed);

        match operation().await {
            Ok(result) => Ok(result),
            Err(error) => {
                if trips(&error) {
                    self.trip();
                }
                Err(ResilienceError::OperationFailed { source: error })
            }
        }
    }

    /// Open the circuit, restarting the cooldown from now
    pub fn trip(&self) {
        let now = self.clock.now();
        {
            let mut status = self.status.write();
            status.state = CircuitState::Open;
            status.opened_at = Some(now);
        }
        let times = self.times_opened.fetch_add(1, Ordering::Relaxed) + 1;
        warn!(cooldown = ?self.config.cooldown, times_opened = times, "Circuit breaker opened");
    }

    /// Get the current state, closing the circuit if the cooldown elapsed
    pub fn state(&self) -> CircuitState {
        self.refresh()
    }

    /// Get circuit breaker metrics
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let remaining_cooldown = self.remaining_cooldown();
        let status = *self.status.read();
        CircuitBreakerMetrics {
            state: status.state,
            times_opened: self.times_opened.load(Ordering::Acquire),
            rejected_calls: self.rejected_calls.load(Ordering::Acquire),
            total_calls: self.total_calls.load(Ordering::Acquire),
            opened_at: status.opened_at,
            remaining_cooldown,
        }
    }

    /// Reset the circuit breaker to closed state
    pub fn reset(&self) {
        let mut status = self.status.write();
        status.state = CircuitState::Closed;
        status.opened_at = None;
        info!("Circuit breaker manually reset to closed state");
    }

    fn refresh(&self) -> CircuitState {
        let status = *self.status.read();
        let (CircuitState::Open, Some(opened_at)) = (status.state, status.opened_at) else {
            return status.state;
        };

        if self.clock.now().saturating_duration_since(opened_at) < self.config.cooldown {
            return CircuitState::Open;
        }

        let mut status = self.status.write();
        // A concurrent trip may have restarted the cooldown.
        if status.opened_at == Some(opened_at) {
            status.state = CircuitState::Closed;
            status.opened_at = None;
            info!("Circuit breaker closed after cooldown");
        }
        status.state
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the cooldown circuit breaker
    //!
    //! Tests cover clock behavior, state transitions driven by `trip` and
    //! cooldown expiry, and the pass-through of non-tripping failures.

    use std::sync::atomic::AtomicU32;

    use super::*;

    #[derive(Debug, Error)]
    #[error("{0}")]
    struct TestError(&'static str);

    fn breaker(clock: &MockClock) -> CircuitBreaker<MockClock> {
        CircuitBreaker::with_clock(CircuitBreakerConfig::default(), clock.clone()).unwrap()
    }

    #[test]
    fn test_system_clock_now() {
        let clock = SystemClock;
        let now1 = clock.now();
        let now2 = clock.now();
        assert!(now2 >= now1, "System clock should advance");
        assert!(clock.millis_since_epoch() > 0);
    }

    #[test]
    fn test_mock_clock_advance() {
        let clock = MockClock::with_epoch_millis(1_000);
        let start = clock.now();
        clock.advance(Duration::from_secs(5));
        assert_eq!(clock.now().duration_since(start), Duration::from_secs(5));
        assert_eq!(clock.millis_since_epoch(), 6_000);
    }

    #[test]
    fn test_default_cooldown_is_sixty_seconds() {
        assert_eq!(CircuitBreakerConfig::default().cooldown, Duration::from_millis(60_000));
    }

    #[test]
    fn test_zero_cooldown_rejected() {
        let result = CircuitBreaker::new(CircuitBreakerConfig::with_cooldown(Duration::ZERO));
        assert!(result.is_err());
    }

    #[test]
    fn test_starts_closed() {
        let clock = MockClock::new();
        let cb = breaker(&clock);
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.can_execute());
        assert_eq!(cb.remaining_cooldown(), None);
    }

    #[test]
    fn test_trip_opens_for_exactly_cooldown() {
        let clock = MockClock::new();
        let cb = breaker(&clock);

        cb.trip();
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.remaining_cooldown(), Some(Duration::from_secs(60)));

        clock.advance_millis(59_999);
        assert!(!cb.can_execute());
        assert_eq!(cb.remaining_cooldown(), Some(Duration::from_millis(1)));

        clock.advance_millis(1);
        assert!(cb.can_execute());
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_retrip_restarts_cooldown() {
        let clock = MockClock::new();
        let cb = breaker(&clock);

        cb.trip();
        clock.advance_millis(30_000);
        cb.trip();
        clock.advance_millis(30_000);
        assert_eq!(cb.state(), CircuitState::Open);

        clock.advance_millis(30_000);
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.metrics().times_opened, 2);
    }

    #[tokio::test]
    async fn test_execute_rejects_while_open_without_running_operation() {
        let clock = MockClock::new();
        let cb = breaker(&clock);
        cb.trip();

        let calls = AtomicU32::new(0);
        let result: ResilienceResult<(), TestError> = cb
            .execute(
                |_| true,
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                },
            )
            .await;

        assert!(matches!(result, Err(ResilienceError::CircuitOpen { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(cb.metrics().rejected_calls, 1);
    }

    #[tokio::test]
    async fn test_non_tripping_failure_leaves_circuit_closed() {
        let clock = MockClock::new();
        let cb = breaker(&clock);

        let result: ResilienceResult<(), TestError> =
            cb.execute(|_| false, || async { Err(TestError("not found")) }).await;

        assert!(matches!(result, Err(ResilienceError::OperationFailed { .. })));
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_tripping_failure_opens_circuit() {
        let clock = MockClock::new();
        let cb = breaker(&clock);

        let result: ResilienceResult<(), TestError> = cb
            .execute(|e: &TestError| e.0.contains("quota"), || async { Err(TestError("quota")) })
            .await;

        assert!(matches!(result, Err(ResilienceError::OperationFailed { .. })));
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(cb.metrics().opened_at.is_some());
    }

    #[test]
    fn test_reset_closes_circuit() {
        let clock = MockClock::new();
        let cb = breaker(&clock);
        cb.trip();
        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_clones_share_state() {
        let clock = MockClock::new();
        let cb = breaker(&clock);
        let clone = cb.clone();
        cb.trip();
        assert_eq!(clone.state(), CircuitState::Open);
    }

    #[test]
    fn test_shared_clock_drives_breaker() {
        let mock = MockClock::new();
        let shared: SharedClock = Arc::new(mock.clone());
        let cb = CircuitBreaker::with_clock(CircuitBreakerConfig::default(), shared).unwrap();
        cb.trip();
        mock.advance_millis(60_000);
        assert_eq!(cb.state(), CircuitState::Closed);
    }
}
