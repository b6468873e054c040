//! API client with circuit breaker and retry logic
//!
//! Every call goes through the same pipeline:
//! 1. circuit breaker gate (rejects while cooling down after a quota failure)
//! 2. identity resolution, waiting a bounded time for a sign-in
//! 3. cached bearer token, refreshed only near expiry
//! 4. the HTTP request, retried with exponential backoff on quota failures
//!
//! Quota failures that survive every retry open the breaker. Any other
//! failure is returned after a single attempt.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crmdesk_common::auth::{Identity, IdentityProvider};
use crmdesk_common::resilience::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics, ResilienceError, RetryConfig,
    RetryDecision, RetryError, RetryExecutor, RetryPolicy, SharedClock, SystemClock,
};
use crmdesk_domain::ApiConfig;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::auth::AuthSessionState;
use super::classify::{classify_message, classify_response, error_message, FailureKind};
use super::errors::ApiError;
use crate::http::{HttpTransport, Transport, TransportRequest, TransportResponse};
use crate::observability::log_call_outcome;

/// Header carrying the per-call correlation id
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Failure of a single attempt, as seen by the retry executor
#[derive(Debug)]
enum AttemptError {
    /// Retried with backoff; trips the breaker once retries run out
    Quota { message: String },
    /// Returned to the caller immediately
    Fatal(ApiError),
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quota { message } => write!(f, "quota failure: {message}"),
            Self::Fatal(err) => write!(f, "{err}"),
        }
    }
}

impl AttemptError {
    /// Caller-facing error once the executor has given up after `attempts`
    fn into_api_error(self, attempts: u32) -> ApiError {
        match self {
            Self::Quota { message } => {
                warn!(attempts, message = %message, "Quota retries exhausted");
                ApiError::RateLimited { attempts, message }
            }
            Self::Fatal(err) => err,
        }
    }
}

/// Retries quota failures only
#[derive(Debug, Clone, Copy)]
struct QuotaOnly;

impl RetryPolicy<AttemptError> for QuotaOnly {
    fn should_retry(&self, error: &AttemptError, _attempt: u32) -> RetryDecision {
        match error {
            AttemptError::Quota { .. } => RetryDecision::Retry,
            AttemptError::Fatal(_) => RetryDecision::Stop,
        }
    }
}

/// Authenticated API client with quota retry and circuit breaking
///
/// Cloning is cheap; clones share the token cache and the breaker.
#[derive(Clone)]
pub struct ApiClient {
    config: Arc<ApiConfig>,
    transport: Arc<dyn Transport>,
    auth: Arc<AuthSessionState>,
    circuit_breaker: CircuitBreaker<SharedClock>,
    retry: RetryExecutor<QuotaOnly>,
}

impl ApiClient {
    /// Create a client on the reqwest transport and the system clock
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Config` if the configuration is invalid or the
    /// HTTP transport cannot be built
    pub fn new(
        config: ApiConfig,
        identity_provider: Arc<dyn IdentityProvider>,
    ) -> Result<Self, ApiError> {
        Self::builder().config(config).identity_provider(identity_provider).build()
    }

    /// Create a builder for fluent configuration
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    /// Execute an authenticated API call
    ///
    /// `endpoint` is appended to the environment's base URL. `body` is sent
    /// as JSON for POST, PUT and PATCH. Returns the parsed JSON response,
    /// `Value::Null` for empty bodies.
    ///
    /// # Errors
    ///
    /// - `CircuitOpen` while the breaker cools down after a quota failure
    /// - `AuthenticationRequired` / `AuthenticationTimeout` without identity
    /// - `RateLimited` once quota failures exhaust every retry
    /// - `RequestFailed` for any other failed response or transport error
    /// - `InvalidResponse` if a successful body is not JSON
    #[instrument(skip(self, body), fields(endpoint = %endpoint, method = %method))]
    pub async fn call(
        &self,
        endpoint: &str,
        method: Method,
        body: Option<Value>,
    ) -> Result<Value, ApiError> {
        let started = Instant::now();
        let url = self.config.url_for(endpoint);
        let request_id = Uuid::new_v4().to_string();

        debug!(url = %url, request_id = %request_id, "API call");

        let result = self
            .circuit_breaker
            .execute(
                |err: &ApiError| matches!(err, ApiError::RateLimited { .. }),
                || self.authenticated_call(&url, &method, body.as_ref(), &request_id),
            )
            .await
            .map_err(Self::map_resilience_error);

        log_call_outcome(endpoint, method.as_str(), started.elapsed(), &result);
        result
    }

    /// Execute a GET request
    ///
    /// # Errors
    ///
    /// See [`ApiClient::call`]
    pub async fn get(&self, endpoint: &str) -> Result<Value, ApiError> {
        self.call(endpoint, Method::GET, None).await
    }

    /// Execute a POST request with a JSON body
    ///
    /// # Errors
    ///
    /// See [`ApiClient::call`]
    pub async fn post(&self, endpoint: &str, body: Value) -> Result<Value, ApiError> {
        self.call(endpoint, Method::POST, Some(body)).await
    }

    /// Execute a PUT request with a JSON body
    ///
    /// # Errors
    ///
    /// See [`ApiClient::call`]
    pub async fn put(&self, endpoint: &str, body: Value) -> Result<Value, ApiError> {
        self.call(endpoint, Method::PUT, Some(body)).await
    }

    /// Execute a DELETE request
    ///
    /// # Errors
    ///
    /// See [`ApiClient::call`]
    pub async fn delete(&self, endpoint: &str) -> Result<Value, ApiError> {
        self.call(endpoint, Method::DELETE, None).await
    }

    /// GET and deserialize the response into `T`
    ///
    /// # Errors
    ///
    /// See [`ApiClient::call`]; `InvalidResponse` if the JSON does not match
    /// `T`
    pub async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        let value = self.get(endpoint).await?;
        Self::decode(value)
    }

    /// POST a serializable body and deserialize the response into `T`
    ///
    /// # Errors
    ///
    /// `InvalidRequest` if the body cannot be serialized, otherwise see
    /// [`ApiClient::get_json`]
    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let value = self.post(endpoint, Self::encode(body)?).await?;
        Self::decode(value)
    }

    /// PUT a serializable body and deserialize the response into `T`
    ///
    /// # Errors
    ///
    /// See [`ApiClient::post_json`]
    pub async fn put_json<B: Serialize, T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let value = self.put(endpoint, Self::encode(body)?).await?;
        Self::decode(value)
    }

    /// Sign out and drop the cached token
    pub fn sign_out(&self) {
        self.auth.sign_out();
    }

    /// Check whether an identity is signed in right now
    pub fn is_authenticated(&self) -> bool {
        self.auth.is_authenticated()
    }

    /// Snapshot of the circuit breaker
    pub fn breaker_metrics(&self) -> CircuitBreakerMetrics {
        self.circuit_breaker.metrics()
    }

    /// Close the circuit breaker without waiting for the cooldown
    pub fn reset_breaker(&self) {
        self.circuit_breaker.reset();
    }

    /// Configuration the client was built with
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Shared identity and token state
    pub fn auth(&self) -> &AuthSessionState {
        &self.auth
    }

    async fn authenticated_call(
        &self,
        url: &str,
        method: &Method,
        body: Option<&Value>,
        request_id: &str,
    ) -> Result<Value, ApiError> {
        let identity = self.auth.identity().await?;
        let identity = identity.as_ref();

        let outcome = self
            .retry
            .execute_with_outcome(move |attempt| {
                self.attempt(identity, url, method, body, request_id, attempt)
            })
            .await;

        match outcome.result {
            Ok(value) => Ok(value),
            Err(
                RetryError::AttemptsExhausted { source, .. } | RetryError::NonRetryable { source },
            ) => Err(source.into_api_error(outcome.attempts)),
            Err(RetryError::InvalidConfiguration { message }) => Err(ApiError::Config(message)),
        }
    }

    async fn attempt(
        &self,
        identity: &dyn Identity,
        url: &str,
        method: &Method,
        body: Option<&Value>,
        request_id: &str,
        attempt: u32,
    ) -> Result<Value, AttemptError> {
        // Clones share the breaker; a concurrent call may have opened it
        // while this one was backing off
        if let Some(retry_after) = self.circuit_breaker.remaining_cooldown() {
            debug!(attempt = attempt + 1, ?retry_after, "Circuit opened during retries");
            return Err(AttemptError::Fatal(ApiError::CircuitOpen { retry_after }));
        }

        // Re-resolved per attempt so a token that expired during backoff is
        // replaced; otherwise the cache serves the same one
        let token = self.auth.token_for(identity).await.map_err(AttemptError::Fatal)?;

        let mut request = TransportRequest::new(method.clone(), url)
            .header("Authorization", format!("Bearer {token}"))
            .header("Content-Type", "application/json")
            .header(REQUEST_ID_HEADER, request_id);
        if let Some(body) = body {
            if carries_body(method) {
                request = request.json_body(body.clone());
            } else {
                debug!(method = %method, "Ignoring body for method without payload");
            }
        }

        debug!(attempt = attempt + 1, "Sending request");

        let timeout = self.config.request_timeout();
        let response = match tokio::time::timeout(timeout, self.transport.send(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                let message = err.to_string();
                return Err(match classify_message(&message) {
                    FailureKind::Quota => AttemptError::Quota { message },
                    FailureKind::Other => {
                        AttemptError::Fatal(ApiError::request_failed(None, message))
                    }
                });
            }
            Err(_) => {
                return Err(AttemptError::Fatal(ApiError::request_failed(
                    None,
                    format!("request timed out after {timeout:?}"),
                )));
            }
        };

        if response.is_success() {
            return Self::parse_success(&response).map_err(AttemptError::Fatal);
        }

        let status = response.status;
        if status == 401 {
            debug!("Credentials rejected, invalidating cached token");
            self.auth.invalidate_token();
        }

        let message = error_message(status, &response.body);
        match classify_response(status, &response.body) {
            FailureKind::Quota => {
                debug!(status, message = %message, "Quota failure");
                Err(AttemptError::Quota { message })
            }
            FailureKind::Other => {
                debug!(status, message = %message, "Request failed");
                Err(AttemptError::Fatal(ApiError::request_failed(Some(status), message)))
            }
        }
    }

    fn parse_success(response: &TransportResponse) -> Result<Value, ApiError> {
        if response.status == 204 || response.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        response.json().map_err(|e| ApiError::InvalidResponse(format!("Failed to parse response: {e}")))
    }

    fn encode<B: Serialize>(body: &B) -> Result<Value, ApiError> {
        serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to serialize body: {e}")))
    }

    fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
        serde_json::from_value(value)
            .map_err(|e| ApiError::InvalidResponse(format!("Unexpected response shape: {e}")))
    }

    fn map_resilience_error(err: ResilienceError<ApiError>) -> ApiError {
        match err {
            ResilienceError::CircuitOpen { retry_after } => ApiError::CircuitOpen { retry_after },
            ResilienceError::OperationFailed { source } => source,
            ResilienceError::InvalidConfiguration { message } => ApiError::Config(message),
        }
    }
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.config.base_url())
            .field("auth", &self.auth)
            .field("circuit_breaker", &self.circuit_breaker)
            .finish_non_exhaustive()
    }
}

fn carries_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

/// Builder for API client
#[derive(Default)]
pub struct ApiClientBuilder {
    config: Option<ApiConfig>,
    identity_provider: Option<Arc<dyn IdentityProvider>>,
    transport: Option<Arc<dyn Transport>>,
    clock: Option<SharedClock>,
}

impl ApiClientBuilder {
    /// Set the API configuration
    pub fn config(mut self, config: ApiConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the identity provider
    pub fn identity_provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.identity_provider = Some(provider);
        self
    }

    /// Replace the reqwest transport
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Clock driving the breaker cooldown and token expiry
    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the API client
    ///
    /// # Errors
    ///
    /// Returns error if required fields are missing or client creation fails
    pub fn build(self) -> Result<ApiClient, ApiError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let provider = self
            .identity_provider
            .ok_or_else(|| ApiError::Config("Identity provider not set".to_string()))?;
        let clock: SharedClock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(
                HttpTransport::builder()
                    .timeout(config.request_timeout())
                    .build()
                    .map_err(|e| ApiError::Config(format!("Failed to build HTTP transport: {e}")))?,
            ),
        };

        let circuit_breaker = CircuitBreaker::with_clock(
            CircuitBreakerConfig::with_cooldown(config.breaker.cooldown()),
            Arc::clone(&clock),
        )
        .map_err(|e| ApiError::Config(format!("Failed to create circuit breaker: {e}")))?;

        let retry_config =
            RetryConfig::exponential(config.retry.max_retries, config.retry.initial_delay());

        let auth = AuthSessionState::new(provider, config.auth, clock);

        Ok(ApiClient {
            config: Arc::new(config),
            transport,
            auth: Arc::new(auth),
            circuit_breaker,
            retry: RetryExecutor::new(retry_config, QuotaOnly),
        })
    }
}
