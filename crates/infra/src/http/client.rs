use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client as ReqwestClient, Method};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

/// Errors produced below the HTTP status level
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("failed to build HTTP client: {0}")]
    Build(String),
}

/// Outgoing request handed to a [`Transport`]
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl TransportRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self { method, url: url.into(), headers: Vec::new(), body: None }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn json_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Value of the first header named `name` (case-insensitive)
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Response as seen by the pipeline: status code and raw body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self { status, body: body.into() }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Deserialize the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Executes single HTTP requests; retry policy lives above this seam
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// reqwest-backed transport. Sends each request exactly once.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: ReqwestClient,
    timeout: Duration,
}

impl HttpTransport {
    /// Start building a new HTTP transport.
    pub fn builder() -> HttpTransportBuilder {
        HttpTransportBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self, TransportError> {
        Self::builder().build()
    }

    fn map_reqwest_error(&self, err: &reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout(self.timeout)
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError::Request(format!("invalid header name: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| TransportError::Request(format!("invalid header value: {e}")))?;
            headers.insert(name, value);
        }

        let mut builder = self.client.request(request.method.clone(), &request.url).headers(headers);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        debug!(method = %request.method, url = %request.url, "sending HTTP request");

        let response = builder.send().await.map_err(|err| {
            debug!(method = %request.method, url = %request.url, error = %err, "HTTP request failed");
            self.map_reqwest_error(&err)
        })?;

        let status = response.status().as_u16();
        debug!(method = %request.method, url = %request.url, status, "received HTTP response");

        let body = response.bytes().await.map_err(|err| TransportError::Body(err.to_string()))?;
        Ok(TransportResponse { status, body: body.to_vec() })
    }
}

/// Builder for [`HttpTransport`].
#[derive(Debug)]
pub struct HttpTransportBuilder {
    timeout: Duration,
}

impl Default for HttpTransportBuilder {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(30) }
    }
}

impl HttpTransportBuilder {
    /// Overall per-request timeout (default 30 s)
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the transport
    ///
    /// # Errors
    /// Returns `TransportError::Build` if reqwest cannot create the client
    pub fn build(self) -> Result<HttpTransport, TransportError> {
        let client = ReqwestClient::builder()
            .timeout(self.timeout)
            .user_agent(concat!("crmdesk/", env!("CARGO_PKG_VERSION")))
            .no_proxy()
            .build()
            .map_err(|err| TransportError::Build(err.to_string()))?;

        Ok(HttpTransport { client, timeout: self.timeout })
    }
}
