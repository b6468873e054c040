//! Configuration structures
//!
//! Every field has a serde default so partial JSON/TOML files load; the
//! defaults reproduce the pipeline's fixed constants.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_AUTH_WAIT_TIMEOUT_MS, DEFAULT_BREAKER_COOLDOWN_MS, DEFAULT_INITIAL_RETRY_DELAY_MS,
    DEFAULT_LOCAL_BASE_URL, DEFAULT_MAX_RETRIES, DEFAULT_REQUEST_TIMEOUT_MS,
    DEFAULT_TOKEN_REFRESH_BUFFER_MS, FALLBACK_TOKEN_LIFETIME_MS,
};
use crate::errors::{CrmError, Result};

/// Top-level application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
}

/// Deployment environment, selects which base URL requests go to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Backend running on the developer machine
    #[default]
    Local,
    /// Hosted backend; its base URL must be configured
    Production,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Production => write!(f, "production"),
        }
    }
}

impl FromStr for Environment {
    type Err = CrmError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "localhost" | "development" | "dev" => Ok(Self::Local),
            "production" | "prod" => Ok(Self::Production),
            other => Err(CrmError::Config(format!("Unknown environment: {other}"))),
        }
    }
}

/// API pipeline configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub environment: Environment,
    /// Hosted backend URL; empty until configured
    #[serde(default)]
    pub production_base_url: String,
    #[serde(default = "default_local_base_url")]
    pub local_base_url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub breaker: BreakerSettings,
    #[serde(default)]
    pub auth: AuthSettings,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            production_base_url: String::new(),
            local_base_url: default_local_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
            retry: RetrySettings::default(),
            breaker: BreakerSettings::default(),
            auth: AuthSettings::default(),
        }
    }
}

impl ApiConfig {
    /// Base URL for the configured environment, without a trailing slash
    #[must_use]
    pub fn base_url(&self) -> &str {
        let url = match self.environment {
            Environment::Local => &self.local_base_url,
            Environment::Production => &self.production_base_url,
        };
        url.trim_end_matches('/')
    }

    /// Full request URL for an endpoint path
    ///
    /// The endpoint is treated as opaque; a missing leading slash is added.
    #[must_use]
    pub fn url_for(&self, endpoint: &str) -> String {
        if endpoint.starts_with('/') {
            format!("{}{}", self.base_url(), endpoint)
        } else {
            format!("{}/{}", self.base_url(), endpoint)
        }
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// Returns `CrmError::Config` when the active base URL is not an absolute
    /// http(s) URL or when a timeout is zero.
    pub fn validate(&self) -> Result<()> {
        let base = self.base_url();
        if base.is_empty() {
            return Err(CrmError::Config(format!("{} base URL is empty", self.environment)));
        }

        let parsed = url::Url::parse(base)
            .map_err(|e| CrmError::Config(format!("Invalid base URL '{base}': {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(CrmError::Config(format!(
                "Unsupported base URL scheme '{}'",
                parsed.scheme()
            )));
        }

        if self.request_timeout_ms == 0 {
            return Err(CrmError::Config("request_timeout_ms must be greater than 0".into()));
        }
        if self.auth.wait_timeout_ms == 0 {
            return Err(CrmError::Config("auth.wait_timeout_ms must be greater than 0".into()));
        }

        Ok(())
    }
}

/// Retry settings for quota failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self { max_retries: default_max_retries(), initial_delay_ms: default_initial_delay_ms() }
    }
}

impl RetrySettings {
    #[must_use]
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }
}

/// Quota circuit breaker settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerSettings {
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self { cooldown_ms: default_cooldown_ms() }
    }
}

impl BreakerSettings {
    #[must_use]
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

/// Identity wait and token cache settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSettings {
    #[serde(default = "default_wait_timeout_ms")]
    pub wait_timeout_ms: u64,
    #[serde(default = "default_refresh_buffer_ms")]
    pub refresh_buffer_ms: u64,
    #[serde(default = "default_fallback_lifetime_ms")]
    pub fallback_lifetime_ms: u64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            wait_timeout_ms: default_wait_timeout_ms(),
            refresh_buffer_ms: default_refresh_buffer_ms(),
            fallback_lifetime_ms: default_fallback_lifetime_ms(),
        }
    }
}

impl AuthSettings {
    #[must_use]
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }
}

fn default_local_base_url() -> String {
    DEFAULT_LOCAL_BASE_URL.to_string()
}

const fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

const fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

const fn default_initial_delay_ms() -> u64 {
    DEFAULT_INITIAL_RETRY_DELAY_MS
}

const fn default_cooldown_ms() -> u64 {
    DEFAULT_BREAKER_COOLDOWN_MS
}

const fn default_wait_timeout_ms() -> u64 {
    DEFAULT_AUTH_WAIT_TIMEOUT_MS
}

const fn default_refresh_buffer_ms() -> u64 {
    DEFAULT_TOKEN_REFRESH_BUFFER_MS
}

const fn default_fallback_lifetime_ms() -> u64 {
    FALLBACK_TOKEN_LIFETIME_MS
}
