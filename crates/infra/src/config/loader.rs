//! Configuration loader
//!
//! Loads the API pipeline configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. Reads a `.env` file into the environment when one exists
//! 2. Attempts to load from environment variables (`CRMDESK_ENV` selects
//!    this source)
//! 3. Otherwise falls back to a config file, probing multiple paths
//! 4. Uses the built-in defaults when no file exists
//!
//! Supports JSON and TOML formats.
//!
//! ## Environment Variables
//! - `CRMDESK_ENV`: `local` or `production` (required for env loading)
//! - `CRMDESK_API_BASE_URL`: Production base URL
//! - `CRMDESK_LOCAL_API_BASE_URL`: Local base URL
//! - `CRMDESK_REQUEST_TIMEOUT_MS`: Per-request timeout
//! - `CRMDESK_MAX_RETRIES`: Retries after the first attempt on quota failures
//! - `CRMDESK_INITIAL_RETRY_DELAY_MS`: Delay before the first retry
//! - `CRMDESK_BREAKER_COOLDOWN_MS`: How long the breaker stays open
//! - `CRMDESK_AUTH_WAIT_TIMEOUT_MS`: Bound on waiting for a sign-in
//! - `CRMDESK_TOKEN_REFRESH_BUFFER_MS`: Refresh tokens this long before expiry
//!
//! Unset optional variables keep their defaults.
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./config.json` or `./config.toml` (current working directory)
//! 2. `./crmdesk.json` or `./crmdesk.toml` (current working directory)
//! 3. `../config.json` or `../config.toml` (parent directory)
//! 4. `../../config.json` or `../../config.toml` (grandparent directory)
//! 5. Relative to executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use crmdesk_domain::{ApiConfig, Config, CrmError, Environment, Result};

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If `CRMDESK_ENV` is
/// not set, falls back to a config file, and to defaults when none exists.
/// The result is validated before it is returned.
///
/// # Errors
/// Returns `CrmError::Config` if:
/// - An environment variable or the config file holds an invalid value
/// - The resulting configuration fails validation
pub fn load() -> Result<Config> {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "Loaded .env file");
    }

    let config = match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            config
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            match probe_config_paths() {
                Some(path) => load_from_file(Some(path))?,
                None => {
                    tracing::info!("No config file found, using defaults");
                    Config::default()
                }
            }
        }
    };

    config.api.validate()?;
    Ok(config)
}

/// Load configuration from environment variables
///
/// `CRMDESK_ENV` must be present; every other variable is optional and
/// overrides the corresponding default.
///
/// # Environment Variables
/// See module documentation for the complete list.
///
/// # Errors
/// Returns `CrmError::Config` if `CRMDESK_ENV` is missing or a variable has
/// an invalid value.
pub fn load_from_env() -> Result<Config> {
    let environment = Environment::from_str(&env_var("CRMDESK_ENV")?)?;
    let mut api = ApiConfig { environment, ..ApiConfig::default() };

    if let Some(url) = env_opt("CRMDESK_API_BASE_URL") {
        api.production_base_url = url;
    }
    if let Some(url) = env_opt("CRMDESK_LOCAL_API_BASE_URL") {
        api.local_base_url = url;
    }
    if let Some(timeout) = env_parse("CRMDESK_REQUEST_TIMEOUT_MS")? {
        api.request_timeout_ms = timeout;
    }
    if let Some(retries) = env_parse("CRMDESK_MAX_RETRIES")? {
        api.retry.max_retries = retries;
    }
    if let Some(delay) = env_parse("CRMDESK_INITIAL_RETRY_DELAY_MS")? {
        api.retry.initial_delay_ms = delay;
    }
    if let Some(cooldown) = env_parse("CRMDESK_BREAKER_COOLDOWN_MS")? {
        api.breaker.cooldown_ms = cooldown;
    }
    if let Some(wait) = env_parse("CRMDESK_AUTH_WAIT_TIMEOUT_MS")? {
        api.auth.wait_timeout_ms = wait;
    }
    if let Some(buffer) = env_parse("CRMDESK_TOKEN_REFRESH_BUFFER_MS")? {
        api.auth.refresh_buffer_ms = buffer;
    }

    Ok(Config { api })
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Arguments
/// * `path` - Optional path to config file. If `None`, uses
///   [`probe_config_paths`].
///
/// # Errors
/// Returns `CrmError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(CrmError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            CrmError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| CrmError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| CrmError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| CrmError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(CrmError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe multiple paths for configuration files
///
/// Searches for config files in the following locations (in order):
/// 1. Current working directory (`./config.{json,toml}`,
///    `./crmdesk.{json,toml}`)
/// 2. Parent directories (up to 2 levels)
/// 3. Relative to executable location
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(candidates_in(&cwd));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(candidates_in(exe_dir));
        }
    }

    candidates.into_iter().find(|path| path.is_file())
}

fn candidates_in(dir: &Path) -> Vec<PathBuf> {
    vec![
        dir.join("config.json"),
        dir.join("config.toml"),
        dir.join("crmdesk.json"),
        dir.join("crmdesk.toml"),
        dir.join("../config.json"),
        dir.join("../config.toml"),
        dir.join("../../config.json"),
        dir.join("../../config.toml"),
    ]
}

/// Get required environment variable
///
/// # Errors
/// Returns `CrmError::Config` if the variable is not set.
fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| CrmError::Config(format!("Missing required environment variable: {key}")))
}

/// Optional environment variable; empty values count as unset
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Parse an optional numeric environment variable
///
/// # Errors
/// Returns `CrmError::Config` if the variable is set but not a valid number.
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_opt(key)
        .map(|raw| {
            raw.parse::<T>().map_err(|e| CrmError::Config(format!("Invalid value for {key}: {e}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use once_cell::sync::Lazy;
    use tempfile::NamedTempFile;

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const ALL_VARS: &[&str] = &[
        "CRMDESK_ENV",
        "CRMDESK_API_BASE_URL",
        "CRMDESK_LOCAL_API_BASE_URL",
        "CRMDESK_REQUEST_TIMEOUT_MS",
        "CRMDESK_MAX_RETRIES",
        "CRMDESK_INITIAL_RETRY_DELAY_MS",
        "CRMDESK_BREAKER_COOLDOWN_MS",
        "CRMDESK_AUTH_WAIT_TIMEOUT_MS",
        "CRMDESK_TOKEN_REFRESH_BUFFER_MS",
    ];

    fn clear_env() {
        for key in ALL_VARS {
            std::env::remove_var(key);
        }
    }

    fn write_temp(contents: &str, extension: &str) -> PathBuf {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(contents.as_bytes()).unwrap();
        let path = temp_file.path().with_extension(extension);
        std::fs::copy(temp_file.path(), &path).unwrap();
        path
    }

    #[test]
    fn test_load_from_env_all_vars_set() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("CRMDESK_ENV", "local");
        std::env::set_var("CRMDESK_LOCAL_API_BASE_URL", "http://127.0.0.1:5050/api");
        std::env::set_var("CRMDESK_REQUEST_TIMEOUT_MS", "10000");
        std::env::set_var("CRMDESK_MAX_RETRIES", "5");
        std::env::set_var("CRMDESK_INITIAL_RETRY_DELAY_MS", "250");
        std::env::set_var("CRMDESK_BREAKER_COOLDOWN_MS", "30000");
        std::env::set_var("CRMDESK_AUTH_WAIT_TIMEOUT_MS", "2000");
        std::env::set_var("CRMDESK_TOKEN_REFRESH_BUFFER_MS", "60000");

        let result = load_from_env();
        assert!(result.is_ok(), "Should load config from env vars, error: {:?}", result.err());

        let api = result.unwrap().api;
        assert_eq!(api.environment, Environment::Local);
        assert_eq!(api.base_url(), "http://127.0.0.1:5050/api");
        assert_eq!(api.request_timeout_ms, 10_000);
        assert_eq!(api.retry.max_retries, 5);
        assert_eq!(api.retry.initial_delay_ms, 250);
        assert_eq!(api.breaker.cooldown_ms, 30_000);
        assert_eq!(api.auth.wait_timeout_ms, 2_000);
        assert_eq!(api.auth.refresh_buffer_ms, 60_000);

        clear_env();
    }

    #[test]
    fn test_load_from_env_defaults_for_unset_vars() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("CRMDESK_ENV", "local");
        std::env::set_var("CRMDESK_MAX_RETRIES", "");

        let api = load_from_env().unwrap().api;
        assert_eq!(api, ApiConfig::default());

        clear_env();
    }

    #[test]
    fn test_load_rejects_production_without_url() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("CRMDESK_ENV", "production");
        let err = load().unwrap_err();
        assert!(
            matches!(err, CrmError::Config(ref msg) if msg.contains("base URL")),
            "got {err:?}"
        );

        std::env::set_var("CRMDESK_API_BASE_URL", "https://crm.example.com/api");
        let config = load().expect("configured production URL");
        assert_eq!(config.api.base_url(), "https://crm.example.com/api");

        clear_env();
    }

    #[test]
    fn test_load_from_env_missing_env() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        let result = load_from_env();
        assert!(matches!(result, Err(CrmError::Config(_))), "Should be a Config error");
    }

    #[test]
    fn test_load_from_env_invalid_number() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("CRMDESK_ENV", "local");
        std::env::set_var("CRMDESK_MAX_RETRIES", "three");

        let err = load_from_env().unwrap_err();
        assert!(
            matches!(err, CrmError::Config(ref msg) if msg.contains("CRMDESK_MAX_RETRIES")),
            "got {err:?}"
        );

        clear_env();
    }

    #[test]
    fn test_load_from_env_unknown_environment() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("CRMDESK_ENV", "staging");
        assert!(load_from_env().is_err());

        clear_env();
    }

    #[test]
    fn test_load_from_file_json() {
        let path = write_temp(
            r#"{
                "api": {
                    "environment": "production",
                    "production_base_url": "https://crm.example.com/api",
                    "retry": { "max_retries": 2 }
                }
            }"#,
            "json",
        );

        let config = load_from_file(Some(path.clone())).unwrap();
        assert_eq!(config.api.base_url(), "https://crm.example.com/api");
        assert_eq!(config.api.retry.max_retries, 2);
        assert_eq!(config.api.retry.initial_delay_ms, 1_000);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_from_file_toml() {
        let path = write_temp(
            r#"
[api]
environment = "local"

[api.breaker]
cooldown_ms = 90000
"#,
            "toml",
        );

        let config = load_from_file(Some(path.clone())).unwrap();
        assert_eq!(config.api.environment, Environment::Local);
        assert_eq!(config.api.breaker.cooldown_ms, 90_000);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_from_file_not_found() {
        let result = load_from_file(Some(PathBuf::from("/nonexistent/config.json")));
        assert!(matches!(result, Err(CrmError::Config(_))), "Should be a Config error");
    }

    #[test]
    fn test_load_from_file_invalid_json() {
        let path = write_temp(r#"{ "this is": "not valid json" "#, "json");

        let result = load_from_file(Some(path.clone()));
        assert!(result.is_err(), "Should fail with invalid JSON");

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_parse_config_unsupported_format() {
        let result = parse_config("api: {}", &PathBuf::from("test.yaml"));
        assert!(result.is_err(), "Should fail with unsupported format");
    }

    #[test]
    fn test_parse_config_empty_toml_uses_defaults() {
        let config = parse_config("", &PathBuf::from("test.toml")).unwrap();
        assert_eq!(config, Config::default());
    }
}
