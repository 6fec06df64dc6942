//! Environment variable parsing for configuration.
//!
//! Responsibilities:
//! - Read and parse `FACILITY_*` environment variables.
//! - Apply environment variable values to a ConfigLoader instance.
//! - Provide helper functions for reading env vars with empty/whitespace filtering.
//!
//! Does NOT handle:
//! - Loading from config files (see file.rs).
//! - Building the final Config (see builder.rs).
//! - .env file loading (handled by ConfigLoader::load_dotenv).
//!
//! Invariants:
//! - Empty or whitespace-only environment variables are treated as unset.
//! - Returned values are trimmed (leading/trailing whitespace removed).
//! - `FACILITY_PASSWORD` is base64-encoded; invalid base64 or non-UTF-8 is an error.
//! - Invalid numeric values return ConfigError::InvalidValue.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use secrecy::SecretString;
use std::time::Duration;

use super::builder::ConfigLoader;
use super::error::ConfigError;
use crate::constants::{
    ENV_APPLICATION_NAME, ENV_ENDPOINT, ENV_MAX_RETRIES, ENV_PASSWORD, ENV_PROXY_PASSWORD,
    ENV_PROXY_PORT, ENV_PROXY_SERVER, ENV_PROXY_USERNAME, ENV_TIMEOUT, ENV_TRUSTED_TOKEN,
    ENV_USERNAME, MAX_MAX_RETRIES,
};

/// Read an environment variable, returning None if unset, empty, or whitespace-only.
/// Returns the trimmed value (leading/trailing whitespace removed) if present.
pub fn env_var_or_none(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|s| {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else if trimmed.len() == s.len() {
            Some(s)
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Decode the base64-encoded password variable.
fn decode_password(encoded: &str) -> Result<SecretString, ConfigError> {
    let invalid = |message: &str| ConfigError::InvalidValue {
        var: ENV_PASSWORD.to_string(),
        message: message.to_string(),
    };

    let bytes = STANDARD
        .decode(encoded)
        .map_err(|_| invalid("must be base64-encoded"))?;
    let password = String::from_utf8(bytes).map_err(|_| invalid("must decode to UTF-8 text"))?;
    Ok(SecretString::new(password.into()))
}

/// Apply environment variable configuration to the loader.
///
/// Environment variables take precedence over file settings.
pub fn apply_env(loader: &mut ConfigLoader) -> Result<(), ConfigError> {
    if let Some(endpoint) = env_var_or_none(ENV_ENDPOINT) {
        loader.set_endpoint(Some(endpoint));
    }
    if let Some(username) = env_var_or_none(ENV_USERNAME) {
        loader.set_username(Some(username));
    }
    if let Some(encoded) = env_var_or_none(ENV_PASSWORD) {
        loader.set_password(Some(decode_password(&encoded)?));
    }
    if let Some(token) = env_var_or_none(ENV_TRUSTED_TOKEN) {
        loader.set_trusted_token(Some(SecretString::new(token.into())));
    }
    if let Some(server) = env_var_or_none(ENV_PROXY_SERVER) {
        loader.set_proxy_server(Some(server));
    }
    if let Some(port) = env_var_or_none(ENV_PROXY_PORT) {
        let port: u16 = port.parse().map_err(|_| ConfigError::InvalidValue {
            var: ENV_PROXY_PORT.to_string(),
            message: format!("must be a port number between 0 and 65535 (got '{port}')"),
        })?;
        loader.set_proxy_port(Some(port));
    }
    if let Some(username) = env_var_or_none(ENV_PROXY_USERNAME) {
        loader.set_proxy_username(Some(username));
    }
    if let Some(password) = env_var_or_none(ENV_PROXY_PASSWORD) {
        loader.set_proxy_password(Some(SecretString::new(password.into())));
    }
    if let Some(name) = env_var_or_none(ENV_APPLICATION_NAME) {
        loader.set_application_name(Some(name));
    }
    if let Some(timeout) = env_var_or_none(ENV_TIMEOUT) {
        let secs: u64 = timeout.parse().map_err(|_| ConfigError::InvalidValue {
            var: ENV_TIMEOUT.to_string(),
            message: "must be a number".to_string(),
        })?;
        loader.set_timeout(Some(Duration::from_secs(secs)));
    }
    if let Some(retries) = env_var_or_none(ENV_MAX_RETRIES) {
        let value: usize = retries.parse().map_err(|_| ConfigError::InvalidValue {
            var: ENV_MAX_RETRIES.to_string(),
            message: "must be a non-negative integer".to_string(),
        })?;
        if value > MAX_MAX_RETRIES {
            return Err(ConfigError::InvalidMaxRetries {
                message: format!("must be between 0 and {} (got {})", MAX_MAX_RETRIES, value),
            });
        }
        loader.set_max_retries(Some(value));
    }

    Ok(())
}
