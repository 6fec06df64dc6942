//! Configuration loader builder implementation.
//!
//! Responsibilities:
//! - Provide a builder-pattern `ConfigLoader` for hierarchical configuration merging.
//! - Support loading from a JSON file, environment variables, and direct builder methods.
//! - Build and validate the final `Config`.
//!
//! Does NOT handle:
//! - Direct environment variable parsing logic (delegated to env.rs).
//! - Config file parsing (delegated to file.rs).
//!
//! Invariants / Assumptions:
//! - Later sources overwrite earlier ones; call order defines precedence
//!   (typically file, then env, then explicit builder methods).
//! - `load_dotenv()` must be called explicitly to enable `.env` file loading.
//! - `build()` never returns a config that fails `Config::validate()`.

use secrecy::SecretString;
use std::path::Path;
use std::time::Duration;

use super::env::apply_env;
use super::error::ConfigError;
use super::file::apply_file;
use crate::constants::{
    DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT_SECS, ENV_DOTENV_DISABLED, MAX_MAX_RETRIES,
    MAX_TIMEOUT_SECS,
};
use crate::types::{Config, ProxyConfig};

/// Configuration loader that builds config from files, environment variables and builder calls.
#[derive(Default)]
pub struct ConfigLoader {
    endpoint: Option<String>,
    username: Option<String>,
    password: Option<SecretString>,
    trusted_token: Option<SecretString>,
    proxy_server: Option<String>,
    proxy_port: Option<u16>,
    proxy_username: Option<String>,
    proxy_password: Option<SecretString>,
    use_compression: Option<bool>,
    application_name: Option<String>,
    throw_on_auth_failure: Option<bool>,
    throw_on_api_failure: Option<bool>,
    timeout: Option<Duration>,
    max_retries: Option<usize>,
}

impl ConfigLoader {
    /// Create a new configuration loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if dotenv loading is disabled via environment variable.
    fn dotenv_disabled() -> bool {
        matches!(
            std::env::var(ENV_DOTENV_DISABLED).ok().as_deref(),
            Some("true") | Some("1")
        )
    }

    /// Load environment variables from .env file if present.
    ///
    /// If `DOTENV_DISABLED` environment variable is set to "true" or "1",
    /// the .env file will not be loaded (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The `.env` file exists but has invalid syntax (`ConfigError::DotenvParse`)
    /// - The `.env` file exists but cannot be read due to I/O errors (`ConfigError::DotenvIo`)
    ///
    /// Missing `.env` files are silently ignored (returns `Ok(self)`).
    pub fn load_dotenv(self) -> Result<Self, ConfigError> {
        if Self::dotenv_disabled() {
            return Ok(self);
        }

        match dotenvy::dotenv() {
            Ok(_) => Ok(self),
            Err(e) if Self::is_not_found(&e) => Ok(self),
            Err(dotenvy::Error::LineParse(_, idx)) => {
                Err(ConfigError::DotenvParse { error_index: idx })
            }
            Err(dotenvy::Error::Io(io_err)) => Err(ConfigError::DotenvIo {
                kind: io_err.kind(),
            }),
            Err(_) => Err(ConfigError::DotenvUnknown),
        }
    }

    /// Check if a dotenv error indicates the file was not found.
    fn is_not_found(err: &dotenvy::Error) -> bool {
        matches!(
            err,
            dotenvy::Error::Io(io_err) if io_err.kind() == std::io::ErrorKind::NotFound
        )
    }

    /// Read configuration from a JSON config file.
    pub fn from_file(mut self, path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        apply_file(&mut self, path.as_ref())?;
        Ok(self)
    }

    /// Read configuration from `FACILITY_*` environment variables.
    ///
    /// Only non-blank variables overwrite values loaded so far.
    pub fn from_env(mut self) -> Result<Self, ConfigError> {
        apply_env(&mut self)?;
        Ok(self)
    }

    /// Set the API endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the username.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the password (plain text, not base64).
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(SecretString::new(password.into().into()));
        self
    }

    /// Set the trusted token.
    pub fn with_trusted_token(mut self, token: impl Into<String>) -> Self {
        self.trusted_token = Some(SecretString::new(token.into().into()));
        self
    }

    /// Set the proxy server (host, optionally with scheme and port).
    pub fn with_proxy_server(mut self, server: impl Into<String>) -> Self {
        self.proxy_server = Some(server.into());
        self
    }

    /// Set an explicit proxy port.
    pub fn with_proxy_port(mut self, port: u16) -> Self {
        self.proxy_port = Some(port);
        self
    }

    /// Set the proxy credentials.
    pub fn with_proxy_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.proxy_username = Some(username.into());
        self.proxy_password = Some(SecretString::new(password.into().into()));
        self
    }

    /// Enable or disable gzip response compression.
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.use_compression = Some(enabled);
        self
    }

    /// Set the application name header value.
    pub fn with_application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }

    /// Turn implicit authentication failures into errors in the high-level client.
    pub fn with_throw_on_auth_failure(mut self, enabled: bool) -> Self {
        self.throw_on_auth_failure = Some(enabled);
        self
    }

    /// Turn non-2xx API responses into errors in the high-level client.
    pub fn with_throw_on_api_failure(mut self, enabled: bool) -> Self {
        self.throw_on_api_failure = Some(enabled);
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the maximum number of rate-limit retries.
    pub fn with_max_retries(mut self, retries: usize) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// Build the final configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEndpoint`] without an endpoint,
    /// [`ConfigError::InvalidCredentials`] when the credential invariant fails,
    /// and timeout/retry range errors.
    pub fn build(self) -> Result<Config, ConfigError> {
        let endpoint = self
            .endpoint
            .as_deref()
            .map(normalize_endpoint)
            .filter(|e| !e.is_empty())
            .ok_or(ConfigError::MissingEndpoint)?;

        let timeout = self
            .timeout
            .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        validate_timeout(timeout)?;

        let max_retries = self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES);
        if max_retries > MAX_MAX_RETRIES {
            return Err(ConfigError::InvalidMaxRetries {
                message: format!(
                    "must be between 0 and {} (got {})",
                    MAX_MAX_RETRIES, max_retries
                ),
            });
        }

        let config = Config {
            endpoint,
            username: self.username,
            password: self.password,
            trusted_token: self.trusted_token,
            proxy: ProxyConfig {
                server: self.proxy_server,
                port: self.proxy_port.unwrap_or(0),
                username: self.proxy_username,
                password: self.proxy_password,
            },
            use_compression: self.use_compression.unwrap_or(false),
            application_name: self.application_name,
            throw_on_auth_failure: self.throw_on_auth_failure.unwrap_or(false),
            throw_on_api_failure: self.throw_on_api_failure.unwrap_or(false),
            timeout,
            max_retries,
        };

        config.validate()?;
        Ok(config)
    }

    // Internal accessor methods for use by other loader modules

    pub(crate) fn set_endpoint(&mut self, endpoint: Option<String>) {
        self.endpoint = endpoint;
    }

    pub(crate) fn set_username(&mut self, username: Option<String>) {
        self.username = username;
    }

    pub(crate) fn set_password(&mut self, password: Option<SecretString>) {
        self.password = password;
    }

    pub(crate) fn set_trusted_token(&mut self, token: Option<SecretString>) {
        self.trusted_token = token;
    }

    pub(crate) fn set_proxy_server(&mut self, server: Option<String>) {
        self.proxy_server = server;
    }

    pub(crate) fn set_proxy_port(&mut self, port: Option<u16>) {
        self.proxy_port = port;
    }

    pub(crate) fn set_proxy_username(&mut self, username: Option<String>) {
        self.proxy_username = username;
    }

    pub(crate) fn set_proxy_password(&mut self, password: Option<SecretString>) {
        self.proxy_password = password;
    }

    pub(crate) fn set_use_compression(&mut self, enabled: Option<bool>) {
        self.use_compression = enabled;
    }

    pub(crate) fn set_application_name(&mut self, name: Option<String>) {
        self.application_name = name;
    }

    pub(crate) fn set_throw_on_auth_failure(&mut self, flag: Option<bool>) {
        self.throw_on_auth_failure = flag;
    }

    pub(crate) fn set_throw_on_api_failure(&mut self, flag: Option<bool>) {
        self.throw_on_api_failure = flag;
    }

    pub(crate) fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    pub(crate) fn set_max_retries(&mut self, retries: Option<usize>) {
        self.max_retries = retries;
    }
}

/// Trim whitespace and trailing slashes so `{endpoint}/token` never doubles a slash.
fn normalize_endpoint(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

fn validate_timeout(timeout: Duration) -> Result<(), ConfigError> {
    let secs = timeout.as_secs();
    if secs == 0 {
        return Err(ConfigError::InvalidTimeout {
            message: "timeout must be greater than 0 seconds".to_string(),
        });
    }
    if secs > MAX_TIMEOUT_SECS {
        return Err(ConfigError::InvalidTimeout {
            message: format!(
                "timeout exceeds maximum allowed value of {} seconds",
                MAX_TIMEOUT_SECS
            ),
        });
    }
    Ok(())
}
