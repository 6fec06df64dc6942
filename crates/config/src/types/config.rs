//! The configuration snapshot for the facility API client.
//!
//! Responsibilities:
//! - Define the `Config` value object and its proxy settings.
//! - Validate the credential invariant and the endpoint.
//! - Detect authentication-relevant and proxy-relevant changes between snapshots.
//! - Derive the proxy port from the endpoint scheme when none is configured.
//!
//! Does NOT handle:
//! - Loading values from env/files (see `loader` module).
//! - Building the proxy URI (see `proxy.rs`).
//!
//! Invariants:
//! - A valid config has a non-blank endpoint and either a username/password
//!   pair or a trusted token.
//! - `Clone` copies every field, proxy settings included.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{duration_seconds, secret_string};
use crate::constants::{
    DEFAULT_MAX_RETRIES, DEFAULT_PLAIN_PROXY_PORT, DEFAULT_SECURE_PROXY_PORT,
    DEFAULT_TIMEOUT_SECS,
};
use crate::loader::ConfigError;

/// Upstream proxy settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Proxy host, optionally with scheme and port (e.g. `myproxy.local:9000`)
    #[serde(default)]
    pub server: Option<String>,
    /// Explicit proxy port; 0 means derive it from the endpoint scheme
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, with = "secret_string")]
    pub password: Option<SecretString>,
}

impl ProxyConfig {
    /// Returns the server string if it is present and not blank.
    pub fn server(&self) -> Option<&str> {
        self.server.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

/// Connection, credential and proxy settings in effect for one client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the facility API (e.g. https://facility.example.com/api)
    pub endpoint: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, with = "secret_string")]
    pub password: Option<SecretString>,
    /// Long-lived credential used in place of a username/password pair
    #[serde(default, with = "secret_string")]
    pub trusted_token: Option<SecretString>,
    #[serde(default)]
    pub proxy: ProxyConfig,
    /// Request gzip-compressed responses and decompress them transparently
    #[serde(default)]
    pub use_compression: bool,
    /// Sent as `X-Application-Name` on every request when set
    #[serde(default)]
    pub application_name: Option<String>,
    /// Consumed by the high-level client: turn auth failures into errors
    #[serde(default)]
    pub throw_on_auth_failure: bool,
    /// Consumed by the high-level client: turn non-2xx responses into errors
    #[serde(default)]
    pub throw_on_api_failure: bool,
    /// Request timeout (serialized as seconds)
    #[serde(with = "duration_seconds", default = "default_timeout")]
    pub timeout: Duration,
    /// Maximum retries for rate-limited (HTTP 429) requests
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
}

fn default_timeout() -> Duration {
    Duration::from_secs(DEFAULT_TIMEOUT_SECS)
}

fn default_max_retries() -> usize {
    DEFAULT_MAX_RETRIES
}

fn non_blank(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

fn secret_non_blank(value: Option<&SecretString>) -> bool {
    value.is_some_and(|v| !v.expose_secret().trim().is_empty())
}

fn secret_eq(a: Option<&SecretString>, b: Option<&SecretString>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.expose_secret() == b.expose_secret(),
        _ => false,
    }
}

impl Config {
    /// Create a configuration for `endpoint` with no credentials and default behavior.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            username: None,
            password: None,
            trusted_token: None,
            proxy: ProxyConfig::default(),
            use_compression: false,
            application_name: None,
            throw_on_auth_failure: false,
            throw_on_api_failure: false,
            timeout: default_timeout(),
            max_retries: default_max_retries(),
        }
    }

    /// Create a configuration that authenticates with a username/password pair.
    pub fn with_credentials(
        endpoint: impl Into<String>,
        username: impl Into<String>,
        password: SecretString,
    ) -> Self {
        let mut config = Self::new(endpoint);
        config.username = Some(username.into());
        config.password = Some(password);
        config
    }

    /// Create a configuration that authenticates with a trusted token.
    pub fn with_trusted_token(endpoint: impl Into<String>, token: SecretString) -> Self {
        let mut config = Self::new(endpoint);
        config.trusted_token = Some(token);
        config
    }

    /// Whether a non-blank username is configured.
    ///
    /// Determines the grant type: password grant with a username, trusted grant without.
    pub fn has_username(&self) -> bool {
        non_blank(self.username.as_deref())
    }

    /// Check the endpoint and the credential invariant without mutating anything.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::MissingEndpoint);
        }

        let has_password_pair = self.has_username() && secret_non_blank(self.password.as_ref());
        if has_password_pair || secret_non_blank(self.trusted_token.as_ref()) {
            return Ok(());
        }

        if self.has_username() {
            Err(ConfigError::InvalidCredentials(
                "a password is required when a username is set".to_string(),
            ))
        } else {
            Err(ConfigError::InvalidCredentials(
                "either a username/password pair or a trusted token is required".to_string(),
            ))
        }
    }

    /// True if `other` would authenticate differently from `self`.
    ///
    /// Compares endpoint, username, password and trusted token.
    pub fn authentication_changed(&self, other: &Config) -> bool {
        self.endpoint != other.endpoint
            || self.username != other.username
            || !secret_eq(self.password.as_ref(), other.password.as_ref())
            || !secret_eq(self.trusted_token.as_ref(), other.trusted_token.as_ref())
    }

    /// True if any proxy setting (server, port, username, password) differs.
    pub fn proxy_changed(&self, other: &Config) -> bool {
        self.proxy.server != other.proxy.server
            || self.proxy.port != other.proxy.port
            || self.proxy.username != other.proxy.username
            || !secret_eq(self.proxy.password.as_ref(), other.proxy.password.as_ref())
    }

    /// True if settings baked into the HTTP client (other than the proxy) differ.
    pub fn transport_changed(&self, other: &Config) -> bool {
        self.use_compression != other.use_compression
            || self.application_name != other.application_name
            || self.timeout != other.timeout
    }

    /// Proxy port to use when the server string does not carry one.
    ///
    /// An explicit non-zero port wins. Otherwise the endpoint scheme decides:
    /// 443 for `https`, 80 for anything else, and 443 when the endpoint does
    /// not parse.
    pub fn resolve_proxy_port(&self) -> u16 {
        if self.proxy.port != 0 {
            return self.proxy.port;
        }

        match url::Url::parse(self.endpoint.trim()) {
            Ok(endpoint) if endpoint.scheme() == "https" => DEFAULT_SECURE_PROXY_PORT,
            Ok(_) => DEFAULT_PLAIN_PROXY_PORT,
            Err(_) => DEFAULT_SECURE_PROXY_PORT,
        }
    }

    /// True if the last `:`-delimited segment of the proxy server is an integer.
    pub fn proxy_server_includes_port(&self) -> bool {
        self.proxy
            .server()
            .and_then(|server| server.rsplit_once(':'))
            .is_some_and(|(_, port)| port.parse::<u64>().is_ok())
    }
}
