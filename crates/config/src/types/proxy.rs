//! Proxy route derivation.
//!
//! Responsibilities:
//! - Turn the proxy settings of a `Config` into a concrete proxy URI.
//! - Attach proxy credentials when a proxy username is configured.
//!
//! Does NOT handle:
//! - Installing the proxy on an HTTP client (see client crate `transport::proxy`).
//!
//! Invariants:
//! - A resolved route never uses the `https` scheme.
//! - A server string without `scheme://` is treated as a plain `http` proxy.

use secrecy::SecretString;
use url::Url;

use super::Config;
use crate::loader::ConfigError;

/// Proxy target derived from a configuration snapshot.
#[derive(Debug, Clone)]
pub struct ProxyRoute {
    uri: Url,
    credentials: Option<(String, SecretString)>,
}

impl ProxyRoute {
    /// Derive the proxy route for `config`.
    ///
    /// Returns `Ok(None)` when no proxy server is configured. A server string
    /// that already embeds a port is used verbatim; otherwise the port from
    /// [`Config::resolve_proxy_port`] is appended.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::SecureProxy`] for `https` proxies and
    /// [`ConfigError::InvalidProxy`] when the address cannot be parsed.
    pub fn resolve(config: &Config) -> Result<Option<Self>, ConfigError> {
        let Some(server) = config.proxy.server() else {
            return Ok(None);
        };

        let address = if config.proxy_server_includes_port() {
            server.to_string()
        } else {
            format!("{}:{}", server, config.resolve_proxy_port())
        };
        let address = if address.contains("://") {
            address
        } else {
            format!("http://{address}")
        };

        let uri = Url::parse(&address).map_err(|e| ConfigError::InvalidProxy {
            server: server.to_string(),
            message: e.to_string(),
        })?;
        if uri.scheme() == "https" {
            return Err(ConfigError::SecureProxy(server.to_string()));
        }

        let credentials = config
            .proxy
            .username
            .as_deref()
            .map(str::trim)
            .filter(|user| !user.is_empty())
            .map(|user| {
                let password = config
                    .proxy
                    .password
                    .clone()
                    .unwrap_or_else(|| SecretString::new(String::new().into()));
                (user.to_string(), password)
            });

        tracing::debug!(proxy = %uri, authenticated = credentials.is_some(), "Resolved proxy route");

        Ok(Some(Self { uri, credentials }))
    }

    /// The proxy URI (scheme, host and port).
    pub fn uri(&self) -> &Url {
        &self.uri
    }

    /// Proxy username and password, if a proxy username was configured.
    pub fn credentials(&self) -> Option<(&str, &SecretString)> {
        self.credentials
            .as_ref()
            .map(|(user, password)| (user.as_str(), password))
    }
}
