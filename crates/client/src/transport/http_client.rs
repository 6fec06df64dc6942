//! HTTP client construction from a configuration snapshot.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::redirect::Policy;

use facility_config::constants::DEFAULT_MAX_REDIRECTS;
use facility_config::{Config, ConfigError, ProxyRoute};

use super::proxy::attach_proxy;
use crate::error::{ClientError, Result};

/// Header naming the calling application on every request.
pub const APPLICATION_NAME_HEADER: HeaderName = HeaderName::from_static("x-application-name");

/// `User-Agent` sent on every request.
pub const USER_AGENT: &str = concat!("facility-client/", env!("CARGO_PKG_VERSION"));

/// Build the underlying `reqwest::Client` for `config`.
///
/// Bakes in the timeout, redirect limit, compression, application name
/// header and proxy. Bearer tokens are never part of the client; they are
/// attached per request.
pub(crate) fn build_http_client(
    config: &Config,
    proxy: Option<&ProxyRoute>,
) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    if let Some(name) = config
        .application_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
    {
        let value = HeaderValue::from_str(name).map_err(|_| {
            ClientError::Config(ConfigError::InvalidValue {
                var: "application_name".to_string(),
                message: "must be a valid HTTP header value".to_string(),
            })
        })?;
        headers.insert(APPLICATION_NAME_HEADER, value);
    }

    let builder = reqwest::Client::builder()
        .timeout(config.timeout)
        .redirect(Policy::limited(DEFAULT_MAX_REDIRECTS))
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .gzip(config.use_compression);

    Ok(attach_proxy(builder, proxy.cloned()).build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn config() -> Config {
        Config::with_trusted_token(
            "https://f.example.com",
            SecretString::new("t".to_string().into()),
        )
    }

    #[test]
    fn test_build_with_application_name() {
        let mut config = config();
        config.application_name = Some("dispatch-board".to_string());
        config.use_compression = true;
        assert!(build_http_client(&config, None).is_ok());
    }

    #[test]
    fn test_invalid_application_name_is_config_error() {
        let mut config = config();
        config.application_name = Some("line\nbreak".to_string());
        let err = build_http_client(&config, None).unwrap_err();
        assert!(matches!(err, ClientError::Config(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_user_agent_carries_version() {
        assert!(USER_AGENT.starts_with("facility-client/"));
        assert!(USER_AGENT.len() > "facility-client/".len());
    }
}
