//! Installing a proxy on the HTTP client.

use reqwest::ClientBuilder;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use facility_config::ProxyRoute;

/// Supplies the proxy target for a destination URI.
pub trait ProxySelector: Send + Sync + 'static {
    /// Proxy to use for `destination`, or `None` to connect directly.
    fn proxy_for(&self, destination: &Url) -> Option<Url>;

    /// Username and password sent to the proxy, if any.
    fn credentials(&self) -> Option<(&str, &SecretString)> {
        None
    }
}

/// A resolved route sends every destination through the same proxy.
impl ProxySelector for ProxyRoute {
    fn proxy_for(&self, _destination: &Url) -> Option<Url> {
        Some(self.uri().clone())
    }

    fn credentials(&self) -> Option<(&str, &SecretString)> {
        ProxyRoute::credentials(self)
    }
}

/// Route requests of `builder` through `selector`, or through no proxy at all.
///
/// With `None` the system proxy environment (`HTTP_PROXY` and friends) is
/// ignored as well, so an empty proxy server means a direct connection.
pub(crate) fn attach_proxy<S: ProxySelector>(
    builder: ClientBuilder,
    selector: Option<S>,
) -> ClientBuilder {
    let Some(selector) = selector else {
        return builder.no_proxy();
    };

    let credentials = selector
        .credentials()
        .map(|(user, password)| (user.to_string(), password.expose_secret().to_string()));

    let mut proxy = reqwest::Proxy::custom(move |destination| selector.proxy_for(destination));
    if let Some((username, password)) = credentials {
        proxy = proxy.basic_auth(&username, &password);
    }
    builder.proxy(proxy)
}
