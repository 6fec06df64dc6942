//! Authenticated HTTP transport.
//!
//! Every outgoing request passes through [`AuthenticatedTransport`], which
//! makes sure a bearer token is attached when one can be obtained.
//!
//! # What this module does NOT handle
//! - Retrying on 429 or 401 (see `FacilityClient::execute`)
//! - Interpreting response bodies
//!
//! # Invariants
//! - A configuration replacement is validated and fully prepared before any
//!   state changes; a rejected replacement leaves the transport untouched.
//! - Token exchanges use the same HTTP client (proxy, timeout) as API calls
//!   but never carry an `Authorization` header themselves.
//! - A failed token exchange never blocks the request: it is forwarded
//!   without `Authorization` and the server decides.

mod http_client;
mod proxy;

pub use http_client::{APPLICATION_NAME_HEADER, USER_AGENT};
pub use proxy::ProxySelector;

use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::{Method, Request, RequestBuilder, Response};
use secrecy::ExposeSecret;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use facility_config::{Config, ProxyRoute};

use crate::auth::{Credentials, TokenAuthority, TokenStatus};
use crate::error::{AuthError, ClientError, Result};
use crate::events::{AuthEvent, EVENT_CHANNEL_CAPACITY};
use crate::metrics::MetricsCollector;
use http_client::build_http_client;

/// Everything derived from one configuration snapshot.
#[derive(Debug)]
struct Pipeline {
    config: Arc<Config>,
    proxy: Option<ProxyRoute>,
    http: reqwest::Client,
}

/// Outcome of sending one request through the transport.
#[derive(Debug)]
pub struct Delivery {
    pub response: Response,
    /// True if an `Authorization` header was attached.
    pub authenticated: bool,
    /// The token exchange error, if the request went out without a token
    /// because the exchange failed.
    pub auth_failure: Option<AuthError>,
}

/// HTTP transport that injects bearer tokens.
#[derive(Debug)]
pub struct AuthenticatedTransport {
    authority: TokenAuthority,
    pipeline: RwLock<Arc<Pipeline>>,
    events: broadcast::Sender<AuthEvent>,
    metrics: Option<MetricsCollector>,
}

impl AuthenticatedTransport {
    /// Build a transport for `config`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Config` if the configuration is invalid or the
    /// proxy cannot be resolved.
    pub fn new(config: Config, metrics: Option<MetricsCollector>) -> Result<Self> {
        config.validate()?;
        let proxy = ProxyRoute::resolve(&config)?;
        let http = build_http_client(&config, proxy.as_ref())?;

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let authority = TokenAuthority::new(
            Credentials::from_config(&config),
            events.clone(),
            metrics.clone(),
        );

        Ok(Self {
            authority,
            pipeline: RwLock::new(Arc::new(Pipeline {
                config: Arc::new(config),
                proxy,
                http,
            })),
            events,
            metrics,
        })
    }

    fn pipeline(&self) -> Arc<Pipeline> {
        Arc::clone(&self.pipeline.read())
    }

    /// The configuration currently in effect.
    pub fn config(&self) -> Arc<Config> {
        Arc::clone(&self.pipeline.read().config)
    }

    /// The proxy route currently in effect.
    pub fn proxy_route(&self) -> Option<ProxyRoute> {
        self.pipeline.read().proxy.clone()
    }

    /// Replace the configuration.
    ///
    /// Authentication changes discard the cached token without a network
    /// call; proxy changes recompute the route; proxy or transport changes
    /// rebuild the HTTP client. Requests already in flight finish on the
    /// snapshot they started with.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Config` and leaves all state unchanged if the
    /// new configuration is invalid.
    pub fn set_config(&self, config: Config) -> Result<()> {
        config.validate()?;

        let mut pipeline = self.pipeline.write();
        let previous = &pipeline.config;
        let auth_changed = previous.authentication_changed(&config);
        let proxy_changed = previous.proxy_changed(&config);
        let transport_changed = previous.transport_changed(&config);

        let proxy = if proxy_changed {
            ProxyRoute::resolve(&config)?
        } else {
            pipeline.proxy.clone()
        };
        let http = if proxy_changed || transport_changed {
            build_http_client(&config, proxy.as_ref())?
        } else {
            pipeline.http.clone()
        };

        if auth_changed {
            self.authority.reset(Credentials::from_config(&config));
        }
        if proxy_changed {
            info!(proxy = ?proxy.as_ref().map(|p| p.uri().as_str()), "Proxy settings changed");
        }
        debug!(auth_changed, proxy_changed, transport_changed, "Configuration replaced");

        *pipeline = Arc::new(Pipeline {
            config: Arc::new(config),
            proxy,
            http,
        });
        Ok(())
    }

    /// Subscribe to authentication events.
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    /// True iff a non-expired token is cached.
    pub fn is_authenticated(&self) -> bool {
        self.authority.is_valid()
    }

    pub fn token_status(&self) -> TokenStatus {
        self.authority.status()
    }

    /// Drop the cached token; the next request exchanges credentials again.
    pub fn invalidate_token(&self) {
        self.authority.invalidate();
    }

    /// Exchange credentials for a new token now.
    ///
    /// Joins an exchange already in flight. `cancel` abandons the wait, not
    /// the exchange itself.
    pub async fn refresh_token(
        &self,
        cancel: Option<CancellationToken>,
    ) -> std::result::Result<(), AuthError> {
        let http = self.pipeline().http.clone();
        self.authority.refresh(&http, cancel).await
    }

    /// Start a request for `path`, relative to the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InvalidUrl` if the joined URL does not parse.
    pub fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let pipeline = self.pipeline();
        let url = join_url(&pipeline.config.endpoint, path)?;
        Ok(pipeline.http.request(method, url))
    }

    /// Send `request`, attaching a bearer token when one can be obtained.
    pub async fn send(&self, request: Request) -> Result<Response> {
        self.deliver(request, None).await.map(|d| d.response)
    }

    /// Send `request` and report how authentication went.
    ///
    /// If no valid token is cached, an exchange is run (or joined) first. If
    /// that fails, an `AuthenticationFailed` event is published and the
    /// request is forwarded without `Authorization`.
    pub async fn deliver(
        &self,
        mut request: Request,
        cancel: Option<CancellationToken>,
    ) -> Result<Delivery> {
        let pipeline = self.pipeline();
        let endpoint = request.url().path().to_string();
        let method = request.method().to_string();

        let (authenticated, auth_failure) =
            match self.authority.ensure_token(&pipeline.http, cancel).await {
                Ok(token) => match bearer_header(token.expose_secret()) {
                    Ok(value) => {
                        request.headers_mut().insert(AUTHORIZATION, value);
                        (true, None)
                    }
                    Err(error) => {
                        self.authority.invalidate();
                        warn!(
                            endpoint = %endpoint,
                            error = %error,
                            "Cached token unusable, sending request without a bearer token"
                        );
                        if let Some(metrics) = &self.metrics {
                            metrics.record_unauthenticated_request(&endpoint);
                        }
                        (false, Some(error))
                    }
                },
                Err(AuthError::Cancelled) => return Err(ClientError::Cancelled),
                Err(error) => {
                    warn!(
                        endpoint = %endpoint,
                        error = %error,
                        "Sending request without a bearer token"
                    );
                    if let Some(metrics) = &self.metrics {
                        metrics.record_unauthenticated_request(&endpoint);
                    }
                    (false, Some(error))
                }
            };

        if let Some(metrics) = &self.metrics {
            metrics.record_request(&endpoint, &method);
        }
        let started = Instant::now();
        let outcome = pipeline.http.execute(request).await;

        if let Some(metrics) = &self.metrics {
            let status = outcome.as_ref().ok().map(|r| r.status().as_u16());
            metrics.record_request_duration(&endpoint, &method, started.elapsed(), status);
        }

        let response = outcome.map_err(|e| {
            let error = ClientError::from(e);
            if let Some(metrics) = &self.metrics {
                metrics.record_client_error(&endpoint, &method, &error);
            }
            error
        })?;

        Ok(Delivery {
            response,
            authenticated,
            auth_failure,
        })
    }
}

/// `Authorization` value for `token`, marked sensitive.
fn bearer_header(token: &str) -> std::result::Result<HeaderValue, AuthError> {
    let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
        AuthError::InvalidResponse("token contains characters not allowed in a header".to_string())
    })?;
    value.set_sensitive(true);
    Ok(value)
}

/// Join `path` onto `endpoint`, keeping any path prefix the endpoint carries.
fn join_url(endpoint: &str, path: &str) -> Result<url::Url> {
    let joined = format!(
        "{}/{}",
        endpoint.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    url::Url::parse(&joined).map_err(|e| ClientError::InvalidUrl(format!("{joined}: {e}")))
}
