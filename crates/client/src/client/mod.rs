//! Facility API client.
//!
//! [`FacilityClient`] wraps the shared [`AuthenticatedTransport`] and adds
//! the request-level policies on top of it.
//!
//! # Submodules
//! - [`builder`]: Client construction and configuration
//!
//! # What this module does NOT handle:
//! - Token storage and exchange (delegated to `TokenAuthority` in `auth.rs`)
//! - Header decoration and proxying (delegated to [`crate::transport`])
//!
//! # Invariants
//! - HTTP 429 is retried with exponential backoff up to `max_retries` times
//! - A 401 on a request that carried a bearer token drops the token and the
//!   request is retried once with a fresh one
//! - `throw_on_auth_failure` turns an implicit token exchange failure during
//!   the call into `ClientError::AuthFailed`; otherwise the server's response
//!   is returned
//! - `throw_on_api_failure` turns a non-2xx response into `ClientError::ApiError`

pub mod builder;

use std::sync::Arc;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use facility_config::Config;

use crate::auth::TokenStatus;
use crate::endpoints::{api_error, backoff_delay};
use crate::error::{ClientError, Result};
use crate::events::AuthEvent;
use crate::metrics::MetricsCollector;
use crate::transport::AuthenticatedTransport;

use builder::FacilityClientBuilder;

/// Client for the facility-management API.
///
/// Cheap to clone; clones share the transport, token and configuration.
#[derive(Debug, Clone)]
pub struct FacilityClient {
    pub(crate) transport: Arc<AuthenticatedTransport>,
    pub(crate) metrics: Option<MetricsCollector>,
}

impl FacilityClient {
    /// Create a new client builder.
    pub fn builder() -> FacilityClientBuilder {
        FacilityClientBuilder::new()
    }

    /// Create a client for `config` without metrics.
    pub fn new(config: Config) -> Result<Self> {
        Self::builder().config(config).build()
    }

    /// The shared transport, for callers that build their own requests.
    pub fn transport(&self) -> &Arc<AuthenticatedTransport> {
        &self.transport
    }

    /// The configuration currently in effect.
    pub fn config(&self) -> Arc<Config> {
        self.transport.config()
    }

    /// Replace the configuration. See [`AuthenticatedTransport::set_config`].
    pub fn set_config(&self, config: Config) -> Result<()> {
        self.transport.set_config(config)
    }

    /// Subscribe to authentication events.
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.transport.subscribe()
    }

    /// True iff a non-expired token is cached.
    pub fn is_authenticated(&self) -> bool {
        self.transport.is_authenticated()
    }

    pub fn token_status(&self) -> TokenStatus {
        self.transport.token_status()
    }

    /// Exchange credentials for a new token now.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::AuthFailed` with the server's description if the
    /// exchange fails, or `ClientError::Cancelled` if `cancel` fires first.
    pub async fn refresh_token(&self, cancel: Option<CancellationToken>) -> Result<()> {
        self.transport.refresh_token(cancel).await?;
        Ok(())
    }

    /// Start a request for `path`, relative to the configured endpoint.
    pub fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        self.transport.request(method, path)
    }

    /// Send a request with the retry and failure policies applied.
    ///
    /// A request whose body cannot be cloned (a stream) is sent once: a 429
    /// or 401 on it is handed back like any other response.
    pub async fn execute(&self, builder: RequestBuilder) -> Result<Response> {
        let config = self.transport.config();
        let max_retries = config.max_retries;
        let mut request = builder.build()?;
        let mut rate_limited = 0usize;
        let mut reauthenticated = false;

        loop {
            let template = request.try_clone();
            if template.is_none() {
                debug!("Request cannot be cloned, single attempt only");
            }
            let endpoint = request.url().path().to_string();
            let method = request.method().to_string();

            let delivery = self.transport.deliver(request, None).await?;

            if config.throw_on_auth_failure
                && let Some(error) = delivery.auth_failure
            {
                let error = ClientError::from(error);
                self.record_error(&endpoint, &method, &error);
                return Err(error);
            }

            let status = delivery.response.status();
            if ClientError::is_retryable_status(status.as_u16())
                && let Some(retry) = template
            {
                if rate_limited < max_retries {
                    let delay = backoff_delay(rate_limited);
                    rate_limited += 1;
                    debug!(
                        attempt = rate_limited,
                        max_retries,
                        backoff_secs = delay.as_secs(),
                        "Rate limited (HTTP 429), retrying with exponential backoff"
                    );
                    if let Some(metrics) = &self.metrics {
                        metrics.record_retry(&endpoint, &method, rate_limited);
                    }
                    tokio::time::sleep(delay).await;
                    request = retry;
                    continue;
                }

                debug!(
                    attempts = rate_limited + 1,
                    "Max retries exhausted for rate-limited request"
                );
                let error = ClientError::MaxRetriesExceeded(max_retries + 1);
                self.record_error(&endpoint, &method, &error);
                return Err(error);
            }

            if status == StatusCode::UNAUTHORIZED
                && delivery.authenticated
                && !reauthenticated
                && let Some(retry) = template
            {
                debug!(endpoint = %endpoint, "Bearer token rejected, re-authenticating once");
                self.transport.invalidate_token();
                reauthenticated = true;
                request = retry;
                continue;
            }

            if !status.is_success() && config.throw_on_api_failure {
                let error = api_error(delivery.response).await;
                self.record_error(&endpoint, &method, &error);
                return Err(error);
            }

            return Ok(delivery.response);
        }
    }

    /// `GET path` and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.execute(self.request(Method::GET, path)?).await?;
        decode_json(response).await
    }

    /// `POST path` with a JSON body and decode the JSON response.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let builder = self.request(Method::POST, path)?.json(body);
        let response = self.execute(builder).await?;
        decode_json(response).await
    }

    /// `DELETE path`, discarding the response body.
    ///
    /// Non-2xx responses are errors here regardless of `throw_on_api_failure`.
    pub async fn delete(&self, path: &str) -> Result<()> {
        let response = self.execute(self.request(Method::DELETE, path)?).await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(api_error(response).await)
        }
    }

    fn record_error(&self, endpoint: &str, method: &str, error: &ClientError) {
        if let Some(metrics) = &self.metrics {
            metrics.record_client_error(endpoint, method, error);
        }
    }
}

/// Decode a JSON body, turning non-2xx responses into `ApiError` first.
async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    if !response.status().is_success() {
        return Err(api_error(response).await);
    }

    let url = response.url().to_string();
    let body = response.text().await?;
    serde_json::from_str(&body)
        .map_err(|e| ClientError::InvalidResponse(format!("{url}: {e}")))
}
