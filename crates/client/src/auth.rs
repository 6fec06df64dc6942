//! Bearer token lifecycle.
//!
//! Responsibilities:
//! - Derive token-request credentials from a `Config` snapshot.
//! - Cache the current bearer token with its expiry.
//! - Run at most one token exchange at a time; concurrent callers join it.
//!
//! Does NOT handle:
//! - Attaching the token to outgoing requests (see `transport`).
//! - Retrying API calls after a 401 (see `client`).
//!
//! Invariants:
//! - A token is valid iff one is cached and `now < expires_at`.
//! - `reset` discards the token and abandons any in-flight exchange without
//!   a network call; a late result from the abandoned exchange is ignored.
//! - The state lock is never held across an `.await`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use facility_config::Config;

use crate::endpoints::request_token;
use crate::error::AuthError;
use crate::events::AuthEvent;
use crate::metrics::MetricsCollector;

/// How a token is obtained from the token endpoint.
#[derive(Debug, Clone)]
pub enum Grant {
    /// Username/password exchange (`grant_type=password`).
    Password {
        username: String,
        password: SecretString,
    },
    /// Pre-shared trusted token exchange (`grant_type=trusted`).
    Trusted { token: SecretString },
}

/// Everything a token exchange needs, captured from one `Config` snapshot.
#[derive(Debug, Clone)]
pub struct Credentials {
    endpoint: String,
    grant: Grant,
}

impl Credentials {
    /// Capture the credentials of `config`.
    ///
    /// A username together with a non-blank password selects the password
    /// grant; anything else falls back to the trusted token.
    pub fn from_config(config: &Config) -> Self {
        let password = config
            .password
            .as_ref()
            .filter(|p| !p.expose_secret().trim().is_empty());

        let grant = match (config.username.as_deref().map(str::trim), password) {
            (Some(username), Some(password)) if !username.is_empty() => Grant::Password {
                username: username.to_string(),
                password: password.clone(),
            },
            _ => Grant::Trusted {
                token: config
                    .trusted_token
                    .clone()
                    .unwrap_or_else(|| SecretString::new(String::new().into())),
            },
        };

        Self {
            endpoint: config.endpoint.clone(),
            grant,
        }
    }

    /// `{endpoint}/token`.
    pub fn token_url(&self) -> String {
        format!("{}/token", self.endpoint.trim_end_matches('/'))
    }

    pub fn grant(&self) -> &Grant {
        &self.grant
    }
}

/// Snapshot of the token state for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenStatus {
    /// True if a token is cached and not yet expired.
    pub valid: bool,
    /// Wall-clock expiry of the cached token.
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
struct IssuedToken {
    value: SecretString,
    expires_at: Instant,
    expires_at_utc: Option<DateTime<Utc>>,
}

impl IssuedToken {
    fn new(value: SecretString, expires_in: u64) -> Self {
        let now = Instant::now();
        // Lifetimes beyond what `Instant` can represent are clamped to a century.
        let expires_at = now
            .checked_add(Duration::from_secs(expires_in))
            .unwrap_or_else(|| now + Duration::from_secs(100 * 365 * 24 * 60 * 60));
        let expires_at_utc = i64::try_from(expires_in)
            .ok()
            .and_then(chrono::TimeDelta::try_seconds)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime));

        Self {
            value,
            expires_at,
            expires_at_utc,
        }
    }

    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

type RefreshFuture = Shared<BoxFuture<'static, Result<SecretString, AuthError>>>;

struct AuthorityState {
    credentials: Credentials,
    token: Option<IssuedToken>,
    /// Bumped whenever credentials change; an exchange only applies its
    /// result if the generation it started under is still current.
    generation: u64,
    in_flight: Option<RefreshFuture>,
}

/// Owns the bearer token and the single in-flight exchange.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct TokenAuthority {
    state: Arc<Mutex<AuthorityState>>,
    events: broadcast::Sender<AuthEvent>,
    metrics: Option<MetricsCollector>,
}

impl std::fmt::Debug for TokenAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("TokenAuthority")
            .field("credentials", &state.credentials)
            .field("has_token", &state.token.is_some())
            .field("generation", &state.generation)
            .field("refreshing", &state.in_flight.is_some())
            .finish()
    }
}

impl TokenAuthority {
    pub fn new(
        credentials: Credentials,
        events: broadcast::Sender<AuthEvent>,
        metrics: Option<MetricsCollector>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(AuthorityState {
                credentials,
                token: None,
                generation: 0,
                in_flight: None,
            })),
            events,
            metrics,
        }
    }

    /// True iff a token is cached and has not expired.
    pub fn is_valid(&self) -> bool {
        self.state
            .lock()
            .token
            .as_ref()
            .is_some_and(IssuedToken::is_valid)
    }

    pub fn status(&self) -> TokenStatus {
        let state = self.state.lock();
        match &state.token {
            Some(token) => TokenStatus {
                valid: token.is_valid(),
                expires_at: token.expires_at_utc,
            },
            None => TokenStatus {
                valid: false,
                expires_at: None,
            },
        }
    }

    /// The cached token, if it is still valid.
    pub fn current_token(&self) -> Option<SecretString> {
        self.state
            .lock()
            .token
            .as_ref()
            .filter(|token| token.is_valid())
            .map(|token| token.value.clone())
    }

    /// Return a valid token, exchanging credentials first if needed.
    ///
    /// Joins an exchange already in flight instead of starting a second one.
    pub async fn ensure_token(
        &self,
        http: &reqwest::Client,
        cancel: Option<CancellationToken>,
    ) -> Result<SecretString, AuthError> {
        if let Some(token) = self.current_token() {
            return Ok(token);
        }
        let exchange = self.join_or_start(http, true);
        await_exchange(exchange, cancel).await
    }

    /// Exchange credentials for a new token even if the cached one is valid.
    ///
    /// Joins an exchange already in flight. On failure the cached token is
    /// cleared and the error returned.
    pub async fn refresh(
        &self,
        http: &reqwest::Client,
        cancel: Option<CancellationToken>,
    ) -> Result<(), AuthError> {
        let exchange = self.join_or_start(http, false);
        await_exchange(exchange, cancel).await.map(|_| ())
    }

    /// Replace the credentials and discard the cached token.
    ///
    /// An exchange in flight for the old credentials is abandoned: its waiters
    /// still receive its outcome, but the result is not cached.
    pub fn reset(&self, credentials: Credentials) {
        {
            let mut state = self.state.lock();
            state.credentials = credentials;
            state.token = None;
            state.generation = state.generation.wrapping_add(1);
            state.in_flight = None;
        }
        info!("Credentials changed, cached token discarded");
        let _ = self.events.send(AuthEvent::CredentialsChanged);
    }

    /// Drop the cached token so the next request exchanges credentials again.
    pub fn invalidate(&self) {
        if self.state.lock().token.take().is_some() {
            debug!("Cached token invalidated");
        }
    }

    /// Join the in-flight exchange or start one.
    ///
    /// With `reuse_valid`, a token cached by an exchange that finished after
    /// the caller's own validity check is returned instead.
    fn join_or_start(&self, http: &reqwest::Client, reuse_valid: bool) -> RefreshFuture {
        let mut state = self.state.lock();
        if reuse_valid
            && let Some(token) = state.token.as_ref().filter(|token| token.is_valid())
        {
            return futures::future::ready(Ok(token.value.clone()))
                .boxed()
                .shared();
        }
        if let Some(in_flight) = &state.in_flight {
            debug!("Joining in-flight token exchange");
            return in_flight.clone();
        }

        let exchange = run_exchange(
            Arc::clone(&self.state),
            state.generation,
            state.credentials.clone(),
            http.clone(),
            self.events.clone(),
            self.metrics.clone(),
        )
        .boxed()
        .shared();
        state.in_flight = Some(exchange.clone());
        exchange
    }
}

async fn await_exchange(
    exchange: RefreshFuture,
    cancel: Option<CancellationToken>,
) -> Result<SecretString, AuthError> {
    match cancel {
        Some(cancel) => tokio::select! {
            _ = cancel.cancelled() => Err(AuthError::Cancelled),
            outcome = exchange => outcome,
        },
        None => exchange.await,
    }
}

async fn run_exchange(
    state: Arc<Mutex<AuthorityState>>,
    generation: u64,
    credentials: Credentials,
    http: reqwest::Client,
    events: broadcast::Sender<AuthEvent>,
    metrics: Option<MetricsCollector>,
) -> Result<SecretString, AuthError> {
    let started = std::time::Instant::now();
    let outcome = request_token(&http, &credentials).await;

    if let Some(metrics) = &metrics {
        let label = if outcome.is_ok() { "success" } else { "failure" };
        metrics.record_token_exchange(label, started.elapsed());
    }

    let current = complete_exchange(&state, generation, &outcome);

    match &outcome {
        Ok(_) if current => {
            let expires_at = state
                .lock()
                .token
                .as_ref()
                .and_then(|token| token.expires_at_utc);
            let _ = events.send(AuthEvent::Authenticated { expires_at });
        }
        Ok(_) => debug!("Token exchange finished for superseded credentials, result ignored"),
        Err(error) => {
            warn!(error = %error, "Token exchange failed");
            if current {
                let _ = events.send(AuthEvent::AuthenticationFailed {
                    description: error.description(),
                    error: error.clone(),
                });
            }
        }
    }

    outcome.map(|grant| grant.access_token)
}

/// Store the outcome if `generation` is still current. Returns whether it was.
fn complete_exchange(
    state: &Mutex<AuthorityState>,
    generation: u64,
    outcome: &Result<crate::endpoints::TokenGrant, AuthError>,
) -> bool {
    let mut state = state.lock();
    if state.generation != generation {
        return false;
    }

    state.in_flight = None;
    match outcome {
        Ok(grant) => {
            info!(expires_in = grant.expires_in, "Obtained bearer token");
            state.token = Some(IssuedToken::new(
                grant.access_token.clone(),
                grant.expires_in,
            ));
        }
        Err(_) => state.token = None,
    }
    true
}
