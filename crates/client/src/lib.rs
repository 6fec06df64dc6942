//! Authenticated client for the facility-management HTTP API.
//!
//! Every request goes through an [`AuthenticatedTransport`] that obtains a
//! bearer token from `{endpoint}/token`, caches it until it expires, and
//! attaches it as `Authorization: Bearer`. Configuration can be replaced at
//! runtime; credential changes discard the token, proxy changes rebuild the
//! HTTP client.

mod auth;
pub mod client;
pub mod endpoints;
pub mod error;
pub mod events;
pub mod metrics;
pub mod transport;

#[cfg(any(feature = "test-utils", test))]
pub mod testing;

pub use auth::{Credentials, Grant, TokenAuthority, TokenStatus};
pub use client::FacilityClient;
pub use client::builder::FacilityClientBuilder;
pub use error::{AuthError, ClientError, Result};
pub use events::AuthEvent;
pub use metrics::{ErrorCategory, MetricsCollector};
pub use transport::{AuthenticatedTransport, Delivery, ProxySelector};

pub use facility_config::{Config, ConfigError, ConfigLoader, ProxyConfig, ProxyRoute};
