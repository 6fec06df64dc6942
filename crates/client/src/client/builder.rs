//! Client builder for constructing [`FacilityClient`] instances.
//!
//! This module is responsible for:
//! - Providing a fluent builder API over a [`Config`] snapshot
//! - Loading the configuration from the environment when none is supplied
//! - Attaching an optional [`MetricsCollector`]
//!
//! # What this module does NOT handle:
//! - Actual API calls (handled by [`FacilityClient`] methods in `mod.rs`)
//! - Token management (handled by `TokenAuthority` in `auth.rs`)
//!
//! # Invariants
//! - `build()` validates the configuration; an invalid one never yields a client

use std::sync::Arc;

use facility_config::{Config, ConfigLoader};

use crate::client::FacilityClient;
use crate::error::Result;
use crate::metrics::MetricsCollector;
use crate::transport::AuthenticatedTransport;

/// Builder for creating a new [`FacilityClient`].
///
/// # Example
///
/// ```rust,ignore
/// use facility_client::FacilityClient;
/// use facility_config::Config;
/// use secrecy::SecretString;
///
/// let client = FacilityClient::builder()
///     .config(Config::with_credentials(
///         "https://facility.example.com",
///         "admin",
///         SecretString::new("hunter2".to_string().into()),
///     ))
///     .metrics(MetricsCollector::new())
///     .build()?;
/// ```
#[derive(Debug, Default)]
pub struct FacilityClientBuilder {
    config: Option<Config>,
    metrics: Option<MetricsCollector>,
}

impl FacilityClientBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `config` instead of loading from the environment.
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Record request and token metrics through `collector`.
    pub fn metrics(mut self, collector: MetricsCollector) -> Self {
        self.metrics = Some(collector);
        self
    }

    /// Build the client.
    ///
    /// Without an explicit configuration, one is loaded from `.env` and the
    /// `FACILITY_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Config` if the configuration cannot be loaded or
    /// is invalid, or `ClientError::HttpError` if the HTTP client cannot be built.
    pub fn build(self) -> Result<FacilityClient> {
        let config = match self.config {
            Some(config) => config,
            None => ConfigLoader::new().load_dotenv()?.from_env()?.build()?,
        };

        let transport = AuthenticatedTransport::new(config, self.metrics.clone())?;
        Ok(FacilityClient {
            transport: Arc::new(transport),
            metrics: self.metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use secrecy::SecretString;

    #[test]
    fn test_build_with_explicit_config() {
        let client = FacilityClientBuilder::new()
            .config(Config::with_trusted_token(
                "https://facility.example.com",
                SecretString::new("t".to_string().into()),
            ))
            .metrics(MetricsCollector::disabled())
            .build()
            .unwrap();
        assert_eq!(client.config().endpoint, "https://facility.example.com");
        assert!(!client.is_authenticated());
    }

    #[test]
    fn test_build_rejects_missing_credentials() {
        let err = FacilityClientBuilder::new()
            .config(Config::new("https://facility.example.com"))
            .build()
            .unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }
}
