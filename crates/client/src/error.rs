//! Error types for the facility client.

use std::sync::Arc;
use thiserror::Error;

use facility_config::ConfigError;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur during facility client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Configuration rejected at construction or replacement.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Authentication failed (only raised when `throw_on_auth_failure` is set
    /// or when a refresh is requested explicitly).
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// HTTP transport error (network, TLS, proxy, timeout).
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Non-success response from the API.
    #[error("API error ({status}) at {url}: {message}")]
    ApiError {
        status: u16,
        url: String,
        message: String,
    },

    /// Response body did not have the expected shape.
    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    /// Maximum retries exceeded.
    #[error("Maximum retries exceeded ({0} attempts)")]
    MaxRetriesExceeded(usize),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The caller cancelled the operation.
    #[error("Operation cancelled")]
    Cancelled,
}

impl ClientError {
    /// Check if an HTTP status code is retryable.
    ///
    /// Only 429 (Too Many Requests) is retried; everything else is returned as-is.
    pub fn is_retryable_status(status: u16) -> bool {
        status == 429
    }

    /// Check if this error indicates authentication failure.
    pub fn is_auth_error(&self) -> bool {
        match self {
            Self::AuthFailed(_) => true,
            Self::ApiError { status, .. } => *status == 401,
            _ => false,
        }
    }
}

impl From<AuthError> for ClientError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::Cancelled => ClientError::Cancelled,
            other => ClientError::AuthFailed(other.description()),
        }
    }
}

/// Errors produced by a token exchange.
///
/// `Clone` so one in-flight exchange can hand the same outcome to every
/// caller waiting on it.
#[derive(Error, Debug, Clone)]
pub enum AuthError {
    /// The token endpoint rejected the credentials.
    #[error("Token request rejected ({status}): {description}")]
    Rejected { status: u16, description: String },

    /// The token endpoint answered with a body we could not interpret.
    #[error("Invalid token response: {0}")]
    InvalidResponse(String),

    /// The exchange never produced a response.
    #[error("Token request failed: {0}")]
    Transport(Arc<reqwest::Error>),

    /// The caller stopped waiting for the exchange.
    #[error("Token request cancelled")]
    Cancelled,
}

impl AuthError {
    /// Human-readable description carried by authentication-failed events.
    ///
    /// For a rejection this is the server's `error_description` verbatim.
    pub fn description(&self) -> String {
        match self {
            Self::Rejected { description, .. } => description.clone(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        AuthError::Transport(Arc::new(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retryable_status() {
        assert!(ClientError::is_retryable_status(429));
        assert!(!ClientError::is_retryable_status(401));
        assert!(!ClientError::is_retryable_status(500));
        assert!(!ClientError::is_retryable_status(503));
        assert!(!ClientError::is_retryable_status(200));
    }

    #[test]
    fn test_error_is_auth_error() {
        assert!(ClientError::AuthFailed("test".to_string()).is_auth_error());
        assert!(
            ClientError::ApiError {
                status: 401,
                url: "https://x/token".to_string(),
                message: "nope".to_string(),
            }
            .is_auth_error()
        );
        assert!(!ClientError::MaxRetriesExceeded(3).is_auth_error());
    }

    #[test]
    fn test_rejection_description_is_server_text() {
        let err = AuthError::Rejected {
            status: 401,
            description: "bad credentials".to_string(),
        };
        assert_eq!(err.description(), "bad credentials");
        assert!(matches!(
            ClientError::from(err),
            ClientError::AuthFailed(ref msg) if msg == "bad credentials"
        ));
    }

    #[test]
    fn test_cancelled_exchange_maps_to_cancelled() {
        assert!(matches!(
            ClientError::from(AuthError::Cancelled),
            ClientError::Cancelled
        ));
    }

    #[test]
    fn test_parse_error_is_distinct_from_rejection() {
        let err = AuthError::InvalidResponse("missing access_token".to_string());
        assert!(!matches!(err, AuthError::Rejected { .. }));
        assert!(err.description().contains("missing access_token"));
    }
}
