//! Authentication lifecycle notifications.
//!
//! Events are published on a `tokio::sync::broadcast` channel. Any number of
//! observers can subscribe; a send with no subscribers is not an error.

use chrono::{DateTime, Utc};

use crate::error::AuthError;

/// Capacity of the authentication event channel.
///
/// A subscriber that falls further behind than this sees `RecvError::Lagged`.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Something observable happened to the authentication state.
#[derive(Debug, Clone)]
pub enum AuthEvent {
    /// A token exchange succeeded.
    Authenticated {
        /// Wall-clock expiry of the new token, if representable.
        expires_at: Option<DateTime<Utc>>,
    },
    /// A token exchange failed. Published once per exchange, not per waiter.
    AuthenticationFailed {
        /// Server-provided `error_description` for rejections, otherwise the
        /// error's display text.
        description: String,
        error: AuthError,
    },
    /// Credentials were replaced; any cached token was discarded.
    CredentialsChanged,
}

impl AuthEvent {
    /// Description of a failure event, `None` for other kinds.
    pub fn failure_description(&self) -> Option<&str> {
        match self {
            Self::AuthenticationFailed { description, .. } => Some(description),
            _ => None,
        }
    }
}
