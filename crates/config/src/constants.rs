//! Centralized constants for the facility client workspace.
//!
//! This module contains default values and environment variable names used
//! across crates to avoid magic number duplication.

// =============================================================================
// Connection & Timeout Defaults
// =============================================================================

/// Default HTTP request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum allowed request timeout in seconds (1 hour).
pub const MAX_TIMEOUT_SECS: u64 = 3600;

/// Default maximum number of HTTP redirects to follow.
pub const DEFAULT_MAX_REDIRECTS: usize = 5;

/// Default maximum number of retries for rate-limited requests.
pub const DEFAULT_MAX_RETRIES: usize = 3;

/// Upper bound for the configurable retry count.
pub const MAX_MAX_RETRIES: usize = 10;

// =============================================================================
// Proxy Defaults
// =============================================================================

/// Proxy port used when the API endpoint is served over TLS (or cannot be parsed).
pub const DEFAULT_SECURE_PROXY_PORT: u16 = 443;

/// Proxy port used when the API endpoint is plain HTTP.
pub const DEFAULT_PLAIN_PROXY_PORT: u16 = 80;

// =============================================================================
// Environment Variables
// =============================================================================

pub const ENV_ENDPOINT: &str = "FACILITY_ENDPOINT";
pub const ENV_USERNAME: &str = "FACILITY_USERNAME";
/// Base64-encoded password.
pub const ENV_PASSWORD: &str = "FACILITY_PASSWORD";
pub const ENV_TRUSTED_TOKEN: &str = "FACILITY_TRUSTED_TOKEN";
pub const ENV_PROXY_SERVER: &str = "FACILITY_PROXY_SERVER";
pub const ENV_PROXY_PORT: &str = "FACILITY_PROXY_PORT";
pub const ENV_PROXY_USERNAME: &str = "FACILITY_PROXY_USERNAME";
pub const ENV_PROXY_PASSWORD: &str = "FACILITY_PROXY_PASSWORD";
pub const ENV_APPLICATION_NAME: &str = "FACILITY_APPLICATION_NAME";
pub const ENV_TIMEOUT: &str = "FACILITY_TIMEOUT";
pub const ENV_MAX_RETRIES: &str = "FACILITY_MAX_RETRIES";

/// Set to `1` or `true` to skip `.env` loading.
pub const ENV_DOTENV_DISABLED: &str = "DOTENV_DISABLED";
