//! Configuration management for the facility API client.
//!
//! This crate provides the `Config` snapshot (endpoint, credentials, proxy
//! settings, behavior flags), its change-detection helpers, the proxy route
//! derivation, and loaders for environment variables, `.env` and JSON files.

pub mod constants;
mod loader;
pub mod types;

pub use loader::{ConfigError, ConfigLoader, env_var_or_none};
pub use types::{Config, ProxyConfig, ProxyRoute};

/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
pub(crate) mod test_util {
    use std::sync::{Mutex, OnceLock};

    pub fn global_test_lock() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }
}
