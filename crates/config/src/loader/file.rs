//! JSON config file loading.
//!
//! Responsibilities:
//! - Read a JSON file whose fields mirror `Config`, every field optional.
//! - Apply file values to a ConfigLoader instance.
//!
//! Does NOT handle:
//! - Environment variable parsing (see env.rs).
//! - Writing configuration back to disk.
//!
//! Invariants:
//! - File settings are applied before environment variables (env vars take precedence).
//! - Read/parse errors carry the path only, never file contents.

use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use super::builder::ConfigLoader;
use super::error::ConfigError;

/// On-disk shape of a configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    endpoint: Option<String>,
    username: Option<String>,
    password: Option<String>,
    trusted_token: Option<String>,
    proxy_server: Option<String>,
    proxy_port: Option<u16>,
    proxy_username: Option<String>,
    proxy_password: Option<String>,
    use_compression: Option<bool>,
    application_name: Option<String>,
    throw_on_auth_failure: Option<bool>,
    throw_on_api_failure: Option<bool>,
    timeout_seconds: Option<u64>,
    max_retries: Option<usize>,
}

fn secret(value: String) -> SecretString {
    SecretString::new(value.into())
}

/// Apply the config file at `path` to the loader.
pub fn apply_file(loader: &mut ConfigLoader, path: &Path) -> Result<(), ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|_| ConfigError::ConfigFileRead {
        path: path.to_path_buf(),
    })?;
    let file: ConfigFile =
        serde_json::from_str(&content).map_err(|_| ConfigError::ConfigFileParse {
            path: path.to_path_buf(),
        })?;

    tracing::debug!(path = %path.display(), "Applying config file");

    if let Some(endpoint) = file.endpoint {
        loader.set_endpoint(Some(endpoint));
    }
    if let Some(username) = file.username {
        loader.set_username(Some(username));
    }
    if let Some(password) = file.password {
        loader.set_password(Some(secret(password)));
    }
    if let Some(token) = file.trusted_token {
        loader.set_trusted_token(Some(secret(token)));
    }
    if let Some(server) = file.proxy_server {
        loader.set_proxy_server(Some(server));
    }
    if let Some(port) = file.proxy_port {
        loader.set_proxy_port(Some(port));
    }
    if let Some(username) = file.proxy_username {
        loader.set_proxy_username(Some(username));
    }
    if let Some(password) = file.proxy_password {
        loader.set_proxy_password(Some(secret(password)));
    }
    if let Some(enabled) = file.use_compression {
        loader.set_use_compression(Some(enabled));
    }
    if let Some(name) = file.application_name {
        loader.set_application_name(Some(name));
    }
    if let Some(flag) = file.throw_on_auth_failure {
        loader.set_throw_on_auth_failure(Some(flag));
    }
    if let Some(flag) = file.throw_on_api_failure {
        loader.set_throw_on_api_failure(Some(flag));
    }
    if let Some(secs) = file.timeout_seconds {
        loader.set_timeout(Some(Duration::from_secs(secs)));
    }
    if let Some(retries) = file.max_retries {
        loader.set_max_retries(Some(retries));
    }
    Ok(())
}
