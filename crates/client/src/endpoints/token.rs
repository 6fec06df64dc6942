//! Token endpoint.

use reqwest::Client;
use reqwest::header::HeaderValue;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::auth::{Credentials, Grant};
use crate::error::AuthError;

/// Bearer token returned by a successful exchange.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: SecretString,
    /// Lifetime in seconds, counted from receipt of the response.
    pub expires_in: u64,
}

/// Exchange credentials for a bearer token at `{endpoint}/token`.
///
/// The request goes out on `client` as-is, so `client` must not inject
/// tokens itself. The body is parsed as JSON whatever the status code.
pub async fn request_token(
    client: &Client,
    credentials: &Credentials,
) -> Result<TokenGrant, AuthError> {
    let url = credentials.token_url();
    let (grant_type, username, password) = match credentials.grant() {
        Grant::Password { username, password } => {
            ("password", username.as_str(), password.expose_secret())
        }
        Grant::Trusted { token } => ("trusted", "", token.expose_secret()),
    };
    debug!(grant_type, username, "Requesting bearer token");

    let response = client
        .post(&url)
        .form(&[
            ("grant_type", grant_type),
            ("username", username),
            ("password", password),
        ])
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await?;
    let json: serde_json::Value = serde_json::from_str(&body).map_err(|e| {
        AuthError::InvalidResponse(format!("token response (HTTP {}) is not JSON: {e}", status))
    })?;

    if !status.is_success() {
        let description = json["error_description"].as_str().ok_or_else(|| {
            AuthError::InvalidResponse(format!(
                "token request failed with HTTP {} and no error_description",
                status.as_u16()
            ))
        })?;
        return Err(AuthError::Rejected {
            status: status.as_u16(),
            description: description.to_string(),
        });
    }

    let access_token = json["access_token"]
        .as_str()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AuthError::InvalidResponse("missing access_token".to_string()))?;
    if HeaderValue::from_str(&format!("Bearer {access_token}")).is_err() {
        return Err(AuthError::InvalidResponse(
            "access_token contains characters not allowed in a header".to_string(),
        ));
    }
    let expires_in = match &json["expires_in"] {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| AuthError::InvalidResponse("missing or invalid expires_in".to_string()))?;

    Ok(TokenGrant {
        access_token: SecretString::new(access_token.to_string().into()),
        expires_in,
    })
}
