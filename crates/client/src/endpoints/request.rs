//! Response handling shared by API calls.
//!
//! HTTP 429 (Too Many Requests) is retried with exponential backoff
//! (1s, 2s, 4s = 2^attempt); the loop itself lives in `FacilityClient::execute`
//! because every attempt must pass through the authenticated transport.

use std::time::Duration;

use reqwest::Response;
use serde_json::Value;

use crate::error::ClientError;

/// Upper bound on the backoff exponent so the delay cannot overflow.
const MAX_BACKOFF_EXPONENT: u32 = 10;

/// Delay before retry number `attempt + 1` (0-based `attempt`).
pub(crate) fn backoff_delay(attempt: usize) -> Duration {
    let exponent = u32::try_from(attempt)
        .unwrap_or(MAX_BACKOFF_EXPONENT)
        .min(MAX_BACKOFF_EXPONENT);
    Duration::from_secs(2u64.pow(exponent))
}

/// Consume a non-success response into `ClientError::ApiError`.
///
/// Prefers `error_description`, then `message`, from a JSON body; falls back
/// to the raw body text.
pub(crate) async fn api_error(response: Response) -> ClientError {
    let status = response.status().as_u16();
    let url = response.url().to_string();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Could not read error response body".to_string());

    ClientError::ApiError {
        status,
        url,
        message: error_message(&body),
    }
}

fn error_message(body: &str) -> String {
    let Ok(json) = serde_json::from_str::<Value>(body) else {
        return body.to_string();
    };

    ["error_description", "message", "error"]
        .iter()
        .find_map(|key| json[*key].as_str())
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string())
}
