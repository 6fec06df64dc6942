//! Common test utilities for integration tests.
//!
//! # Invariants
//! - Fixtures are loaded from the `fixtures/` directory relative to the crate root
//! - Token endpoint mocks answer on `POST /token`
//!
//! # What this does NOT handle
//! - Test-specific assertions or test logic

use std::time::Duration;

#[allow(unused_imports)]
pub use facility_client::testing::load_fixture;

#[allow(unused_imports)]
pub use facility_client::{AuthError, AuthEvent, ClientError, Config, FacilityClient};
#[allow(unused_imports)]
pub use wiremock::{Mock, MockServer, ResponseTemplate};

use secrecy::SecretString;
use wiremock::Times;
use wiremock::matchers::{method, path};

#[allow(dead_code)]
pub fn secret(value: &str) -> SecretString {
    SecretString::new(value.to_string().into())
}

/// Password-grant configuration pointing at `endpoint`.
#[allow(dead_code)]
pub fn password_config(endpoint: &str) -> Config {
    Config::with_credentials(endpoint, "admin", secret("hunter2"))
}

/// Route `tracing` output to the test harness when `RUST_LOG` is set.
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Mount a token endpoint that always answers with `token/success.json`.
#[allow(dead_code)]
pub async fn mount_token_success(server: &MockServer, expected_calls: impl Into<Times>) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(load_fixture("token/success.json")))
        .expect(expected_calls)
        .mount(server)
        .await;
}

/// Like [`mount_token_success`], but each answer is held back for `delay`.
#[allow(dead_code)]
pub async fn mount_slow_token(
    server: &MockServer,
    delay: Duration,
    expected_calls: impl Into<Times>,
) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(load_fixture("token/success.json"))
                .set_delay(delay),
        )
        .expect(expected_calls)
        .mount(server)
        .await;
}

/// Mount a token endpoint that rejects every exchange with HTTP 401.
#[allow(dead_code)]
pub async fn mount_token_rejection(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(load_fixture("token/invalid_credentials.json")),
        )
        .mount(server)
        .await;
}
