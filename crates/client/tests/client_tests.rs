//! `FacilityClient` policy tests.
//!
//! # Invariants
//! - 429 is retried with exponential backoff, then `MaxRetriesExceeded`
//! - A request with a streaming body is sent once and its response returned
//! - A 401 on a request that carried a token triggers one re-authentication
//! - `throw_on_auth_failure` / `throw_on_api_failure` turn failures into errors

mod common;

use common::*;
use serde::{Deserialize, Serialize};
use wiremock::matchers::{body_json, header, method, path};

use reqwest::Method;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct WorkOrder {
    id: Option<u64>,
    site: String,
    summary: String,
}

fn client(config: Config) -> FacilityClient {
    FacilityClient::new(config).unwrap()
}

fn streaming_body() -> reqwest::Body {
    reqwest::Body::wrap_stream(futures::stream::iter(vec![Ok::<_, std::io::Error>(
        "site=north-depot",
    )]))
}

#[tokio::test]
async fn test_get_json_decodes_body() {
    let server = MockServer::start().await;
    mount_token_success(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/work-orders/7"))
        .and(header("authorization", "Bearer T"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": 7,
            "site": "north-depot",
            "summary": "replace filter"
        })))
        .mount(&server)
        .await;

    let order: WorkOrder = client(password_config(&server.uri()))
        .get_json("/work-orders/7")
        .await
        .unwrap();
    assert_eq!(order.id, Some(7));
    assert_eq!(order.site, "north-depot");
}

#[tokio::test]
async fn test_post_json_sends_body() {
    let server = MockServer::start().await;
    mount_token_success(&server, 1).await;
    let order = WorkOrder {
        id: None,
        site: "north-depot".to_string(),
        summary: "replace filter".to_string(),
    };
    Mock::given(method("POST"))
        .and(path("/work-orders"))
        .and(body_json(&order))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "id": 8,
            "site": "north-depot",
            "summary": "replace filter"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let created: WorkOrder = client(password_config(&server.uri()))
        .post_json("/work-orders", &order)
        .await
        .unwrap();
    assert_eq!(created.id, Some(8));
}

#[tokio::test]
async fn test_delete_succeeds_on_no_content() {
    let server = MockServer::start().await;
    mount_token_success(&server, 1).await;
    Mock::given(method("DELETE"))
        .and(path("/work-orders/7"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client(password_config(&server.uri()))
        .delete("/work-orders/7")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_retry_on_429_then_success() {
    let server = MockServer::start().await;
    mount_token_success(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/sites"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sites"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;

    let mut config = password_config(&server.uri());
    config.max_retries = 1;

    let sites: Vec<serde_json::Value> = client(config).get_json("/sites").await.unwrap();
    assert!(sites.is_empty());
}

#[tokio::test]
async fn test_retry_on_429_exhaustion() {
    let server = MockServer::start().await;
    mount_token_success(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/sites"))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = password_config(&server.uri());
    config.max_retries = 0;

    let err = client(config)
        .get_json::<serde_json::Value>("/sites")
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::MaxRetriesExceeded(1)));
}

#[tokio::test]
async fn test_streaming_request_is_not_retried_on_429() {
    let server = MockServer::start().await;
    mount_token_success(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/uploads"))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = password_config(&server.uri());
    config.max_retries = 3;
    let client = client(config);

    let builder = client
        .request(Method::POST, "/uploads")
        .unwrap()
        .body(streaming_body());
    let response = client.execute(builder).await.unwrap();
    assert_eq!(response.status(), 429);
}

#[tokio::test]
async fn test_streaming_request_returns_401_without_reauthentication() {
    let server = MockServer::start().await;
    mount_token_success(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/uploads"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(password_config(&server.uri()));
    let builder = client
        .request(Method::POST, "/uploads")
        .unwrap()
        .body(streaming_body());
    let response = client.execute(builder).await.unwrap();
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn test_stale_token_is_replaced_once() {
    let server = MockServer::start().await;
    mount_token_success(&server, 2).await;
    Mock::given(method("GET"))
        .and(path("/sites"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sites"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;

    let client = client(password_config(&server.uri()));
    let sites: Vec<serde_json::Value> = client.get_json("/sites").await.unwrap();
    assert!(sites.is_empty());
    assert!(client.is_authenticated());
}

#[tokio::test]
async fn test_persistent_401_is_not_retried_forever() {
    let server = MockServer::start().await;
    mount_token_success(&server, 2).await;
    Mock::given(method("GET"))
        .and(path("/sites"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "message": "token revoked"
        })))
        .expect(2)
        .mount(&server)
        .await;

    let err = client(password_config(&server.uri()))
        .get_json::<serde_json::Value>("/sites")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::ApiError { status: 401, ref message, .. } if message == "token revoked"
    ));
    assert!(err.is_auth_error());
}

#[tokio::test]
async fn test_throw_on_auth_failure() {
    let server = MockServer::start().await;
    mount_token_rejection(&server).await;
    Mock::given(method("GET"))
        .and(path("/sites"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let mut config = password_config(&server.uri());
    config.throw_on_auth_failure = true;
    let client = client(config);

    let err = client
        .execute(client.request(Method::GET, "/sites").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::AuthFailed(ref msg) if msg == "bad credentials"));
}

#[tokio::test]
async fn test_auth_failure_is_silent_without_flag() {
    let server = MockServer::start().await;
    mount_token_rejection(&server).await;
    Mock::given(method("GET"))
        .and(path("/public/status"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client = client(password_config(&server.uri()));
    let mut events = client.subscribe();

    let response = client
        .execute(client.request(Method::GET, "/public/status").unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        events.try_recv().unwrap().failure_description(),
        Some("bad credentials")
    );
}

#[tokio::test]
async fn test_throw_on_api_failure() {
    let server = MockServer::start().await;
    mount_token_success(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/sites/99"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "message": "no such site"
        })))
        .mount(&server)
        .await;

    let mut config = password_config(&server.uri());
    config.throw_on_api_failure = true;
    let client = client(config);

    let err = client
        .execute(client.request(Method::GET, "/sites/99").unwrap())
        .await
        .unwrap_err();
    match err {
        ClientError::ApiError {
            status,
            url,
            message,
        } => {
            assert_eq!(status, 404);
            assert!(url.ends_with("/sites/99"));
            assert_eq!(message, "no such site");
        }
        other => panic!("Expected ApiError, got {:?}", other),
    }
}

#[tokio::test]
async fn test_api_failure_returned_as_response_without_flag() {
    let server = MockServer::start().await;
    mount_token_success(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/sites/99"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client(password_config(&server.uri()));
    let response = client
        .execute(client.request(Method::GET, "/sites/99").unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_set_config_switches_endpoint() {
    let first = MockServer::start().await;
    let second = MockServer::start().await;
    mount_token_success(&first, 1).await;
    mount_token_success(&second, 1).await;
    for server in [&first, &second] {
        Mock::given(method("GET"))
            .and(path("/sites"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(1)
            .mount(server)
            .await;
    }

    let client = client(password_config(&first.uri()));
    let _: Vec<serde_json::Value> = client.get_json("/sites").await.unwrap();

    client.set_config(password_config(&second.uri())).unwrap();
    assert!(!client.is_authenticated());
    let _: Vec<serde_json::Value> = client.get_json("/sites").await.unwrap();
    assert_eq!(client.config().endpoint, second.uri());
}

#[tokio::test]
async fn test_invalid_replacement_is_rejected() {
    let server = MockServer::start().await;
    let client = client(password_config(&server.uri()));

    let mut invalid = password_config(&server.uri());
    invalid.password = None;
    assert!(matches!(
        client.set_config(invalid),
        Err(ClientError::Config(_))
    ));
    assert!(client.config().password.is_some());
}
