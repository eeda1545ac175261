//! Integration tests for the request executor against a mock backend.
//!
//! Covers the retry contract: a persistently failing retryable error uses
//! the whole budget, a client error is terminal on the first attempt, and
//! backoff sleeps double between attempts.

use std::time::{Duration, Instant};

use chatter_client::{ApiClient, ApiError, ClientConfig, Payload, RequestSpec};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Client with a short deadline and near-zero backoff for fast tests.
fn client_for(server: &MockServer) -> ApiClient {
    let config = ClientConfig::new(server.uri())
        .with_timeout(Duration::from_secs(2))
        .with_retry_base_delay(Duration::from_millis(10));
    ApiClient::new(config).unwrap()
}

#[tokio::test]
async fn persistent_server_error_uses_full_retry_budget() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/boom"))
        .respond_with(ResponseTemplate::new(500))
        .expect(4) // 3 retries = 4 attempts
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .execute(RequestSpec::get("/boom").retries(3))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Server { status: 500, .. }));
}

#[tokio::test]
async fn client_error_is_terminal_after_one_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let start = Instant::now();
    // A 5s base delay would dominate the elapsed time if any backoff sleep
    // happened.
    let spec = RequestSpec::get("/missing")
        .retries(3)
        .retry_base_delay(Duration::from_secs(5));
    let err = client.execute(spec).await.unwrap_err();

    assert!(matches!(err, ApiError::Client { status: 404, .. }));
    assert!(err.is_terminal());
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn recovers_when_a_retry_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let payload = client
        .execute(RequestSpec::get("/flaky").retries(3))
        .await
        .unwrap();

    assert_eq!(payload, Payload::Json(json!({"ok": true})));
}

#[tokio::test]
async fn backoff_doubles_between_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(502))
        .expect(4)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let start = Instant::now();
    let spec = RequestSpec::get("/down")
        .retries(3)
        .retry_base_delay(Duration::from_millis(50));
    let err = client.execute(spec).await.unwrap_err();
    let elapsed = start.elapsed();

    assert!(matches!(err, ApiError::Server { status: 502, .. }));
    // Sleeps of 50, 100, and 200ms separate the four attempts.
    assert!(elapsed >= Duration::from_millis(350), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(2), "elapsed {elapsed:?}");
}

#[tokio::test]
async fn slow_response_is_classified_as_timeout_and_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let spec = RequestSpec::get("/slow")
        .timeout(Duration::from_millis(100))
        .retries(1);
    let err = client.execute(spec).await.unwrap_err();

    assert!(matches!(err, ApiError::Timeout(_)));
}

#[tokio::test]
async fn json_content_type_yields_structured_value() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"a": 1})))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let payload = client
        .execute(RequestSpec::get("/json").retries(0))
        .await
        .unwrap();

    assert_eq!(payload, Payload::Json(json!({"a": 1})));
}

#[tokio::test]
async fn plain_text_yields_raw_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/text"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("hi", "text/plain"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let payload = client
        .execute(RequestSpec::get("/text").retries(0))
        .await
        .unwrap();

    assert_eq!(payload, Payload::Text("hi".into()));
}

#[tokio::test]
async fn declared_json_that_does_not_parse_is_a_decode_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bad-json"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("not json", "application/json"))
        .expect(2) // decode failures are retryable
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .execute(RequestSpec::get("/bad-json").retries(1))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Decode(_)));
}

#[tokio::test]
async fn caller_content_type_replaces_the_json_default() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/custom"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("ok", "text/plain"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let spec = RequestSpec::post("/custom")
        .json(json!({"text": "q"}))
        .header("content-type", "application/vnd.custom+json")
        .retries(0);
    client.execute(spec).await.unwrap();

    // Exactly one content-type must reach the wire, and it must be the
    // caller's, not a second value appended after the JSON default.
    let requests = server.received_requests().await.unwrap();
    let values: Vec<_> = requests[0]
        .headers
        .get_all("content-type")
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert_eq!(values, vec!["application/vnd.custom+json"]);
}

#[tokio::test]
async fn error_body_detail_and_code_are_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/ask-sync"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "detail": "Question cannot be empty",
            "error_code": "EMPTY_QUESTION"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.ask_sync("").await.unwrap_err();

    assert_eq!(err.to_string(), "Question cannot be empty");
    assert_eq!(err.status(), Some(400));
    assert_eq!(err.error_code(), Some("EMPTY_QUESTION"));
}

#[tokio::test]
async fn connection_failure_is_a_network_error() {
    // Nothing listens on this port.
    let config = ClientConfig::new("http://127.0.0.1:9")
        .with_timeout(Duration::from_secs(2))
        .with_retry_base_delay(Duration::from_millis(1));
    let client = ApiClient::new(config).unwrap();

    let err = client
        .execute(RequestSpec::get("/anything").retries(1))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Network(_) | ApiError::Timeout(_)));
}
