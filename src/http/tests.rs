use super::*;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[test]
fn endpoint_keeps_base_path() {
    let base = Url::parse("http://localhost:8080/invocations/v1").expect("url should parse");
    let url = endpoint(&base, "/api/embed").expect("endpoint should join");
    assert_eq!(url.as_str(), "http://localhost:8080/invocations/v1/api/embed");

    let base = Url::parse("http://localhost:11434").expect("url should parse");
    let url = endpoint(&base, "api/generate").expect("endpoint should join");
    assert_eq!(url.as_str(), "http://localhost:11434/api/generate");
}

#[test]
fn retry_attempts_never_zero() {
    let transport = HttpTransport::new(Duration::from_secs(1)).with_retry_attempts(0);
    assert_eq!(transport.retry_attempts(), 1);
    assert_eq!(
        HttpTransport::new(Duration::from_secs(1)).retry_attempts(),
        DEFAULT_RETRY_ATTEMPTS
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn post_json_sends_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/predict"))
        .and(body_json(serde_json::json!({ "inputs": "hello" })))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let url = Url::parse(&format!("{}/predict", server.uri())).expect("url should parse");
    let transport = HttpTransport::new(Duration::from_secs(5));
    let body = serde_json::json!({ "inputs": "hello" });

    let response = tokio::task::spawn_blocking(move || transport.post_json(&url, &body))
        .await
        .expect("task should join");
    assert_eq!(response.expect("request should succeed"), "ok");
}

#[tokio::test(flavor = "multi_thread")]
async fn bearer_token_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .and(header("Authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .expect(1)
        .mount(&server)
        .await;

    let url = Url::parse(&format!("{}/models", server.uri())).expect("url should parse");
    let transport = HttpTransport::new(Duration::from_secs(5)).with_bearer_token("secret");

    let response = tokio::task::spawn_blocking(move || transport.get(&url))
        .await
        .expect("task should join");
    assert_eq!(response.expect("request should succeed"), "[]");
}

#[tokio::test(flavor = "multi_thread")]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let url = Url::parse(&format!("{}/missing", server.uri())).expect("url should parse");
    let transport = HttpTransport::new(Duration::from_secs(5)).with_retry_attempts(3);

    let result = tokio::task::spawn_blocking(move || transport.get(&url))
        .await
        .expect("task should join");
    assert!(matches!(result, Err(TransportError::Status(404))));
}

#[tokio::test(flavor = "multi_thread")]
async fn server_errors_fail_without_retry_by_default() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let url = Url::parse(&format!("{}/flaky", server.uri())).expect("url should parse");
    let transport = HttpTransport::new(Duration::from_secs(5));

    let result = tokio::task::spawn_blocking(move || transport.get(&url))
        .await
        .expect("task should join");
    assert!(matches!(result, Err(TransportError::Status(503))));
}

#[test]
fn unreachable_host_is_connection_error() {
    let url = Url::parse("http://127.0.0.1:1/unreachable").expect("url should parse");
    let transport = HttpTransport::new(Duration::from_secs(2));

    let result = transport.get(&url);
    assert!(matches!(
        result,
        Err(TransportError::Connection(_) | TransportError::Timeout(_))
    ));
}
