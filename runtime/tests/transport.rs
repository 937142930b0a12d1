//! Retry, deadline and cancellation behavior of the HTTP client against a
//! local mock server.

use pagescout_runtime::acquisition::http_client::{HttpClient, RequestOptions, RetryPolicy};
use pagescout_runtime::error::TransportError;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(max_retries: u32, base_ms: u64, timeout_ms: u64) -> HttpClient {
    HttpClient::with_client(
        reqwest::Client::new(),
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(base_ms),
            timeout: Duration::from_millis(timeout_ms),
        },
    )
}

#[tokio::test]
async fn test_retries_server_errors_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let http = client(3, 40, 10_000);
    let start = Instant::now();
    let resp = http
        .get(&format!("{}/flaky", server.uri()), None)
        .await
        .unwrap();

    assert_eq!(resp.status, 200);
    assert_eq!(resp.body, "ok");
    // Two backoffs: base + 2 * base.
    assert!(start.elapsed() >= Duration::from_millis(120));
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let http = client(3, 10, 5_000);
    let err = http
        .get(&format!("{}/missing", server.uri()), None)
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_retry_budget_is_bounded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let http = client(2, 5, 5_000);
    let err = http
        .get(&format!("{}/down", server.uri()), None)
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(503));
}

#[tokio::test]
async fn test_post_is_not_retried_unless_marked_safe() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/analyze"))
        .respond_with(ResponseTemplate::new(502))
        .expect(1)
        .mount(&server)
        .await;

    let http = client(3, 5, 5_000);
    let err = http
        .request(
            &format!("{}/analyze", server.uri()),
            RequestOptions::post_json("{}".into()),
        )
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(502));
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let http = client(0, 5, 150);
    let err = http
        .get(&format!("{}/slow", server.uri()), None)
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Timeout { .. }));
}

#[tokio::test]
async fn test_cancel_aborts_in_flight_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let http = client(0, 5, 10_000);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let start = Instant::now();
    let err = http
        .get(&format!("{}/slow", server.uri()), Some(&cancel))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Aborted { .. }));
    assert!(start.elapsed() < Duration::from_secs(1));
}
