//! HTTP behaviour of the Teams client against a local mock webhook.

use std::time::{Duration, Instant};
use teams_client::{RetryPolicy, TeamsClient, TeamsClientTrait, TeamsError, TeamsMessage, THEME_COLOR_WARNING};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        initial_backoff: Duration::from_millis(20),
        max_backoff: Duration::from_millis(200),
    }
}

fn client_for(server: &MockServer) -> TeamsClient {
    TeamsClient::new(&format!("{}/webhook", server.uri()), Duration::from_secs(2))
        .expect("Failed to create client")
        .with_retry_policy(fast_retry())
}

fn sample_message() -> TeamsMessage {
    TeamsMessage::new("[prod] Pod restarted", "default/web-0/app", THEME_COLOR_WARNING)
}

#[tokio::test]
async fn test_delivers_json_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/webhook"))
        .and(header("content-type", "application/json"))
        .and(body_json(serde_json::json!({
            "summary": "[prod] Pod restarted",
            "text": "default/web-0/app",
            "themeColor": "#FFA500",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string("1"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client
        .send_message(&sample_message())
        .await
        .expect("delivery should succeed");
}

#[tokio::test]
async fn test_server_errors_are_retried_until_attempts_run_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let started = Instant::now();
    let err = client
        .send_message(&sample_message())
        .await
        .expect_err("delivery should fail");

    assert!(matches!(err, TeamsError::Status { status, .. } if status.as_u16() == 503));
    // 20ms + 40ms of backoff between the three attempts
    assert!(started.elapsed() >= Duration::from_millis(60));
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("Bad payload"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .send_message(&sample_message())
        .await
        .expect_err("delivery should fail");

    match err {
        TeamsError::Rejected { status, body } => {
            assert_eq!(status.as_u16(), 400);
            assert_eq!(body, "Bad payload");
        }
        other => panic!("expected Rejected, got {other:?}"),
    }
}

#[tokio::test]
async fn test_throttling_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client
        .send_message(&sample_message())
        .await
        .expect("second attempt should succeed");
}

#[tokio::test]
async fn test_recovers_after_transient_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client
        .send_message(&sample_message())
        .await
        .expect("third attempt should succeed");
}

#[tokio::test]
async fn test_timeout_counts_as_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .expect(2)
        .mount(&server)
        .await;

    let client = TeamsClient::new(&format!("{}/webhook", server.uri()), Duration::from_millis(100))
        .expect("Failed to create client")
        .with_retry_policy(RetryPolicy {
            max_attempts: 2,
            ..fast_retry()
        });

    let err = client
        .send_message(&sample_message())
        .await
        .expect_err("every attempt times out");
    assert!(matches!(err, TeamsError::Http(ref e) if e.is_timeout()));
}
