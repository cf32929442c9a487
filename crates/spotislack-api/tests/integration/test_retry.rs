//! Shared retry, backoff and throttle handling

use std::time::Duration;

use spotislack_core::{
    domain::{ServiceError, StatusUpdate},
    ports::{IMessagingService, IMusicService},
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common;

#[tokio::test]
async fn test_server_error_is_retried_then_succeeds() {
    let (server, client) = common::spotify_mock().await;

    Mock::given(method("GET"))
        .and(path("/v1/me/player"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/me/player"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let state = client.current_playback("t").await.unwrap();
    assert!(!state.is_active());
}

#[tokio::test]
async fn test_persistent_server_error_is_transient_after_bounded_retries() {
    let (server, client) = common::spotify_mock().await;

    // common client allows 2 retries: 3 attempts in total
    Mock::given(method("GET"))
        .and(path("/v1/me/player"))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&server)
        .await;

    let err = client.current_playback("t").await.unwrap_err();
    assert!(matches!(err, ServiceError::Transient(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_too_many_requests_honours_retry_after() {
    let (server, client) = common::slack_mock().await;

    Mock::given(method("POST"))
        .and(path("/users.profile.set"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/users.profile.set"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let started = std::time::Instant::now();
    client
        .set_status("t", &StatusUpdate::clear())
        .await
        .unwrap();
    assert!(started.elapsed() >= Duration::from_secs(1));
    assert!(client.api().rate_limiter().remaining_pause().is_none());
    assert_eq!(
        client.api().rate_limiter().effective_capacity("profile"),
        Some(50)
    );
}

#[tokio::test]
async fn test_throttling_exhausts_into_rate_limited() {
    let (server, client) = common::slack_mock().await;

    Mock::given(method("POST"))
        .and(path("/users.profile.set"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .expect(3)
        .mount(&server)
        .await;

    let err = client
        .set_status("t", &StatusUpdate::clear())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ServiceError::RateLimited {
            retry_after: Duration::ZERO
        }
    );
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let (server, client) = common::spotify_mock().await;

    Mock::given(method("GET"))
        .and(path("/v1/me/player"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let err = client.current_playback("t").await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidResponse(_)));
}
