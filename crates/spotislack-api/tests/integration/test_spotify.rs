//! Spotify player endpoint behaviour

use spotislack_core::{domain::ServiceError, ports::IMusicService};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common;

#[tokio::test]
async fn test_current_playback_returns_track() {
    let (server, client) = common::spotify_mock().await;

    Mock::given(method("GET"))
        .and(path("/v1/me/player"))
        .and(header("authorization", "Bearer spotify-token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(common::player_body("Song A", &["Artist"], true)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let state = client.current_playback("spotify-token").await.unwrap();
    assert!(state.is_active());
    let track = state.track.unwrap();
    assert_eq!(track.title, "Song A");
    assert_eq!(track.artists, vec!["Artist"]);
}

#[tokio::test]
async fn test_no_content_means_not_playing() {
    let (server, client) = common::spotify_mock().await;

    Mock::given(method("GET"))
        .and(path("/v1/me/player"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let state = client.current_playback("t").await.unwrap();
    assert!(!state.is_active());
    assert!(state.track.is_none());
}

#[tokio::test]
async fn test_paused_player_is_not_active() {
    let (server, client) = common::spotify_mock().await;

    Mock::given(method("GET"))
        .and(path("/v1/me/player"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(common::player_body("Song A", &["Artist"], false)),
        )
        .mount(&server)
        .await;

    let state = client.current_playback("t").await.unwrap();
    assert!(!state.is_active());
}

#[tokio::test]
async fn test_unauthorized_maps_to_auth_expired() {
    let (server, client) = common::spotify_mock().await;

    Mock::given(method("GET"))
        .and(path("/v1/me/player"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": {"status": 401, "message": "The access token expired"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client.current_playback("stale").await.unwrap_err();
    assert_eq!(err, ServiceError::AuthExpired);
}

#[tokio::test]
async fn test_forbidden_maps_to_auth_invalid() {
    let (server, client) = common::spotify_mock().await;

    Mock::given(method("GET"))
        .and(path("/v1/me/player"))
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "error": {"status": 403, "message": "Insufficient client scope"}
        })))
        .mount(&server)
        .await;

    let err = client.current_playback("t").await.unwrap_err();
    assert_eq!(
        err,
        ServiceError::AuthInvalid("Insufficient client scope".to_string())
    );
}

#[tokio::test]
async fn test_malformed_body_is_invalid_response() {
    let (server, client) = common::spotify_mock().await;

    Mock::given(method("GET"))
        .and(path("/v1/me/player"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
        .mount(&server)
        .await;

    let err = client.current_playback("t").await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidResponse(_)));
}
