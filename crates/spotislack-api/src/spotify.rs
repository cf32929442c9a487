//! Spotify Web API player client
//!
//! Implements [`IMusicService`] on top of `GET /v1/me/player`.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use spotislack_core::{
    config::{HttpConfig, ProviderConfig},
    domain::{PlaybackState, Service, ServiceError, Track},
    ports::IMusicService,
};
use tracing::{debug, instrument};

use crate::{client::ApiClient, ApiError};

const PLAYER_PATH: &str = "/v1/me/player";

// ============================================================================
// Spotify API response types
// ============================================================================

/// Response body of `GET /v1/me/player`
#[derive(Debug, Deserialize)]
struct PlayerResponse {
    #[serde(default)]
    is_playing: bool,
    progress_ms: Option<u64>,
    /// Track or episode; null during ads and some transitions
    item: Option<PlayerItem>,
    /// `track`, `episode`, `ad` or `unknown`
    #[serde(default)]
    currently_playing_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlayerItem {
    id: Option<String>,
    name: String,
    duration_ms: Option<u64>,
    /// Present for tracks, absent for podcast episodes
    #[serde(default)]
    artists: Vec<ArtistObject>,
}

#[derive(Debug, Deserialize)]
struct ArtistObject {
    name: String,
}

impl PlayerResponse {
    fn into_state(self) -> PlaybackState {
        let fetched_at = Utc::now();
        if self.currently_playing_type.as_deref() == Some("ad") {
            return PlaybackState::not_playing(fetched_at);
        }
        match self.item {
            Some(item) => PlaybackState {
                track: Some(Track {
                    id: item.id.unwrap_or_default(),
                    title: item.name,
                    artists: item.artists.into_iter().map(|a| a.name).collect(),
                    duration_ms: item.duration_ms,
                }),
                is_playing: self.is_playing,
                progress_ms: self.progress_ms,
                fetched_at,
            },
            None => PlaybackState::not_playing(fetched_at),
        }
    }
}

// ============================================================================
// SpotifyClient
// ============================================================================

/// Adapter for the Spotify Web API
#[derive(Debug, Clone)]
pub struct SpotifyClient {
    api: ApiClient,
}

impl SpotifyClient {
    /// Creates a client from the provider and HTTP configuration
    pub fn new(provider: &ProviderConfig, http: &HttpConfig) -> Result<Self, ApiError> {
        Ok(Self {
            api: ApiClient::new(Service::Spotify, &provider.api_base_url, http)?,
        })
    }

    /// Wraps an existing [`ApiClient`] (useful for testing)
    pub fn from_api_client(api: ApiClient) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Fetches the player state, mapping HTTP outcomes to [`ApiError`]
    pub async fn get_player(&self, access_token: &str) -> Result<PlaybackState, ApiError> {
        let response = self
            .api
            .execute_with_retry("player", || {
                self.api.request(Method::GET, PLAYER_PATH, access_token)
            })
            .await?;

        match response.status() {
            StatusCode::NO_CONTENT => {
                debug!("Player idle (204)");
                Ok(PlaybackState::not_playing(Utc::now()))
            }
            status if status.is_success() => {
                let body = response.text().await?;
                // Spotify occasionally answers 200 with an empty body when idle
                if body.trim().is_empty() {
                    return Ok(PlaybackState::not_playing(Utc::now()));
                }
                let player: PlayerResponse = serde_json::from_str(&body)
                    .map_err(|e| ApiError::InvalidResponse(format!("player body: {e}")))?;
                Ok(player.into_state())
            }
            StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized(error_message(response).await)),
            StatusCode::FORBIDDEN => Err(ApiError::Forbidden(error_message(response).await)),
            status => Err(ApiError::InvalidResponse(format!(
                "unexpected status {status}: {}",
                error_message(response).await
            ))),
        }
    }
}

/// Spotify error bodies look like `{"error": {"status": 401, "message": "..."}}`
async fn error_message(response: reqwest::Response) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: ErrorDetail,
    }
    #[derive(Deserialize)]
    struct ErrorDetail {
        message: String,
    }

    let status = response.status();
    match response.text().await {
        Ok(text) => serde_json::from_str::<ErrorBody>(&text)
            .map(|b| b.error.message)
            .unwrap_or_else(|_| format!("HTTP {status}")),
        Err(_) => format!("HTTP {status}"),
    }
}

#[async_trait]
impl IMusicService for SpotifyClient {
    #[instrument(skip_all, fields(service = "spotify"))]
    async fn current_playback(&self, access_token: &str) -> Result<PlaybackState, ServiceError> {
        self.get_player(access_token).await.map_err(ServiceError::from)
    }
}
