//! Spotislack API - HTTP adapters for the Spotify and Slack Web APIs
//!
//! Provides async clients for:
//! - Reading current playback from Spotify (`GET /v1/me/player`)
//! - Writing profile status to Slack (`users.profile.set`)
//! - OAuth2 refresh-token exchange for both services
//!
//! ## Modules
//!
//! - [`client`] - Shared HTTP executor: rate limiting, 429 handling, retry with backoff
//! - [`spotify`] - [`IMusicService`](spotislack_core::ports::IMusicService) adapter
//! - [`slack`] - [`IMessagingService`](spotislack_core::ports::IMessagingService) adapter
//! - [`oauth`] - [`ITokenRefresher`](spotislack_core::ports::ITokenRefresher) adapter
//! - [`rate_limit`] - Adaptive token buckets and service-wide throttling

pub mod client;
pub mod oauth;
pub mod rate_limit;
pub mod slack;
pub mod spotify;

use std::time::Duration;

use spotislack_core::domain::ServiceError;
use thiserror::Error;

pub use client::{ApiClient, RetryPolicy};
pub use oauth::OAuthRefresher;
pub use slack::SlackClient;
pub use spotify::SpotifyClient;

/// Errors that can occur when talking to an external Web API
#[derive(Debug, Error)]
pub enum ApiError {
    /// The access token was rejected as expired (HTTP 401 or `token_expired`)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The credentials are no longer usable (revoked, missing scope, inactive account)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Rate limit exceeded; retry after the specified duration
    #[error("Too many requests, retry after {retry_after:?}")]
    TooManyRequests {
        /// Duration to wait before retrying
        retry_after: Duration,
    },

    /// A server-side error occurred (5xx)
    #[error("Server error: {0}")]
    ServerError(String),

    /// A network-level error occurred
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The API response could not be parsed or was malformed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<ApiError> for ServiceError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized(_) => ServiceError::AuthExpired,
            ApiError::Forbidden(msg) => ServiceError::AuthInvalid(msg),
            ApiError::TooManyRequests { retry_after } => ServiceError::RateLimited { retry_after },
            ApiError::ServerError(msg) => ServiceError::Transient(msg),
            ApiError::NetworkError(e) if e.is_decode() => {
                ServiceError::InvalidResponse(e.to_string())
            }
            ApiError::NetworkError(e) => ServiceError::Transient(e.to_string()),
            ApiError::InvalidResponse(msg) => ServiceError::InvalidResponse(msg),
        }
    }
}
