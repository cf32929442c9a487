//! Slack Web API profile client
//!
//! Implements [`IMessagingService`] on top of `users.profile.set`. Slack
//! answers most failures with HTTP 200 and `{"ok": false, "error": "..."}`,
//! so the error code in the body decides the outcome.

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use spotislack_core::{
    config::{HttpConfig, ProviderConfig},
    domain::{Service, ServiceError, StatusUpdate},
    ports::IMessagingService,
};
use tracing::{debug, instrument};

use crate::{client::ApiClient, ApiError};

const PROFILE_SET_PATH: &str = "/users.profile.set";

// ============================================================================
// Slack API request/response types
// ============================================================================

#[derive(Debug, Serialize)]
struct ProfileSetRequest<'a> {
    profile: ProfileFields<'a>,
}

#[derive(Debug, Serialize)]
struct ProfileFields<'a> {
    status_text: &'a str,
    status_emoji: &'a str,
    /// Unix seconds; 0 means the status never expires
    status_expiration: i64,
}

impl<'a> From<&'a StatusUpdate> for ProfileSetRequest<'a> {
    fn from(update: &'a StatusUpdate) -> Self {
        let fields = if update.clear {
            ProfileFields {
                status_text: "",
                status_emoji: "",
                status_expiration: 0,
            }
        } else {
            ProfileFields {
                status_text: &update.text,
                status_emoji: &update.emoji,
                status_expiration: update.expiration_epoch(),
            }
        };
        Self { profile: fields }
    }
}

#[derive(Debug, Deserialize)]
struct SlackResponse {
    ok: bool,
    error: Option<String>,
}

/// Maps a Slack `error` code to an [`ApiError`]
pub(crate) fn map_slack_error(code: &str) -> ApiError {
    match code {
        "token_expired" => ApiError::Unauthorized(code.to_string()),
        "invalid_auth" | "token_revoked" | "account_inactive" | "not_authed"
        | "missing_scope" | "no_permission" | "user_not_found" => {
            ApiError::Forbidden(code.to_string())
        }
        "ratelimited" => ApiError::TooManyRequests {
            retry_after: std::time::Duration::from_secs(1),
        },
        "internal_error" | "fatal_error" | "service_unavailable" | "request_timeout" => {
            ApiError::ServerError(code.to_string())
        }
        other => ApiError::InvalidResponse(format!("slack error: {other}")),
    }
}

// ============================================================================
// SlackClient
// ============================================================================

/// Adapter for the Slack Web API
#[derive(Debug, Clone)]
pub struct SlackClient {
    api: ApiClient,
}

impl SlackClient {
    /// Creates a client from the provider and HTTP configuration
    pub fn new(provider: &ProviderConfig, http: &HttpConfig) -> Result<Self, ApiError> {
        Ok(Self {
            api: ApiClient::new(Service::Slack, &provider.api_base_url, http)?,
        })
    }

    /// Wraps an existing [`ApiClient`] (useful for testing)
    pub fn from_api_client(api: ApiClient) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Calls `users.profile.set`
    pub async fn set_profile_status(
        &self,
        access_token: &str,
        update: &StatusUpdate,
    ) -> Result<(), ApiError> {
        let body = ProfileSetRequest::from(update);
        let response = self
            .api
            .execute_with_retry("profile", || {
                self.api
                    .request(Method::POST, PROFILE_SET_PATH, access_token)
                    .json(&body)
            })
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized(format!("HTTP {status}")));
        }
        if status == StatusCode::FORBIDDEN {
            let code = response
                .json::<SlackResponse>()
                .await
                .ok()
                .and_then(|r| r.error)
                .unwrap_or_else(|| format!("HTTP {status}"));
            return Err(ApiError::Forbidden(code));
        }
        if !status.is_success() {
            return Err(ApiError::InvalidResponse(format!(
                "unexpected status {status}"
            )));
        }

        let parsed: SlackResponse = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("profile response: {e}")))?;

        if parsed.ok {
            debug!(clear = update.clear, "Slack status updated");
            Ok(())
        } else {
            let code = parsed.error.as_deref().unwrap_or("unknown_error");
            Err(map_slack_error(code))
        }
    }
}

#[async_trait]
impl IMessagingService for SlackClient {
    #[instrument(skip_all, fields(service = "slack", clear = update.clear))]
    async fn set_status(
        &self,
        access_token: &str,
        update: &StatusUpdate,
    ) -> Result<(), ServiceError> {
        self.set_profile_status(access_token, update)
            .await
            .map_err(ServiceError::from)
    }
}
