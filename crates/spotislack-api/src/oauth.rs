//! OAuth2 refresh-token exchange for Spotify and Slack
//!
//! Implements [`ITokenRefresher`] with the `oauth2` crate. Only the refresh
//! grant is needed; the authorization-code flow belongs to the web front end.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use oauth2::{
    basic::{BasicClient, BasicErrorResponseType},
    ClientId, ClientSecret, EndpointNotSet, EndpointSet, RefreshToken, RequestTokenError,
    TokenResponse, TokenUrl,
};
use serde::Deserialize;
use spotislack_core::{
    config::{HttpConfig, ProviderConfig},
    domain::{Service, ServiceError, Tokens},
    ports::ITokenRefresher,
};
use tracing::{info, instrument, warn};

use crate::{slack::map_slack_error, ApiError};

type TokenClient =
    BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Refresh client for one provider
#[derive(Debug, Clone)]
struct ProviderRefresher {
    client: TokenClient,
}

impl ProviderRefresher {
    fn new(config: &ProviderConfig) -> Result<Option<Self>, ApiError> {
        let (Some(id), Some(secret)) = (&config.client_id, &config.client_secret) else {
            return Ok(None);
        };
        let token_url = TokenUrl::new(config.token_url.clone())
            .map_err(|e| ApiError::InvalidResponse(format!("invalid token URL: {e}")))?;
        let client = BasicClient::new(ClientId::new(id.clone()))
            .set_client_secret(ClientSecret::new(secret.clone()))
            .set_token_uri(token_url);
        Ok(Some(Self { client }))
    }
}

/// Exchanges refresh tokens for both services
#[derive(Debug, Clone)]
pub struct OAuthRefresher {
    spotify: Option<ProviderRefresher>,
    slack: Option<ProviderRefresher>,
    http: reqwest::Client,
}

impl OAuthRefresher {
    /// Builds refreshers for every provider that has client credentials
    pub fn new(
        spotify: &ProviderConfig,
        slack: &ProviderConfig,
        http: &HttpConfig,
    ) -> Result<Self, ApiError> {
        // Token endpoints must not follow redirects (oauth2 crate guidance)
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(http.request_timeout))
            .build()?;

        Ok(Self {
            spotify: ProviderRefresher::new(spotify)?,
            slack: ProviderRefresher::new(slack)?,
            http: client,
        })
    }

    /// Returns true if refresh is possible for the service
    pub fn supports(&self, service: Service) -> bool {
        self.provider(service).is_some()
    }

    fn provider(&self, service: Service) -> Option<&ProviderRefresher> {
        match service {
            Service::Spotify => self.spotify.as_ref(),
            Service::Slack => self.slack.as_ref(),
        }
    }

    async fn exchange(
        &self,
        service: Service,
        refresh_token: &str,
    ) -> Result<Tokens, ServiceError> {
        let provider = self.provider(service).ok_or_else(|| {
            ServiceError::AuthInvalid(format!("no OAuth client configured for {service}"))
        })?;

        let result = provider
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&self.http)
            .await
            .map_err(classify_refresh_error)?;

        let expires_at = result
            .expires_in()
            .map(|d| Utc::now() + Duration::seconds(d.as_secs() as i64));

        Ok(Tokens {
            access_token: result.access_token().secret().to_string(),
            refresh_token: result.refresh_token().map(|t| t.secret().to_string()),
            expires_at,
        })
    }
}

#[async_trait]
impl ITokenRefresher for OAuthRefresher {
    #[instrument(skip(self, refresh_token), fields(service = %service))]
    async fn refresh(&self, service: Service, refresh_token: &str) -> Result<Tokens, ServiceError> {
        match self.exchange(service, refresh_token).await {
            Ok(tokens) => {
                info!("Refreshed access token");
                Ok(tokens)
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed");
                Err(e)
            }
        }
    }
}

/// Slack's token endpoint answers HTTP 200 `{"ok": false, "error": ...}`
#[derive(Deserialize)]
struct SlackOAuthError {
    ok: bool,
    error: Option<String>,
}

fn classify_refresh_error<RE>(
    err: RequestTokenError<RE, oauth2::basic::BasicErrorResponse>,
) -> ServiceError
where
    RE: std::error::Error + 'static,
{
    match err {
        RequestTokenError::ServerResponse(resp) => match resp.error() {
            BasicErrorResponseType::InvalidGrant
            | BasicErrorResponseType::InvalidClient
            | BasicErrorResponseType::UnauthorizedClient => {
                let detail = resp
                    .error_description()
                    .cloned()
                    .unwrap_or_else(|| resp.error().to_string());
                ServiceError::AuthInvalid(detail)
            }
            other => ServiceError::InvalidResponse(format!("token endpoint error: {other}")),
        },
        RequestTokenError::Request(e) => ServiceError::Transient(e.to_string()),
        RequestTokenError::Parse(_, body) => {
            match serde_json::from_slice::<SlackOAuthError>(&body) {
                Ok(SlackOAuthError { ok: false, error }) => {
                    let code = error.unwrap_or_else(|| "unknown_error".to_string());
                    match code.as_str() {
                        "invalid_refresh_token" | "invalid_grant_type" => {
                            ServiceError::AuthInvalid(code)
                        }
                        _ => map_slack_error(&code).into(),
                    }
                }
                Ok(_) => ServiceError::InvalidResponse("unparseable token response".to_string()),
                // Not JSON at all: usually a proxy or 5xx error page
                Err(_) => ServiceError::Transient("token endpoint returned a non-JSON body".into()),
            }
        }
        RequestTokenError::Other(msg) => ServiceError::InvalidResponse(msg),
    }
}
