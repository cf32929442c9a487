//! Shared HTTP executor for the Web API adapters
//!
//! [`ApiClient`] wraps `reqwest::Client` with a base URL, bearer
//! authentication, proactive rate limiting, `Retry-After` handling, and
//! bounded exponential backoff for network errors and 5xx responses.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use reqwest::Method;
//! use spotislack_api::client::ApiClient;
//! use spotislack_core::domain::Service;
//!
//! # async fn example() -> Result<(), spotislack_api::ApiError> {
//! let client = ApiClient::with_base_url(Service::Spotify, "https://api.spotify.com");
//! let response = client
//!     .execute_with_retry("player", || client.request(Method::GET, "/v1/me/player", "token"))
//!     .await?;
//! println!("{}", response.status());
//! # Ok(())
//! # }
//! ```

use std::{sync::Arc, time::Duration};

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use spotislack_core::{config::HttpConfig, domain::Service};
use tracing::{debug, info, warn};

use crate::{
    rate_limit::{parse_retry_after, AdaptiveRateLimiter},
    ApiError,
};

/// Default retry-after duration when the header is missing
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(5);

/// Upper bound for a single backoff sleep
const MAX_BACKOFF: Duration = Duration::from_secs(30);

// ============================================================================
// RetryPolicy
// ============================================================================

/// Bounded retry with exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry; doubles each attempt
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    pub fn from_config(http: &HttpConfig) -> Self {
        Self::new(
            http.max_retries,
            Duration::from_millis(http.retry_base_delay_ms),
        )
    }

    /// Backoff before retry number `attempt + 1`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(MAX_BACKOFF)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}

// ============================================================================
// ApiClient
// ============================================================================

/// HTTP client for one external service
///
/// Cloning is cheap; clones share the connection pool and the rate limiter.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    service: Service,
    rate_limiter: Arc<AdaptiveRateLimiter>,
    policy: RetryPolicy,
}

impl ApiClient {
    /// Creates a client with timeouts and retry settings from configuration
    pub fn new(
        service: Service,
        base_url: impl Into<String>,
        http: &HttpConfig,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(http.request_timeout))
            .user_agent(concat!("spotislack/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: trim_base(base_url.into()),
            service,
            rate_limiter: Arc::new(AdaptiveRateLimiter::with_defaults()),
            policy: RetryPolicy::from_config(http),
        })
    }

    /// Creates a client with default settings and a custom base URL (useful for testing)
    pub fn with_base_url(service: Service, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: trim_base(base_url.into()),
            service,
            rate_limiter: Arc::new(AdaptiveRateLimiter::with_defaults()),
            policy: RetryPolicy::default(),
        }
    }

    /// Replaces the rate limiter
    pub fn with_rate_limiter(mut self, limiter: Arc<AdaptiveRateLimiter>) -> Self {
        self.rate_limiter = limiter;
        self
    }

    /// Replaces the retry policy
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn service(&self) -> Service {
        self.service
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn rate_limiter(&self) -> &Arc<AdaptiveRateLimiter> {
        &self.rate_limiter
    }

    /// Creates an authenticated request builder for the given method and path
    pub fn request(&self, method: Method, path: &str, access_token: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client.request(method, url).bearer_auth(access_token)
    }

    /// Sends a request with rate limiting, 429 handling and bounded retry.
    ///
    /// `build` is invoked once per attempt. Network errors and 5xx responses
    /// are retried with exponential backoff. A 429 pauses every call to this
    /// service for `Retry-After` plus a margin, then the request is retried.
    /// Any other response, including 4xx, is returned to the caller.
    pub async fn execute_with_retry<F>(&self, endpoint: &str, build: F) -> Result<Response, ApiError>
    where
        F: Fn() -> RequestBuilder,
    {
        let service = self.service.as_str();
        let max_retries = self.policy.max_retries;
        let mut attempt = 0;

        loop {
            self.rate_limiter.wait_until_resumed().await;
            self.rate_limiter.acquire(endpoint).await;

            let error = match build().send().await {
                Ok(response) => {
                    let status = response.status();

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        let retry_after = response
                            .headers()
                            .get(reqwest::header::RETRY_AFTER)
                            .and_then(|v| v.to_str().ok())
                            .map(|v| parse_retry_after(v, DEFAULT_RETRY_AFTER))
                            .unwrap_or(DEFAULT_RETRY_AFTER);
                        self.rate_limiter.on_throttle(endpoint, retry_after);
                        ApiError::TooManyRequests { retry_after }
                    } else if status.is_server_error() {
                        ApiError::ServerError(format!("{endpoint} returned {status}"))
                    } else {
                        self.rate_limiter.on_success(endpoint);
                        if attempt > 0 {
                            info!(service, endpoint, attempt, "Request succeeded after retry");
                        }
                        return Ok(response);
                    }
                }
                Err(e) => ApiError::NetworkError(e),
            };

            if attempt >= max_retries {
                warn!(
                    service,
                    endpoint,
                    attempts = attempt + 1,
                    error = %error,
                    "Retry limit exhausted"
                );
                return Err(error);
            }

            // 429s wait on the service pause at the top of the loop instead.
            if !matches!(error, ApiError::TooManyRequests { .. }) {
                let delay = self.policy.delay_for(attempt);
                debug!(
                    service,
                    endpoint,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Transient error, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            attempt += 1;
        }
    }
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}
