//! Configuration module for Spotislack.
//!
//! Provides typed configuration structs with defaults, optional YAML file
//! loading, environment overrides, validation, and a builder pattern for
//! programmatic use.
//!
//! Sources are layered, later overriding earlier:
//! defaults → YAML file → environment variables.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for the sync daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub sync: SyncConfig,
    pub http: HttpConfig,
    #[serde(deserialize_with = "spotify_section")]
    pub spotify: ProviderConfig,
    #[serde(deserialize_with = "slack_section")]
    pub slack: ProviderConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

/// User store settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite URL or path, e.g. `sqlite:///var/lib/spotislack/users.db`. Required.
    pub url: Option<String>,
}

/// Sync loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Seconds between tick starts. Required.
    pub tick_interval: Option<u64>,
    /// Maximum number of user pipelines running at once.
    pub worker_concurrency: usize,
    /// Seconds a single user pipeline may run before it is abandoned.
    pub user_timeout: u64,
    /// Extra seconds added to a status expiry beyond the next tick.
    /// Must exceed `tick_interval`.
    pub status_expiry_grace: u64,
    /// Emoji used when the user has no preference.
    pub default_emoji: String,
}

/// Outbound HTTP settings shared by both service clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Retries after the first attempt for transient failures.
    pub max_retries: u32,
    /// Base delay for exponential backoff, in milliseconds.
    pub retry_base_delay_ms: u64,
    /// Per-request timeout in seconds.
    pub request_timeout: u64,
}

/// Credentials and endpoints for one OAuth provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Base URL for API calls (overridable for tests).
    pub api_base_url: String,
    /// OAuth token endpoint used for refresh-token grants.
    pub token_url: String,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Output format: `text` or `json`.
    pub format: String,
}

/// Prometheus exporter settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Listen address for `/metrics`, e.g. `127.0.0.1:9464`. Disabled when unset.
    pub endpoint: Option<String>,
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

pub const DEFAULT_SPOTIFY_API_BASE_URL: &str = "https://api.spotify.com";
pub const DEFAULT_SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const DEFAULT_SLACK_API_BASE_URL: &str = "https://slack.com/api";
pub const DEFAULT_SLACK_TOKEN_URL: &str = "https://slack.com/api/oauth.v2.access";

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tick_interval: None,
            worker_concurrency: 10,
            user_timeout: 30,
            status_expiry_grace: 60,
            default_emoji: ":headphones:".to_string(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_base_delay_ms: 500,
            request_timeout: 10,
        }
    }
}

impl ProviderConfig {
    /// Spotify Web API defaults
    pub fn spotify() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            api_base_url: DEFAULT_SPOTIFY_API_BASE_URL.to_string(),
            token_url: DEFAULT_SPOTIFY_TOKEN_URL.to_string(),
        }
    }

    /// Slack Web API defaults
    pub fn slack() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            api_base_url: DEFAULT_SLACK_API_BASE_URL.to_string(),
            token_url: DEFAULT_SLACK_TOKEN_URL.to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            sync: SyncConfig::default(),
            http: HttpConfig::default(),
            spotify: ProviderConfig::spotify(),
            slack: ProviderConfig::slack(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

/// Provider section as written in YAML, where every field is optional and
/// missing endpoints fall back to the provider's defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PartialProvider {
    client_id: Option<String>,
    client_secret: Option<String>,
    api_base_url: Option<String>,
    token_url: Option<String>,
}

impl PartialProvider {
    fn over(self, base: ProviderConfig) -> ProviderConfig {
        ProviderConfig {
            client_id: self.client_id.or(base.client_id),
            client_secret: self.client_secret.or(base.client_secret),
            api_base_url: self.api_base_url.unwrap_or(base.api_base_url),
            token_url: self.token_url.unwrap_or(base.token_url),
        }
    }
}

fn spotify_section<'de, D>(d: D) -> Result<ProviderConfig, D::Error>
where
    D: serde::Deserializer<'de>,
{
    PartialProvider::deserialize(d).map(|p| p.over(ProviderConfig::spotify()))
}

fn slack_section<'de, D>(d: D) -> Result<ProviderConfig, D::Error>
where
    D: serde::Deserializer<'de>,
{
    PartialProvider::deserialize(d).map(|p| p.over(ProviderConfig::slack()))
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.tick_interval"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Fatal configuration problems detected at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv { var: String, value: String },

    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("invalid configuration:\n{}", format_errors(.0))]
    Invalid(Vec<ValidationError>),
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Environment variables recognised by [`Config::apply_env`].
pub mod env {
    pub const DATABASE_URL: &str = "DATABASE_URL";
    pub const TICK_INTERVAL: &str = "SET_STATUSES_SLEEP_INTERVAL";
    pub const WORKER_CONCURRENCY: &str = "WORKER_COROUTINES";
    pub const USER_TIMEOUT: &str = "USER_TIMEOUT";
    pub const STATUS_EXPIRY_GRACE: &str = "STATUS_EXPIRY_GRACE";
    pub const DEFAULT_EMOJI: &str = "DEFAULT_STATUS_EMOJI";
    pub const HTTP_MAX_RETRIES: &str = "HTTP_MAX_RETRIES";
    pub const HTTP_RETRY_BASE_DELAY_MS: &str = "HTTP_RETRY_BASE_DELAY_MS";
    pub const HTTP_REQUEST_TIMEOUT: &str = "HTTP_REQUEST_TIMEOUT";
    pub const SPOTIFY_CLIENT_ID: &str = "SPOTIFY_CLIENT_ID";
    pub const SPOTIFY_CLIENT_SECRET: &str = "SPOTIFY_CLIENT_SECRET";
    pub const SPOTIFY_API_BASE_URL: &str = "SPOTIFY_API_BASE_URL";
    pub const SPOTIFY_TOKEN_URL: &str = "SPOTIFY_TOKEN_URL";
    pub const SLACK_CLIENT_ID: &str = "SLACK_CLIENT_ID";
    pub const SLACK_CLIENT_SECRET: &str = "SLACK_CLIENT_SECRET";
    pub const SLACK_API_BASE_URL: &str = "SLACK_API_BASE_URL";
    pub const SLACK_TOKEN_URL: &str = "SLACK_TOKEN_URL";
    pub const METRICS_ENDPOINT: &str = "METRICS_ENDPOINT";
    pub const LOG_LEVEL: &str = "LOG_LEVEL";
    pub const LOG_FORMAT: &str = "LOG_FORMAT";
}

impl Config {
    /// Defaults with provider-specific endpoints filled in.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a YAML file at `path`, on top of defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text, on top of defaults.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::new());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Overlay values from the process environment.
    pub fn apply_process_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env(|key| std::env::var(key).ok())
    }

    /// Overlay values from an environment lookup.
    ///
    /// Empty values are ignored. Numeric variables that fail to parse are
    /// reported as [`ConfigError::InvalidEnv`].
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(env::DATABASE_URL) {
            self.database.url = Some(v);
        }
        if let Some(v) = get(env::TICK_INTERVAL) {
            self.sync.tick_interval = Some(parse_env(env::TICK_INTERVAL, &v)?);
        }
        if let Some(v) = get(env::WORKER_CONCURRENCY) {
            self.sync.worker_concurrency = parse_env(env::WORKER_CONCURRENCY, &v)?;
        }
        if let Some(v) = get(env::USER_TIMEOUT) {
            self.sync.user_timeout = parse_env(env::USER_TIMEOUT, &v)?;
        }
        if let Some(v) = get(env::STATUS_EXPIRY_GRACE) {
            self.sync.status_expiry_grace = parse_env(env::STATUS_EXPIRY_GRACE, &v)?;
        }
        if let Some(v) = get(env::DEFAULT_EMOJI) {
            self.sync.default_emoji = v;
        }
        if let Some(v) = get(env::HTTP_MAX_RETRIES) {
            self.http.max_retries = parse_env(env::HTTP_MAX_RETRIES, &v)?;
        }
        if let Some(v) = get(env::HTTP_RETRY_BASE_DELAY_MS) {
            self.http.retry_base_delay_ms = parse_env(env::HTTP_RETRY_BASE_DELAY_MS, &v)?;
        }
        if let Some(v) = get(env::HTTP_REQUEST_TIMEOUT) {
            self.http.request_timeout = parse_env(env::HTTP_REQUEST_TIMEOUT, &v)?;
        }
        if let Some(v) = get(env::SPOTIFY_CLIENT_ID) {
            self.spotify.client_id = Some(v);
        }
        if let Some(v) = get(env::SPOTIFY_CLIENT_SECRET) {
            self.spotify.client_secret = Some(v);
        }
        if let Some(v) = get(env::SPOTIFY_API_BASE_URL) {
            self.spotify.api_base_url = v;
        }
        if let Some(v) = get(env::SPOTIFY_TOKEN_URL) {
            self.spotify.token_url = v;
        }
        if let Some(v) = get(env::SLACK_CLIENT_ID) {
            self.slack.client_id = Some(v);
        }
        if let Some(v) = get(env::SLACK_CLIENT_SECRET) {
            self.slack.client_secret = Some(v);
        }
        if let Some(v) = get(env::SLACK_API_BASE_URL) {
            self.slack.api_base_url = v;
        }
        if let Some(v) = get(env::SLACK_TOKEN_URL) {
            self.slack.token_url = v;
        }
        if let Some(v) = get(env::METRICS_ENDPOINT) {
            self.metrics.endpoint = Some(v);
        }
        if let Some(v) = get(env::LOG_LEVEL) {
            self.logging.level = v.to_lowercase();
        }
        if let Some(v) = get(env::LOG_FORMAT) {
            self.logging.format = v.to_lowercase();
        }
        Ok(())
    }

    /// Full startup load: defaults, optional file, process environment, validation.
    pub fn load_layered(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::load(p)?,
            None => Self::new(),
        };
        config.apply_process_env()?;
        config.ensure_valid()?;
        Ok(config)
    }

    /// Returns `Err(ConfigError::Invalid)` listing every violation, if any.
    pub fn ensure_valid(&self) -> Result<(), ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }

    // --- Typed accessors ---

    pub fn database_url(&self) -> Result<&str, ConfigError> {
        self.database
            .url
            .as_deref()
            .ok_or(ConfigError::Missing(env::DATABASE_URL))
    }

    pub fn tick_interval(&self) -> Result<Duration, ConfigError> {
        self.sync
            .tick_interval
            .map(Duration::from_secs)
            .ok_or(ConfigError::Missing(env::TICK_INTERVAL))
    }

    pub fn user_timeout(&self) -> Duration {
        Duration::from_secs(self.sync.user_timeout)
    }

    pub fn status_expiry_grace(&self) -> Duration {
        Duration::from_secs(self.sync.status_expiry_grace)
    }
}

fn parse_env<T: std::str::FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        var: var.to_string(),
        value: value.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `logging.format`.
const VALID_LOG_FORMATS: &[&str] = &["text", "json"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- database ---
        match self.database.url.as_deref() {
            None => errors.push(ValidationError::new(
                "database.url",
                format!("is required (set {})", env::DATABASE_URL),
            )),
            Some(url) if url.trim().is_empty() => {
                errors.push(ValidationError::new("database.url", "must not be empty"))
            }
            Some(_) => {}
        }

        // --- sync ---
        match self.sync.tick_interval {
            None => errors.push(ValidationError::new(
                "sync.tick_interval",
                format!("is required (set {})", env::TICK_INTERVAL),
            )),
            Some(0) => errors.push(ValidationError::new(
                "sync.tick_interval",
                "must be greater than 0",
            )),
            Some(_) => {}
        }
        if self.sync.worker_concurrency == 0 || self.sync.worker_concurrency > 1000 {
            errors.push(ValidationError::new(
                "sync.worker_concurrency",
                "must be in range 1..=1000",
            ));
        }
        // A status must outlive the gap to the next tick, or every tick republishes it
        let min_grace = self.sync.tick_interval.unwrap_or(0);
        if self.sync.status_expiry_grace <= min_grace {
            errors.push(ValidationError::new(
                "sync.status_expiry_grace",
                format!("must be greater than the tick interval ({min_grace}s)"),
            ));
        }
        if self.sync.user_timeout == 0 {
            errors.push(ValidationError::new(
                "sync.user_timeout",
                "must be greater than 0",
            ));
        }
        if !is_emoji_code(&self.sync.default_emoji) {
            errors.push(ValidationError::new(
                "sync.default_emoji",
                format!(
                    "must look like ':name:', got '{}'",
                    self.sync.default_emoji
                ),
            ));
        }

        // --- http ---
        if self.http.max_retries > 10 {
            errors.push(ValidationError::new(
                "http.max_retries",
                "must be at most 10",
            ));
        }
        if self.http.request_timeout == 0 {
            errors.push(ValidationError::new(
                "http.request_timeout",
                "must be greater than 0",
            ));
        }

        // --- providers ---
        if self.spotify.client_id.is_none() {
            errors.push(ValidationError::new(
                "spotify.client_id",
                format!("is required (set {})", env::SPOTIFY_CLIENT_ID),
            ));
        }
        if self.spotify.client_secret.is_none() {
            errors.push(ValidationError::new(
                "spotify.client_secret",
                format!("is required (set {})", env::SPOTIFY_CLIENT_SECRET),
            ));
        }
        if self.slack.client_id.is_some() != self.slack.client_secret.is_some() {
            errors.push(ValidationError::new(
                "slack.client_secret",
                "slack client_id and client_secret must be set together",
            ));
        }
        for (field, url) in [
            ("spotify.api_base_url", &self.spotify.api_base_url),
            ("spotify.token_url", &self.spotify.token_url),
            ("slack.api_base_url", &self.slack.api_base_url),
            ("slack.token_url", &self.slack.token_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                errors.push(ValidationError::new(
                    field,
                    format!("must be an http(s) URL, got '{url}'"),
                ));
            }
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError::new(
                "logging.level",
                format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            ));
        }
        if !VALID_LOG_FORMATS.contains(&self.logging.format.as_str()) {
            errors.push(ValidationError::new(
                "logging.format",
                format!(
                    "invalid format '{}'; valid options: {}",
                    self.logging.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            ));
        }

        // --- metrics ---
        if let Some(endpoint) = &self.metrics.endpoint {
            if endpoint.parse::<std::net::SocketAddr>().is_err() {
                errors.push(ValidationError::new(
                    "metrics.endpoint",
                    format!("must be a socket address like 127.0.0.1:9464, got '{endpoint}'"),
                ));
            }
        }

        errors
    }
}

fn is_emoji_code(s: &str) -> bool {
    s.len() > 2 && s.starts_with(':') && s.ends_with(':') && !s[1..s.len() - 1].contains(':')
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::new`] and allows selective overrides.
///
/// # Example
///
/// ```rust
/// use spotislack_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .database_url("sqlite::memory:")
///     .tick_interval(5)
///     .spotify_credentials("id", "secret")
///     .build_validated()
///     .expect("valid config");
/// assert_eq!(config.sync.tick_interval, Some(5));
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::new`] values.
    pub fn new() -> Self {
        Self {
            config: Config::new(),
        }
    }

    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.config.database.url = Some(url.into());
        self
    }

    // --- sync ---

    pub fn tick_interval(mut self, seconds: u64) -> Self {
        self.config.sync.tick_interval = Some(seconds);
        self
    }

    pub fn worker_concurrency(mut self, n: usize) -> Self {
        self.config.sync.worker_concurrency = n;
        self
    }

    pub fn user_timeout(mut self, seconds: u64) -> Self {
        self.config.sync.user_timeout = seconds;
        self
    }

    pub fn status_expiry_grace(mut self, seconds: u64) -> Self {
        self.config.sync.status_expiry_grace = seconds;
        self
    }

    pub fn default_emoji(mut self, emoji: impl Into<String>) -> Self {
        self.config.sync.default_emoji = emoji.into();
        self
    }

    // --- http ---

    pub fn http_max_retries(mut self, n: u32) -> Self {
        self.config.http.max_retries = n;
        self
    }

    pub fn http_retry_base_delay_ms(mut self, ms: u64) -> Self {
        self.config.http.retry_base_delay_ms = ms;
        self
    }

    // --- providers ---

    pub fn spotify_credentials(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.config.spotify.client_id = Some(client_id.into());
        self.config.spotify.client_secret = Some(client_secret.into());
        self
    }

    pub fn slack_credentials(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.config.slack.client_id = Some(client_id.into());
        self.config.slack.client_secret = Some(client_secret.into());
        self
    }

    pub fn spotify_base_urls(mut self, api: impl Into<String>, token: impl Into<String>) -> Self {
        self.config.spotify.api_base_url = api.into();
        self.config.spotify.token_url = token.into();
        self
    }

    pub fn slack_base_urls(mut self, api: impl Into<String>, token: impl Into<String>) -> Self {
        self.config.slack.api_base_url = api.into();
        self.config.slack.token_url = token.into();
        self
    }

    // --- logging / metrics ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_format(mut self, format: impl Into<String>) -> Self {
        self.config.logging.format = format.into();
        self
    }

    pub fn metrics_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.metrics.endpoint = Some(endpoint.into());
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
