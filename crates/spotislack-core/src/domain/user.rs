//! User domain entity
//!
//! A [`User`] links a Slack identity to a Spotify identity and carries the
//! OAuth tokens for both services, plus the last status the daemon set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    newtypes::{Service, UserId},
    status::StatusUpdate,
};

/// OAuth tokens for one external service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tokens {
    /// Bearer token for authenticating API requests
    pub access_token: String,
    /// Token for obtaining a new access token without user interaction
    pub refresh_token: Option<String>,
    /// When the access token expires (None for non-expiring tokens)
    pub expires_at: Option<DateTime<Utc>>,
}

impl Tokens {
    /// Creates a token set
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at,
        }
    }

    /// Returns true if the access token is known to have expired at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// A registered user whose Spotify playback is mirrored into Slack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier for this user
    id: UserId,
    /// Slack member ID (e.g. `U024BE7LH`)
    slack_user_id: String,
    /// Slack workspace ID (e.g. `T024BE7LD`)
    slack_team_id: String,
    /// Spotify account ID
    spotify_user_id: String,
    /// Spotify OAuth tokens
    spotify_tokens: Tokens,
    /// Slack OAuth tokens
    slack_tokens: Tokens,
    /// Status most recently published for this user (None if never set)
    last_status: Option<StatusUpdate>,
    /// Whether the user takes part in sync ticks
    sync_enabled: bool,
    /// Preferred status emoji, overriding the configured default
    status_emoji: Option<String>,
    /// When this user was registered
    created_at: DateTime<Utc>,
    /// Last time this record was modified
    updated_at: DateTime<Utc>,
}

impl User {
    /// Creates a new enabled user with no status history
    pub fn new(
        slack_user_id: impl Into<String>,
        slack_team_id: impl Into<String>,
        spotify_user_id: impl Into<String>,
        spotify_tokens: Tokens,
        slack_tokens: Tokens,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: UserId::new(),
            slack_user_id: slack_user_id.into(),
            slack_team_id: slack_team_id.into(),
            spotify_user_id: spotify_user_id.into(),
            spotify_tokens,
            slack_tokens,
            last_status: None,
            sync_enabled: true,
            status_emoji: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replaces the generated ID and timestamps (for reconstitution from storage)
    pub fn with_identity(
        mut self,
        id: UserId,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        self.id = id;
        self.created_at = created_at;
        self.updated_at = updated_at;
        self
    }

    /// Sets the last published status
    pub fn with_last_status(mut self, status: Option<StatusUpdate>) -> Self {
        self.last_status = status;
        self
    }

    /// Sets the sync-enabled flag
    pub fn with_sync_enabled(mut self, enabled: bool) -> Self {
        self.sync_enabled = enabled;
        self
    }

    /// Sets the preferred status emoji
    pub fn with_status_emoji(mut self, emoji: Option<String>) -> Self {
        self.status_emoji = emoji;
        self
    }

    // --- Getters ---

    pub fn id(&self) -> &UserId {
        &self.id
    }

    pub fn slack_user_id(&self) -> &str {
        &self.slack_user_id
    }

    pub fn slack_team_id(&self) -> &str {
        &self.slack_team_id
    }

    pub fn spotify_user_id(&self) -> &str {
        &self.spotify_user_id
    }

    /// Returns the tokens held for the given service
    pub fn tokens(&self, service: Service) -> &Tokens {
        match service {
            Service::Spotify => &self.spotify_tokens,
            Service::Slack => &self.slack_tokens,
        }
    }

    pub fn last_status(&self) -> Option<&StatusUpdate> {
        self.last_status.as_ref()
    }

    pub fn sync_enabled(&self) -> bool {
        self.sync_enabled
    }

    pub fn status_emoji(&self) -> Option<&str> {
        self.status_emoji.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    // --- Mutations ---

    /// Replaces the tokens for a service (after a refresh)
    pub fn set_tokens(&mut self, service: Service, tokens: Tokens) {
        match service {
            Service::Spotify => self.spotify_tokens = tokens,
            Service::Slack => self.slack_tokens = tokens,
        }
        self.updated_at = Utc::now();
    }

    /// Records the status most recently published
    pub fn set_last_status(&mut self, status: Option<StatusUpdate>) {
        self.last_status = status;
        self.updated_at = Utc::now();
    }
}
