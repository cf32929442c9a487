//! Playback Fetcher
//!
//! Retrieves the user's current Spotify playback. "Nothing playing" is a
//! normal outcome, not an error.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use spotislack_core::{
    domain::{PlaybackState, Service, User},
    ports::IMusicService,
};
use tracing::trace;

use crate::{credentials::CredentialStoreAdapter, SyncError};

pub struct PlaybackFetcher {
    music: Arc<dyn IMusicService>,
    credentials: Arc<CredentialStoreAdapter>,
}

impl PlaybackFetcher {
    pub fn new(music: Arc<dyn IMusicService>, credentials: Arc<CredentialStoreAdapter>) -> Self {
        Self { music, credentials }
    }

    /// Fetches playback with the stored token, refreshing it at most once
    pub async fn fetch(&self, user: &mut User, now: DateTime<Utc>) -> Result<PlaybackState, SyncError> {
        let music = &self.music;
        let state = self
            .credentials
            .call_with_refresh(user, Service::Spotify, now, |token| async move {
                music.current_playback(&token).await
            })
            .await?;

        trace!(
            user_id = %user.id(),
            playing = state.is_active(),
            track = state.active_track().map(|t| t.title.as_str()),
            "Fetched playback"
        );
        Ok(state)
    }
}
