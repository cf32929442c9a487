//! Playback snapshot fetched from the music service
//!
//! A [`PlaybackState`] is produced once per tick per user and never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The track currently loaded in a user's player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Provider-specific track identifier
    pub id: String,
    /// Track title
    pub title: String,
    /// Artist names, in credit order
    pub artists: Vec<String>,
    /// Track length in milliseconds, when reported
    pub duration_ms: Option<u64>,
}

/// Current playback state for one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackState {
    /// Loaded track (None when the player is empty or playing an ad)
    pub track: Option<Track>,
    /// Whether the player is actively playing
    pub is_playing: bool,
    /// Position within the track in milliseconds, when reported
    pub progress_ms: Option<u64>,
    /// When this state was fetched
    pub fetched_at: DateTime<Utc>,
}

impl PlaybackState {
    /// A state with an active track
    pub fn playing(track: Track, progress_ms: Option<u64>, fetched_at: DateTime<Utc>) -> Self {
        Self {
            track: Some(track),
            is_playing: true,
            progress_ms,
            fetched_at,
        }
    }

    /// A state with nothing playing
    pub fn not_playing(fetched_at: DateTime<Utc>) -> Self {
        Self {
            track: None,
            is_playing: false,
            progress_ms: None,
            fetched_at,
        }
    }

    /// Returns the track when something is actually playing
    pub fn active_track(&self) -> Option<&Track> {
        if self.is_playing {
            self.track.as_ref()
        } else {
            None
        }
    }

    /// Returns true if a track is playing right now
    pub fn is_active(&self) -> bool {
        self.active_track().is_some()
    }
}
