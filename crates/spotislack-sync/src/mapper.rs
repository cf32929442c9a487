//! Status Mapper
//!
//! Pure mapping from [`PlaybackState`] to the [`StatusUpdate`] that should
//! be shown in Slack. No I/O, no clock reads: the expiry is derived from the
//! playback fetch timestamp.

use std::time::Duration;

use spotislack_core::domain::{PlaybackState, StatusUpdate, Track};

/// Slack rejects status text longer than this many characters
pub const MAX_STATUS_CHARS: usize = 100;

const ELLIPSIS: char = '…';

#[derive(Debug, Clone)]
pub struct StatusMapper {
    default_emoji: String,
    /// Tick interval plus grace period
    expiry_offset: chrono::Duration,
}

impl StatusMapper {
    pub fn new(default_emoji: impl Into<String>, tick_interval: Duration, grace: Duration) -> Self {
        let offset = tick_interval.saturating_add(grace);
        Self {
            default_emoji: default_emoji.into(),
            expiry_offset: chrono::Duration::from_std(offset)
                .unwrap_or_else(|_| chrono::Duration::seconds(i64::from(u32::MAX))),
        }
    }

    /// Derives the status for the given playback
    ///
    /// Not playing (idle, paused, ad) maps to a clear update.
    pub fn map(&self, state: &PlaybackState, preferred_emoji: Option<&str>) -> StatusUpdate {
        match state.active_track() {
            Some(track) => StatusUpdate::set(
                status_text(track),
                preferred_emoji.unwrap_or(&self.default_emoji),
                Some(state.fetched_at + self.expiry_offset),
            ),
            None => StatusUpdate::clear(),
        }
    }
}

/// `"<title> by <artist1>, <artist2>"`, truncated to [`MAX_STATUS_CHARS`]
pub fn status_text(track: &Track) -> String {
    let text = if track.artists.is_empty() {
        track.title.clone()
    } else {
        format!("{} by {}", track.title, track.artists.join(", "))
    };
    truncate_status(&text)
}

/// Keeps the first 99 characters, trims trailing whitespace and appends `…`
pub fn truncate_status(text: &str) -> String {
    if text.chars().count() <= MAX_STATUS_CHARS {
        return text.to_string();
    }
    let head: String = text.chars().take(MAX_STATUS_CHARS - 1).collect();
    let mut out = head.trim_end().to_string();
    out.push(ELLIPSIS);
    out
}
