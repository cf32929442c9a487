//! Status update pushed to the messaging service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Target status for a user's messaging profile
///
/// A `clear` update carries empty text and emoji and removes whatever status
/// the daemon previously set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    /// Status text (at most 100 characters)
    pub text: String,
    /// Status emoji in `:name:` form
    pub emoji: String,
    /// When the messaging service should drop the status on its own
    pub expires_at: Option<DateTime<Utc>>,
    /// True when this update clears the status
    pub clear: bool,
}

impl StatusUpdate {
    /// An update that sets text and emoji with an optional expiry
    pub fn set(
        text: impl Into<String>,
        emoji: impl Into<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            text: text.into(),
            emoji: emoji.into(),
            expires_at,
            clear: false,
        }
    }

    /// An update that clears the status
    pub fn clear() -> Self {
        Self {
            text: String::new(),
            emoji: String::new(),
            expires_at: None,
            clear: true,
        }
    }

    /// Compares visible content, ignoring the expiry timestamp
    pub fn same_status(&self, other: &StatusUpdate) -> bool {
        self.clear == other.clear && self.text == other.text && self.emoji == other.emoji
    }

    /// Expiry as Unix seconds, 0 meaning "never"
    pub fn expiration_epoch(&self) -> i64 {
        self.expires_at.map(|at| at.timestamp()).unwrap_or(0)
    }
}
