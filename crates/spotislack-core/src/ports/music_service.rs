//! Music service port (driven/secondary port)

use crate::domain::{PlaybackState, ServiceError};

/// Port trait for reading a user's current playback
#[async_trait::async_trait]
pub trait IMusicService: Send + Sync {
    /// Fetches current playback using the given access token
    ///
    /// "Nothing playing" is `Ok` with an inactive [`PlaybackState`], never an
    /// error. An expired token yields [`ServiceError::AuthExpired`].
    async fn current_playback(&self, access_token: &str) -> Result<PlaybackState, ServiceError>;
}
