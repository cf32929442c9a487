//! Messaging service port (driven/secondary port)

use crate::domain::{ServiceError, StatusUpdate};

/// Port trait for writing a user's profile status
#[async_trait::async_trait]
pub trait IMessagingService: Send + Sync {
    /// Sets (or clears) the status; calling twice with the same update is harmless
    async fn set_status(&self, access_token: &str, update: &StatusUpdate)
        -> Result<(), ServiceError>;
}
