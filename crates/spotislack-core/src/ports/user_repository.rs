//! User repository port (driven/secondary port)
//!
//! Uses `anyhow::Result` because storage errors are adapter-specific and the
//! sync core only needs to know that the call failed.

use crate::domain::{Service, StatusUpdate, Tokens, User, UserId};

/// Port trait for persistent user storage
///
/// Registration and removal happen outside the daemon; `save_user` and
/// `delete_user` exist for that collaborator and for tests.
#[async_trait::async_trait]
pub trait IUserRepository: Send + Sync {
    /// Returns every user with sync enabled, ordered by creation time
    async fn list_enabled_users(&self) -> anyhow::Result<Vec<User>>;

    /// Retrieves a user by ID
    async fn get_user(&self, id: &UserId) -> anyhow::Result<Option<User>>;

    /// Saves a user (insert or update)
    async fn save_user(&self, user: &User) -> anyhow::Result<()>;

    /// Deletes a user; deleting an unknown ID is not an error
    async fn delete_user(&self, id: &UserId) -> anyhow::Result<()>;

    /// Replaces the stored tokens for one service
    async fn update_tokens(
        &self,
        id: &UserId,
        service: Service,
        tokens: &Tokens,
    ) -> anyhow::Result<()>;

    /// Records the status most recently published (None after a clear)
    async fn update_last_status(
        &self,
        id: &UserId,
        status: Option<&StatusUpdate>,
    ) -> anyhow::Result<()>;
}
