//! Spotislack Store - User and credential persistence
//!
//! SQLite-based storage for registered users, their Spotify and Slack OAuth
//! tokens, and the last status published for each of them.
//!
//! ## Architecture
//!
//! This crate implements the `IUserRepository` port from `spotislack-core`
//! using SQLite as the storage backend. It is a driven (secondary) adapter
//! in the hexagonal architecture.
//!
//! ## Key Components
//!
//! - [`DatabasePool`] - Connection pool with bootstrap schema
//! - [`SqliteUserRepository`] - `IUserRepository` implementation
//! - [`StoreError`] - Error types for store operations
//!
//! ## Usage
//!
//! ```no_run
//! use spotislack_store::{DatabasePool, SqliteUserRepository};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::connect("sqlite:///var/lib/spotislack/users.db").await?;
//! let repo = SqliteUserRepository::new(pool.pool().clone());
//! // Use repo as IUserRepository...
//! # Ok(())
//! # }
//! ```

pub mod pool;
pub mod repository;

pub use pool::DatabasePool;
pub use repository::SqliteUserRepository;

/// Errors that can occur during store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema bootstrap failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Serialization or deserialization of domain types failed
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An update targeted a user that does not exist
    #[error("User not found: {0}")]
    NotFound(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::QueryFailed(e.to_string())
    }
}
