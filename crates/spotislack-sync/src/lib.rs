//! Spotislack Sync - Playback to status synchronization
//!
//! Provides:
//! - Credential access and OAuth token refresh with write-through persistence
//! - Playback fetching with a single refresh-and-retry on expired tokens
//! - Pure mapping from playback state to a Slack status
//! - Idempotent status publishing
//! - The tick loop that runs every enabled user's pipeline concurrently
//!
//! ## Modules
//!
//! - [`credentials`] - Credential Store Adapter over the user repository
//! - [`fetcher`] - Playback Fetcher
//! - [`mapper`] - Status Mapper
//! - [`publisher`] - Status Publisher and the skip decision
//! - [`orchestrator`] - Sync Orchestrator (tick loop, pacing, stop)
//! - [`observer`] - Structured-log sync observer

pub mod credentials;
pub mod fetcher;
pub mod mapper;
pub mod observer;
pub mod orchestrator;
pub mod publisher;

#[cfg(test)]
mod test_support;

use std::time::Duration;

use spotislack_core::domain::{FailureKind, Service, ServiceError, SyncFailure};
use thiserror::Error;

pub use credentials::CredentialStoreAdapter;
pub use fetcher::PlaybackFetcher;
pub use mapper::StatusMapper;
pub use observer::LogObserver;
pub use orchestrator::{SyncDependencies, SyncOrchestrator, SyncSettings};
pub use publisher::StatusPublisher;

/// Errors that end one user's pipeline for the current tick
#[derive(Debug, Error)]
pub enum SyncError {
    /// A music or messaging API call failed
    #[error("{service} request failed: {source}")]
    Service {
        service: Service,
        #[source]
        source: ServiceError,
    },

    /// Exchanging the refresh token failed
    #[error("{service} token refresh failed: {source}")]
    Refresh {
        service: Service,
        #[source]
        source: ServiceError,
    },

    /// No refresh token is stored, so the user must re-authorize
    #[error("no {0} refresh token stored")]
    MissingRefreshToken(Service),

    /// The user store could not be read or written
    #[error("storage error: {0:#}")]
    Storage(anyhow::Error),

    /// The pipeline exceeded the per-user timeout
    #[error("user pipeline timed out after {0:?}")]
    Timeout(Duration),
}

impl SyncError {
    /// Classifies the error for the tick summary
    pub fn to_failure(&self) -> SyncFailure {
        let message = self.to_string();
        match self {
            SyncError::Service { service, source } => SyncFailure::new(
                Some(*service),
                FailureKind::from(source),
                message,
            ),
            // A network hiccup during refresh is retried next tick like any
            // other transient error; a rejected grant needs re-authorization.
            SyncError::Refresh { service, source } => {
                let kind = match source {
                    ServiceError::Transient(_) | ServiceError::RateLimited { .. } => {
                        FailureKind::from(source)
                    }
                    _ => FailureKind::RefreshFailed,
                };
                SyncFailure::new(Some(*service), kind, message)
            }
            SyncError::MissingRefreshToken(service) => {
                SyncFailure::new(Some(*service), FailureKind::AuthInvalid, message)
            }
            SyncError::Storage(_) => SyncFailure::new(None, FailureKind::Storage, message),
            SyncError::Timeout(_) => SyncFailure::new(None, FailureKind::Timeout, message),
        }
    }
}
