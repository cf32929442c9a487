//! Domain entities
//!
//! This module contains the core domain types for Spotislack:
//! - Newtypes for identifiers and the external service enum
//! - User records and their per-service OAuth tokens
//! - Playback snapshots fetched from the music service
//! - Status updates pushed to the messaging service
//! - Per-user and per-tick sync outcomes
//! - Error types shared across port boundaries

pub mod errors;
pub mod newtypes;
pub mod outcome;
pub mod playback;
pub mod status;
pub mod user;

// Re-export commonly used types
pub use errors::{DomainError, ServiceError};
pub use newtypes::{Service, UserId};
pub use outcome::{FailureKind, SkipReason, SyncFailure, SyncOutcome, SyncResult, TickSummary};
pub use playback::{PlaybackState, Track};
pub use status::StatusUpdate;
pub use user::{Tokens, User};
