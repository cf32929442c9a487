//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the sync core depends
//! on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IUserRepository`] - Persistent storage for users, tokens and last status
//! - [`IMusicService`] - Current playback lookup (Spotify)
//! - [`IMessagingService`] - Profile status updates (Slack)
//! - [`ITokenRefresher`] - OAuth refresh-token exchange for either service
//! - [`ISyncObserver`] - Per-user outcomes and per-tick summaries

pub mod messaging_service;
pub mod music_service;
pub mod sync_observer;
pub mod token_refresher;
pub mod user_repository;

pub use messaging_service::IMessagingService;
pub use music_service::IMusicService;
pub use sync_observer::ISyncObserver;
pub use token_refresher::ITokenRefresher;
pub use user_repository::IUserRepository;
