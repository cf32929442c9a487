//! Spotislack Core - Domain types and port definitions
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `User`, `PlaybackState`, `StatusUpdate`, `SyncResult`
//! - **Port definitions** - Traits for adapters: `IUserRepository`, `IMusicService`,
//!   `IMessagingService`, `ISyncObserver`
//! - **Configuration** - Layered config (defaults, YAML file, environment)
//!
//! # Architecture
//!
//! The domain module contains pure data types with no I/O.
//! Ports define trait interfaces that adapter crates implement
//! (`spotislack-api` for HTTP services, `spotislack-store` for persistence).

pub mod config;
pub mod domain;
pub mod ports;
