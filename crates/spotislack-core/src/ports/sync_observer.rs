//! Sync observer port
//!
//! Observers receive every per-user result and one summary per tick. Calls
//! are synchronous and must not block; implementations record into logs or
//! metrics and return.

use crate::domain::{SyncResult, TickSummary, User};

/// Receiver of sync progress events
pub trait ISyncObserver: Send + Sync {
    /// Called once per user per tick, as soon as that user's pipeline finishes
    fn on_user_result(&self, user: &User, result: &SyncResult);

    /// Called once the whole tick has finished
    fn on_tick_completed(&self, summary: &TickSummary);

    /// Called when a tick was aborted before any user was processed
    fn on_tick_failed(&self, tick: u64, error: &anyhow::Error);
}
