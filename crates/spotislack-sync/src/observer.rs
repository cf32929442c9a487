//! Structured-log sync observer

use spotislack_core::{
    domain::{SyncOutcome, SyncResult, TickSummary, User},
    ports::ISyncObserver,
};
use tracing::{debug, error, info, warn};

/// Logs every user result and tick summary through `tracing`
///
/// Failures needing user action are logged at `error` with
/// `reauth_required = true` so they stand apart from transient noise.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl ISyncObserver for LogObserver {
    fn on_user_result(&self, user: &User, result: &SyncResult) {
        let duration_ms = result.duration.as_millis() as u64;
        match &result.outcome {
            SyncOutcome::Published { cleared } => info!(
                user_id = %result.user_id,
                slack_user = user.slack_user_id(),
                cleared,
                duration_ms,
                "Status published"
            ),
            SyncOutcome::Skipped { reason } => debug!(
                user_id = %result.user_id,
                reason = reason.as_str(),
                duration_ms,
                "Publish skipped"
            ),
            SyncOutcome::Failed(failure) if failure.is_retryable() => warn!(
                user_id = %result.user_id,
                service = failure.service.map(|s| s.as_str()),
                kind = failure.kind.as_str(),
                error = %failure.message,
                "User sync failed, will retry next tick"
            ),
            SyncOutcome::Failed(failure) => error!(
                user_id = %result.user_id,
                slack_user = user.slack_user_id(),
                service = failure.service.map(|s| s.as_str()),
                kind = failure.kind.as_str(),
                reauth_required = failure.reauth_required(),
                error = %failure.message,
                "User sync failed"
            ),
        }
    }

    fn on_tick_completed(&self, summary: &TickSummary) {
        info!(
            tick = summary.tick,
            users = summary.users,
            succeeded = summary.succeeded,
            skipped = summary.skipped,
            retryable_failures = summary.retryable_failures,
            fatal_failures = summary.fatal_failures,
            duration_ms = summary.duration.as_millis() as u64,
            "Tick completed"
        );
    }

    fn on_tick_failed(&self, tick: u64, err: &anyhow::Error) {
        error!(tick, error = %format!("{err:#}"), "Tick failed, retrying next tick");
    }
}
