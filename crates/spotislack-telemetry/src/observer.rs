//! Sync observer that feeds the metrics registry

use std::sync::Arc;

use spotislack_core::{
    domain::{SyncOutcome, SyncResult, TickSummary, User},
    ports::ISyncObserver,
};

use crate::metrics::MetricsRegistry;

/// Records every sync event into a shared [`MetricsRegistry`]
pub struct MetricsObserver {
    metrics: Arc<MetricsRegistry>,
}

impl MetricsObserver {
    pub fn new(metrics: Arc<MetricsRegistry>) -> Self {
        Self { metrics }
    }
}

/// `kind` label for an outcome
fn outcome_kind(outcome: &SyncOutcome) -> &'static str {
    match outcome {
        SyncOutcome::Published { cleared: true } => "cleared",
        SyncOutcome::Published { cleared: false } => "set",
        SyncOutcome::Skipped { reason } => reason.as_str(),
        SyncOutcome::Failed(failure) => failure.kind.as_str(),
    }
}

impl ISyncObserver for MetricsObserver {
    fn on_user_result(&self, _user: &User, result: &SyncResult) {
        self.metrics
            .record_user_outcome(result.outcome.as_str(), outcome_kind(&result.outcome));
    }

    fn on_tick_completed(&self, summary: &TickSummary) {
        self.metrics
            .record_tick_completed(summary.users, summary.duration.as_secs_f64());
    }

    fn on_tick_failed(&self, _tick: u64, _error: &anyhow::Error) {
        self.metrics.record_tick_failed();
    }
}
