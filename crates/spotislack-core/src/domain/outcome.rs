//! Per-user sync outcomes and per-tick aggregates
//!
//! Every user pipeline yields exactly one [`SyncResult`]; the orchestrator
//! folds them into a [`TickSummary`] that observers receive at the end of
//! each tick. Neither type is persisted.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    errors::ServiceError,
    newtypes::{Service, UserId},
};

/// Classification of a per-user failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Network error, timeout or 5xx that survived bounded retries
    Transient,
    /// The service kept throttling us
    RateLimited,
    /// Credentials were rejected; the user must re-authenticate
    AuthInvalid,
    /// Token refresh exchange failed
    RefreshFailed,
    /// The pipeline exceeded the per-user timeout
    Timeout,
    /// The service answered with something we could not use
    InvalidResponse,
    /// Persisting tokens or status failed
    Storage,
    /// The pipeline panicked
    Internal,
}

impl FailureKind {
    /// Returns true if the next tick can reasonably expect a different result
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FailureKind::Transient
                | FailureKind::RateLimited
                | FailureKind::Timeout
                | FailureKind::Storage
        )
    }

    /// Stable name, used as a metric label
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Transient => "transient",
            FailureKind::RateLimited => "rate_limited",
            FailureKind::AuthInvalid => "auth_invalid",
            FailureKind::RefreshFailed => "refresh_failed",
            FailureKind::Timeout => "timeout",
            FailureKind::InvalidResponse => "invalid_response",
            FailureKind::Storage => "storage",
            FailureKind::Internal => "internal",
        }
    }
}

impl From<&ServiceError> for FailureKind {
    fn from(err: &ServiceError) -> Self {
        match err {
            ServiceError::Transient(_) => FailureKind::Transient,
            ServiceError::RateLimited { .. } => FailureKind::RateLimited,
            // An expiry that outlives the single refresh is treated as a rejection
            ServiceError::AuthExpired | ServiceError::AuthInvalid(_) => FailureKind::AuthInvalid,
            ServiceError::InvalidResponse(_) => FailureKind::InvalidResponse,
        }
    }
}

/// Why a pipeline finished without publishing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The derived status matches the cached one
    Unchanged,
    /// Nothing is playing and no status was set by us
    NothingToClear,
    /// The orchestrator was stopped before this pipeline started
    Stopped,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Unchanged => "unchanged",
            SkipReason::NothingToClear => "nothing_to_clear",
            SkipReason::Stopped => "stopped",
        }
    }
}

/// A typed per-user failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncFailure {
    /// Service the failing call was made against (None for local failures)
    pub service: Option<Service>,
    pub kind: FailureKind,
    pub message: String,
}

impl SyncFailure {
    pub fn new(service: Option<Service>, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            service,
            kind,
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// True when only user re-authentication can fix this
    pub fn reauth_required(&self) -> bool {
        matches!(self.kind, FailureKind::AuthInvalid | FailureKind::RefreshFailed)
    }
}

/// Outcome of one user's pipeline in one tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// A status update was sent
    Published {
        /// True when the update cleared the status
        cleared: bool,
    },
    /// Nothing needed to be sent
    Skipped { reason: SkipReason },
    /// The pipeline failed
    Failed(SyncFailure),
}

impl SyncOutcome {
    /// Stable name, used as a metric label
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncOutcome::Published { .. } => "published",
            SyncOutcome::Skipped { .. } => "skipped",
            SyncOutcome::Failed(_) => "failed",
        }
    }
}

/// Result of one user's pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    pub user_id: UserId,
    pub outcome: SyncOutcome,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

impl SyncResult {
    pub fn new(user_id: UserId, outcome: SyncOutcome, duration: Duration) -> Self {
        Self {
            user_id,
            outcome,
            duration,
        }
    }
}

/// Aggregate of all user results for one tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickSummary {
    /// Monotonic tick counter, starting at 1
    pub tick: u64,
    pub started_at: DateTime<Utc>,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
    /// Number of users processed
    pub users: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub retryable_failures: usize,
    pub fatal_failures: usize,
    pub results: Vec<SyncResult>,
}

impl TickSummary {
    /// Folds per-user results into a summary
    pub fn from_results(
        tick: u64,
        started_at: DateTime<Utc>,
        duration: Duration,
        results: Vec<SyncResult>,
    ) -> Self {
        let mut summary = Self {
            tick,
            started_at,
            duration,
            users: results.len(),
            succeeded: 0,
            skipped: 0,
            retryable_failures: 0,
            fatal_failures: 0,
            results: Vec::new(),
        };

        for result in &results {
            match &result.outcome {
                SyncOutcome::Published { .. } => summary.succeeded += 1,
                SyncOutcome::Skipped { .. } => summary.skipped += 1,
                SyncOutcome::Failed(f) if f.is_retryable() => summary.retryable_failures += 1,
                SyncOutcome::Failed(_) => summary.fatal_failures += 1,
            }
        }
        summary.results = results;
        summary
    }

    /// Total failures of either kind
    pub fn failed(&self) -> usize {
        self.retryable_failures + self.fatal_failures
    }

    /// Number of publish calls that cleared a status
    pub fn cleared(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, SyncOutcome::Published { cleared: true }))
            .count()
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
