//! Sync Orchestrator
//!
//! The [`SyncOrchestrator`] owns the tick loop. Each tick loads the enabled
//! users and runs one pipeline per user on a bounded pool of tasks:
//!
//! ```text
//! Idle ──→ Fetching ──→ NotPlaying ──────────────────────────→ Idle
//!              │    └──→ Playing ──→ Mapping ──→ Publishing ──→ Idle
//!              └──────────────── Error ←───────────┘
//! ```
//!
//! A failing user only ends its own pipeline for the current tick. Ticks are
//! paced from their start: a short tick sleeps until `start + interval`, an
//! overrunning tick is followed immediately by the next one.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::Result;
use chrono::Utc;
use dashmap::DashMap;
use spotislack_core::{
    config::{Config, ConfigError},
    domain::{
        FailureKind, SkipReason, StatusUpdate, SyncFailure, SyncOutcome, SyncResult, TickSummary,
        User, UserId,
    },
    ports::{IMessagingService, IMusicService, ISyncObserver, ITokenRefresher, IUserRepository},
};
use tokio::{
    sync::{Mutex, Semaphore},
    task::JoinSet,
    time::Instant,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::{
    credentials::CredentialStoreAdapter, fetcher::PlaybackFetcher, mapper::StatusMapper,
    publisher::{skip_reason, StatusPublisher},
    SyncError,
};

// ============================================================================
// Settings and dependencies
// ============================================================================

/// Tuning for the tick loop and the status mapper
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub tick_interval: Duration,
    /// Maximum number of user pipelines running at once
    pub worker_concurrency: usize,
    /// Upper bound on one user's pipeline
    pub user_timeout: Duration,
    /// Added to the tick interval when computing status expiry
    pub status_expiry_grace: Duration,
    pub default_emoji: String,
}

impl SyncSettings {
    /// Extracts the sync settings from a loaded configuration
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            tick_interval: config.tick_interval()?,
            worker_concurrency: config.sync.worker_concurrency.max(1),
            user_timeout: config.user_timeout(),
            status_expiry_grace: config.status_expiry_grace(),
            default_emoji: config.sync.default_emoji.clone(),
        })
    }
}

/// Port implementations the orchestrator drives
#[derive(Clone)]
pub struct SyncDependencies {
    pub repository: Arc<dyn IUserRepository>,
    pub music: Arc<dyn IMusicService>,
    pub messaging: Arc<dyn IMessagingService>,
    pub refresher: Arc<dyn ITokenRefresher>,
}

// ============================================================================
// Pipeline state
// ============================================================================

/// Where a user's pipeline is within the current tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Fetching,
    NotPlaying,
    Playing,
    Mapping,
    Publishing,
}

impl PipelineState {
    /// Moves to `next`, tracing the transition
    fn advance(&mut self, next: PipelineState, user_id: &UserId) {
        trace!(%user_id, from = self.as_str(), to = next.as_str(), "Pipeline transition");
        *self = next;
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Fetching => "fetching",
            PipelineState::NotPlaying => "not_playing",
            PipelineState::Playing => "playing",
            PipelineState::Mapping => "mapping",
            PipelineState::Publishing => "publishing",
        }
    }
}

// ============================================================================
// SyncOrchestrator
// ============================================================================

/// Runs every enabled user's fetch → map → publish pipeline, tick after tick
///
/// Cheap to clone; clones share the same caches, locks and stop signal.
#[derive(Clone)]
pub struct SyncOrchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    credentials: Arc<CredentialStoreAdapter>,
    fetcher: PlaybackFetcher,
    mapper: StatusMapper,
    publisher: StatusPublisher,
    observers: Vec<Arc<dyn ISyncObserver>>,
    settings: SyncSettings,
    workers: Arc<Semaphore>,
    /// One lock per user; a pipeline holds it for its whole run
    user_locks: DashMap<UserId, Arc<Mutex<()>>>,
    /// Last status this daemon set per user; `None` once cleared
    last_status: DashMap<UserId, Option<StatusUpdate>>,
    cancel: CancellationToken,
    ticks: AtomicU64,
}

impl SyncOrchestrator {
    pub fn new(deps: SyncDependencies, settings: SyncSettings) -> Self {
        let credentials = Arc::new(CredentialStoreAdapter::new(deps.repository, deps.refresher));
        let mapper = StatusMapper::new(
            settings.default_emoji.clone(),
            settings.tick_interval,
            settings.status_expiry_grace,
        );

        info!(
            tick_interval_s = settings.tick_interval.as_secs_f64(),
            workers = settings.worker_concurrency,
            user_timeout_s = settings.user_timeout.as_secs(),
            "Creating sync orchestrator"
        );

        Self {
            inner: Arc::new(Inner {
                fetcher: PlaybackFetcher::new(deps.music, credentials.clone()),
                publisher: StatusPublisher::new(deps.messaging, credentials.clone()),
                credentials,
                mapper,
                observers: Vec::new(),
                workers: Arc::new(Semaphore::new(settings.worker_concurrency.max(1))),
                settings,
                user_locks: DashMap::new(),
                last_status: DashMap::new(),
                cancel: CancellationToken::new(),
                ticks: AtomicU64::new(0),
            }),
        }
    }

    /// Registers an observer; must be called before the orchestrator is cloned
    pub fn with_observer(mut self, observer: Arc<dyn ISyncObserver>) -> Self {
        match Arc::get_mut(&mut self.inner) {
            Some(inner) => inner.observers.push(observer),
            None => warn!("Observer registered after the orchestrator was shared; ignored"),
        }
        self
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.inner.settings
    }

    /// Asks [`run_forever`](Self::run_forever) to return after the current tick
    ///
    /// Pipelines already running complete; pipelines not yet started in the
    /// current tick are skipped.
    pub fn stop(&self) {
        info!("Stop requested");
        self.inner.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Token cancelled by [`stop`](Self::stop)
    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    /// Runs ticks until [`stop`](Self::stop) is called
    pub async fn run_forever(&self) {
        let interval = self.inner.settings.tick_interval;
        info!(interval_s = interval.as_secs_f64(), "Sync loop starting");

        while !self.is_stopped() {
            let tick_start = Instant::now();
            if let Err(e) = self.run_once().await {
                debug!(error = %e, "Tick failed, retrying after the interval");
            }

            if self.is_stopped() {
                break;
            }

            let next_tick = tick_start + interval;
            if next_tick <= Instant::now() {
                debug!("Tick overran its interval, starting next tick immediately");
            }
            tokio::select! {
                _ = tokio::time::sleep_until(next_tick) => {}
                _ = self.inner.cancel.cancelled() => break,
            }
        }

        info!("Sync loop stopped");
    }

    /// Performs exactly one pass over all enabled users
    ///
    /// Per-user failures are part of the returned summary. Only a failure to
    /// load the user list fails the tick.
    #[instrument(skip(self), fields(tick = tracing::field::Empty))]
    pub async fn run_once(&self) -> Result<TickSummary> {
        let tick = self.inner.ticks.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::Span::current().record("tick", tick);
        let started_at = Utc::now();
        let start = Instant::now();

        let users = match self.inner.credentials.list_enabled_users().await {
            Ok(users) => users,
            Err(e) => {
                let err = anyhow::Error::new(e).context("failed to load users");
                error!(tick, error = %format!("{err:#}"), "Tick aborted");
                for observer in &self.inner.observers {
                    observer.on_tick_failed(tick, &err);
                }
                return Err(err);
            }
        };

        debug!(tick, users = users.len(), "Tick started");

        let mut tasks = JoinSet::new();
        for user in users {
            let inner = self.inner.clone();
            tasks.spawn(async move { inner.isolated_sync_user(user).await });
        }

        let mut results = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                // Only reachable if the runtime aborts the task during shutdown
                Err(e) => error!(tick, error = %e, "User task aborted"),
            }
        }

        let summary = TickSummary::from_results(tick, started_at, start.elapsed(), results);
        for observer in &self.inner.observers {
            observer.on_tick_completed(&summary);
        }
        Ok(summary)
    }
}

impl Inner {
    /// Runs [`sync_user`](Self::sync_user) on its own task so a panic is
    /// still reported as that user's result
    async fn isolated_sync_user(self: Arc<Self>, user: User) -> SyncResult {
        let start = Instant::now();
        let observed = user.clone();
        let inner = Arc::clone(&self);

        match tokio::spawn(async move { inner.sync_user(user).await }).await {
            Ok(result) => result,
            Err(e) => {
                error!(user_id = %observed.id(), error = %e, "User pipeline panicked");
                let failure = SyncFailure::new(
                    None,
                    FailureKind::Internal,
                    format!("pipeline panicked: {e}"),
                );
                let result =
                    SyncResult::new(*observed.id(), SyncOutcome::Failed(failure), start.elapsed());
                for observer in &self.observers {
                    observer.on_user_result(&observed, &result);
                }
                result
            }
        }
    }

    /// Runs one user's pipeline and reports the result; never fails
    async fn sync_user(&self, mut user: User) -> SyncResult {
        let start = Instant::now();
        let user_id = *user.id();

        let outcome = match self.workers.clone().acquire_owned().await {
            Ok(_permit) => {
                let lock = self.user_locks.entry(user_id).or_default().clone();
                let _guard = lock.lock().await;
                self.guarded_pipeline(&mut user).await
            }
            Err(_) => SyncOutcome::Skipped {
                reason: SkipReason::Stopped,
            },
        };

        let result = SyncResult::new(user_id, outcome, start.elapsed());
        for observer in &self.observers {
            observer.on_user_result(&user, &result);
        }
        result
    }

    /// Applies the stop check and the per-user timeout around the pipeline
    async fn guarded_pipeline(&self, user: &mut User) -> SyncOutcome {
        if self.cancel.is_cancelled() {
            return SyncOutcome::Skipped {
                reason: SkipReason::Stopped,
            };
        }

        let timeout = self.settings.user_timeout;
        let mut state = PipelineState::Idle;
        let run = tokio::time::timeout(timeout, self.pipeline(user, &mut state)).await;

        let err = match run {
            Ok(Ok(outcome)) => return outcome,
            Ok(Err(e)) => e,
            Err(_) => SyncError::Timeout(timeout),
        };
        debug!(user_id = %user.id(), failed_in = state.as_str(), error = %err, "Pipeline failed");
        SyncOutcome::Failed(err.to_failure())
    }

    async fn pipeline(
        &self,
        user: &mut User,
        state: &mut PipelineState,
    ) -> Result<SyncOutcome, SyncError> {
        let now = Utc::now();
        let user_id = *user.id();

        state.advance(PipelineState::Fetching, &user_id);
        let playback = self.fetcher.fetch(user, now).await?;

        if playback.is_active() {
            state.advance(PipelineState::Playing, &user_id);
        } else {
            state.advance(PipelineState::NotPlaying, &user_id);
        }

        state.advance(PipelineState::Mapping, &user_id);
        let update = self.mapper.map(&playback, user.status_emoji());

        let cached = self.cached_status(user);
        let next_tick_at = now
            + chrono::Duration::from_std(self.settings.tick_interval)
                .unwrap_or_else(|_| chrono::Duration::zero());
        if let Some(reason) = skip_reason(&update, cached.as_ref(), next_tick_at) {
            state.advance(PipelineState::Idle, &user_id);
            return Ok(SyncOutcome::Skipped { reason });
        }

        state.advance(PipelineState::Publishing, &user_id);
        self.publisher.publish(user, &update, now).await?;

        let remembered = (!update.clear).then_some(update.clone());
        self.last_status.insert(user_id, remembered.clone());
        user.set_last_status(remembered.clone());
        // The status is already in Slack; a failed write only costs a
        // redundant publish after a restart.
        if let Err(e) = self
            .credentials
            .save_last_status(&user_id, remembered.as_ref())
            .await
        {
            warn!(%user_id, error = %e, "Failed to persist last status");
        }

        state.advance(PipelineState::Idle, &user_id);
        Ok(SyncOutcome::Published {
            cleared: update.clear,
        })
    }

    /// Cached last status, seeded from the store on first sight of the user
    fn cached_status(&self, user: &User) -> Option<StatusUpdate> {
        self.last_status
            .entry(*user.id())
            .or_insert_with(|| user.last_status().cloned())
            .clone()
    }
}
