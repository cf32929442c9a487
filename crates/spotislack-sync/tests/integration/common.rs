//! In-memory ports with configurable latency and failures

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use spotislack_core::{
    domain::{
        PlaybackState, Service, ServiceError, StatusUpdate, SyncResult, TickSummary, Tokens,
        Track, User, UserId,
    },
    ports::{
        IMessagingService, IMusicService, ISyncObserver, ITokenRefresher, IUserRepository,
    },
};
use spotislack_sync::{SyncDependencies, SyncOrchestrator, SyncSettings};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// A user whose Spotify access token is `sp-<name>`
pub fn user(name: &str) -> User {
    User::new(
        name,
        "T1",
        format!("spotify-{name}"),
        Tokens::new(format!("sp-{name}"), Some(format!("sp-refresh-{name}")), None),
        Tokens::new(format!("xoxp-{name}"), Some(format!("xoxe-{name}")), None),
    )
}

pub fn playing(title: &str, artist: &str) -> PlaybackState {
    PlaybackState::playing(
        Track {
            id: format!("id-{title}"),
            title: title.into(),
            artists: vec![artist.into()],
            duration_ms: None,
        },
        None,
        Utc::now(),
    )
}

pub fn settings(interval_secs: u64, workers: usize) -> SyncSettings {
    SyncSettings {
        tick_interval: Duration::from_secs(interval_secs),
        worker_concurrency: workers,
        user_timeout: Duration::from_secs(30),
        status_expiry_grace: Duration::from_secs(60),
        default_emoji: ":headphones:".into(),
    }
}

// ============================================================================
// Repository
// ============================================================================

#[derive(Default)]
pub struct InMemoryRepo {
    users: Mutex<Vec<User>>,
    pub fail_listing: AtomicBool,
}

impl InMemoryRepo {
    pub fn new(users: Vec<User>) -> Arc<Self> {
        Arc::new(Self {
            users: Mutex::new(users),
            fail_listing: AtomicBool::new(false),
        })
    }

    pub fn get(&self, id: &UserId) -> Option<User> {
        self.users.lock().unwrap().iter().find(|u| u.id() == id).cloned()
    }

    fn with_user<F: FnOnce(&mut User)>(&self, id: &UserId, f: F) -> anyhow::Result<()> {
        let mut users = self.users.lock().unwrap();
        let user = users
            .iter_mut()
            .find(|u| u.id() == id)
            .ok_or_else(|| anyhow::anyhow!("user {id} not found"))?;
        f(user);
        Ok(())
    }
}

#[async_trait]
impl IUserRepository for InMemoryRepo {
    async fn list_enabled_users(&self) -> anyhow::Result<Vec<User>> {
        if self.fail_listing.load(Ordering::SeqCst) {
            anyhow::bail!("database is locked");
        }
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.sync_enabled())
            .cloned()
            .collect())
    }

    async fn get_user(&self, id: &UserId) -> anyhow::Result<Option<User>> {
        Ok(self.get(id))
    }

    async fn save_user(&self, user: &User) -> anyhow::Result<()> {
        self.users.lock().unwrap().push(user.clone());
        Ok(())
    }

    async fn delete_user(&self, id: &UserId) -> anyhow::Result<()> {
        self.users.lock().unwrap().retain(|u| u.id() != id);
        Ok(())
    }

    async fn update_tokens(
        &self,
        id: &UserId,
        service: Service,
        tokens: &Tokens,
    ) -> anyhow::Result<()> {
        self.with_user(id, |u| u.set_tokens(service, tokens.clone()))
    }

    async fn update_last_status(
        &self,
        id: &UserId,
        status: Option<&StatusUpdate>,
    ) -> anyhow::Result<()> {
        self.with_user(id, |u| u.set_last_status(status.cloned()))
    }
}

// ============================================================================
// Music service
// ============================================================================

/// Answers per access token, after an optional delay, tracking concurrency
pub struct FakeMusic {
    by_token: Mutex<HashMap<String, Result<PlaybackState, ServiceError>>>,
    default: Result<PlaybackState, ServiceError>,
    delay: Duration,
    pub calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
}

impl FakeMusic {
    pub fn new(default: Result<PlaybackState, ServiceError>) -> Self {
        Self {
            by_token: Mutex::new(HashMap::new()),
            default,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn answer(self, token: &str, result: Result<PlaybackState, ServiceError>) -> Self {
        self.by_token
            .lock()
            .unwrap()
            .insert(token.to_string(), result);
        self
    }
}

#[async_trait]
impl IMusicService for FakeMusic {
    async fn current_playback(&self, access_token: &str) -> Result<PlaybackState, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let scripted = self.by_token.lock().unwrap().get(access_token).cloned();
        scripted.unwrap_or_else(|| self.default.clone())
    }
}

// ============================================================================
// Messaging service
// ============================================================================

#[derive(Default)]
pub struct FakeSlack {
    failures: Mutex<HashMap<String, ServiceError>>,
    pub published: Mutex<Vec<(String, StatusUpdate)>>,
}

impl FakeSlack {
    pub fn failing_for(self, token: &str, err: ServiceError) -> Self {
        self.failures.lock().unwrap().insert(token.to_string(), err);
        self
    }

    pub fn calls(&self) -> usize {
        self.published.lock().unwrap().len()
    }
}

#[async_trait]
impl IMessagingService for FakeSlack {
    async fn set_status(&self, access_token: &str, update: &StatusUpdate) -> Result<(), ServiceError> {
        self.published
            .lock()
            .unwrap()
            .push((access_token.to_string(), update.clone()));
        match self.failures.lock().unwrap().get(access_token) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

// ============================================================================
// Token refresher
// ============================================================================

pub struct FakeRefresher {
    access_token: String,
    pub calls: AtomicUsize,
}

impl FakeRefresher {
    pub fn issuing(access_token: &str) -> Arc<Self> {
        Arc::new(Self {
            access_token: access_token.to_string(),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ITokenRefresher for FakeRefresher {
    async fn refresh(&self, _service: Service, _refresh_token: &str) -> Result<Tokens, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Tokens::new(self.access_token.clone(), None, None))
    }
}

// ============================================================================
// Observer
// ============================================================================

/// Records results and stops the orchestrator after `stop_after` ticks
#[derive(Default)]
pub struct RecordingObserver {
    pub ticks: Mutex<Vec<(Instant, TickSummary)>>,
    pub user_results: Mutex<Vec<SyncResult>>,
    pub failed_ticks: Mutex<Vec<u64>>,
    stop_after: Option<(usize, CancellationToken)>,
}

impl RecordingObserver {
    pub fn stopping_after(ticks: usize, token: CancellationToken) -> Self {
        Self {
            stop_after: Some((ticks, token)),
            ..Self::default()
        }
    }

    pub fn tick_instants(&self) -> Vec<Instant> {
        self.ticks.lock().unwrap().iter().map(|(at, _)| *at).collect()
    }
}

impl ISyncObserver for RecordingObserver {
    fn on_user_result(&self, _user: &User, result: &SyncResult) {
        self.user_results.lock().unwrap().push(result.clone());
    }

    fn on_tick_completed(&self, summary: &TickSummary) {
        let mut ticks = self.ticks.lock().unwrap();
        ticks.push((Instant::now(), summary.clone()));
        if let Some((limit, token)) = &self.stop_after {
            if ticks.len() >= *limit {
                token.cancel();
            }
        }
    }

    fn on_tick_failed(&self, tick: u64, _error: &anyhow::Error) {
        self.failed_ticks.lock().unwrap().push(tick);
    }
}

// ============================================================================
// Wiring
// ============================================================================

pub struct Harness {
    pub repo: Arc<InMemoryRepo>,
    pub music: Arc<FakeMusic>,
    pub slack: Arc<FakeSlack>,
    pub refresher: Arc<FakeRefresher>,
}

impl Harness {
    pub fn new(users: Vec<User>, music: FakeMusic, slack: FakeSlack) -> Self {
        Self {
            repo: InMemoryRepo::new(users),
            music: Arc::new(music),
            slack: Arc::new(slack),
            refresher: FakeRefresher::issuing("fresh"),
        }
    }

    pub fn orchestrator(&self, settings: SyncSettings) -> SyncOrchestrator {
        SyncOrchestrator::new(
            SyncDependencies {
                repository: self.repo.clone(),
                music: self.music.clone(),
                messaging: self.slack.clone(),
                refresher: self.refresher.clone(),
            },
            settings,
        )
    }
}
