//! In-memory port implementations shared by the unit tests

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use spotislack_core::{
    domain::{
        PlaybackState, Service, ServiceError, StatusUpdate, Tokens, Track, User, UserId,
    },
    ports::{IMessagingService, IMusicService, ITokenRefresher, IUserRepository},
};

pub(crate) fn sample_user(slack_user_id: &str) -> User {
    User::new(
        slack_user_id,
        "T1",
        format!("sp-{slack_user_id}"),
        Tokens::new("sp-access", Some("sp-refresh".into()), None),
        Tokens::new("xoxp-access", Some("xoxe-refresh".into()), None),
    )
}

pub(crate) fn playing(title: &str, artist: &str) -> PlaybackState {
    PlaybackState::playing(
        Track {
            id: format!("id-{title}"),
            title: title.to_string(),
            artists: vec![artist.to_string()],
            duration_ms: Some(200_000),
        },
        Some(1_000),
        Utc::now(),
    )
}

#[derive(Default)]
pub(crate) struct MockRepo {
    users: Mutex<HashMap<UserId, User>>,
    token_write_delay: Option<Duration>,
}

impl MockRepo {
    pub(crate) fn with_users(users: Vec<User>) -> Self {
        Self {
            users: Mutex::new(users.into_iter().map(|u| (*u.id(), u)).collect()),
            token_write_delay: None,
        }
    }

    /// Makes every `update_tokens` call take `delay` before writing
    pub(crate) fn with_token_write_delay(mut self, delay: Duration) -> Self {
        self.token_write_delay = Some(delay);
        self
    }

    pub(crate) fn user(&self, id: &UserId) -> Option<User> {
        self.users.lock().unwrap().get(id).cloned()
    }
}

#[async_trait]
impl IUserRepository for MockRepo {
    async fn list_enabled_users(&self) -> anyhow::Result<Vec<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .filter(|u| u.sync_enabled())
            .cloned()
            .collect())
    }

    async fn get_user(&self, id: &UserId) -> anyhow::Result<Option<User>> {
        Ok(self.user(id))
    }

    async fn save_user(&self, user: &User) -> anyhow::Result<()> {
        self.users.lock().unwrap().insert(*user.id(), user.clone());
        Ok(())
    }

    async fn delete_user(&self, id: &UserId) -> anyhow::Result<()> {
        self.users.lock().unwrap().remove(id);
        Ok(())
    }

    async fn update_tokens(
        &self,
        id: &UserId,
        service: Service,
        tokens: &Tokens,
    ) -> anyhow::Result<()> {
        if let Some(delay) = self.token_write_delay {
            tokio::time::sleep(delay).await;
        }
        let mut users = self.users.lock().unwrap();
        let user = users
            .get_mut(id)
            .ok_or_else(|| anyhow::anyhow!("user {id} not found"))?;
        user.set_tokens(service, tokens.clone());
        Ok(())
    }

    async fn update_last_status(
        &self,
        id: &UserId,
        status: Option<&StatusUpdate>,
    ) -> anyhow::Result<()> {
        let mut users = self.users.lock().unwrap();
        let user = users
            .get_mut(id)
            .ok_or_else(|| anyhow::anyhow!("user {id} not found"))?;
        user.set_last_status(status.cloned());
        Ok(())
    }
}

pub(crate) struct MockRefresher {
    result: Result<Tokens, ServiceError>,
    pub(crate) calls: AtomicUsize,
}

impl MockRefresher {
    pub(crate) fn returning(tokens: Tokens) -> Self {
        Self {
            result: Ok(tokens),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing(err: ServiceError) -> Self {
        Self {
            result: Err(err),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ITokenRefresher for MockRefresher {
    async fn refresh(&self, _service: Service, _refresh_token: &str) -> Result<Tokens, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

/// Music service answering from a script, then repeating the fallback
pub(crate) struct MockMusic {
    script: Mutex<VecDeque<Result<PlaybackState, ServiceError>>>,
    fallback: Result<PlaybackState, ServiceError>,
    pub(crate) tokens_seen: Mutex<Vec<String>>,
}

impl MockMusic {
    pub(crate) fn always(result: Result<PlaybackState, ServiceError>) -> Self {
        Self::scripted(Vec::new(), result)
    }

    pub(crate) fn scripted(
        script: Vec<Result<PlaybackState, ServiceError>>,
        fallback: Result<PlaybackState, ServiceError>,
    ) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            tokens_seen: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.tokens_seen.lock().unwrap().len()
    }
}

#[async_trait]
impl IMusicService for MockMusic {
    async fn current_playback(&self, access_token: &str) -> Result<PlaybackState, ServiceError> {
        self.tokens_seen
            .lock()
            .unwrap()
            .push(access_token.to_string());
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

/// Messaging service recording every update it receives
pub(crate) struct MockMessaging {
    script: Mutex<VecDeque<Result<(), ServiceError>>>,
    pub(crate) published: Mutex<Vec<(String, StatusUpdate)>>,
}

impl MockMessaging {
    pub(crate) fn ok() -> Self {
        Self::scripted(Vec::new())
    }

    pub(crate) fn scripted(script: Vec<Result<(), ServiceError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            published: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.published.lock().unwrap().len()
    }
}

#[async_trait]
impl IMessagingService for MockMessaging {
    async fn set_status(&self, access_token: &str, update: &StatusUpdate) -> Result<(), ServiceError> {
        self.published
            .lock()
            .unwrap()
            .push((access_token.to_string(), update.clone()));
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or(Ok(()))
    }
}
