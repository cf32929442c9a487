//! Credential Store Adapter
//!
//! Read access to registered users plus the one mutation the sync loop is
//! allowed to make to credentials: exchanging a refresh token and persisting
//! the result. Callers hold the per-user lock, so a refresh never races
//! another pipeline for the same user.

use std::{future::Future, sync::Arc};

use chrono::{DateTime, Utc};
use spotislack_core::{
    domain::{Service, ServiceError, StatusUpdate, Tokens, User, UserId},
    ports::{ITokenRefresher, IUserRepository},
};
use tracing::{debug, info, warn};

use crate::SyncError;

/// Adapter over the user repository and the OAuth token refresher
pub struct CredentialStoreAdapter {
    repository: Arc<dyn IUserRepository>,
    refresher: Arc<dyn ITokenRefresher>,
}

impl CredentialStoreAdapter {
    pub fn new(repository: Arc<dyn IUserRepository>, refresher: Arc<dyn ITokenRefresher>) -> Self {
        Self {
            repository,
            refresher,
        }
    }

    /// Loads every user with sync enabled
    pub async fn list_enabled_users(&self) -> Result<Vec<User>, SyncError> {
        self.repository
            .list_enabled_users()
            .await
            .map_err(SyncError::Storage)
    }

    /// Exchanges the user's refresh token for `service` and persists the result
    ///
    /// A provider that does not rotate refresh tokens returns none; the stored
    /// one is kept. On success the user's in-memory tokens are replaced too.
    ///
    /// The exchange and the write run on their own task: a rotated refresh
    /// token invalidates the stored one, so once the exchange has started the
    /// write must happen even if the caller is cancelled by its timeout.
    pub async fn refresh(&self, user: &mut User, service: Service) -> Result<Tokens, SyncError> {
        let refresh_token = user
            .tokens(service)
            .refresh_token
            .clone()
            .ok_or(SyncError::MissingRefreshToken(service))?;

        let user_id = *user.id();
        let repository = Arc::clone(&self.repository);
        let refresher = Arc::clone(&self.refresher);
        let exchange = tokio::spawn(async move {
            let mut tokens = refresher
                .refresh(service, &refresh_token)
                .await
                .map_err(|source| SyncError::Refresh { service, source })?;

            if tokens.refresh_token.is_none() {
                tokens.refresh_token = Some(refresh_token);
            }

            repository
                .update_tokens(&user_id, service, &tokens)
                .await
                .map_err(SyncError::Storage)?;
            Ok::<_, SyncError>(tokens)
        });

        let tokens = exchange.await.map_err(|e| {
            SyncError::Storage(anyhow::anyhow!("token refresh task failed: {e}"))
        })??;

        user.set_tokens(service, tokens.clone());
        info!(%user_id, %service, "Access token refreshed");
        Ok(tokens)
    }

    /// Writes the last published status through to the store
    pub async fn save_last_status(
        &self,
        user_id: &UserId,
        status: Option<&StatusUpdate>,
    ) -> Result<(), SyncError> {
        self.repository
            .update_last_status(user_id, status)
            .await
            .map_err(SyncError::Storage)
    }

    /// Runs `call` with the user's access token, refreshing at most once
    ///
    /// The refresh happens up front when the stored expiry has already
    /// passed, or after the service reports [`ServiceError::AuthExpired`].
    /// Either way only one refresh is attempted; an expiry reported after it
    /// is returned as-is.
    pub async fn call_with_refresh<T, F, Fut>(
        &self,
        user: &mut User,
        service: Service,
        now: DateTime<Utc>,
        call: F,
    ) -> Result<T, SyncError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let mut refreshed = false;
        if user.tokens(service).is_expired_at(now) {
            debug!(user_id = %user.id(), %service, "Stored access token expired, refreshing first");
            self.refresh(user, service).await?;
            refreshed = true;
        }

        match call(user.tokens(service).access_token.clone()).await {
            Ok(value) => Ok(value),
            Err(ServiceError::AuthExpired) if !refreshed => {
                debug!(user_id = %user.id(), %service, "Access token rejected, refreshing");
                let tokens = self.refresh(user, service).await?;
                call(tokens.access_token)
                    .await
                    .map_err(|source| SyncError::Service { service, source })
            }
            Err(source) => {
                if matches!(source, ServiceError::AuthExpired) {
                    warn!(user_id = %user.id(), %service, "Access token rejected after refresh");
                }
                Err(SyncError::Service { service, source })
            }
        }
    }
}
