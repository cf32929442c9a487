//! Status Publisher
//!
//! Pushes a [`StatusUpdate`] to Slack and decides, against the cached last
//! status, whether a push is needed at all.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use spotislack_core::{
    domain::{Service, SkipReason, StatusUpdate, User},
    ports::IMessagingService,
};
use tracing::debug;

use crate::{credentials::CredentialStoreAdapter, SyncError};

/// Returns why `update` need not be published, or `None` to publish
///
/// `cached` is the last status this daemon set for the user. An unchanged
/// playing status is republished when its expiry would lapse before
/// `next_tick_at`, so Slack never drops it while the track is still on.
pub fn skip_reason(
    update: &StatusUpdate,
    cached: Option<&StatusUpdate>,
    next_tick_at: DateTime<Utc>,
) -> Option<SkipReason> {
    match cached {
        None if update.clear => Some(SkipReason::NothingToClear),
        None => None,
        Some(prev) if !prev.same_status(update) => None,
        Some(_) if update.clear => Some(SkipReason::Unchanged),
        Some(prev) => match prev.expires_at {
            Some(expires_at) if expires_at <= next_tick_at => None,
            _ => Some(SkipReason::Unchanged),
        },
    }
}

pub struct StatusPublisher {
    messaging: Arc<dyn IMessagingService>,
    credentials: Arc<CredentialStoreAdapter>,
}

impl StatusPublisher {
    pub fn new(
        messaging: Arc<dyn IMessagingService>,
        credentials: Arc<CredentialStoreAdapter>,
    ) -> Self {
        Self {
            messaging,
            credentials,
        }
    }

    /// Sends the update, refreshing the Slack token at most once
    pub async fn publish(
        &self,
        user: &mut User,
        update: &StatusUpdate,
        now: DateTime<Utc>,
    ) -> Result<(), SyncError> {
        let messaging = &self.messaging;
        self.credentials
            .call_with_refresh(user, Service::Slack, now, |token| async move {
                messaging.set_status(&token, update).await
            })
            .await?;

        debug!(user_id = %user.id(), clear = update.clear, text = %update.text, "Status published");
        Ok(())
    }
}
