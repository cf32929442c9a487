//! Token refresh port (driven/secondary port)

use crate::domain::{Service, ServiceError, Tokens};

/// Port trait for exchanging a refresh token for fresh tokens
#[async_trait::async_trait]
pub trait ITokenRefresher: Send + Sync {
    /// Performs the refresh-token grant against the service's token endpoint
    ///
    /// The returned `refresh_token` is `None` when the provider did not rotate
    /// it; callers keep the old one in that case. A rejected grant yields
    /// [`ServiceError::AuthInvalid`].
    async fn refresh(&self, service: Service, refresh_token: &str)
        -> Result<Tokens, ServiceError>;
}
