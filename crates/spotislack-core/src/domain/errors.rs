//! Domain error types
//!
//! [`DomainError`] covers validation of domain values. [`ServiceError`] is the
//! typed error every external-service port returns, so the sync core can
//! classify failures without knowing about HTTP.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// Unknown external service name
    #[error("Unknown service: {0}")]
    UnknownService(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

/// Errors reported by the music and messaging service adapters
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Network failure, timeout or 5xx response
    #[error("Transient error: {0}")]
    Transient(String),

    /// The service is throttling requests
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// Delay requested by the service
        retry_after: Duration,
    },

    /// The access token has expired and must be refreshed
    #[error("Access token expired")]
    AuthExpired,

    /// Credentials were rejected; the user has to re-authenticate
    #[error("Authentication invalid: {0}")]
    AuthInvalid(String),

    /// The response could not be parsed or was otherwise unusable
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ServiceError {
    /// Returns true if the same call may succeed when tried again later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ServiceError::Transient(_) | ServiceError::RateLimited { .. }
        )
    }
}
