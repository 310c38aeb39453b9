//! Error taxonomy for the navigation pipeline.

use thiserror::Error;

use crate::store::StoreError;

/// Every failure a navigation request can end with.
#[derive(Debug, Error)]
pub enum NavError {
    /// Malformed or missing input. Never reaches a collaborator.
    #[error("{0}")]
    Validation(String),

    #[error("Request body too large.")]
    PayloadTooLarge,

    #[error("Too many requests. Please slow down.")]
    RateLimited { retry_after_secs: u64 },

    #[error("{0}")]
    NotFound(String),

    /// An upstream service failed or returned unusable data.
    #[error("{0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl NavError {
    pub fn status_code(&self) -> u16 {
        match self {
            NavError::Validation(_) => 400,
            NavError::NotFound(_) => 404,
            NavError::PayloadTooLarge => 413,
            NavError::RateLimited { .. } => 429,
            NavError::Internal(_) => 500,
            NavError::Upstream(_) => 502,
        }
    }
}

impl From<StoreError> for NavError {
    fn from(e: StoreError) -> Self {
        NavError::Internal(e.to_string())
    }
}

pub type NavResult<T> = Result<T, NavError>;
