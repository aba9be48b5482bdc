//! Error types shared across the store, generation, and metrics seams.

use std::time::Duration;
use thiserror::Error;

/// Failures from the persistence store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The write was rejected before touching the database.
    #[error("storage error: {0}")]
    Storage(String),
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: i64 },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Failures from the text-generation capability.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Rejected locally; the model was never called.
    #[error("invalid generation request: {0}")]
    InvalidRequest(String),
    #[error("text generation is disabled")]
    Disabled,
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),
    #[error("generation failed: {0}")]
    Backend(String),
}

/// Failure while preparing the scoring resource. Never fatal.
#[derive(Debug, Error)]
#[error("metrics initialization failed: {0}")]
pub struct MetricsInitError(pub String);

/// Failure of one chat exchange: either the model or the store refused it.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
