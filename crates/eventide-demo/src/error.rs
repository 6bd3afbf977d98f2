//! Eventide demo — error types.

use eventide_core::DomainError;
use eventide_event_store::ConfigError;
use thiserror::Error;

/// Startup and walkthrough errors.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Database connection or schema error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A command or query was rejected.
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),

    /// Replayed state diverged from the persisted row.
    #[error("replay mismatch for {0}")]
    ReplayMismatch(String),
}
