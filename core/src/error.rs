//! Application-wide error types.

use thiserror::Error;

/// Every failure a lifecycle or ledger operation can surface to a caller.
///
/// All variants except `Database`/`Migrate` are local precondition failures:
/// they are returned synchronously, are never retried internally, and never
/// leave persisted state mutated.
#[derive(Debug, Error)]
pub enum Error {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("PIN does not match")]
    InvalidCredential,

    #[error("too many failed PIN attempts, try again later")]
    TooManyAttempts,

    #[error("insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: i64, available: i64 },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

impl Error {
    /// Short machine-readable identifier, used in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation",
            Error::NotFound(_) => "not_found",
            Error::Forbidden(_) => "forbidden",
            Error::InvalidState(_) => "invalid_state",
            Error::InvalidCredential => "invalid_credential",
            Error::TooManyAttempts => "too_many_attempts",
            Error::InsufficientBalance { .. } => "insufficient_balance",
            Error::Database(_) => "database",
            Error::Migrate(_) => "migration",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
