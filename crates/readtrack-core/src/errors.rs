use thiserror::Error;

use crate::storage::migrate::MigrationStep;

pub type StoreResult<T> = Result<T, StoreError>;

/// Shown to the child whenever a store call fails. Raw SQLite text stays in the logs.
pub const FRIENDLY_RETRY_MESSAGE: &str = "Something went wrong. Please try again.";

/// DDL failure while creating the schema. Fatal at startup.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to open database {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("failed to create table {table}: {source}")]
    Ddl {
        table: &'static str,
        #[source]
        source: rusqlite::Error,
    },
    #[error("store unavailable: {0}")]
    Store(#[from] StoreError),
}

/// Structural rewrite failure. The transaction is rolled back and the legacy shape stays.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("sqlite error during migration: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("migration aborted after {step}: {reason}")]
    Aborted { step: MigrationStep, reason: String },
    #[error("store unavailable: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("store connection lock poisoned")]
    Poisoned,
}

impl StoreError {
    /// Message safe to hand to the UI.
    pub fn friendly_message(&self) -> &'static str {
        match self {
            StoreError::InvalidArgument(_) => "That request was not valid. Please try again.",
            _ => FRIENDLY_RETRY_MESSAGE,
        }
    }

    pub fn is_constraint_violation(&self) -> bool {
        match self {
            StoreError::ConstraintViolation(_) => true,
            StoreError::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => {
                err.code == rusqlite::ErrorCode::ConstraintViolation
            }
            _ => false,
        }
    }
}

#[derive(Debug, Error)]
#[error("config error: {0}")]
pub struct ConfigError(pub String);
