//! Core error types for tasktally-core.
//!
//! Every repository operation returns [`Result`], whose error side is
//! [`CoreError`]. Failures are never swallowed or retried inside the core;
//! callers decide what to show the user.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for tasktally-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Input violates a task invariant. Always raised before any write.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The targeted row does not exist (or, for task mutations, is already deleted).
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    /// Concurrent-mutation conflict. Nothing produces this yet.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Storage engine errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Schema creation or upgrade failed
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// The caller cancelled the operation
    #[error("Operation canceled")]
    Canceled,

    /// The caller's deadline passed before the operation finished
    #[error("Operation timed out")]
    Timeout,

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    pub(crate) fn task_not_found(id: i64) -> Self {
        CoreError::NotFound { entity: "task", id }
    }

    /// True for errors caused by the caller aborting the operation.
    pub fn is_abort(&self) -> bool {
        matches!(
            self,
            CoreError::Canceled | CoreError::Timeout | CoreError::Database(DatabaseError::Interrupted)
        )
    }
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {message}")]
    OpenFailed { path: PathBuf, message: String },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// No pooled connection became available in time
    #[error("Database connection pool exhausted: {0}")]
    PoolExhausted(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// A running statement was interrupted
    #[error("Statement interrupted")]
    Interrupted,
}

/// Schema/migration errors. Fatal at startup.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// Storage could not be reached to run migrations
    #[error("storage unreachable: {0}")]
    Unreachable(String),

    /// A migration step was rejected by the engine
    #[error("migration step '{step}' rejected: {source}")]
    Rejected {
        step: &'static str,
        #[source]
        source: rusqlite::Error,
    },
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// The data directory could not be determined or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("task name cannot be empty")]
    EmptyName,

    #[error("points cannot be negative (got {0})")]
    NegativePoints(i64),
}

// Helper implementations for converting from other error types

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) => match e.code {
                rusqlite::ErrorCode::DatabaseLocked | rusqlite::ErrorCode::DatabaseBusy => {
                    DatabaseError::Locked
                }
                rusqlite::ErrorCode::OperationInterrupted => DatabaseError::Interrupted,
                _ => DatabaseError::QueryFailed(err.to_string()),
            },
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

impl From<r2d2::Error> for CoreError {
    fn from(err: r2d2::Error) -> Self {
        CoreError::Database(DatabaseError::PoolExhausted(err.to_string()))
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
