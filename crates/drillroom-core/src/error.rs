//! Core error types for drillroom-core.
//!
//! State-machine errors ([`EngineError`]) are returned synchronously from
//! sequencer commands. Persistence errors ([`PersistenceError`]) only ever
//! travel on the completion reporter's side channel. Everything else
//! (configuration, database, IO) is wrapped by [`CoreError`].

use std::path::PathBuf;
use thiserror::Error;

use crate::session::SessionStatus;

/// Errors returned by sequencer commands.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// `start()` was called with input the engine cannot run.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The session already finished or was stopped.
    #[error("Session is {status}; call start() to begin a new one")]
    SessionTerminated { status: SessionStatus },

    /// `start()` while another session is still running or paused.
    #[error("A session is already {status}; stop it before starting another")]
    SessionActive { status: SessionStatus },

    /// A command that needs a session was issued before any `start()`.
    #[error("No session has been started")]
    NotStarted,

    /// The command is not accepted in the current status.
    #[error("Cannot {command} while {status}")]
    InvalidTransition {
        command: &'static str,
        status: SessionStatus,
    },
}

/// Failure reported by a completion store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    /// The backing store rejected or failed the write.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The store could not be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The reporter's worker is gone, so the write was never attempted.
    #[error("Completion reporter is shut down")]
    ReporterClosed,
}

/// Core error type for the ambient layers (config, storage, catalog).
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Sequencer errors bubbling up through a host
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Catalog lookups that found nothing
    #[error("Unknown {kind} '{id}'")]
    NotFound { kind: &'static str, id: String },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,
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

    /// Unknown dot-path key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Home/config directory could not be prepared
    #[error("Cannot prepare data directory {path}: {message}")]
    DataDir { path: PathBuf, message: String },
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

impl From<DatabaseError> for PersistenceError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Locked => PersistenceError::Unavailable(err.to_string()),
            other => PersistenceError::Storage(other.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
