//! Core error types for medalarm-core.
//!
//! This module defines the error hierarchy using thiserror. Malformed alarm
//! data is reported through [`ValidationError`] and recovered locally by the
//! scheduler; collaborator failures surface as [`CoreError`].

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for medalarm-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Trigger-delivery errors
    #[error("Trigger error: {0}")]
    Trigger(#[from] TriggerError),

    /// A referenced record does not exist
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

impl CoreError {
    pub fn medication_not_found(id: &str) -> Self {
        CoreError::NotFound {
            kind: "medication",
            id: id.to_string(),
        }
    }

    pub fn alarm_not_found(id: &str) -> Self {
        CoreError::NotFound {
            kind: "alarm",
            id: id.to_string(),
        }
    }
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

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// Connection mutex was poisoned by a panicking holder
    #[error("Database connection poisoned")]
    Poisoned,
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

    /// Could not resolve the data directory
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Alarm time is not a valid `HH:MM` pair
    #[error("Invalid alarm time '{0}': expected HH:MM with hour 0-23 and minute 0-59")]
    InvalidTime(String),

    /// Weekday value outside Monday=1..Sunday=7
    #[error("Invalid weekday {0}: expected 1 (Monday) through 7 (Sunday)")]
    InvalidWeekday(u8),

    /// Alarm has no weekdays and can never fire
    #[error("Alarm has no weekdays selected")]
    NoWeekdays,

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Errors reported by a trigger-delivery collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TriggerError {
    /// Notification permission has been revoked or never granted
    #[error("Notification permission not granted")]
    PermissionDenied,

    /// The collaborator rejected a single registration
    #[error("Registration rejected for '{key}': {message}")]
    Rejected { key: String, message: String },

    /// Cancelling existing triggers failed
    #[error("Failed to cancel triggers: {0}")]
    CancelFailed(String),
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

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::InvalidValue {
            key: "<file>".to_string(),
            message: err.to_string(),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
