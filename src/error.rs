//! Error types for dreamlog
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in dreamlog
#[derive(Debug, Error)]
pub enum DreamError {
    /// Database could not be opened or initialized
    #[error("Connection error: {0}")]
    Connection(String),

    /// A dream with this id already exists
    #[error("Duplicate dream id: {0}")]
    DuplicateId(String),

    /// No dream matched the given id
    #[error("Dream not found: {0}")]
    NotFound(String),

    /// Read-path failure or malformed filter combination
    #[error("Query error: {0}")]
    Query(String),

    /// Input rejected before reaching the database
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Underlying SQLite driver error
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Blocking database task was cancelled or panicked
    #[error("Task error: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Configuration could not be loaded
    #[error("Config error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DreamError {
    /// Returns true for errors raised on the write path that the UI should surface
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, DreamError::DuplicateId(_))
    }
}

/// Result type alias for dreamlog operations
pub type Result<T> = std::result::Result<T, DreamError>;
