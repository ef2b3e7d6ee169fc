// src/error.rs
// Crate-wide error taxonomy for the Waddle core.

use thiserror::Error;

/// Error kind, used by callers that need to branch on category rather than message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Database,
    Encryption,
    Vector,
    FileSystem,
    Validation,
    NotFound,
    Conflict,
    Serialization,
    Migration,
}

#[derive(Error, Debug)]
pub enum WaddleError {
    #[error("database error: {0}")]
    Database(String),

    #[error("encryption error: {0}")]
    Encryption(String),

    #[error("vector index error: {0}")]
    Vector(String),

    #[error("filesystem error: {0}")]
    FileSystem(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("migration error: {0}")]
    Migration(String),
}

impl WaddleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WaddleError::Database(_) => ErrorKind::Database,
            WaddleError::Encryption(_) => ErrorKind::Encryption,
            WaddleError::Vector(_) => ErrorKind::Vector,
            WaddleError::FileSystem(_) => ErrorKind::FileSystem,
            WaddleError::Validation(_) => ErrorKind::Validation,
            WaddleError::NotFound(_) => ErrorKind::NotFound,
            WaddleError::Conflict(_) => ErrorKind::Conflict,
            WaddleError::Serialization(_) => ErrorKind::Serialization,
            WaddleError::Migration(_) => ErrorKind::Migration,
        }
    }

    /// Whether the caller may retry the operation unmodified.
    pub fn retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Database | ErrorKind::Vector | ErrorKind::FileSystem
        )
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        WaddleError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        WaddleError::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        WaddleError::Conflict(msg.into())
    }
}

impl From<sqlx::Error> for WaddleError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return WaddleError::Conflict(db_err.message().to_string());
            }
        }
        if matches!(e, sqlx::Error::RowNotFound) {
            return WaddleError::NotFound("row not found".to_string());
        }
        WaddleError::Database(e.to_string())
    }
}

impl From<std::io::Error> for WaddleError {
    fn from(e: std::io::Error) -> Self {
        WaddleError::FileSystem(e.to_string())
    }
}

impl From<serde_json::Error> for WaddleError {
    fn from(e: serde_json::Error) -> Self {
        WaddleError::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WaddleError>;
