//! Custom error types for the user store

use common::error::DatabaseError;
use thiserror::Error;
use uuid::Uuid;

/// Custom error type for user store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database connection or query failure
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Reading or writing the user document failed
    #[error("Storage file error: {0}")]
    Io(#[from] std::io::Error),

    /// The user document could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Password hashing or hash parsing failed
    #[error("Password hashing error: {0}")]
    Hashing(String),

    /// A stored record cannot be turned into a user
    #[error("Invalid stored record: {0}")]
    InvalidRecord(String),

    /// A record with this id is already stored
    #[error("Duplicate user id: {0}")]
    DuplicateId(Uuid),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(DatabaseError::Query(err))
    }
}

/// Type alias for user store results
pub type StoreResult<T> = Result<T, StoreError>;
