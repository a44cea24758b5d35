//! Storage-specific error types for Firestore operations.
//!
//! This module provides error types that wrap HTTP and JWT failures and convert
//! them to the database-agnostic error types defined in `folio_core`.

use folio_core::errors::{DatabaseError, Error};
use folio_market_data::MarketDataError;
use thiserror::Error;

/// Storage-specific errors.
///
/// These errors are internal to the storage layer and are converted to
/// `folio_core::Error` (or `MarketDataError::Storage` for mappings) before
/// being returned to callers.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Invalid service account key: {0}")]
    InvalidKey(String),

    #[error("Failed to sign token assertion: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Document already exists: {0}")]
    AlreadyExists(String),

    #[error("Firestore error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidKey(e) | StorageError::Auth(e) => {
                Error::Database(DatabaseError::ConnectionFailed(e))
            }
            StorageError::Signing(e) => {
                Error::Database(DatabaseError::ConnectionFailed(e.to_string()))
            }
            StorageError::Transport(e) => {
                Error::Database(DatabaseError::ConnectionFailed(e.to_string()))
            }
            StorageError::NotFound(e) => Error::Database(DatabaseError::NotFound(e)),
            StorageError::AlreadyExists(e) => Error::Database(DatabaseError::UniqueViolation(e)),
            StorageError::Api { status, message } => Error::Database(DatabaseError::QueryFailed(
                format!("HTTP {} - {}", status, message),
            )),
            StorageError::Serialization(e) => Error::Database(DatabaseError::Internal(e)),
        }
    }
}

impl From<StorageError> for MarketDataError {
    fn from(err: StorageError) -> Self {
        MarketDataError::Storage(err.to_string())
    }
}
