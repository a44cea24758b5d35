//! Core error types for the price synchronization.
//!
//! This module defines database-agnostic error types. Storage-specific errors
//! (HTTP, document decoding, etc.) are converted to these types by the storage layer.

use thiserror::Error;

pub use folio_market_data::MarketDataError;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the synchronization.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database operation failed: {0}")]
    Database(#[from] DatabaseError),

    #[error("Market data operation failed: {0}")]
    MarketData(#[from] MarketDataError),

    #[error("Invalid record '{id}': {message}")]
    InvalidRecord { id: String, message: String },

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl Error {
    /// Credential failures abort a run; everything else is handled per record.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::MarketData(e) if e.is_fatal())
    }
}

/// Database-agnostic error type for storage operations.
///
/// This enum uses `String` for all error details, allowing the storage layer
/// to convert storage-specific errors into this format.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to reach or authenticate against the database.
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// A read or write request was rejected.
    #[error("Database query failed: {0}")]
    QueryFailed(String),

    /// The requested record was not found.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// A document that must not exist already does.
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// Internal/unexpected database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}
