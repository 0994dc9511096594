//! Error types for the photo cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Storage Error Enum ==
/// Errors raised by the on-disk cache.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Filesystem failure (create, write, rename, fsync)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Store opened with unusable parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Journal could not be parsed
    #[error("Corrupt journal: {0}")]
    CorruptJournal(String),

    /// Key is not a safe file name
    #[error("Invalid cache key: {0}")]
    InvalidKey(String),

    /// Another editor holds the key
    #[error("Edit already in progress for key: {0}")]
    EditInProgress(String),

    /// A new entry was committed without writing every value slot
    #[error("Edit for key {key} did not write value slot {slot}")]
    IncompleteEdit { key: String, slot: usize },

    /// Value slot index past the configured slot count
    #[error("Value slot {slot} out of range (store holds {count} slots)")]
    SlotOutOfRange { slot: usize, count: usize },

    /// Store was closed
    #[error("Disk cache is closed")]
    Closed,
}

// == Fetch Error Enum ==
/// Errors that terminate a single fetch task.
///
/// None of these escape the task: they abort the disk edit and leave the
/// waiting sinks untouched.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Network unreachable, malformed URL or non-2xx response
    #[error("Transport error: {0}")]
    Transport(String),

    /// Corrupt or unsupported image bytes
    #[error("Decode error: {0}")]
    Decode(String),

    /// Disk cache failure
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Task cancelled before completion
    #[error("Fetch cancelled")]
    Cancelled,

    /// Blocking worker panicked or was shut down
    #[error("Worker error: {0}")]
    Worker(String),
}

// == Cache Error Enum ==
/// Error type surfaced by the HTTP service.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Nothing cached for the request
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The fetch finished without delivering an asset
    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    /// No delivery within the configured window
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Disk cache failure
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::FetchFailed(_) => StatusCode::BAD_GATEWAY,
            CacheError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            CacheError::Storage(_) | CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the photo cache.
pub type Result<T> = std::result::Result<T, CacheError>;
