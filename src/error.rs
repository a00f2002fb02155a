//! Error types for the DanceConnect client.
//!
//! Three layers, matching the crate structure:
//! - [`StoreError`]: failures from a remote store implementation (HTTP,
//!   websocket, auth endpoints).
//! - [`StorageError`]: failures from the local JSON document store.
//! - [`SyncError`]: failures surfaced by the sync service to callers, with
//!   remote errors split into read and write sides because the two are
//!   handled differently (reads are tolerated, writes are not).

use thiserror::Error;

/// Errors from a remote store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-success HTTP status with whatever message the backend returned.
    #[error("backend returned {status}: {message}")]
    Http { status: u16, message: String },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed frame or payload on the change feed.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// The backend or feed is gone and will not recover.
    #[error("connection closed")]
    Closed,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from the local JSON document store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt stored document: {0}")]
    Serde(#[from] serde_json::Error),

    /// Key is empty or would escape the storage directory.
    #[error("invalid storage key: {0}")]
    InvalidKey(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Errors surfaced by the sync service.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("authentication error: {0}")]
    Auth(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("remote read failed: {0}")]
    RemoteRead(StoreError),

    #[error("remote write failed: {0}")]
    RemoteWrite(StoreError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unauthorized(msg) => SyncError::Auth(msg),
            StoreError::Conflict(msg) => SyncError::Conflict(msg),
            StoreError::NotFound(msg) => SyncError::NotFound(msg),
            other => SyncError::RemoteWrite(other),
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = StoreError::Http {
            status: 409,
            message: "duplicate key".to_string(),
        };
        assert_eq!(format!("{}", err), "backend returned 409: duplicate key");
    }

    #[test]
    fn test_store_error_maps_to_sync_error() {
        let err: SyncError = StoreError::Unauthorized("bad token".to_string()).into();
        assert!(matches!(err, SyncError::Auth(_)));

        let err: SyncError = StoreError::Conflict("slot taken".to_string()).into();
        assert!(matches!(err, SyncError::Conflict(_)));

        let err: SyncError = StoreError::NotFound("slot 42".to_string()).into();
        assert!(matches!(err, SyncError::NotFound(_)));

        let err: SyncError = StoreError::Closed.into();
        assert!(matches!(err, SyncError::RemoteWrite(StoreError::Closed)));
    }

    #[test]
    fn test_storage_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let err: StorageError = io.into();
        assert!(matches!(err, StorageError::Io(_)));
    }
}
