//! Error types for kvshell
//!
//! Provides a unified error type for store operations, plus the open-time
//! failure classification and the close-time error returned by
//! [`Store::close`](crate::Store::close).

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using StoreError
pub type Result<T> = std::result::Result<T, StoreError>;

/// Unified error type for kvshell operations
#[derive(Debug, Error)]
pub enum StoreError {
    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("unable to open store at '{}': {reason}", .path.display())]
    Open { path: PathBuf, reason: OpenFailure },

    #[error("store is closed")]
    Closed,

    // -------------------------------------------------------------------------
    // Access Errors
    // -------------------------------------------------------------------------
    #[error("record not found")]
    NotFound,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Encryption error: {0}")]
    Crypto(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Shell Errors
    // -------------------------------------------------------------------------
    #[error("{0}")]
    Usage(&'static str),

    #[error("unrecognized command: {0}")]
    UnrecognizedCommand(String),
}

impl StoreError {
    pub(crate) fn open(path: impl Into<PathBuf>, reason: OpenFailure) -> Self {
        StoreError::Open {
            path: path.into(),
            reason,
        }
    }

    /// True for the expected "key absent" outcome
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }
}

/// Why a store could not be opened
#[derive(Debug, Error)]
pub enum OpenFailure {
    #[error("the store is already open by another handle")]
    Locked,

    #[error("the store file is corrupted: {0}")]
    Corrupted(String),

    #[error("the encryption key does not match this store")]
    WrongKey,

    #[error("the store is encrypted and no key was given")]
    KeyRequired,

    #[error("an encryption key was given but the store is not encrypted")]
    NotEncrypted,

    #[error("{0}")]
    Engine(String),
}

/// Error returned when closing a store fails
///
/// Both the maintenance worker shutdown and the engine close are attempted;
/// when both fail neither error is discarded.
#[derive(Debug, Error)]
pub enum CloseError {
    #[error("error closing store: maintenance worker: {0}")]
    Worker(String),

    #[error("error closing store: engine: {0}")]
    Engine(String),

    #[error("error closing store: maintenance worker: {worker}; engine: {engine}")]
    Both { worker: String, engine: String },
}

impl CloseError {
    /// Combine the outcome of both shutdown steps; `None` when both succeeded
    pub fn join(worker: Option<String>, engine: Option<String>) -> Option<Self> {
        match (worker, engine) {
            (None, None) => None,
            (Some(worker), None) => Some(CloseError::Worker(worker)),
            (None, Some(engine)) => Some(CloseError::Engine(engine)),
            (Some(worker), Some(engine)) => Some(CloseError::Both { worker, engine }),
        }
    }
}

// -----------------------------------------------------------------------------
// Engine error conversions
// -----------------------------------------------------------------------------

macro_rules! storage_error_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for StoreError {
                fn from(err: $ty) -> Self {
                    StoreError::Storage(err.to_string())
                }
            }
        )*
    };
}

storage_error_from!(
    redb::Error,
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
    redb::CompactionError,
);

impl From<redb::DatabaseError> for OpenFailure {
    fn from(err: redb::DatabaseError) -> Self {
        match err {
            redb::DatabaseError::DatabaseAlreadyOpen => OpenFailure::Locked,
            redb::DatabaseError::Storage(redb::StorageError::Corrupted(msg)) => {
                OpenFailure::Corrupted(msg)
            }
            other => OpenFailure::Engine(other.to_string()),
        }
    }
}
