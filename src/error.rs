//! Error types for the event store
//!
//! Conflicts and backing-store failures propagate to the caller of
//! `query`/`append`. Lock misuse surfaces from the lock operation itself.
//! Handler failures never leave the notifier.

use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// What a subscriber handler returns when it fails
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur in store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// The optimistic-concurrency gate failed
    #[error(
        "context changed: events were modified between query() and append() (expected max sequence number {expected}{})",
        .actual.map(|a| format!(", found {a}")).unwrap_or_default()
    )]
    Conflict {
        /// The high-water mark the caller observed
        expected: u64,
        /// The high-water mark found at commit time, when the engine knows it
        actual: Option<u64>,
    },

    /// The durable backing store failed for infrastructural reasons
    #[error(transparent)]
    BackingStore(#[from] BackingStoreError),

    /// JSON encoding or decoding failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error (snapshot files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// An event or a stored record is malformed (e.g. a non-object payload)
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Fair lock misuse
    #[error(transparent)]
    Lock(#[from] LockError),
}

impl StoreError {
    /// Create a conflict error
    pub fn conflict(expected: u64, actual: Option<u64>) -> Self {
        Self::Conflict { expected, actual }
    }

    /// Create a new Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a new InvalidRecord error
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord(message.into())
    }

    /// Whether the caller should re-query and retry
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Releasing a lock kind that is not held
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LockError {
    #[error("No read locks to release")]
    NoReadLockHeld,

    #[error("No write lock to release")]
    NoWriteLockHeld,
}

/// Failure reported by the SQL executor
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Backing store error{}: {message}", .code.as_ref().map(|c| format!(" [{c}]")).unwrap_or_default())]
pub struct BackingStoreError {
    /// Driver-provided description
    pub message: String,
    /// SQLSTATE or driver error code, if any
    pub code: Option<String>,
}

impl BackingStoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: Some(code.into()),
        }
    }
}
