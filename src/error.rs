//! Error taxonomy shared by every adapter operation.

use thiserror::Error;

/// Failure of a data operation's underlying execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationError {
    /// The query could not be parsed or contains an unsupported operator.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The update specification could not be parsed or applied.
    #[error("invalid update: {0}")]
    InvalidUpdate(String),

    /// An index specification was rejected.
    #[error("invalid index: {0}")]
    InvalidIndex(String),

    /// A write would produce two documents with the same key in a unique index.
    #[error("duplicate key in {collection} index {index}: {key}")]
    DuplicateKey {
        collection: String,
        index: String,
        key: String,
    },

    /// The storage engine failed to read or write its data.
    #[error("storage error: {0}")]
    Storage(String),
}

/// Error type returned by every [`DataStore`](crate::DataStore) operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DatastoreError {
    /// A data operation was invoked while the adapter is not connected.
    #[error("DB_DISCONNECTED: cannot {operation} before connect has completed")]
    NotConnected { operation: &'static str },

    /// `connect` could not open the backing resource.
    #[error("connection to database {database:?} failed: {reason}")]
    ConnectionFailure { database: String, reason: String },

    /// The operation reached the engine and failed there.
    #[error(transparent)]
    Operation(#[from] OperationError),

    /// The operation exceeded the configured deadline.
    #[error("{operation} timed out after {after_ms}ms")]
    Timeout {
        operation: &'static str,
        after_ms: u64,
    },

    /// Configuration could not be loaded or failed validation.
    #[error("configuration error: {0}")]
    Config(String),
}

impl DatastoreError {
    pub fn not_connected(operation: &'static str) -> Self {
        Self::NotConnected { operation }
    }

    pub fn connection_failure(database: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConnectionFailure {
            database: database.into(),
            reason: reason.into(),
        }
    }

    pub fn is_not_connected(&self) -> bool {
        matches!(self, Self::NotConnected { .. })
    }

    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, Self::Operation(OperationError::DuplicateKey { .. }))
    }
}

/// Result type for adapter operations.
pub type DatastoreResult<T> = Result<T, DatastoreError>;
