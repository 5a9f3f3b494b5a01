//! Error types for the engine and the record store.

use kvs_core::CodecError;

/// Errors returned by a [`KvEngine`](crate::storage::KvEngine) implementation.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("storage backend error: {0}")]
    Backend(#[from] redb::Error),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("sequence {name:?} requires a bandwidth greater than zero")]
    ZeroBandwidth { name: String },
    #[error("sequence {name:?} is exhausted")]
    SequenceExhausted { name: String },
}

macro_rules! backend_error {
    ($($source:ty),* $(,)?) => {
        $(
            impl From<$source> for EngineError {
                fn from(err: $source) -> Self {
                    Self::Backend(err.into())
                }
            }
        )*
    };
}

backend_error!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

/// Errors returned by [`Store`](crate::storage::Store) and query operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("key not found: {key}")]
    NotFound { key: String },
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("failed to allocate row id from sequence {sequence}: {source}")]
    Sequence {
        sequence: String,
        #[source]
        source: EngineError,
    },
    #[error("failed to release sequence {sequence}: {source}")]
    Release {
        sequence: String,
        #[source]
        source: EngineError,
    },
    #[error("store is closed")]
    Closed,
    #[error("storage engine error: {0}")]
    Engine(#[from] EngineError),
}

impl StoreError {
    /// Returns `true` if the error reports a missing key.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result alias for store operations.
pub type Result<T, E = StoreError> = std::result::Result<T, E>;
