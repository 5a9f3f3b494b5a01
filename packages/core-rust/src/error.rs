//! Error types for key parsing and record conversion.

/// Failure to turn stored bytes back into a field value.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("invalid owner identity: {0}")]
    Identity(#[from] uuid::Error),
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while converting records to entries and back.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("table {table:?} has no field matching column {column:?}")]
    FieldNotFound { table: String, column: String },
    #[error("failed to decode column {column:?}: {source}")]
    Decode {
        column: String,
        #[source]
        source: DecodeError,
    },
    #[error("failed to encode column {column:?}: {source}")]
    Encode {
        column: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("malformed key {key:?}: expected a decimal row id suffix")]
    MalformedKey { key: String },
}
