//! Error types for denseps.

use thiserror::Error;

/// Result type alias for denseps operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in denseps operations.
#[derive(Error, Debug)]
pub enum Error {
    // Argument errors
    #[error("length mismatch: {keys} keys but {tensors} tensors")]
    LengthMismatch { keys: usize, tensors: usize },

    #[error("table name must not be empty")]
    EmptyTableName,

    #[error("invalid tensor data: {0}")]
    InvalidTensorData(String),

    // Configuration errors
    #[error("invalid backend url \"{0}\": expected scheme://config")]
    InvalidUrl(String),

    #[error("unknown backend scheme: {0}")]
    UnknownScheme(String),

    #[error("failed to connect to backend at {addr}: {reason}")]
    ConnectionFailed { addr: String, reason: String },

    // Backend errors
    #[error("backend error on table {table}: {reason}")]
    Backend { table: String, reason: String },

    #[error("request timed out after {0} ms")]
    Timeout(u64),

    #[error("key not found in table {table}: {key}")]
    KeyNotFound { table: String, key: String },

    // Tensor mismatch errors
    #[error("shape mismatch for key {key}: stored {stored:?}, destination {destination:?}")]
    ShapeMismatch {
        key: String,
        stored: Vec<usize>,
        destination: Vec<usize>,
    },

    #[error("dtype mismatch for key {key}: stored {stored}, destination {destination}")]
    DtypeMismatch {
        key: String,
        stored: String,
        destination: String,
    },

    // Wire errors
    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("decompression failed: {0}")]
    DecompressionFailed(String),

    #[error("protocol error: {0}")]
    ProtocolError(String),

    // Generic errors
    #[error("internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}
