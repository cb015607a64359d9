//! Error types for the shard reader

use crate::client::KinesisClientError;
use thiserror::Error;
use tokio::task::JoinError;

/// Main error type for shard consumer operations
#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("Iterator expired for shard {0}")]
    IteratorExpired(String),

    #[error("Failed to get iterator for shard {shard_id}: {source}")]
    GetIteratorFailed {
        shard_id: String,
        #[source]
        source: KinesisClientError,
    },

    #[error("Failed to get records for shard {shard_id}: {source}")]
    GetRecordsFailed {
        shard_id: String,
        #[source]
        source: KinesisClientError,
    },

    #[error("Failed to read position for {key}: {reason}")]
    PositionRead { key: String, reason: String },

    #[error("Failed to persist position {position} for {key}: {reason}")]
    PersistFailure {
        key: String,
        position: String,
        reason: String,
    },

    #[error("Failed to decode record {position}: {source}")]
    Decode {
        position: String,
        #[source]
        source: DecodeError,
    },

    #[error("Handler failed on record {position} ({schema_name}): {source}")]
    Handler {
        position: String,
        schema_name: String,
        #[source]
        source: HandlerError,
    },

    #[error("Stream client error: {0}")]
    Client(#[from] KinesisClientError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ReaderError {
    /// Whether the consumer loop recovers from this error without exiting
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ReaderError::IteratorExpired(_))
    }
}

impl From<JoinError> for ReaderError {
    fn from(err: JoinError) -> Self {
        ReaderError::Other(err.into())
    }
}

/// Result type for shard consumer operations
pub type Result<T> = std::result::Result<T, ReaderError>;

/// Error produced by a [`RecordDecoder`](crate::decoder::RecordDecoder)
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Malformed payload: {0}")]
    Malformed(String),

    #[error("Unknown schema: {0}")]
    UnknownSchema(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Error returned by an [`EventHandler`](crate::handler::EventHandler)
#[derive(Debug, Error)]
#[error("{0}")]
pub struct HandlerError(#[source] pub anyhow::Error);

impl HandlerError {
    pub fn new(err: impl Into<anyhow::Error>) -> Self {
        HandlerError(err.into())
    }
}

impl From<anyhow::Error> for HandlerError {
    fn from(err: anyhow::Error) -> Self {
        HandlerError(err)
    }
}
