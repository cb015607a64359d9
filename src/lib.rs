//! Kinesis Shard Reader - per-shard consumption of AWS Kinesis streams
//!
//! Each shard is read by an independent [`ShardConsumer`] task that resumes
//! after the last durably stored [`Position`], rate limits its fetches,
//! decodes records into events for a caller-supplied [`EventHandler`], and
//! persists its progress one record at a time. A [`StreamReader`] runs one
//! consumer per shard of a stream.

pub mod client;
pub mod consumer;
pub mod decoder;
pub mod error;
pub mod handler;
pub mod monitoring;
pub mod reader;
pub mod retry;
pub mod store;
pub mod tracker;
pub mod types;

// Make test utilities available for integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test;

pub use error::{ReaderError, Result};
pub use retry::{Backoff, ExponentialBackoff, RetryConfig};

// Re-export main traits
pub use crate::client::StreamClient;
pub use crate::decoder::RecordDecoder;
pub use crate::handler::EventHandler;
pub use crate::monitoring::ShardObserver;
pub use crate::store::PositionStore;

// Re-export implementations
pub use crate::consumer::{ConsumerHandle, ReaderConfig, ShardConsumer};
pub use crate::decoder::{DecodedEvent, PassthroughDecoder};
pub use crate::handler::RecordContext;
pub use crate::reader::{ReaderHandle, StreamReader};
pub use crate::store::memory::InMemoryPositionStore;
pub use crate::tracker::PositionTracker;
pub use crate::types::{IteratorStart, Position, RawRecord, RecordBatch, ShardExit, ShardKey};

#[cfg(feature = "dynamodb-store")]
pub use crate::store::dynamodb::DynamoDbPositionStore;
