//! Core data types shared by the client, tracker and consumer

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Identifies one shard of one stream, plus the namespace its position is tracked under
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShardKey {
    stream_name: String,
    tracker_prefix: Option<String>,
    shard_id: String,
}

impl ShardKey {
    pub fn new(
        stream_name: impl Into<String>,
        tracker_prefix: Option<String>,
        shard_id: impl Into<String>,
    ) -> Self {
        Self {
            stream_name: stream_name.into(),
            tracker_prefix,
            shard_id: shard_id.into(),
        }
    }

    pub fn stream_name(&self) -> &str {
        &self.stream_name
    }

    pub fn tracker_prefix(&self) -> Option<&str> {
        self.tracker_prefix.as_deref()
    }

    pub fn shard_id(&self) -> &str {
        &self.shard_id
    }

    /// Key under which this shard's position is stored: `stream[-prefix]-shard`
    pub fn tracking_key(&self) -> String {
        [
            Some(self.stream_name.as_str()),
            self.tracker_prefix.as_deref(),
            Some(self.shard_id.as_str()),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join("-")
    }
}

impl fmt::Display for ShardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.stream_name, self.shard_id)
    }
}

/// The service's sequence number for a record.
///
/// Kinesis sequence numbers are decimal strings of varying length, so ordering
/// compares length first and then digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Position(String);

impl Position {
    pub fn new(sequence_number: impl Into<String>) -> Self {
        Self(sequence_number.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Ord for Position {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for Position {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Position {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Position {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Where a new iterator should start reading
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IteratorStart {
    /// Oldest record still retained by the shard
    TrimHorizon,
    /// First record strictly after the given position
    AfterPosition(Position),
}

impl IteratorStart {
    /// Resume point for a shard with the given last processed position
    pub fn resume_from(position: Option<Position>) -> Self {
        match position {
            Some(p) => IteratorStart::AfterPosition(p),
            None => IteratorStart::TrimHorizon,
        }
    }
}

/// A single undecoded record as returned by the stream service
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub payload: Bytes,
    pub position: Position,
    pub partition_key: String,
    pub approximate_arrival: Option<DateTime<Utc>>,
    pub shard: ShardKey,
}

/// One GetRecords response
#[derive(Debug, Clone, Default)]
pub struct RecordBatch {
    pub records: Vec<RawRecord>,
    /// Absent once the shard is closed and fully read
    pub next_iterator: Option<String>,
    pub millis_behind_latest: Option<i64>,
}

impl RecordBatch {
    pub fn is_shard_end(&self) -> bool {
        self.next_iterator.is_none()
    }
}

/// How a shard consumer's loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardExit {
    /// The shard was closed by a split or merge and has been fully read
    Closed,
    /// A stop was requested and observed
    Stopped,
}

impl fmt::Display for ShardExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShardExit::Closed => f.write_str("closed"),
            ShardExit::Stopped => f.write_str("stopped"),
        }
    }
}
