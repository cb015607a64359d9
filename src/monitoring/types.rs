use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

/// Configuration for the monitoring channel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Whether events are emitted at all
    pub enabled: bool,
    /// Size of the monitoring channel buffer
    pub channel_size: usize,
    /// How often the aggregator logs per-shard metrics
    pub metrics_interval: Duration,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            channel_size: 1000,
            metrics_interval: Duration::from_secs(60),
        }
    }
}

/// Represents a monitoring event from a shard consumer
#[derive(Debug, Clone)]
pub struct ProcessingEvent {
    /// When the event occurred
    pub timestamp: SystemTime,
    /// ID of the shard this event relates to
    pub shard_id: String,
    /// The type of event and its details
    pub event_type: ProcessingEventType,
}

/// The different types of events that can occur during consumption
#[derive(Debug, Clone)]
pub enum ProcessingEventType {
    Iterator {
        event_type: IteratorEventType,
        /// Resume position the iterator was requested after, if any
        position: Option<String>,
    },
    BatchFetched {
        record_count: usize,
        millis_behind_latest: Option<i64>,
        duration: Duration,
    },
    RecordProcessed {
        sequence_number: String,
        event_count: usize,
        duration: Duration,
    },
    PersistFailure {
        sequence_number: String,
        error: String,
    },
    ShardEvent {
        event_type: ShardEventType,
        details: Option<String>,
    },
}

/// Types of shard-level events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShardEventType {
    /// Consumer loop started
    Started,
    /// Shard closed and fully read
    Closed,
    /// Stop requested and observed
    Stopped,
    /// Loop terminated by an error
    Error,
}

/// Types of iterator events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IteratorEventType {
    /// Iterator acquired from the trim horizon
    AcquiredAtTrimHorizon,
    /// Iterator acquired after a stored position
    AcquiredAfterPosition,
    /// Iterator expired and will be reacquired
    Expired,
}

impl ProcessingEvent {
    fn new(shard_id: String, event_type: ProcessingEventType) -> Self {
        Self {
            timestamp: SystemTime::now(),
            shard_id,
            event_type,
        }
    }

    pub fn iterator(
        shard_id: String,
        event_type: IteratorEventType,
        position: Option<String>,
    ) -> Self {
        Self::new(
            shard_id,
            ProcessingEventType::Iterator {
                event_type,
                position,
            },
        )
    }

    pub fn batch_fetched(
        shard_id: String,
        record_count: usize,
        millis_behind_latest: Option<i64>,
        duration: Duration,
    ) -> Self {
        Self::new(
            shard_id,
            ProcessingEventType::BatchFetched {
                record_count,
                millis_behind_latest,
                duration,
            },
        )
    }

    pub fn record_processed(
        shard_id: String,
        sequence_number: String,
        event_count: usize,
        duration: Duration,
    ) -> Self {
        Self::new(
            shard_id,
            ProcessingEventType::RecordProcessed {
                sequence_number,
                event_count,
                duration,
            },
        )
    }

    pub fn persist_failure(shard_id: String, sequence_number: String, error: String) -> Self {
        Self::new(
            shard_id,
            ProcessingEventType::PersistFailure {
                sequence_number,
                error,
            },
        )
    }

    pub fn shard_event(
        shard_id: String,
        event_type: ShardEventType,
        details: Option<String>,
    ) -> Self {
        Self::new(
            shard_id,
            ProcessingEventType::ShardEvent {
                event_type,
                details,
            },
        )
    }
}
