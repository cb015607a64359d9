//! Observability hooks for shard consumers
//!
//! The consumer reports each iterator acquisition, fetch, processed record and
//! exit through a [`ShardObserver`]. [`ChannelObserver`] turns those calls into
//! [`ProcessingEvent`]s that a [`MetricsAggregator`] can fold into per-shard
//! metrics.

mod metrics;
mod observer;
mod types;

pub use metrics::{MetricsAggregator, ShardMetrics};
pub use observer::{ChannelObserver, NoopObserver, ShardObserver};
pub use types::{
    IteratorEventType, MonitoringConfig, ProcessingEvent, ProcessingEventType, ShardEventType,
};
