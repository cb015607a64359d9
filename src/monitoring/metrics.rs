use super::types::{IteratorEventType, ProcessingEvent, ProcessingEventType, ShardEventType};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;
use tracing::{debug, info, trace, warn};

/// Holds aggregated metrics for a single shard
#[derive(Debug, Clone)]
pub struct ShardMetrics {
    // Record processing metrics
    pub records_processed: u64,
    pub events_handled: u64,
    pub processing_time: Duration,
    pub max_processing_time: Duration,

    // Fetch metrics
    pub batches_fetched: u64,
    pub empty_batches: u64,
    pub millis_behind_latest: Option<i64>,

    // Iterator metrics
    pub iterator_acquisitions: u64,
    pub iterator_expirations: u64,

    // Position tracking
    pub last_position: Option<String>,
    pub persist_failures: u64,

    // Lifecycle
    pub exited: Option<ShardEventType>,
    pub last_updated: Instant,
}

impl Default for ShardMetrics {
    fn default() -> Self {
        Self {
            records_processed: 0,
            events_handled: 0,
            processing_time: Duration::default(),
            max_processing_time: Duration::default(),
            batches_fetched: 0,
            empty_batches: 0,
            millis_behind_latest: None,
            iterator_acquisitions: 0,
            iterator_expirations: 0,
            last_position: None,
            persist_failures: 0,
            exited: None,
            last_updated: Instant::now(),
        }
    }
}

impl ShardMetrics {
    pub fn avg_processing_time(&self) -> Duration {
        if self.records_processed == 0 {
            Duration::default()
        } else {
            self.processing_time
                .div_f64(self.records_processed as f64)
        }
    }
}

/// Aggregates monitoring events into per-shard metrics
pub struct MetricsAggregator {
    metrics: Arc<RwLock<HashMap<String, ShardMetrics>>>,
    metrics_interval: Duration,
    monitoring_rx: mpsc::Receiver<ProcessingEvent>,
}

impl MetricsAggregator {
    pub fn new(metrics_interval: Duration, monitoring_rx: mpsc::Receiver<ProcessingEvent>) -> Self {
        Self {
            metrics: Arc::new(RwLock::new(HashMap::new())),
            metrics_interval,
            monitoring_rx,
        }
    }

    /// Shared view of the metrics, readable while [`run`](Self::run) is consuming events
    pub fn metrics_handle(&self) -> Arc<RwLock<HashMap<String, ShardMetrics>>> {
        self.metrics.clone()
    }

    /// Consume events until every sender is dropped, logging metrics on each interval tick
    pub async fn run(mut self) -> HashMap<String, ShardMetrics> {
        let mut ticker = interval(self.metrics_interval);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                event = self.monitoring_rx.recv() => match event {
                    Some(event) => self.process_event(event).await,
                    None => break,
                },
                _ = ticker.tick() => self.emit_metrics().await,
            }
        }

        self.emit_metrics().await;
        self.get_metrics().await
    }

    pub async fn process_event(&self, event: ProcessingEvent) {
        let mut metrics = self.metrics.write().await;
        let shard_metrics = metrics.entry(event.shard_id.clone()).or_default();

        match event.event_type {
            ProcessingEventType::Iterator {
                event_type,
                position,
            } => match event_type {
                IteratorEventType::AcquiredAtTrimHorizon
                | IteratorEventType::AcquiredAfterPosition => {
                    shard_metrics.iterator_acquisitions += 1;
                    trace!(shard_id = %event.shard_id, position = ?position, "Iterator acquired");
                }
                IteratorEventType::Expired => {
                    shard_metrics.iterator_expirations += 1;
                    debug!(shard_id = %event.shard_id, "Iterator expired");
                }
            },
            ProcessingEventType::BatchFetched {
                record_count,
                millis_behind_latest,
                ..
            } => {
                shard_metrics.batches_fetched += 1;
                if record_count == 0 {
                    shard_metrics.empty_batches += 1;
                }
                if millis_behind_latest.is_some() {
                    shard_metrics.millis_behind_latest = millis_behind_latest;
                }
            }
            ProcessingEventType::RecordProcessed {
                sequence_number,
                event_count,
                duration,
            } => {
                shard_metrics.records_processed += 1;
                shard_metrics.events_handled += event_count as u64;
                shard_metrics.processing_time += duration;
                if duration > shard_metrics.max_processing_time {
                    shard_metrics.max_processing_time = duration;
                }
                shard_metrics.last_position = Some(sequence_number);
            }
            ProcessingEventType::PersistFailure {
                sequence_number,
                error,
            } => {
                shard_metrics.persist_failures += 1;
                warn!(
                    shard_id = %event.shard_id,
                    sequence = %sequence_number,
                    error = %error,
                    "Position persist failed"
                );
            }
            ProcessingEventType::ShardEvent {
                event_type,
                details,
            } => {
                match event_type {
                    ShardEventType::Started => {
                        debug!(shard_id = %event.shard_id, "Shard consumer started");
                    }
                    ShardEventType::Closed | ShardEventType::Stopped => {
                        debug!(shard_id = %event.shard_id, exit = ?event_type, "Shard consumer exited");
                    }
                    ShardEventType::Error => {
                        warn!(shard_id = %event.shard_id, details = ?details, "Shard consumer failed");
                    }
                }
                if event_type != ShardEventType::Started {
                    shard_metrics.exited = Some(event_type);
                }
            }
        }

        shard_metrics.last_updated = Instant::now();
    }

    async fn emit_metrics(&self) {
        let metrics = self.metrics.read().await;

        for (shard_id, metrics) in metrics.iter() {
            info!(
                shard_id = %shard_id,
                records_processed = metrics.records_processed,
                events_handled = metrics.events_handled,
                batches_fetched = metrics.batches_fetched,
                empty_batches = metrics.empty_batches,
                millis_behind_latest = ?metrics.millis_behind_latest,
                avg_processing_time_ms = %metrics.avg_processing_time().as_millis(),
                max_processing_time_ms = %metrics.max_processing_time.as_millis(),
                iterator_acquisitions = metrics.iterator_acquisitions,
                iterator_expirations = metrics.iterator_expirations,
                last_position = ?metrics.last_position,
                "Shard metrics"
            );

            if metrics.persist_failures > 0 {
                warn!(
                    shard_id = %shard_id,
                    failures = metrics.persist_failures,
                    "Position persist failures detected"
                );
            }
        }
    }

    /// Get current metrics for all shards
    pub async fn get_metrics(&self) -> HashMap<String, ShardMetrics> {
        self.metrics.read().await.clone()
    }

    /// Get metrics for a specific shard
    pub async fn get_shard_metrics(&self, shard_id: &str) -> Option<ShardMetrics> {
        self.metrics.read().await.get(shard_id).cloned()
    }
}
