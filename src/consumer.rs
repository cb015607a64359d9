//! Per-shard consumption loop
//!
//! A [`ShardConsumer`] owns one shard for its whole lifetime:
//!
//! - acquires an iterator after the last stored position (or at the trim horizon)
//! - fetches batches no more often than the configured minimum interval
//! - decodes each record and hands every event to the caller's handler
//! - persists the record's position once all of its events were handled
//! - reacquires the iterator when the service reports it expired
//! - exits on shard closure or on a cooperative stop request

use crate::client::StreamClient;
use crate::decoder::{DecodedEvent, RecordDecoder};
use crate::error::{ReaderError, Result};
use crate::handler::{EventHandler, RecordContext};
use crate::monitoring::{MonitoringConfig, NoopObserver, ShardObserver};
use crate::retry::RetryConfig;
use crate::store::PositionStore;
use crate::tracker::PositionTracker;
use crate::types::{IteratorStart, RawRecord, RecordBatch, ShardExit, ShardKey};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, info_span, trace, warn, Instrument};

/// Largest `Limit` the GetRecords API accepts
pub const MAX_BATCH_SIZE: i32 = 10_000;

/// Configuration shared by every shard consumer of a stream
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Name of the stream to consume
    pub stream_name: String,
    /// Optional namespace inserted into every shard's tracking key
    pub tracker_prefix: Option<String>,
    /// Maximum number of records to request per GetRecords call
    pub batch_size: i32,
    /// Minimum spacing between the starts of two consecutive fetches
    pub min_fetch_interval: Duration,
    /// Retry policy for persisting positions
    pub persist_retry: RetryConfig,
    /// Monitoring configuration
    pub monitoring: MonitoringConfig,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            stream_name: String::new(),
            tracker_prefix: None,
            batch_size: 100,
            min_fetch_interval: Duration::from_secs(1),
            persist_retry: RetryConfig::default(),
            monitoring: MonitoringConfig::default(),
        }
    }
}

impl ReaderConfig {
    pub fn validate(&self) -> Result<()> {
        if self.stream_name.is_empty() {
            return Err(ReaderError::ConfigError(
                "stream_name must not be empty".to_string(),
            ));
        }
        if !(1..=MAX_BATCH_SIZE).contains(&self.batch_size) {
            return Err(ReaderError::ConfigError(format!(
                "batch_size must be between 1 and {}, got {}",
                MAX_BATCH_SIZE, self.batch_size
            )));
        }
        Ok(())
    }

    /// Key identifying `shard_id` of the configured stream
    pub fn shard_key(&self, shard_id: impl Into<String>) -> ShardKey {
        ShardKey::new(
            self.stream_name.clone(),
            self.tracker_prefix.clone(),
            shard_id,
        )
    }
}

/// Consumes a single shard.
///
/// # Examples
///
/// ```rust,no_run
/// use kinesis_shard_reader::{
///     EventHandler, InMemoryPositionStore, PassthroughDecoder, ReaderConfig, RecordContext,
///     ShardConsumer,
/// };
/// use kinesis_shard_reader::error::HandlerError;
/// use bytes::Bytes;
/// use std::sync::Arc;
///
/// struct Print;
///
/// #[async_trait::async_trait]
/// impl EventHandler<Bytes> for Print {
///     async fn handle(&self, _: &str, event: Bytes, _: &RecordContext) -> Result<(), HandlerError> {
///         println!("{:?}", event);
///         Ok(())
///     }
/// }
///
/// # async fn example(client: aws_sdk_kinesis::Client) -> kinesis_shard_reader::Result<()> {
/// let config = ReaderConfig {
///     stream_name: "orders".to_string(),
///     ..Default::default()
/// };
/// let consumer = ShardConsumer::new(
///     config,
///     "shardId-000000000000",
///     Arc::new(client),
///     Arc::new(InMemoryPositionStore::new()),
///     Arc::new(PassthroughDecoder::default()),
/// )?;
///
/// let handle = consumer.start(Print);
/// // ...
/// handle.request_stop();
/// let exit = handle.join().await?;
/// # Ok(())
/// # }
/// ```
pub struct ShardConsumer<C, S, D>
where
    C: StreamClient + ?Sized + 'static,
    S: PositionStore + ?Sized + 'static,
    D: RecordDecoder + 'static,
{
    shard: ShardKey,
    client: Arc<C>,
    tracker: PositionTracker<S>,
    decoder: Arc<D>,
    observer: Arc<dyn ShardObserver>,
    batch_size: i32,
    min_fetch_interval: Duration,
}

impl<C, S, D> ShardConsumer<C, S, D>
where
    C: StreamClient + ?Sized + 'static,
    S: PositionStore + ?Sized + 'static,
    D: RecordDecoder + 'static,
{
    pub fn new(
        config: ReaderConfig,
        shard_id: impl Into<String>,
        client: Arc<C>,
        store: Arc<S>,
        decoder: Arc<D>,
    ) -> Result<Self> {
        config.validate()?;
        let shard = config.shard_key(shard_id);

        Ok(Self {
            tracker: PositionTracker::new(store, &shard, config.persist_retry.clone()),
            shard,
            client,
            decoder,
            observer: Arc::new(NoopObserver),
            batch_size: config.batch_size,
            min_fetch_interval: config.min_fetch_interval,
        })
    }

    /// Report progress to `observer` instead of discarding it
    pub fn with_observer(mut self, observer: Arc<dyn ShardObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn shard(&self) -> &ShardKey {
        &self.shard
    }

    /// Spawn the consumer loop onto the runtime
    pub fn start<H>(self, handler: H) -> ConsumerHandle
    where
        H: EventHandler<D::Event> + 'static,
    {
        let (stop_tx, stop_rx) = watch::channel(false);
        let shard = self.shard.clone();
        let task = tokio::spawn(self.run(handler, stop_rx));

        ConsumerHandle {
            shard,
            stop_tx,
            task,
        }
    }

    /// Run the consumer loop on the current task until the shard closes,
    /// `shutdown` turns true, or an unrecoverable error occurs
    pub async fn run<H>(self, handler: H, mut shutdown: watch::Receiver<bool>) -> Result<ShardExit>
    where
        H: EventHandler<D::Event>,
    {
        let span = info_span!(
            "shard_consumer",
            stream = %self.shard.stream_name(),
            shard_id = %self.shard.shard_id()
        );

        async move {
            info!("Spawned shard consumer");
            self.observer.shard_started(&self.shard);

            let result = self.consume(&handler, &mut shutdown).await;

            match &result {
                Ok(ShardExit::Closed) => {
                    info!("Shard is closed after a split or merge and all records were read");
                    self.observer.shard_exited(&self.shard, ShardExit::Closed);
                }
                Ok(ShardExit::Stopped) => {
                    info!("Shard consumer stopped on request");
                    self.observer.shard_exited(&self.shard, ShardExit::Stopped);
                }
                Err(e) => {
                    error!(error = %e, "Shard consumer failed");
                    self.observer.shard_failed(&self.shard, e);
                }
            }

            result
        }
        .instrument(span)
        .await
    }

    async fn consume<H>(
        &self,
        handler: &H,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<ShardExit>
    where
        H: EventHandler<D::Event>,
    {
        let mut last_fetch: Option<Instant> = None;

        loop {
            if stop_requested(shutdown) {
                return Ok(ShardExit::Stopped);
            }

            let Some(mut iterator) = self.acquire_iterator().await? else {
                return Ok(ShardExit::Closed);
            };

            loop {
                if stop_requested(shutdown) {
                    return Ok(ShardExit::Stopped);
                }

                if !self.pace(last_fetch, shutdown).await {
                    return Ok(ShardExit::Stopped);
                }

                last_fetch = Some(Instant::now());
                let batch = match self.fetch(&iterator).await {
                    Ok(batch) => batch,
                    Err(e) if e.is_recoverable() => {
                        debug!(error = %e, "Iterator expired, fetching a new one");
                        self.observer.iterator_expired(&self.shard);
                        break;
                    }
                    Err(e) => return Err(e),
                };

                if !self.process_batch(handler, &batch, shutdown).await? {
                    return Ok(ShardExit::Stopped);
                }

                if batch.is_shard_end() {
                    return Ok(ShardExit::Closed);
                }
                if let Some(next) = batch.next_iterator {
                    iterator = next;
                }
            }
        }
    }

    /// Request an iterator resuming after the stored position.
    ///
    /// `Ok(None)` means the shard is closed with nothing left to read.
    async fn acquire_iterator(&self) -> Result<Option<String>> {
        let start = IteratorStart::resume_from(self.tracker.get().await?);
        info!(start = ?start, "Getting shard iterator");

        match self.client.get_shard_iterator(&self.shard, &start).await {
            Ok(Some(iterator)) => {
                self.observer.iterator_acquired(&self.shard, &start);
                Ok(Some(iterator))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                error!(error = %e, "Failed to get shard iterator");
                Err(ReaderError::GetIteratorFailed {
                    shard_id: self.shard.shard_id().to_string(),
                    source: e,
                })
            }
        }
    }

    /// Sleep out the rest of the minimum fetch interval.
    ///
    /// Returns false if a stop was requested while waiting.
    async fn pace(&self, last_fetch: Option<Instant>, shutdown: &mut watch::Receiver<bool>) -> bool {
        let Some(previous) = last_fetch else {
            return true;
        };

        let elapsed = previous.elapsed();
        if elapsed >= self.min_fetch_interval {
            return true;
        }

        let remaining = self.min_fetch_interval - elapsed;
        trace!(wait_ms = remaining.as_millis() as u64, "Fetching too quickly, backing off");

        tokio::select! {
            _ = tokio::time::sleep(remaining) => true,
            _ = stop_signalled(shutdown) => false,
        }
    }

    async fn fetch(&self, iterator: &str) -> Result<RecordBatch> {
        let started = Instant::now();

        match self
            .client
            .get_records(&self.shard, iterator, self.batch_size)
            .await
        {
            Ok(batch) => {
                debug!(
                    records = batch.records.len(),
                    millis_behind_latest = ?batch.millis_behind_latest,
                    "Got batch"
                );
                self.observer.batch_fetched(
                    &self.shard,
                    batch.records.len(),
                    batch.millis_behind_latest,
                    started.elapsed(),
                );
                Ok(batch)
            }
            Err(e) if e.is_expired_iterator() => Err(ReaderError::IteratorExpired(
                self.shard.shard_id().to_string(),
            )),
            Err(e) => {
                error!(error = %e, "Failed to get records");
                Err(ReaderError::GetRecordsFailed {
                    shard_id: self.shard.shard_id().to_string(),
                    source: e,
                })
            }
        }
    }

    /// Handle every record of `batch` in order.
    ///
    /// Returns false if a stop was observed before the batch was finished.
    async fn process_batch<H>(
        &self,
        handler: &H,
        batch: &RecordBatch,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<bool>
    where
        H: EventHandler<D::Event>,
    {
        for (index, record) in batch.records.iter().enumerate() {
            if stop_requested(shutdown) {
                info!(
                    unprocessed = batch.records.len() - index,
                    "Stop observed mid-batch, leaving remaining records for the next run"
                );
                return Ok(false);
            }

            self.process_record(handler, record, batch.millis_behind_latest)
                .await?;
        }

        Ok(true)
    }

    async fn process_record<H>(
        &self,
        handler: &H,
        record: &RawRecord,
        millis_behind_latest: Option<i64>,
    ) -> Result<()>
    where
        H: EventHandler<D::Event>,
    {
        let started = Instant::now();

        let events = self
            .decoder
            .decode(record)
            .map_err(|source| ReaderError::Decode {
                position: record.position.to_string(),
                source,
            })?;
        let event_count = events.len();
        let ctx = RecordContext::for_record(record, millis_behind_latest);

        for DecodedEvent { schema_name, event } in events {
            handler
                .handle(&schema_name, event, &ctx)
                .await
                .map_err(|source| ReaderError::Handler {
                    position: record.position.to_string(),
                    schema_name,
                    source,
                })?;
        }

        if let Err(e) = self.tracker.set(&record.position).await {
            warn!(position = %record.position, error = %e, "Failed to persist position");
            self.observer
                .persist_failed(&self.shard, &record.position, &e);
            return Err(e);
        }

        trace!(position = %record.position, events = event_count, "Record processed");
        self.observer.record_processed(
            &self.shard,
            &record.position,
            event_count,
            started.elapsed(),
        );

        Ok(())
    }
}

fn stop_requested(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow()
}

/// Resolves once a stop is requested; never resolves if the sender is gone
async fn stop_signalled(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Handle to a spawned [`ShardConsumer`]
#[derive(Debug)]
pub struct ConsumerHandle {
    shard: ShardKey,
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<Result<ShardExit>>,
}

impl ConsumerHandle {
    pub fn shard(&self) -> &ShardKey {
        &self.shard
    }

    /// Ask the consumer to stop at its next loop boundary. Does not wait.
    pub fn request_stop(&self) {
        self.stop_tx.send_replace(true);
    }

    /// Whether the consumer loop has already exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the consumer loop to exit and return how it ended
    pub async fn join(self) -> Result<ShardExit> {
        self.task.await?
    }
}
