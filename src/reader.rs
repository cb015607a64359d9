//! Stream-level orchestration: one [`ShardConsumer`] per shard

use crate::client::{kinesis_client_from_env, StreamClient};
use crate::consumer::{ConsumerHandle, ReaderConfig, ShardConsumer};
use crate::decoder::RecordDecoder;
use crate::error::Result;
use crate::handler::EventHandler;
use crate::monitoring::{ChannelObserver, NoopObserver, ProcessingEvent, ShardObserver};
use crate::store::PositionStore;
use crate::types::ShardExit;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Consumes every shard of a stream.
///
/// Shards are listed once at [`start`](Self::start). Shards created later by
/// a split or merge are not picked up; restart the reader to consume them.
pub struct StreamReader<C, S, D>
where
    C: StreamClient + ?Sized + 'static,
    S: PositionStore + ?Sized + 'static,
    D: RecordDecoder + 'static,
{
    config: ReaderConfig,
    client: Arc<C>,
    store: Arc<S>,
    decoder: Arc<D>,
    observer: Arc<dyn ShardObserver>,
}

impl<C, S, D> StreamReader<C, S, D>
where
    C: StreamClient + ?Sized + 'static,
    S: PositionStore + ?Sized + 'static,
    D: RecordDecoder + 'static,
{
    /// Creates a new reader
    ///
    /// # Returns
    ///
    /// The reader and, when `config.monitoring.enabled`, the receiving end of
    /// its monitoring channel
    pub fn new(
        config: ReaderConfig,
        client: Arc<C>,
        store: Arc<S>,
        decoder: Arc<D>,
    ) -> Result<(Self, Option<mpsc::Receiver<ProcessingEvent>>)> {
        config.validate()?;

        let (observer, monitoring_rx) = if config.monitoring.enabled {
            let (observer, rx) = ChannelObserver::new(&config.monitoring);
            let observer: Arc<dyn ShardObserver> = Arc::new(observer);
            (observer, Some(rx))
        } else {
            let observer: Arc<dyn ShardObserver> = Arc::new(NoopObserver);
            (observer, None)
        };

        Ok((
            Self {
                config,
                client,
                store,
                decoder,
                observer,
            },
            monitoring_rx,
        ))
    }

    /// Replace the observer shared by all consumers
    pub fn with_observer(mut self, observer: Arc<dyn ShardObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// List the stream's shards and spawn a consumer for each
    pub async fn start<H>(self, handler: H) -> Result<ReaderHandle>
    where
        H: EventHandler<D::Event> + Clone + 'static,
    {
        let shard_ids = self.client.list_shards(&self.config.stream_name).await?;
        info!(
            stream = %self.config.stream_name,
            shards = shard_ids.len(),
            "Starting stream reader"
        );

        let mut consumers = Vec::with_capacity(shard_ids.len());
        for shard_id in shard_ids {
            let consumer = ShardConsumer::new(
                self.config.clone(),
                shard_id,
                self.client.clone(),
                self.store.clone(),
                self.decoder.clone(),
            )?
            .with_observer(self.observer.clone());

            consumers.push(consumer.start(handler.clone()));
        }

        Ok(ReaderHandle {
            stream_name: self.config.stream_name,
            consumers,
        })
    }
}

impl<S, D> StreamReader<aws_sdk_kinesis::Client, S, D>
where
    S: PositionStore + ?Sized + 'static,
    D: RecordDecoder + 'static,
{
    /// Creates a reader over a Kinesis client built from the default AWS
    /// environment (credentials, region, endpoint overrides)
    pub async fn from_env(
        config: ReaderConfig,
        store: Arc<S>,
        decoder: Arc<D>,
    ) -> Result<(Self, Option<mpsc::Receiver<ProcessingEvent>>)> {
        config.validate()?;
        let client = kinesis_client_from_env().await;
        Self::new(config, Arc::new(client), store, decoder)
    }
}

/// Handle to the consumers spawned by [`StreamReader::start`]
#[derive(Debug)]
pub struct ReaderHandle {
    stream_name: String,
    consumers: Vec<ConsumerHandle>,
}

impl ReaderHandle {
    pub fn shard_ids(&self) -> Vec<String> {
        self.consumers
            .iter()
            .map(|c| c.shard().shard_id().to_string())
            .collect()
    }

    /// Ask every consumer to stop. Does not wait.
    pub fn request_stop(&self) {
        info!(stream = %self.stream_name, "Stopping stream reader");
        for consumer in &self.consumers {
            consumer.request_stop();
        }
    }

    /// Wait for every consumer to exit
    ///
    /// # Returns
    ///
    /// Each shard id paired with how its consumer ended, in listing order
    pub async fn join(self) -> Vec<(String, Result<ShardExit>)> {
        let (shard_ids, waits): (Vec<_>, Vec<_>) = self
            .consumers
            .into_iter()
            .map(|c| (c.shard().shard_id().to_string(), c.join()))
            .unzip();

        let outcomes = futures::future::join_all(waits).await;

        shard_ids
            .into_iter()
            .zip(outcomes)
            .inspect(|(shard_id, outcome)| {
                if let Err(e) = outcome {
                    warn!(shard_id = %shard_id, error = %e, "Shard consumer ended with error");
                }
            })
            .collect()
    }
}

/// Whether every outcome is a clean exit
pub fn all_clean(outcomes: &[(String, Result<ShardExit>)]) -> bool {
    outcomes.iter().all(|(_, outcome)| outcome.is_ok())
}
