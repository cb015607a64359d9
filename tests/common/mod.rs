#![allow(dead_code)]

use kinesis_shard_reader::decoder::RecordDecoder;
use kinesis_shard_reader::test::mocks::{MockPositionStore, MockStreamClient, RecordingHandler};
use kinesis_shard_reader::{ReaderConfig, RetryConfig, ShardConsumer};
use std::sync::{Arc, Once};
use std::time::Duration;

static INIT: Once = Once::new();

pub fn init_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::from_default_env()
                    .add_directive("kinesis_shard_reader=debug".parse().unwrap()),
            )
            .with_test_writer()
            .with_thread_ids(true)
            .with_line_number(true)
            .try_init()
            .ok();
    });
}

pub fn create_test_config() -> ReaderConfig {
    ReaderConfig {
        stream_name: "test-stream".to_string(),
        batch_size: 100,
        persist_retry: RetryConfig {
            max_retries: Some(2),
            initial_backoff: Duration::from_millis(10),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Tracking key of `shard_id` under [`create_test_config`]
pub fn tracking_key(shard_id: &str) -> String {
    format!("test-stream-{}", shard_id)
}

pub struct TestContext {
    pub config: ReaderConfig,
    pub client: MockStreamClient,
    pub store: MockPositionStore,
    pub handler: RecordingHandler,
}

impl TestContext {
    pub fn new() -> Self {
        init_logging();
        Self {
            config: create_test_config(),
            client: MockStreamClient::new(),
            store: MockPositionStore::new(),
            handler: RecordingHandler::new(),
        }
    }

    pub fn with_client(client: MockStreamClient) -> Self {
        Self {
            client,
            ..Self::new()
        }
    }

    pub fn consumer<D: RecordDecoder + 'static>(
        &self,
        shard_id: &str,
        decoder: D,
    ) -> ShardConsumer<MockStreamClient, MockPositionStore, D> {
        ShardConsumer::new(
            self.config.clone(),
            shard_id,
            Arc::new(self.client.clone()),
            Arc::new(self.store.clone()),
            Arc::new(decoder),
        )
        .expect("valid test config")
    }
}

/// Poll `check` on the runtime clock until it holds or `timeout` elapses
pub async fn wait_for<F>(mut check: F, timeout: Duration) -> anyhow::Result<()>
where
    F: FnMut() -> bool,
{
    let start = tokio::time::Instant::now();
    while !check() {
        if start.elapsed() > timeout {
            anyhow::bail!("Condition not met within {:?}", timeout);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    Ok(())
}
