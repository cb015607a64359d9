//! Stream service client abstraction and its AWS Kinesis implementation

use crate::types::{IteratorStart, RawRecord, RecordBatch, ShardKey};
use async_trait::async_trait;
use aws_sdk_kinesis::error::SdkError;
use aws_sdk_kinesis::operation::get_records::GetRecordsError;
use aws_sdk_kinesis::operation::get_shard_iterator::GetShardIteratorError;
use aws_sdk_kinesis::operation::list_shards::ListShardsError;
use aws_sdk_kinesis::{
    types::{Record, ShardIteratorType},
    Client,
};
use aws_smithy_types_convert::date_time::DateTimeExt;
use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, trace};

/// Errors surfaced by a [`StreamClient`]
#[derive(Debug, Clone, Error)]
pub enum KinesisClientError {
    #[error("Iterator expired")]
    ExpiredIterator,

    #[error("Throughput exceeded")]
    ThroughputExceeded,

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("{0}")]
    Other(String),
}

impl KinesisClientError {
    pub fn is_expired_iterator(&self) -> bool {
        matches!(self, KinesisClientError::ExpiredIterator)
    }
}

/// Protocol client for the stream service.
///
/// Implementations are shared by every shard consumer of a stream and must
/// tolerate concurrent calls.
#[async_trait]
pub trait StreamClient: Send + Sync {
    /// List the shard ids of a stream
    async fn list_shards(&self, stream_name: &str) -> Result<Vec<String>, KinesisClientError>;

    /// Acquire an iterator for `shard`.
    ///
    /// `Ok(None)` means the shard is closed and has nothing left to read.
    async fn get_shard_iterator(
        &self,
        shard: &ShardKey,
        start: &IteratorStart,
    ) -> Result<Option<String>, KinesisClientError>;

    /// Fetch up to `limit` records using `iterator`
    async fn get_records(
        &self,
        shard: &ShardKey,
        iterator: &str,
        limit: i32,
    ) -> Result<RecordBatch, KinesisClientError>;
}

/// Build a Kinesis client from the default AWS environment configuration
pub async fn kinesis_client_from_env() -> Client {
    let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    Client::new(&config)
}

/// Convert an SDK record into a [`RawRecord`] owned by `shard`
pub fn raw_record(record: &Record, shard: &ShardKey) -> RawRecord {
    RawRecord {
        payload: Bytes::copy_from_slice(record.data().as_ref()),
        position: record.sequence_number().into(),
        partition_key: record.partition_key().unwrap_or_default().to_string(),
        approximate_arrival: record
            .approximate_arrival_timestamp()
            .and_then(|ts| ts.to_chrono_utc().ok()),
        shard: shard.clone(),
    }
}

fn map_get_records_error<R>(err: SdkError<GetRecordsError, R>) -> KinesisClientError {
    match err.as_service_error() {
        Some(GetRecordsError::ExpiredIteratorException(_)) => KinesisClientError::ExpiredIterator,
        Some(GetRecordsError::ProvisionedThroughputExceededException(_)) => {
            KinesisClientError::ThroughputExceeded
        }
        Some(GetRecordsError::ResourceNotFoundException(e)) => {
            KinesisClientError::ResourceNotFound(e.to_string())
        }
        _ => KinesisClientError::Other(err.to_string()),
    }
}

fn map_get_iterator_error<R>(err: SdkError<GetShardIteratorError, R>) -> KinesisClientError {
    match err.as_service_error() {
        Some(GetShardIteratorError::ProvisionedThroughputExceededException(_)) => {
            KinesisClientError::ThroughputExceeded
        }
        Some(GetShardIteratorError::ResourceNotFoundException(e)) => {
            KinesisClientError::ResourceNotFound(e.to_string())
        }
        _ => KinesisClientError::Other(err.to_string()),
    }
}

fn map_list_shards_error<R>(err: SdkError<ListShardsError, R>) -> KinesisClientError {
    match err.as_service_error() {
        Some(ListShardsError::ResourceNotFoundException(e)) => {
            KinesisClientError::ResourceNotFound(e.to_string())
        }
        _ => KinesisClientError::Other(err.to_string()),
    }
}

#[async_trait]
impl StreamClient for Client {
    async fn list_shards(&self, stream_name: &str) -> Result<Vec<String>, KinesisClientError> {
        let mut shard_ids = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            // The stream name must be omitted once a pagination token is in play
            let request = match &next_token {
                Some(token) => self.list_shards().next_token(token),
                None => self.list_shards().stream_name(stream_name),
            };

            let response = request.send().await.map_err(map_list_shards_error)?;
            shard_ids.extend(response.shards().iter().map(|s| s.shard_id().to_string()));

            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        debug!(stream = %stream_name, shards = shard_ids.len(), "Listed shards");
        Ok(shard_ids)
    }

    async fn get_shard_iterator(
        &self,
        shard: &ShardKey,
        start: &IteratorStart,
    ) -> Result<Option<String>, KinesisClientError> {
        let mut req = self
            .get_shard_iterator()
            .stream_name(shard.stream_name())
            .shard_id(shard.shard_id());

        req = match start {
            IteratorStart::TrimHorizon => req.shard_iterator_type(ShardIteratorType::TrimHorizon),
            IteratorStart::AfterPosition(position) => req
                .shard_iterator_type(ShardIteratorType::AfterSequenceNumber)
                .starting_sequence_number(position.as_str()),
        };

        let response = req.send().await.map_err(map_get_iterator_error)?;
        Ok(response.shard_iterator)
    }

    async fn get_records(
        &self,
        shard: &ShardKey,
        iterator: &str,
        limit: i32,
    ) -> Result<RecordBatch, KinesisClientError> {
        let response = self
            .get_records()
            .shard_iterator(iterator)
            .limit(limit)
            .send()
            .await
            .map_err(map_get_records_error)?;

        trace!(
            shard_id = %shard.shard_id(),
            records = response.records().len(),
            "GetRecords response"
        );

        Ok(RecordBatch {
            records: response
                .records()
                .iter()
                .map(|r| raw_record(r, shard))
                .collect(),
            next_iterator: response.next_shard_iterator().map(String::from),
            millis_behind_latest: response.millis_behind_latest(),
        })
    }
}
