//! Caller-supplied event handling

use crate::error::HandlerError;
use crate::types::{Position, RawRecord, ShardKey};
use async_trait::async_trait;

/// Context of the record an event was decoded from
#[derive(Debug, Clone)]
pub struct RecordContext {
    pub shard: ShardKey,
    pub position: Position,
    pub partition_key: String,
    /// How far the fetching batch was behind the tip of the stream
    pub millis_behind_latest: Option<i64>,
}

impl RecordContext {
    pub(crate) fn for_record(record: &RawRecord, millis_behind_latest: Option<i64>) -> Self {
        Self {
            shard: record.shard.clone(),
            position: record.position.clone(),
            partition_key: record.partition_key.clone(),
            millis_behind_latest,
        }
    }
}

/// Receives decoded events, one call per event.
///
/// The consumer awaits each call before moving on, and only persists a
/// record's position after every event from it has been handled. Returning an
/// error stops the shard's consumer without persisting that record.
///
/// # Examples
///
/// ```rust
/// use kinesis_shard_reader::{EventHandler, RecordContext};
/// use kinesis_shard_reader::error::HandlerError;
/// use bytes::Bytes;
///
/// #[derive(Clone)]
/// struct PrintHandler;
///
/// #[async_trait::async_trait]
/// impl EventHandler<Bytes> for PrintHandler {
///     async fn handle(
///         &self,
///         schema_name: &str,
///         event: Bytes,
///         ctx: &RecordContext,
///     ) -> Result<(), HandlerError> {
///         println!("{} @ {}: {} bytes", schema_name, ctx.position, event.len());
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait EventHandler<E: Send + 'static>: Send + Sync {
    async fn handle(&self, schema_name: &str, event: E, ctx: &RecordContext)
        -> Result<(), HandlerError>;
}
