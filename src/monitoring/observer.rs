use super::types::{IteratorEventType, MonitoringConfig, ProcessingEvent, ShardEventType};
use crate::error::ReaderError;
use crate::types::{IteratorStart, Position, ShardExit, ShardKey};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{trace, warn};

/// Hooks invoked by a shard consumer at each observable step.
///
/// All methods default to doing nothing. They are called inline on the
/// consumer's task, so implementations must not block.
pub trait ShardObserver: Send + Sync {
    fn shard_started(&self, _shard: &ShardKey) {}

    fn iterator_acquired(&self, _shard: &ShardKey, _start: &IteratorStart) {}

    fn iterator_expired(&self, _shard: &ShardKey) {}

    fn batch_fetched(
        &self,
        _shard: &ShardKey,
        _record_count: usize,
        _millis_behind_latest: Option<i64>,
        _duration: Duration,
    ) {
    }

    fn record_processed(
        &self,
        _shard: &ShardKey,
        _position: &Position,
        _event_count: usize,
        _duration: Duration,
    ) {
    }

    fn persist_failed(&self, _shard: &ShardKey, _position: &Position, _error: &ReaderError) {}

    fn shard_exited(&self, _shard: &ShardKey, _exit: ShardExit) {}

    fn shard_failed(&self, _shard: &ShardKey, _error: &ReaderError) {}
}

/// Observer that ignores every hook
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ShardObserver for NoopObserver {}

/// Observer that forwards each hook as a [`ProcessingEvent`] over a bounded channel.
///
/// Events are dropped, with a warning, when the channel is full so a slow
/// consumer of events never stalls shard processing.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::Sender<ProcessingEvent>,
}

impl ChannelObserver {
    pub fn new(config: &MonitoringConfig) -> (Self, mpsc::Receiver<ProcessingEvent>) {
        let (tx, rx) = mpsc::channel(config.channel_size.max(1));
        (Self { tx }, rx)
    }

    fn send(&self, event: ProcessingEvent) {
        match self.tx.try_send(event) {
            Ok(()) => trace!("Sent monitoring event"),
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(shard_id = %event.shard_id, "Monitoring channel full, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                trace!("Monitoring channel closed");
            }
        }
    }
}

impl ShardObserver for ChannelObserver {
    fn shard_started(&self, shard: &ShardKey) {
        self.send(ProcessingEvent::shard_event(
            shard.shard_id().to_string(),
            ShardEventType::Started,
            None,
        ));
    }

    fn iterator_acquired(&self, shard: &ShardKey, start: &IteratorStart) {
        let (event_type, position) = match start {
            IteratorStart::TrimHorizon => (IteratorEventType::AcquiredAtTrimHorizon, None),
            IteratorStart::AfterPosition(p) => {
                (IteratorEventType::AcquiredAfterPosition, Some(p.to_string()))
            }
        };
        self.send(ProcessingEvent::iterator(
            shard.shard_id().to_string(),
            event_type,
            position,
        ));
    }

    fn iterator_expired(&self, shard: &ShardKey) {
        self.send(ProcessingEvent::iterator(
            shard.shard_id().to_string(),
            IteratorEventType::Expired,
            None,
        ));
    }

    fn batch_fetched(
        &self,
        shard: &ShardKey,
        record_count: usize,
        millis_behind_latest: Option<i64>,
        duration: Duration,
    ) {
        self.send(ProcessingEvent::batch_fetched(
            shard.shard_id().to_string(),
            record_count,
            millis_behind_latest,
            duration,
        ));
    }

    fn record_processed(
        &self,
        shard: &ShardKey,
        position: &Position,
        event_count: usize,
        duration: Duration,
    ) {
        self.send(ProcessingEvent::record_processed(
            shard.shard_id().to_string(),
            position.to_string(),
            event_count,
            duration,
        ));
    }

    fn persist_failed(&self, shard: &ShardKey, position: &Position, error: &ReaderError) {
        self.send(ProcessingEvent::persist_failure(
            shard.shard_id().to_string(),
            position.to_string(),
            error.to_string(),
        ));
    }

    fn shard_exited(&self, shard: &ShardKey, exit: ShardExit) {
        let event_type = match exit {
            ShardExit::Closed => ShardEventType::Closed,
            ShardExit::Stopped => ShardEventType::Stopped,
        };
        self.send(ProcessingEvent::shard_event(
            shard.shard_id().to_string(),
            event_type,
            None,
        ));
    }

    fn shard_failed(&self, shard: &ShardKey, error: &ReaderError) {
        self.send(ProcessingEvent::shard_event(
            shard.shard_id().to_string(),
            ShardEventType::Error,
            Some(error.to_string()),
        ));
    }
}
