//! Per-shard accessor over a [`PositionStore`]

use crate::error::{ReaderError, Result};
use crate::retry::{RetryConfig, RetryHandle};
use crate::store::PositionStore;
use crate::types::{Position, ShardKey};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Reads and writes the last processed position of a single shard.
///
/// Every call goes to the store; nothing is cached here.
pub struct PositionTracker<S: PositionStore + ?Sized> {
    store: Arc<S>,
    key: String,
    retry: RetryConfig,
}

impl<S: PositionStore + ?Sized> PositionTracker<S> {
    pub fn new(store: Arc<S>, shard: &ShardKey, retry: RetryConfig) -> Self {
        Self {
            store,
            key: shard.tracking_key(),
            retry,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Last durably stored position, or `None` if the shard was never consumed
    pub async fn get(&self) -> Result<Option<Position>> {
        match self.store.get(&self.key).await {
            Ok(position) => {
                debug!(key = %self.key, position = ?position, "Read stored position");
                Ok(position)
            }
            Err(e) => {
                error!(key = %self.key, error = %e, "Failed to read stored position");
                Err(ReaderError::PositionRead {
                    key: self.key.clone(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Durably record `position`, retrying per the configured policy.
    ///
    /// Returns [`ReaderError::PersistFailure`] once retries are exhausted.
    pub async fn set(&self, position: &Position) -> Result<()> {
        let mut retry = RetryHandle::new(self.retry.clone(), self.retry.backoff());

        retry
            .retry(|| self.store.set(&self.key, position))
            .await
            .map_err(|e| {
                warn!(
                    key = %self.key,
                    position = %position,
                    attempts = e.attempts(),
                    error = %e,
                    "Giving up persisting position"
                );
                ReaderError::PersistFailure {
                    key: self.key.clone(),
                    position: position.to_string(),
                    reason: e.last_error().to_string(),
                }
            })
    }
}
