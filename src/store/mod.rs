//! Position storage implementations for the shard reader

use crate::types::Position;
use async_trait::async_trait;

#[cfg(feature = "dynamodb-store")]
pub mod dynamodb;
pub mod memory;

/// Durable key/value store mapping a shard's tracking key to its last processed position
#[async_trait]
pub trait PositionStore: Send + Sync {
    /// Retrieve the stored position for `key`, if any
    async fn get(&self, key: &str) -> anyhow::Result<Option<Position>>;

    /// Persist `position` for `key`, overwriting any previous value
    async fn set(&self, key: &str, position: &Position) -> anyhow::Result<()>;
}

// Re-export implementations
#[cfg(feature = "dynamodb-store")]
pub use dynamodb::DynamoDbPositionStore;
pub use memory::InMemoryPositionStore;
