use crate::store::PositionStore;
use crate::types::Position;
use async_trait::async_trait;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use tracing::{debug, instrument, trace};

/// In-memory implementation of position storage
#[derive(Debug, Default, Clone)]
pub struct InMemoryPositionStore {
    positions: Arc<RwLock<HashMap<String, Position>>>,
}

impl InMemoryPositionStore {
    pub fn new() -> Self {
        debug!("Initializing in-memory position store");
        Self {
            positions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Snapshot of every stored position
    pub async fn snapshot(&self) -> HashMap<String, Position> {
        self.positions.read().await.clone()
    }
}

#[async_trait]
impl PositionStore for InMemoryPositionStore {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> anyhow::Result<Option<Position>> {
        let position = self.positions.read().await.get(key).cloned();

        trace!(key = %key, position = ?position, "Retrieved position from memory");

        Ok(position)
    }

    #[instrument(skip(self), fields(position = %position))]
    async fn set(&self, key: &str, position: &Position) -> anyhow::Result<()> {
        self.positions
            .write()
            .await
            .insert(key.to_string(), position.clone());

        trace!(key = %key, "Position saved to memory");

        Ok(())
    }
}
