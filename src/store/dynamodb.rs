use crate::store::PositionStore;
use crate::types::Position;
use anyhow::Context;
use async_trait::async_trait;
use aws_sdk_dynamodb::{types::AttributeValue, Client as DynamoClient};
use tracing::{debug, instrument, trace};

const KEY_ATTRIBUTE: &str = "tracking_key";
const POSITION_ATTRIBUTE: &str = "sequence_number";

/// Position store backed by a DynamoDB table keyed on `tracking_key`.
///
/// Each call issues exactly one request. Retrying failed writes is left to
/// [`PositionTracker`](crate::tracker::PositionTracker).
#[derive(Debug, Clone)]
pub struct DynamoDbPositionStore {
    client: DynamoClient,
    table_name: String,
    key_prefix: String,
}

impl DynamoDbPositionStore {
    pub fn builder() -> DynamoDbPositionStoreBuilder {
        DynamoDbPositionStoreBuilder::new()
    }

    fn prefixed_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }
}

#[async_trait]
impl PositionStore for DynamoDbPositionStore {
    #[instrument(skip(self), fields(table = %self.table_name))]
    async fn get(&self, key: &str) -> anyhow::Result<Option<Position>> {
        let key = self.prefixed_key(key);

        let response = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key(KEY_ATTRIBUTE, AttributeValue::S(key.clone()))
            .consistent_read(true)
            .send()
            .await
            .context("Failed to get position from DynamoDB")?;

        let position = response
            .item
            .and_then(|item| item.get(POSITION_ATTRIBUTE).cloned())
            .and_then(|attr| attr.as_s().ok().map(|s| Position::new(s.as_str())));

        debug!(key = %key, position = ?position, "Retrieved position from DynamoDB");

        Ok(position)
    }

    #[instrument(skip(self), fields(table = %self.table_name, position = %position))]
    async fn set(&self, key: &str, position: &Position) -> anyhow::Result<()> {
        let key = self.prefixed_key(key);

        self.client
            .put_item()
            .table_name(&self.table_name)
            .item(KEY_ATTRIBUTE, AttributeValue::S(key.clone()))
            .item(
                POSITION_ATTRIBUTE,
                AttributeValue::S(position.as_str().to_string()),
            )
            .send()
            .await
            .context("Failed to save position to DynamoDB")?;

        trace!(key = %key, "Position saved to DynamoDB");

        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct DynamoDbPositionStoreBuilder {
    client: Option<DynamoClient>,
    table_name: Option<String>,
    key_prefix: Option<String>,
}

impl DynamoDbPositionStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(mut self, client: DynamoClient) -> Self {
        self.client = Some(client);
        self
    }

    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = Some(table_name.into());
        self
    }

    pub fn with_key_prefix(mut self, key_prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(key_prefix.into());
        self
    }

    pub fn build(self) -> anyhow::Result<DynamoDbPositionStore> {
        Ok(DynamoDbPositionStore {
            client: self
                .client
                .ok_or_else(|| anyhow::anyhow!("DynamoDB client is required"))?,
            table_name: self
                .table_name
                .ok_or_else(|| anyhow::anyhow!("Table name is required"))?,
            key_prefix: self.key_prefix.unwrap_or_default(),
        })
    }
}
