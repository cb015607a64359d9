//! Turning raw record payloads into typed events

use crate::error::DecodeError;
use crate::types::RawRecord;
use bytes::Bytes;

/// One event decoded from a record, tagged with the name of its schema
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEvent<E> {
    pub schema_name: String,
    pub event: E,
}

impl<E> DecodedEvent<E> {
    pub fn new(schema_name: impl Into<String>, event: E) -> Self {
        Self {
            schema_name: schema_name.into(),
            event,
        }
    }
}

/// Decodes a record's payload into zero or more events.
///
/// Returning an empty vector is valid (control records, filtered schemas).
/// Events are handed to the handler in the order returned.
pub trait RecordDecoder: Send + Sync {
    type Event: Send + 'static;

    fn decode(&self, record: &RawRecord) -> Result<Vec<DecodedEvent<Self::Event>>, DecodeError>;
}

/// Yields every record's payload unchanged as a single event
#[derive(Debug, Clone)]
pub struct PassthroughDecoder {
    schema_name: String,
}

impl PassthroughDecoder {
    pub fn new(schema_name: impl Into<String>) -> Self {
        Self {
            schema_name: schema_name.into(),
        }
    }
}

impl Default for PassthroughDecoder {
    fn default() -> Self {
        Self::new("raw")
    }
}

impl RecordDecoder for PassthroughDecoder {
    type Event = Bytes;

    fn decode(&self, record: &RawRecord) -> Result<Vec<DecodedEvent<Bytes>>, DecodeError> {
        Ok(vec![DecodedEvent::new(
            self.schema_name.clone(),
            record.payload.clone(),
        )])
    }
}
