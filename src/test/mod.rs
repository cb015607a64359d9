//! Test utilities and mock implementations for exercising shard consumers


use crate::types::ShardKey;
use aws_sdk_kinesis::types::Record;

/// Helper functions for creating test data
pub struct TestUtils;

impl TestUtils {
    /// Create a test record with given sequence number and data
    pub fn create_test_record(sequence_number: &str, data: &[u8]) -> Record {
        Record::builder()
            .sequence_number(sequence_number)
            .data(aws_smithy_types::Blob::new(data.to_vec()))
            .partition_key("test-partition-key")
            .build()
            .expect("Failed to build test record")
    }

    /// Create `count` records with sequence numbers "1" through `count`
    pub fn create_test_records(count: usize) -> Vec<Record> {
        Self::create_test_records_from(1, count)
    }

    /// Create `count` records with consecutive sequence numbers starting at `first`
    pub fn create_test_records_from(first: usize, count: usize) -> Vec<Record> {
        (first..first + count)
            .map(|i| Self::create_test_record(&i.to_string(), format!("data-{}", i).as_bytes()))
            .collect()
    }

    pub fn shard_key(shard_id: &str) -> ShardKey {
        ShardKey::new("test-stream", None, shard_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_test_record() {
        let record = TestUtils::create_test_record("seq-1", b"test-data");
        assert_eq!(record.sequence_number(), "seq-1");
        assert_eq!(record.data().as_ref(), b"test-data");
        assert_eq!(record.partition_key(), Some("test-partition-key"));
    }

    #[test]
    fn test_create_test_records() {
        let records = TestUtils::create_test_records(3);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].sequence_number(), "1");
        assert_eq!(records[2].sequence_number(), "3");
        assert_eq!(records[2].data().as_ref(), b"data-3");

        let later = TestUtils::create_test_records_from(10, 2);
        assert_eq!(later[1].sequence_number(), "11");
    }
}
