use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::constants::AGGREGATED_RECORD_MAGIC;
use crate::record::UserRecord;
use crate::wire::WireError;

/// One record as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub partition_key: String,
    pub explicit_hash_key: Option<String>,
    pub sequence_number: String,
    pub approximate_arrival_timestamp: DateTime<Utc>,
    pub data: Bytes,
}

impl Envelope {
    pub fn new(
        partition_key: impl Into<String>,
        sequence_number: impl Into<String>,
        approximate_arrival_timestamp: DateTime<Utc>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            partition_key: partition_key.into(),
            explicit_hash_key: None,
            sequence_number: sequence_number.into(),
            approximate_arrival_timestamp,
            data: data.into(),
        }
    }

    pub fn with_explicit_hash_key(mut self, explicit_hash_key: impl Into<String>) -> Self {
        self.explicit_hash_key = Some(explicit_hash_key.into());
        self
    }

    /// Whether the payload starts with the aggregated-record magic.
    #[inline]
    pub fn has_magic(&self) -> bool {
        self.data.starts_with(&AGGREGATED_RECORD_MAGIC)
    }
}

/// One user record recovered from an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeaggregatedRecord {
    pub partition_key: String,
    pub explicit_hash_key: Option<String>,
    pub data: Bytes,
    pub sequence_number: String,
    /// Position inside the aggregated envelope; `None` for passthrough records.
    pub sub_sequence_number: Option<u64>,
    pub approximate_arrival_timestamp: DateTime<Utc>,
}

impl DeaggregatedRecord {
    #[inline]
    pub fn is_aggregated(&self) -> bool {
        self.sub_sequence_number.is_some()
    }

    pub fn to_user_record(&self) -> UserRecord {
        match &self.explicit_hash_key {
            Some(ehk) => UserRecord::with_explicit_hash_key(self.partition_key.as_str(), ehk.as_str(), self.data.clone()),
            None => UserRecord::new(self.partition_key.as_str(), self.data.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeaggregationError {
    /// The trailing digest does not match the body. Never passed through.
    #[error("checksum mismatch in record {sequence_number}: trailer {expected}, body hashes to {actual}")]
    ChecksumMismatch {
        sequence_number: String,
        expected: String,
        actual: String,
    },

    #[error("malformed aggregated record {sequence_number}: {source}")]
    Decode {
        sequence_number: String,
        #[source]
        source: WireError,
    },
}
