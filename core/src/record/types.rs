use bytes::Bytes;

use crate::record::validate::validate_partition_key_bytes;

/// Rejected input. Raised before any mutation; fix the input and retry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid partition key: length must be {min}..={max} UTF-8 bytes, got {len}")]
    PartitionKeyLength { len: usize, min: usize, max: usize },

    #[error("invalid partition key: not valid UTF-8")]
    PartitionKeyEncoding,

    #[error("invalid explicit hash key: must be a base-10 unsigned integer, got {0:?}")]
    ExplicitHashKeyFormat(String),

    #[error("invalid explicit hash key: must be within 0..=2^128-1, got {0}")]
    ExplicitHashKeyRange(String),

    #[error("data must be at most {max} bytes, got {len}")]
    DataTooLarge { len: usize, max: usize },
}

/// Errors from adding records to a container or aggregator.
///
/// A full container is not an error: `Container::add_user_record` reports it
/// as `Ok(false)` and `Aggregator::add_user_record` rotates.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AggregationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The record cannot fit even into an empty container; shrink or split it.
    #[error(
        "record (pk={partition_key}, ehk={explicit_hash_key}) needs {size} bytes, \
         more than the container cap of {max} bytes"
    )]
    CapacityExceeded {
        partition_key: String,
        explicit_hash_key: String,
        size: usize,
        max: usize,
    },

    #[error("invalid aggregator config: {0}")]
    Config(String),
}

/// One producer-side record. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    partition_key: String,
    explicit_hash_key: Option<String>,
    data: Bytes,
}

impl UserRecord {
    pub fn new(partition_key: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            partition_key: partition_key.into(),
            explicit_hash_key: None,
            data: data.into(),
        }
    }

    pub fn with_explicit_hash_key(
        partition_key: impl Into<String>,
        explicit_hash_key: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            partition_key: partition_key.into(),
            explicit_hash_key: Some(explicit_hash_key.into()),
            data: data.into(),
        }
    }

    /// Build from a raw partition key, checking its length and UTF-8 encoding.
    pub fn from_raw_parts(
        partition_key: &[u8],
        explicit_hash_key: Option<&str>,
        data: impl Into<Bytes>,
    ) -> Result<Self, ValidationError> {
        let partition_key = validate_partition_key_bytes(partition_key)?;
        Ok(Self {
            partition_key: partition_key.to_owned(),
            explicit_hash_key: explicit_hash_key.map(str::to_owned),
            data: data.into(),
        })
    }

    #[inline]
    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    #[inline]
    pub fn explicit_hash_key(&self) -> Option<&str> {
        self.explicit_hash_key.as_deref()
    }

    #[inline]
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn into_parts(self) -> (String, Option<String>, Bytes) {
        (self.partition_key, self.explicit_hash_key, self.data)
    }
}
