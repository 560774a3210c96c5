use bytes::Bytes;

/// One user record inside a container: indices into the owning container's
/// key tables plus the payload. Never meaningful outside that container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnerRecord {
    pub partition_key_index: u64,
    pub explicit_hash_key_index: Option<u64>,
    pub data: Bytes,
}

/// Borrowed view of a decoded inner record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InnerRecordView<'a> {
    pub partition_key_index: u64,
    pub explicit_hash_key_index: Option<u64>,
    pub data: &'a [u8],
}

/// Borrowed view of a decoded body.
///
/// Built only by `decode_body`, which checks every index of every record
/// against its table. Lookups still go through `get` so a record view from
/// another body resolves to `None` instead of panicking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedView<'a> {
    pub(crate) partition_keys: Vec<&'a str>,
    pub(crate) explicit_hash_keys: Vec<&'a str>,
    pub(crate) records: Vec<InnerRecordView<'a>>,
}

impl<'a> AggregatedView<'a> {
    pub(crate) fn new() -> Self {
        Self {
            partition_keys: Vec::new(),
            explicit_hash_keys: Vec::new(),
            records: Vec::new(),
        }
    }

    pub fn partition_keys(&self) -> &[&'a str] {
        &self.partition_keys
    }

    pub fn explicit_hash_keys(&self) -> &[&'a str] {
        &self.explicit_hash_keys
    }

    pub fn records(&self) -> &[InnerRecordView<'a>] {
        &self.records
    }

    #[inline]
    pub fn partition_key(&self, record: &InnerRecordView<'a>) -> Option<&'a str> {
        let index = usize::try_from(record.partition_key_index).ok()?;
        self.partition_keys.get(index).copied()
    }

    /// `None` when the record carries no index or the index does not resolve.
    #[inline]
    pub fn explicit_hash_key(&self, record: &InnerRecordView<'a>) -> Option<&'a str> {
        let index = usize::try_from(record.explicit_hash_key_index?).ok()?;
        self.explicit_hash_keys.get(index).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("truncated aggregated body")]
    Truncated,
    #[error("varint exceeds 64 bits")]
    VarintOverflow,
    #[error("field {field} has wire type {actual}, expected {expected}")]
    InvalidWireType {
        field: &'static str,
        expected: u8,
        actual: u8,
    },
    #[error("unsupported wire type: {0}")]
    UnsupportedWireType(u8),
    #[error("{field} entry is not valid UTF-8")]
    InvalidUtf8 {
        field: &'static str,
    },
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("{table} index {index} out of range (table has {len} entries)")]
    IndexOutOfRange {
        table: &'static str,
        index: u64,
        len: usize,
    },
}
