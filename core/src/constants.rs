/// Magic prefix of an aggregated record.
// Protocol magic field, so `[u8; 4]` rather than a slice: the type enforces "exactly 4 bytes".
pub const AGGREGATED_RECORD_MAGIC: [u8; 4] = [0xF3, 0x89, 0x9A, 0xC2];

/// Length of the trailing MD5 digest of the body.
pub const DIGEST_LEN: usize = 16;

/// Fixed framing around the body: magic prefix + trailing digest.
pub const FRAMING_OVERHEAD: usize = AGGREGATED_RECORD_MAGIC.len() + DIGEST_LEN;

/// Hard cap on one transport record (1 MiB).
pub const MAX_RECORD_BYTES: usize = 1024 * 1024;

/// Largest user payload accepted by a container.
pub const MAX_USER_DATA_BYTES: usize = MAX_RECORD_BYTES - FRAMING_OVERHEAD;

/// Partition key bounds, in UTF-8 bytes.
pub const PARTITION_KEY_MIN_LEN: usize = 1;
pub const PARTITION_KEY_MAX_LEN: usize = 256;

/// Transport batch limits (one multi-record request).
pub const MAX_ENTRIES_PER_BATCH: usize = 500;
pub const MAX_BYTES_PER_BATCH: usize = 5 * 1024 * 1024;

/// Protocol-Buffers field numbers of the aggregated message.
pub mod fields {
    /// `AggregatedRecord` fields.
    pub const PARTITION_KEY_TABLE: u32 = 1;
    pub const EXPLICIT_HASH_KEY_TABLE: u32 = 2;
    pub const RECORDS: u32 = 3;

    /// Inner `Record` fields.
    pub const PARTITION_KEY_INDEX: u32 = 1;
    pub const EXPLICIT_HASH_KEY_INDEX: u32 = 2;
    pub const DATA: u32 = 3;
}

/// Protocol-Buffers wire types.
pub mod wire_types {
    pub const VARINT: u8 = 0;
    pub const FIXED64: u8 = 1;
    pub const LENGTH_DELIMITED: u8 = 2;
    pub const START_GROUP: u8 = 3;
    pub const END_GROUP: u8 = 4;
    pub const FIXED32: u8 = 5;
}
