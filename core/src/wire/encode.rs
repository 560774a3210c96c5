use md5::{Digest, Md5};

use crate::constants::{fields, wire_types, AGGREGATED_RECORD_MAGIC, FRAMING_OVERHEAD};
use crate::wire::types::InnerRecord;
use crate::wire::varint::{field_key, put_varint, varint_len};

/// Encoded length of one length-delimited field whose payload is `len` bytes
/// (single-byte key + length varint + payload).
#[inline]
pub const fn length_delimited_len(len: usize) -> usize {
    1 + varint_len(len as u64) + len
}

/// Encoded length of an inner record's payload (without its outer wrapper).
pub fn inner_record_len(record: &InnerRecord) -> usize {
    let mut len = 1 + varint_len(record.partition_key_index);
    if let Some(ehk) = record.explicit_hash_key_index {
        len += 1 + varint_len(ehk);
    }
    len + length_delimited_len(record.data.len())
}

/// Exact body length `encode_body` would produce, computed from scratch.
pub fn encoded_body_len<K: AsRef<str>>(
    partition_keys: &[K],
    explicit_hash_keys: &[K],
    records: &[InnerRecord],
) -> usize {
    let keys: usize = partition_keys
        .iter()
        .chain(explicit_hash_keys)
        .map(|k| length_delimited_len(k.as_ref().len()))
        .sum();
    let recs: usize = records
        .iter()
        .map(|r| length_delimited_len(inner_record_len(r)))
        .sum();
    keys + recs
}

/// Encode the body of an aggregated record.
///
/// Layout (Protocol-Buffers wire format, field order fixed):
///
/// ```text
/// for each partition key:      [ 0x0A ][ len varint ][ utf-8 bytes ]
/// for each explicit hash key:  [ 0x12 ][ len varint ][ utf-8 bytes ]
/// for each record:             [ 0x1A ][ len varint ][
///     [ 0x08 ][ pk index varint ]
///     [ 0x10 ][ ehk index varint ]      (only when present)
///     [ 0x1A ][ len varint ][ data ]
/// ]
/// ```
pub fn encode_body<K: AsRef<str>>(
    partition_keys: &[K],
    explicit_hash_keys: &[K],
    records: &[InnerRecord],
) -> Vec<u8> {
    let expected = encoded_body_len(partition_keys, explicit_hash_keys, records);
    let mut out = Vec::with_capacity(expected);

    for key in partition_keys {
        put_bytes_field(&mut out, fields::PARTITION_KEY_TABLE, key.as_ref().as_bytes());
    }
    for key in explicit_hash_keys {
        put_bytes_field(&mut out, fields::EXPLICIT_HASH_KEY_TABLE, key.as_ref().as_bytes());
    }
    for record in records {
        put_varint(&mut out, field_key(fields::RECORDS, wire_types::LENGTH_DELIMITED));
        put_varint(&mut out, inner_record_len(record) as u64);

        put_varint(&mut out, field_key(fields::PARTITION_KEY_INDEX, wire_types::VARINT));
        put_varint(&mut out, record.partition_key_index);
        if let Some(ehk) = record.explicit_hash_key_index {
            put_varint(&mut out, field_key(fields::EXPLICIT_HASH_KEY_INDEX, wire_types::VARINT));
            put_varint(&mut out, ehk);
        }
        put_bytes_field(&mut out, fields::DATA, &record.data);
    }

    debug_assert_eq!(out.len(), expected);
    out
}

/// Wrap an encoded body as `magic | body | md5(body)`.
pub fn frame_body(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(FRAMING_OVERHEAD + body.len());
    out.extend_from_slice(&AGGREGATED_RECORD_MAGIC);
    out.extend_from_slice(body);
    out.extend_from_slice(&Md5::digest(body));
    out
}

#[inline]
fn put_bytes_field(out: &mut Vec<u8>, field: u32, bytes: &[u8]) {
    put_varint(out, field_key(field, wire_types::LENGTH_DELIMITED));
    put_varint(out, bytes.len() as u64);
    out.extend_from_slice(bytes);
}
