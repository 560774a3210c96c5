use bytes::Bytes;
use tracing::trace;

use crate::batch::TransportEntry;
use crate::constants::{FRAMING_OVERHEAD, MAX_RECORD_BYTES};
use crate::digest::derive_explicit_hash_key;
use crate::record::key_table::{KeySlot, KeyTable};
use crate::record::types::{AggregationError, UserRecord};
use crate::record::validate::{parse_explicit_hash_key, validate_data, validate_partition_key};
use crate::wire::{encode_body, frame_body, varint_len, InnerRecord};

/// One aggregated record under construction.
///
/// `size_bytes()` always equals the length `to_wire_bytes()` would return,
/// and never exceeds `max_bytes()`.
#[derive(Debug, Clone)]
pub struct Container {
    partition_keys: KeyTable,
    explicit_hash_keys: KeyTable,
    records: Vec<InnerRecord>,
    encoded_body_size: usize,
    // keys of the first record; the transport routes the blob by these
    overall_partition_key: Option<String>,
    overall_explicit_hash_key: Option<String>,
    max_bytes: usize,
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    pub fn new() -> Self {
        Self::with_max_bytes(MAX_RECORD_BYTES)
    }

    /// Container capped at `max_bytes` serialized bytes.
    ///
    /// The cap is clamped to `FRAMING_OVERHEAD + 1..=MAX_RECORD_BYTES`.
    pub fn with_max_bytes(max_bytes: usize) -> Self {
        let max_bytes = max_bytes.clamp(FRAMING_OVERHEAD + 1, MAX_RECORD_BYTES);
        Self {
            partition_keys: KeyTable::new(),
            explicit_hash_keys: KeyTable::new(),
            records: Vec::new(),
            encoded_body_size: 0,
            overall_partition_key: None,
            overall_explicit_hash_key: None,
            max_bytes,
        }
    }

    /// Try to add a record.
    ///
    /// Returns `Ok(true)` when added, `Ok(false)` when the record does not fit
    /// in what remains (the container is left untouched). A missing explicit
    /// hash key is derived from the partition key.
    ///
    /// Errors: invalid input, or a record too large for even an empty container.
    pub fn add_user_record(
        &mut self,
        partition_key: &str,
        explicit_hash_key: Option<&str>,
        data: impl Into<Bytes>,
    ) -> Result<bool, AggregationError> {
        let data = data.into();

        validate_partition_key(partition_key)?;
        let derived;
        let explicit_hash_key = match explicit_hash_key {
            Some(key) => {
                parse_explicit_hash_key(key)?;
                key
            }
            None => {
                derived = derive_explicit_hash_key(partition_key);
                derived.as_str()
            }
        };
        validate_data(&data)?;

        let solo = solo_size(partition_key, Some(explicit_hash_key), data.len());
        if solo > self.max_bytes {
            return Err(AggregationError::CapacityExceeded {
                partition_key: partition_key.to_owned(),
                explicit_hash_key: explicit_hash_key.to_owned(),
                size: solo,
                max: self.max_bytes,
            });
        }

        let pk_slot = self.partition_keys.slot(partition_key);
        let ehk_slot = self.explicit_hash_keys.slot(explicit_hash_key);
        let delta = record_cost(partition_key, pk_slot, explicit_hash_key, ehk_slot, data.len());
        let projected = FRAMING_OVERHEAD + self.encoded_body_size + delta;
        if projected > self.max_bytes {
            trace!(projected, max = self.max_bytes, records = self.records.len(), "container full");
            return Ok(false);
        }

        let (_, partition_key_index) = self.partition_keys.add(partition_key);
        let (_, explicit_hash_key_index) = self.explicit_hash_keys.add(explicit_hash_key);
        self.records.push(InnerRecord {
            partition_key_index,
            explicit_hash_key_index: Some(explicit_hash_key_index),
            data,
        });
        self.encoded_body_size += delta;

        if self.overall_partition_key.is_none() {
            self.overall_partition_key = Some(partition_key.to_owned());
            self.overall_explicit_hash_key = Some(explicit_hash_key.to_owned());
        }
        Ok(true)
    }

    /// `add_user_record` for an owned [`UserRecord`].
    pub fn add(&mut self, record: &UserRecord) -> Result<bool, AggregationError> {
        self.add_user_record(record.partition_key(), record.explicit_hash_key(), record.data().clone())
    }

    #[inline]
    pub fn num_records(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Serialized size: framing plus body, or 0 when empty.
    #[inline]
    pub fn size_bytes(&self) -> usize {
        if self.records.is_empty() {
            0
        } else {
            FRAMING_OVERHEAD + self.encoded_body_size
        }
    }

    #[inline]
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Partition key of the first record, if any.
    #[inline]
    pub fn partition_key(&self) -> Option<&str> {
        self.overall_partition_key.as_deref()
    }

    /// Explicit hash key of the first record (given or derived), if any.
    #[inline]
    pub fn explicit_hash_key(&self) -> Option<&str> {
        self.overall_explicit_hash_key.as_deref()
    }

    pub fn partition_key_table(&self) -> &[String] {
        self.partition_keys.keys()
    }

    pub fn explicit_hash_key_table(&self) -> &[String] {
        self.explicit_hash_keys.keys()
    }

    pub fn records(&self) -> &[InnerRecord] {
        &self.records
    }

    /// Serialize: magic, body, MD5(body). Empty containers yield an empty vector.
    pub fn to_wire_bytes(&self) -> Vec<u8> {
        if self.records.is_empty() {
            return Vec::new();
        }
        let body = encode_body(self.partition_keys.keys(), self.explicit_hash_keys.keys(), &self.records);
        debug_assert_eq!(body.len(), self.encoded_body_size, "incremental size drifted from encoding");
        frame_body(&body)
    }

    /// Records in insertion order, with keys resolved from the tables.
    pub fn user_records(&self) -> impl Iterator<Item = UserRecord> + '_ {
        self.records.iter().filter_map(move |record| {
            let partition_key = self.partition_keys.get(record.partition_key_index)?;
            let data = record.data.clone();
            Some(match record.explicit_hash_key_index.and_then(|i| self.explicit_hash_keys.get(i)) {
                Some(ehk) => UserRecord::with_explicit_hash_key(partition_key, ehk, data),
                None => UserRecord::new(partition_key, data),
            })
        })
    }

    /// Transport entry for this container, or `None` when empty.
    pub fn to_transport_entry(&self) -> Option<TransportEntry> {
        let partition_key = self.overall_partition_key.clone()?;
        Some(TransportEntry {
            partition_key,
            explicit_hash_key: self.overall_explicit_hash_key.clone(),
            data: Bytes::from(self.to_wire_bytes()),
        })
    }

    /// Reset to empty, keeping the configured cap.
    pub fn clear(&mut self) {
        self.partition_keys.clear();
        self.explicit_hash_keys.clear();
        self.records.clear();
        self.encoded_body_size = 0;
        self.overall_partition_key = None;
        self.overall_explicit_hash_key = None;
    }
}

/// Serialized size of a container holding only this record.
pub(crate) fn solo_size(partition_key: &str, explicit_hash_key: Option<&str>, data_len: usize) -> usize {
    let derived;
    let explicit_hash_key = match explicit_hash_key {
        Some(key) => key,
        None => {
            derived = derive_explicit_hash_key(partition_key);
            derived.as_str()
        }
    };
    FRAMING_OVERHEAD + record_cost(partition_key, KeySlot::FRESH, explicit_hash_key, KeySlot::FRESH, data_len)
}

/// Body bytes one record adds given where its keys land.
fn record_cost(
    partition_key: &str,
    pk_slot: KeySlot,
    explicit_hash_key: &str,
    ehk_slot: KeySlot,
    data_len: usize,
) -> usize {
    let mut cost = 0;
    if pk_slot.is_new {
        cost += key_entry_len(partition_key);
    }
    if ehk_slot.is_new {
        cost += key_entry_len(explicit_hash_key);
    }

    let inner = 1 + varint_len(pk_slot.index)
        + 1 + varint_len(ehk_slot.index)
        + 1 + varint_len(data_len as u64) + data_len;
    cost + 1 + varint_len(inner as u64) + inner
}

#[inline]
fn key_entry_len(key: &str) -> usize {
    1 + varint_len(key.len() as u64) + key.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::encoded_body_len;

    #[test]
    fn empty_container_has_zero_size() {
        let c = Container::new();
        assert_eq!(c.size_bytes(), 0);
        assert!(c.to_wire_bytes().is_empty());
        assert!(c.partition_key().is_none());
        assert!(c.to_transport_entry().is_none());
    }

    #[test]
    fn incremental_size_matches_recount() {
        let mut c = Container::new();
        for i in 0..200u32 {
            let pk = format!("pk-{}", i % 7);
            let data = vec![i as u8; (i as usize * 13) % 300];
            assert!(c.add_user_record(&pk, None, data).unwrap());
            let recount = encoded_body_len(c.partition_key_table(), c.explicit_hash_key_table(), c.records());
            assert_eq!(c.size_bytes(), FRAMING_OVERHEAD + recount);
        }
        assert_eq!(c.to_wire_bytes().len(), c.size_bytes());
    }

    #[test]
    fn first_record_sets_overall_keys() {
        let mut c = Container::new();
        c.add_user_record("first", Some("42"), &b"a"[..]).unwrap();
        c.add_user_record("second", None, &b"b"[..]).unwrap();
        assert_eq!(c.partition_key(), Some("first"));
        assert_eq!(c.explicit_hash_key(), Some("42"));
    }

    #[test]
    fn full_container_is_left_untouched() {
        let mut c = Container::with_max_bytes(64);
        assert!(c.add_user_record("k", Some("1"), vec![0u8; 20]).unwrap());
        let before = c.size_bytes();
        assert!(!c.add_user_record("k", Some("1"), vec![0u8; 20]).unwrap());
        assert_eq!(c.size_bytes(), before);
        assert_eq!(c.num_records(), 1);
    }

    #[test]
    fn oversized_for_cap_is_capacity_error() {
        let mut c = Container::with_max_bytes(64);
        let err = c.add_user_record("k", Some("1"), vec![0u8; 64]).unwrap_err();
        assert!(matches!(err, AggregationError::CapacityExceeded { max: 64, .. }));
        assert!(c.is_empty());
    }

    #[test]
    fn clear_keeps_cap() {
        let mut c = Container::with_max_bytes(4096);
        c.add_user_record("k", None, &b"data"[..]).unwrap();
        c.clear();
        assert!(c.is_empty());
        assert_eq!(c.size_bytes(), 0);
        assert_eq!(c.max_bytes(), 4096);
        assert!(c.partition_key_table().is_empty());
    }

    #[test]
    fn user_records_resolve_keys() {
        let mut c = Container::new();
        c.add_user_record("a", Some("7"), &b"1"[..]).unwrap();
        c.add_user_record("b", None, &b"2"[..]).unwrap();
        let out: Vec<UserRecord> = c.user_records().collect();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].partition_key(), "a");
        assert_eq!(out[0].explicit_hash_key(), Some("7"));
        assert_eq!(out[1].explicit_hash_key(), Some(derive_explicit_hash_key("b").as_str()));
        assert_eq!(&out[1].data()[..], b"2");
    }
}
