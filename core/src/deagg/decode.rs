use std::iter::FusedIterator;

use tracing::{trace, warn};

use crate::deagg::types::{DeaggregatedRecord, DeaggregationError, Envelope};
use crate::digest::md5_digest;
use crate::telemetry::DeaggregatorCounters;
use crate::wire::{decode_body, split_framed, AggregatedView};

/// Decode one envelope into its user records.
///
/// The checksum and body are validated up front; records are materialized
/// lazily as the iterator advances. Payloads share the envelope's buffer.
/// Calling again restarts from the first record.
///
/// Envelopes without the magic prefix, or too short to carry a digest, yield
/// exactly one record wrapping the payload unchanged.
pub fn decode(envelope: &Envelope) -> Result<Records<'_>, DeaggregationError> {
    let framed = match split_framed(&envelope.data) {
        Some(framed) => framed,
        None => {
            trace!(sequence_number = %envelope.sequence_number, len = envelope.data.len(), "passthrough record");
            return Ok(Records { envelope, state: State::Passthrough { done: false } });
        }
    };

    let computed = md5_digest(framed.body);
    if computed[..] != *framed.digest {
        warn!(sequence_number = %envelope.sequence_number, "aggregated record checksum mismatch");
        return Err(DeaggregationError::ChecksumMismatch {
            sequence_number: envelope.sequence_number.clone(),
            expected: hex::encode(framed.digest),
            actual: hex::encode(computed),
        });
    }

    let view = decode_body(framed.body).map_err(|source| DeaggregationError::Decode {
        sequence_number: envelope.sequence_number.clone(),
        source,
    })?;

    Ok(Records { envelope, state: State::Aggregated { view, next: 0 } })
}

/// Lazy records of one envelope, in sub-sequence order.
#[derive(Debug, Clone)]
pub struct Records<'a> {
    envelope: &'a Envelope,
    state: State<'a>,
}

#[derive(Debug, Clone)]
enum State<'a> {
    Passthrough { done: bool },
    Aggregated { view: AggregatedView<'a>, next: usize },
}

impl Records<'_> {
    /// Whether the envelope held an aggregated record.
    pub fn is_aggregated(&self) -> bool {
        matches!(self.state, State::Aggregated { .. })
    }
}

impl Iterator for Records<'_> {
    type Item = DeaggregatedRecord;

    fn next(&mut self) -> Option<Self::Item> {
        let envelope = self.envelope;
        match &mut self.state {
            State::Passthrough { done } => {
                if *done {
                    return None;
                }
                *done = true;
                Some(DeaggregatedRecord {
                    partition_key: envelope.partition_key.clone(),
                    explicit_hash_key: envelope.explicit_hash_key.clone(),
                    data: envelope.data.clone(),
                    sequence_number: envelope.sequence_number.clone(),
                    sub_sequence_number: None,
                    approximate_arrival_timestamp: envelope.approximate_arrival_timestamp,
                })
            }
            State::Aggregated { view, next } => {
                let record = view.records().get(*next)?;
                let sub_sequence_number = *next as u64;
                *next += 1;
                // indices were checked by decode_body
                let partition_key = view.partition_key(record)?;
                Some(DeaggregatedRecord {
                    partition_key: partition_key.to_owned(),
                    explicit_hash_key: view.explicit_hash_key(record).map(str::to_owned),
                    data: envelope.data.slice_ref(record.data),
                    sequence_number: envelope.sequence_number.clone(),
                    sub_sequence_number: Some(sub_sequence_number),
                    approximate_arrival_timestamp: envelope.approximate_arrival_timestamp,
                })
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = match &self.state {
            State::Passthrough { done } => usize::from(!*done),
            State::Aggregated { view, next } => view.records().len() - *next,
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Records<'_> {}
impl FusedIterator for Records<'_> {}

/// Decode many envelopes, flattened in envelope order then sub-sequence order.
///
/// A bad envelope yields a single `Err` item in its place; decoding continues
/// with the next envelope.
pub fn decode_all<'a, I>(envelopes: I) -> impl Iterator<Item = Result<DeaggregatedRecord, DeaggregationError>> + 'a
where
    I: IntoIterator<Item = &'a Envelope>,
    I::IntoIter: 'a,
{
    envelopes.into_iter().flat_map(|envelope| {
        let items: Box<dyn Iterator<Item = Result<DeaggregatedRecord, DeaggregationError>> + 'a> =
            match decode(envelope) {
                Ok(records) => Box::new(records.map(Ok)),
                Err(e) => Box::new(std::iter::once(Err(e))),
            };
        items
    })
}

/// Decode every envelope, failing on the first bad one.
pub fn deaggregate<'a, I>(envelopes: I) -> Result<Vec<DeaggregatedRecord>, DeaggregationError>
where
    I: IntoIterator<Item = &'a Envelope>,
{
    let mut out = Vec::new();
    for envelope in envelopes {
        out.extend(decode(envelope)?);
    }
    Ok(out)
}

/// Decoder that keeps counters across calls.
#[derive(Debug, Default, Clone)]
pub struct Deaggregator {
    counters: DeaggregatorCounters,
}

impl Deaggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// `decode`, collected, with the outcome counted.
    pub fn decode(&mut self, envelope: &Envelope) -> Result<Vec<DeaggregatedRecord>, DeaggregationError> {
        let len = envelope.data.len();
        match decode(envelope) {
            Ok(records) => {
                let aggregated = records.is_aggregated();
                let out: Vec<_> = records.collect();
                if aggregated {
                    self.counters.add_aggregated(len, out.len());
                } else {
                    self.counters.add_passthrough(len);
                }
                Ok(out)
            }
            Err(e) => {
                match &e {
                    DeaggregationError::ChecksumMismatch { .. } => self.counters.add_checksum_failure(len),
                    DeaggregationError::Decode { .. } => self.counters.add_decode_failure(len),
                }
                Err(e)
            }
        }
    }

    pub fn counters(&self) -> &DeaggregatorCounters {
        &self.counters
    }

    pub fn reset_counters(&mut self) {
        self.counters = DeaggregatorCounters::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::AGGREGATED_RECORD_MAGIC;
    use crate::record::Container;
    use chrono::{TimeZone, Utc};

    fn envelope(data: Vec<u8>) -> Envelope {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        Envelope::new("outer", "49590338271490256608559692538361571095921575989136588898", ts, data)
    }

    #[test]
    fn plain_payload_passes_through() {
        let env = envelope(b"not aggregated".to_vec());
        let records: Vec<_> = decode(&env).unwrap().collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].partition_key, "outer");
        assert_eq!(&records[0].data[..], b"not aggregated");
        assert_eq!(records[0].sub_sequence_number, None);
    }

    #[test]
    fn short_magic_blob_passes_through() {
        let mut data = AGGREGATED_RECORD_MAGIC.to_vec();
        data.extend_from_slice(&[0u8; 16]);
        let env = envelope(data.clone());
        let records: Vec<_> = decode(&env).unwrap().collect();
        assert_eq!(records.len(), 1);
        assert_eq!(&records[0].data[..], &data[..]);
    }

    #[test]
    fn aggregated_records_share_envelope_buffer() {
        let mut c = Container::new();
        c.add_user_record("a", None, &b"first"[..]).unwrap();
        c.add_user_record("b", Some("5"), &b"second"[..]).unwrap();
        let env = envelope(c.to_wire_bytes());

        let records = decode(&env).unwrap();
        assert_eq!(records.len(), 2);
        let records: Vec<_> = records.collect();
        assert_eq!(records[1].partition_key, "b");
        assert_eq!(records[1].explicit_hash_key.as_deref(), Some("5"));
        assert_eq!(records[1].sub_sequence_number, Some(1));

        let base = env.data.as_ptr() as usize;
        let ptr = records[0].data.as_ptr() as usize;
        assert!(ptr > base && ptr < base + env.data.len());
    }

    #[test]
    fn corrupted_digest_is_an_error() {
        let mut c = Container::new();
        c.add_user_record("a", None, &b"payload"[..]).unwrap();
        let mut wire = c.to_wire_bytes();
        let last = wire.len() - 1;
        wire[last] ^= 0xFF;

        let mut d = Deaggregator::new();
        assert!(matches!(d.decode(&envelope(wire)), Err(DeaggregationError::ChecksumMismatch { .. })));
        assert_eq!(d.counters().checksum_failures, 1);
    }
}
