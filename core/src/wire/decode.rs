use crate::constants::{fields, wire_types, AGGREGATED_RECORD_MAGIC, DIGEST_LEN, FRAMING_OVERHEAD};
use crate::wire::types::{AggregatedView, InnerRecordView, WireError};
use crate::wire::varint::read_varint;

/// A magic-prefixed blob split into its body and trailing digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramedView<'a> {
    pub body: &'a [u8],
    pub digest: &'a [u8],
}

/// Split `wire` into body and digest if it carries the aggregated framing.
///
/// Returns `None` when the magic prefix is missing or the blob is too short to
/// hold a digest after the magic; such blobs are not aggregated records.
#[inline]
pub fn split_framed(wire: &[u8]) -> Option<FramedView<'_>> {
    if wire.len() <= FRAMING_OVERHEAD || wire[..AGGREGATED_RECORD_MAGIC.len()] != AGGREGATED_RECORD_MAGIC {
        return None;
    }
    let digest_start = wire.len() - DIGEST_LEN;
    Some(FramedView {
        body: &wire[AGGREGATED_RECORD_MAGIC.len()..digest_start],
        digest: &wire[digest_start..],
    })
}

/// Decode an aggregated body into borrowed key tables and records.
///
/// Fields may appear in any order; unknown fields are skipped by wire type.
/// Every record index is checked against its table before returning.
pub fn decode_body(body: &[u8]) -> Result<AggregatedView<'_>, WireError> {
    let mut view = AggregatedView::new();
    let mut pos = 0usize;

    while pos < body.len() {
        let (field, wire_type) = read_key(body, &mut pos)?;
        match field {
            fields::PARTITION_KEY_TABLE => {
                expect_wire_type("partition_key_table", wire_types::LENGTH_DELIMITED, wire_type)?;
                let raw = read_length_delimited(body, &mut pos)?;
                view.partition_keys.push(to_str(raw, "partition_key_table")?);
            }
            fields::EXPLICIT_HASH_KEY_TABLE => {
                expect_wire_type("explicit_hash_key_table", wire_types::LENGTH_DELIMITED, wire_type)?;
                let raw = read_length_delimited(body, &mut pos)?;
                view.explicit_hash_keys.push(to_str(raw, "explicit_hash_key_table")?);
            }
            fields::RECORDS => {
                expect_wire_type("records", wire_types::LENGTH_DELIMITED, wire_type)?;
                let raw = read_length_delimited(body, &mut pos)?;
                view.records.push(decode_inner_record(raw)?);
            }
            _ => skip_field(body, &mut pos, wire_type)?,
        }
    }

    for record in &view.records {
        check_index("partition_key", record.partition_key_index, view.partition_keys.len())?;
        if let Some(ehk) = record.explicit_hash_key_index {
            check_index("explicit_hash_key", ehk, view.explicit_hash_keys.len())?;
        }
    }

    Ok(view)
}

fn decode_inner_record(buf: &[u8]) -> Result<InnerRecordView<'_>, WireError> {
    let mut partition_key_index = None;
    let mut explicit_hash_key_index = None;
    let mut data = None;
    let mut pos = 0usize;

    while pos < buf.len() {
        let (field, wire_type) = read_key(buf, &mut pos)?;
        match field {
            fields::PARTITION_KEY_INDEX => {
                expect_wire_type("partition_key_index", wire_types::VARINT, wire_type)?;
                partition_key_index = Some(read_varint(buf, &mut pos)?);
            }
            fields::EXPLICIT_HASH_KEY_INDEX => {
                expect_wire_type("explicit_hash_key_index", wire_types::VARINT, wire_type)?;
                explicit_hash_key_index = Some(read_varint(buf, &mut pos)?);
            }
            fields::DATA => {
                expect_wire_type("data", wire_types::LENGTH_DELIMITED, wire_type)?;
                data = Some(read_length_delimited(buf, &mut pos)?);
            }
            // tags and anything newer
            _ => skip_field(buf, &mut pos, wire_type)?,
        }
    }

    Ok(InnerRecordView {
        partition_key_index: partition_key_index.ok_or(WireError::MissingField("partition_key_index"))?,
        explicit_hash_key_index,
        data: data.ok_or(WireError::MissingField("data"))?,
    })
}

#[inline]
fn read_key(buf: &[u8], pos: &mut usize) -> Result<(u32, u8), WireError> {
    let key = read_varint(buf, pos)?;
    let field = u32::try_from(key >> 3).map_err(|_| WireError::VarintOverflow)?;
    Ok((field, (key & 0x07) as u8))
}

#[inline]
fn read_length_delimited<'a>(buf: &'a [u8], pos: &mut usize) -> Result<&'a [u8], WireError> {
    let len = read_varint(buf, pos)?;
    let len = usize::try_from(len).map_err(|_| WireError::Truncated)?;
    let end = pos.checked_add(len).ok_or(WireError::Truncated)?;
    if end > buf.len() {
        return Err(WireError::Truncated);
    }
    let out = &buf[*pos..end];
    *pos = end;
    Ok(out)
}

fn skip_field(buf: &[u8], pos: &mut usize, wire_type: u8) -> Result<(), WireError> {
    match wire_type {
        wire_types::VARINT => {
            read_varint(buf, pos)?;
        }
        wire_types::FIXED64 => advance(buf, pos, 8)?,
        wire_types::LENGTH_DELIMITED => {
            read_length_delimited(buf, pos)?;
        }
        wire_types::FIXED32 => advance(buf, pos, 4)?,
        // groups are deprecated and never produced by aggregators
        wire_types::START_GROUP | wire_types::END_GROUP => {
            return Err(WireError::UnsupportedWireType(wire_type))
        }
        other => return Err(WireError::UnsupportedWireType(other)),
    }
    Ok(())
}

#[inline]
fn advance(buf: &[u8], pos: &mut usize, n: usize) -> Result<(), WireError> {
    if buf.len() - *pos < n {
        return Err(WireError::Truncated);
    }
    *pos += n;
    Ok(())
}

#[inline]
fn expect_wire_type(field: &'static str, expected: u8, actual: u8) -> Result<(), WireError> {
    if expected != actual {
        return Err(WireError::InvalidWireType { field, expected, actual });
    }
    Ok(())
}

#[inline]
fn to_str<'a>(raw: &'a [u8], field: &'static str) -> Result<&'a str, WireError> {
    std::str::from_utf8(raw).map_err(|_| WireError::InvalidUtf8 { field })
}

#[inline]
fn check_index(table: &'static str, index: u64, len: usize) -> Result<(), WireError> {
    if index >= len as u64 {
        return Err(WireError::IndexOutOfRange { table, index, len });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_fields_are_skipped() {
        let body = [
            0x0A, 0x01, b'a', // pk table
            0x20, 0x05, // field 4 varint (unknown)
            0x1A, 0x0A, // record, 10 bytes
            0x08, 0x00, //
            0x22, 0x02, 0x0A, 0x00, // field 4 length-delimited (tag message)
            0x1A, 0x02, b'x', b'y', //
        ];
        let view = decode_body(&body).unwrap();
        assert_eq!(view.partition_keys, vec!["a"]);
        assert!(view.explicit_hash_keys.is_empty());
        assert_eq!(view.records.len(), 1);
        assert_eq!(view.records[0].data, b"xy");
        assert_eq!(view.records[0].explicit_hash_key_index, None);
    }

    #[test]
    fn missing_data_is_rejected() {
        let body = [0x0A, 0x01, b'a', 0x1A, 0x02, 0x08, 0x00];
        assert_eq!(decode_body(&body), Err(WireError::MissingField("data")));
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let body = [0x0A, 0x01, b'a', 0x1A, 0x04, 0x08, 0x01, 0x1A, 0x00];
        assert!(matches!(
            decode_body(&body),
            Err(WireError::IndexOutOfRange { table: "partition_key", index: 1, len: 1 })
        ));
    }

    #[test]
    fn wrong_wire_type_is_rejected() {
        let body = [0x08, 0x01];
        assert!(matches!(
            decode_body(&body),
            Err(WireError::InvalidWireType { field: "partition_key_table", .. })
        ));
    }

    #[test]
    fn length_past_end_is_truncated() {
        let body = [0x0A, 0x05, b'a'];
        assert_eq!(decode_body(&body), Err(WireError::Truncated));
    }

    #[test]
    fn split_requires_magic_and_room_for_digest() {
        assert!(split_framed(b"").is_none());
        assert!(split_framed(&AGGREGATED_RECORD_MAGIC).is_none());

        let mut exact = AGGREGATED_RECORD_MAGIC.to_vec();
        exact.extend_from_slice(&[0u8; DIGEST_LEN]);
        assert!(split_framed(&exact).is_none());

        exact.insert(4, 0xAA);
        let framed = split_framed(&exact).unwrap();
        assert_eq!(framed.body, &[0xAA]);
        assert_eq!(framed.digest.len(), DIGEST_LEN);
    }
}
