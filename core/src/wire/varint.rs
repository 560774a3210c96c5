//! Base-128 varints: 7 value bits per byte, high bit set on every byte but the last.

use crate::wire::types::WireError;

/// Longest encoding of a `u64`.
pub const MAX_VARINT_LEN: usize = 10;

/// Number of bytes `value` occupies as a varint.
///
/// `0` takes one byte; otherwise `ceil(bit_length / 7)`. Unsigned by type, so
/// the negative-input case cannot arise.
#[inline]
pub const fn varint_len(value: u64) -> usize {
    if value == 0 {
        return 1;
    }
    let bits = (u64::BITS - value.leading_zeros()) as usize;
    (bits + 6) / 7
}

#[inline]
pub fn put_varint(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

/// Read one varint at `*pos`, advancing the cursor past it.
#[inline]
pub fn read_varint(buf: &[u8], pos: &mut usize) -> Result<u64, WireError> {
    let mut value = 0u64;
    for i in 0..MAX_VARINT_LEN {
        let byte = *buf.get(*pos).ok_or(WireError::Truncated)?;
        *pos += 1;

        // The tenth byte may only carry the single remaining bit.
        if i == MAX_VARINT_LEN - 1 && byte > 0x01 {
            return Err(WireError::VarintOverflow);
        }

        value |= u64::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(WireError::VarintOverflow)
}

/// Field key (`field_number << 3 | wire_type`) as written before every field.
#[inline]
pub const fn field_key(field: u32, wire_type: u8) -> u64 {
    ((field as u64) << 3) | wire_type as u64
}
