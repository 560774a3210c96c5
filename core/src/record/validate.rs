//! Input checks shared by `UserRecord` and `Container`.

use crate::constants::{MAX_USER_DATA_BYTES, PARTITION_KEY_MAX_LEN, PARTITION_KEY_MIN_LEN};
use crate::record::types::ValidationError;

pub fn validate_partition_key(partition_key: &str) -> Result<(), ValidationError> {
    let len = partition_key.len();
    if !(PARTITION_KEY_MIN_LEN..=PARTITION_KEY_MAX_LEN).contains(&len) {
        return Err(ValidationError::PartitionKeyLength {
            len,
            min: PARTITION_KEY_MIN_LEN,
            max: PARTITION_KEY_MAX_LEN,
        });
    }
    Ok(())
}

pub fn validate_partition_key_bytes(raw: &[u8]) -> Result<&str, ValidationError> {
    let partition_key = std::str::from_utf8(raw).map_err(|_| ValidationError::PartitionKeyEncoding)?;
    validate_partition_key(partition_key)?;
    Ok(partition_key)
}

/// Parse an explicit hash key: ASCII digits only, value within `u128`.
pub fn parse_explicit_hash_key(explicit_hash_key: &str) -> Result<u128, ValidationError> {
    if explicit_hash_key.is_empty() || !explicit_hash_key.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::ExplicitHashKeyFormat(explicit_hash_key.to_owned()));
    }
    // only digits remain, so the sole failure mode is overflow
    explicit_hash_key
        .parse::<u128>()
        .map_err(|_| ValidationError::ExplicitHashKeyRange(explicit_hash_key.to_owned()))
}

pub fn validate_data(data: &[u8]) -> Result<(), ValidationError> {
    if data.len() > MAX_USER_DATA_BYTES {
        return Err(ValidationError::DataTooLarge {
            len: data.len(),
            max: MAX_USER_DATA_BYTES,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_key_bounds_are_in_bytes() {
        assert!(validate_partition_key("a").is_ok());
        assert!(validate_partition_key(&"a".repeat(256)).is_ok());
        assert!(validate_partition_key("").is_err());
        assert!(validate_partition_key(&"a".repeat(257)).is_err());

        // 86 three-byte chars = 258 bytes
        let wide = "\u{20AC}".repeat(86);
        assert!(matches!(
            validate_partition_key(&wide),
            Err(ValidationError::PartitionKeyLength { len: 258, .. })
        ));
    }

    #[test]
    fn invalid_utf8_partition_key_is_rejected() {
        assert_eq!(
            validate_partition_key_bytes(&[0xC3, 0x28]),
            Err(ValidationError::PartitionKeyEncoding)
        );
        assert_eq!(validate_partition_key_bytes(b"ok"), Ok("ok"));
    }

    #[test]
    fn explicit_hash_key_limits() {
        assert_eq!(parse_explicit_hash_key("0"), Ok(0));
        assert_eq!(parse_explicit_hash_key(&u128::MAX.to_string()), Ok(u128::MAX));
        assert_eq!(parse_explicit_hash_key("007"), Ok(7));

        // 2^128
        assert!(matches!(
            parse_explicit_hash_key("340282366920938463463374607431768211456"),
            Err(ValidationError::ExplicitHashKeyRange(_))
        ));
        for bad in ["", "-1", "+1", "12a", " 1", "1.0"] {
            assert!(
                matches!(parse_explicit_hash_key(bad), Err(ValidationError::ExplicitHashKeyFormat(_))),
                "{:?}",
                bad
            );
        }
    }

    #[test]
    fn data_limit_leaves_room_for_framing() {
        assert!(validate_data(&vec![0u8; MAX_USER_DATA_BYTES]).is_ok());
        assert!(validate_data(&vec![0u8; MAX_USER_DATA_BYTES + 1]).is_err());
    }
}
