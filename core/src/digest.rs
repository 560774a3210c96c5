//! MD5 helpers: body checksums and explicit-hash-key derivation.
//!
//! MD5 is used here as a routing hash and an integrity check against
//! accidental corruption, not as a security primitive.

use md5::{Digest, Md5};

use crate::constants::DIGEST_LEN;

/// MD5 of `data`.
#[inline]
pub fn md5_digest(data: &[u8]) -> [u8; DIGEST_LEN] {
    let mut out = [0u8; DIGEST_LEN];
    out.copy_from_slice(&Md5::digest(data));
    out
}

/// Whether `expected` is the MD5 of `body`.
#[inline]
pub fn verify_digest(body: &[u8], expected: &[u8]) -> bool {
    expected.len() == DIGEST_LEN && md5_digest(body)[..] == *expected
}

/// Derive the explicit hash key for a partition key.
///
/// The 16 MD5 bytes of the UTF-8 partition key are read as a big-endian
/// unsigned 128-bit integer and rendered in base 10.
pub fn derive_explicit_hash_key(partition_key: &str) -> String {
    u128::from_be_bytes(md5_digest(partition_key.as_bytes())).to_string()
}
