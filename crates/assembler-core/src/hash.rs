//! SHA256 double-hashing and byte-order helpers.

use sha2::{Digest, Sha256};

use crate::error::TransactionError;

/// Bitcoin's double SHA256: SHA256(SHA256(data)).
///
/// This is used for block header hashing, transaction IDs, signature hashes
/// and merkle trees.
#[inline]
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(&first);
    let mut result = [0u8; 32];
    result.copy_from_slice(&second);
    result
}

/// Reverse the byte order of a 32-byte array.
///
/// Bitcoin displays hashes in reverse byte order relative to how they are
/// hashed and serialized.
#[inline]
pub fn reverse_bytes(bytes: &[u8; 32]) -> [u8; 32] {
    let mut reversed = *bytes;
    reversed.reverse();
    reversed
}

/// Convert a hash to its display format (reversed hex).
pub fn hash_to_display_hex(hash: &[u8; 32]) -> String {
    hex::encode(reverse_bytes(hash))
}

/// Parse a display-order hex hash (as shown by explorers) into internal byte order.
pub fn hash_from_display_hex(
    field: &'static str,
    display_hex: &str,
) -> Result<[u8; 32], TransactionError> {
    let bytes = hex::decode(display_hex)
        .map_err(|source| TransactionError::InvalidHex { field, source })?;

    let mut hash: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| TransactionError::InvalidLength {
            field,
            expected: 32,
            actual: bytes.len(),
        })?;
    hash.reverse();
    Ok(hash)
}

/// Count leading zero bits in the DISPLAYED hash format.
///
/// The "leading zeros" you see in a block hash like "0000f433..." are the
/// TRAILING bytes of the internal representation, so this counts from the end.
pub fn count_leading_zeros(hash: &[u8; 32]) -> u32 {
    let mut zeros = 0u32;
    for byte in hash.iter().rev() {
        if *byte == 0 {
            zeros += 8;
        } else {
            zeros += byte.leading_zeros();
            break;
        }
    }
    zeros
}
