//! Merkle root computation over transaction IDs.

use crate::hash::double_sha256;

/// Compute the merkle root of `txids` (internal byte order).
///
/// A single txid is its own root. Otherwise adjacent hashes are paired left
/// to right, the last one duplicated on odd levels, until one remains.
/// Returns `None` for an empty list.
pub fn compute_merkle_root(txids: &[[u8; 32]]) -> Option<[u8; 32]> {
    let mut current_level: Vec<[u8; 32]> = match txids {
        [] => return None,
        [single] => return Some(*single),
        _ => txids.to_vec(),
    };

    while current_level.len() > 1 {
        current_level = current_level
            .chunks(2)
            .map(|pair| {
                // If odd number of elements, duplicate the last one
                let left = &pair[0];
                let right = pair.get(1).unwrap_or(left);
                hash_pair(left, right)
            })
            .collect();
    }

    current_level.first().copied()
}

fn hash_pair(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut combined = [0u8; 64];
    combined[..32].copy_from_slice(left);
    combined[32..].copy_from_slice(right);
    double_sha256(&combined)
}
