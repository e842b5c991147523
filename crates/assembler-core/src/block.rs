//! Block header construction and serialization.

use crate::constants::{BLOCK_HEADER_SIZE, HEADER_TEMPLATE_SIZE};
use crate::difficulty::{bits_to_target, Target};
use crate::error::TransactionError;
use crate::hash::{double_sha256, hash_from_display_hex, hash_to_display_hex};

/// A Bitcoin block header (80 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub version: i32,
    /// Hash of the previous block (internal byte order).
    pub prev_block_hash: [u8; 32],
    /// Merkle root of all transactions (internal byte order).
    pub merkle_root: [u8; 32],
    /// Block timestamp (Unix time).
    pub timestamp: u32,
    /// Difficulty target in compact "bits" format.
    pub bits: u32,
    pub nonce: u32,
}

impl BlockHeader {
    /// Create a new block header with a zero nonce.
    pub fn new(
        version: i32,
        prev_block_hash: [u8; 32],
        merkle_root: [u8; 32],
        timestamp: u32,
        bits: u32,
    ) -> Self {
        BlockHeader {
            version,
            prev_block_hash,
            merkle_root,
            timestamp,
            bits,
            nonce: 0,
        }
    }

    /// Create a header from display-order (explorer) hashes.
    pub fn from_display_hex(
        version: i32,
        prev_block_hash_hex: &str,
        merkle_root_hex: &str,
        timestamp: u32,
        bits: u32,
    ) -> Result<Self, TransactionError> {
        Ok(BlockHeader::new(
            version,
            hash_from_display_hex("prev_block_hash", prev_block_hash_hex)?,
            hash_from_display_hex("merkle_root", merkle_root_hex)?,
            timestamp,
            bits,
        ))
    }

    /// Serialize the block header to 80 bytes.
    pub fn serialize(&self) -> [u8; BLOCK_HEADER_SIZE] {
        let mut header = [0u8; BLOCK_HEADER_SIZE];
        header[..HEADER_TEMPLATE_SIZE].copy_from_slice(&self.serialize_without_nonce());
        header[76..80].copy_from_slice(&self.nonce.to_le_bytes());
        header
    }

    /// Serialize the header without the nonce (76 bytes).
    /// Used for mining where only the nonce changes.
    pub fn serialize_without_nonce(&self) -> [u8; HEADER_TEMPLATE_SIZE] {
        let mut header = [0u8; HEADER_TEMPLATE_SIZE];

        header[0..4].copy_from_slice(&self.version.to_le_bytes());
        header[4..36].copy_from_slice(&self.prev_block_hash);
        header[36..68].copy_from_slice(&self.merkle_root);
        header[68..72].copy_from_slice(&self.timestamp.to_le_bytes());
        header[72..76].copy_from_slice(&self.bits.to_le_bytes());

        header
    }

    /// Compute the block hash (double SHA256, internal byte order).
    pub fn hash(&self) -> [u8; 32] {
        double_sha256(&self.serialize())
    }

    /// Block hash as shown by explorers.
    pub fn hash_display(&self) -> String {
        hash_to_display_hex(&self.hash())
    }

    /// The target encoded in `bits`.
    pub fn target(&self) -> Target {
        bits_to_target(self.bits)
    }

    /// Whether this header's hash is below its own encoded target.
    pub fn meets_target(&self) -> bool {
        self.target().is_met_by(&self.hash())
    }

    /// Copy of this header with a different nonce.
    pub fn with_nonce(mut self, nonce: u32) -> Self {
        self.nonce = nonce;
        self
    }
}

/// Get the current Unix timestamp.
pub fn current_timestamp() -> u32 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    fn genesis() -> BlockHeader {
        BlockHeader::from_display_hex(
            1,
            "0000000000000000000000000000000000000000000000000000000000000000",
            "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b",
            1231006505,
            0x1d00ffff,
        )
        .unwrap()
        .with_nonce(2083236893)
    }

    #[test]
    fn test_block_header_serialization() {
        let prev_hash = [0x12u8; 32];
        let merkle_root = [0x34u8; 32];

        let header = BlockHeader::new(4, prev_hash, merkle_root, 1700000000, 0x17034219)
            .with_nonce(0xDEADBEEF);
        let serialized = header.serialize();

        assert_eq!(serialized.len(), 80);
        assert_eq!(&serialized[0..4], &[0x04, 0x00, 0x00, 0x00]);
        assert_eq!(&serialized[4..36], &prev_hash[..]);
        assert_eq!(&serialized[36..68], &merkle_root[..]);
        assert_eq!(&serialized[68..72], &1700000000u32.to_le_bytes());
        assert_eq!(&serialized[72..76], &[0x19, 0x42, 0x03, 0x17]);
        // Nonce (0xDEADBEEF in little-endian)
        assert_eq!(&serialized[76..80], &[0xEF, 0xBE, 0xAD, 0xDE]);

        assert_eq!(&serialized[..76], &header.serialize_without_nonce()[..]);
    }

    #[test]
    fn test_genesis_header() {
        let header = genesis();
        let expected = hex!(
            "0100000000000000000000000000000000000000000000000000000000000000"
            "000000003ba3edfd7a7b12b27ac72c3e67768f617fc81bc3888a51323a9fb8aa"
            "4b1e5e4a29ab5f49ffff001d1dac2b7c"
        );

        assert_eq!(header.serialize(), expected);
        assert_eq!(
            header.hash_display(),
            "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f"
        );
        assert!(header.meets_target());
        assert!(!header.with_nonce(0).meets_target());
    }

    #[test]
    fn test_negative_version_encoding() {
        let header = BlockHeader::new(-1, [0; 32], [0; 32], 0, 0);
        assert_eq!(&header.serialize()[0..4], &[0xff, 0xff, 0xff, 0xff]);
    }

    #[test]
    fn test_from_display_hex_rejects_bad_hash() {
        assert!(matches!(
            BlockHeader::from_display_hex(1, "00", &"00".repeat(32), 0, 0),
            Err(TransactionError::InvalidLength { field: "prev_block_hash", .. })
        ));
    }
}
