//! Protocol constants and assembly defaults.

/// Block version written into assembled headers unless configured otherwise.
pub const DEFAULT_BLOCK_VERSION: i32 = 4;

/// Size of a block header in bytes.
pub const BLOCK_HEADER_SIZE: usize = 80;

/// Size of a block header without its trailing nonce.
pub const HEADER_TEMPLATE_SIZE: usize = 76;

/// Previous block hash (display order) used when no chain tip is supplied.
pub const PLACEHOLDER_PREV_BLOCK_HASH: &str =
    "00000000000000000397532e06a7601fb7a0d82e93a644c65d4b1ba011931dca";

/// Default proof-of-work target, big-endian hex.
pub const DEFAULT_TARGET_HEX: &str =
    "0000ffff00000000000000000000000000000000000000000000000000000000";

/// Sighash type appended to legacy signature-hash preimages (little-endian u32).
pub const SIGHASH_ALL: u32 = 0x0000_0001;

/// Outputs below this value (satoshis) are rejected by the default policy.
pub const DUST_THRESHOLD: u64 = 546;

/// Nonces between two progress log lines during the search.
pub const PROGRESS_INTERVAL: u32 = 1 << 20;
