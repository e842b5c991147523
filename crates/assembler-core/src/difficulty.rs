//! Proof-of-work targets and their compact "bits" encoding.

use core::cmp::Ordering;
use core::fmt;

use crate::error::{EncodingError, MiningError};

/// Sign bit of the compact mantissa.
const COMPACT_SIGN_BIT: u32 = 0x0080_0000;
const COMPACT_MANTISSA_MASK: u32 = 0x007f_ffff;

/// A 256-bit unsigned proof-of-work target.
///
/// Stored as four u64 limbs, least significant first, and ordered numerically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Target([u64; 4]);

impl Target {
    pub const ZERO: Target = Target([0; 4]);
    pub const MAX: Target = Target([u64::MAX; 4]);

    /// Parse a 64-hex-character big-endian target.
    pub fn from_hex(target_hex: &str) -> Result<Self, MiningError> {
        if target_hex.len() != 64 {
            return Err(MiningError::InvalidTarget(format!(
                "expected 64 hex characters, got {}",
                target_hex.len()
            )));
        }

        let mut bytes = [0u8; 32];
        hex::decode_to_slice(target_hex, &mut bytes)
            .map_err(|e| MiningError::InvalidTarget(e.to_string()))?;

        let target = Target::from_be_bytes(bytes);
        if target.is_zero() {
            return Err(MiningError::InvalidTarget("target is zero".to_string()));
        }
        Ok(target)
    }

    pub fn from_be_bytes(bytes: [u8; 32]) -> Self {
        let mut limbs = [0u64; 4];
        for (i, chunk) in bytes.chunks_exact(8).enumerate() {
            let mut word = [0u8; 8];
            word.copy_from_slice(chunk);
            limbs[3 - i] = u64::from_be_bytes(word);
        }
        Target(limbs)
    }

    pub fn to_be_bytes(&self) -> [u8; 32] {
        let mut bytes = [0u8; 32];
        for (i, chunk) in bytes.chunks_exact_mut(8).enumerate() {
            chunk.copy_from_slice(&self.0[3 - i].to_be_bytes());
        }
        bytes
    }

    /// Interpret a double-SHA256 digest (internal byte order) as a number.
    ///
    /// The digest is little-endian, so this is the value of the displayed hash.
    pub fn from_hash(hash: &[u8; 32]) -> Self {
        let mut bytes = *hash;
        bytes.reverse();
        Target::from_be_bytes(bytes)
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|limb| *limb == 0)
    }

    /// Whether `hash` (internal byte order) is strictly below this target.
    #[inline]
    pub fn is_met_by(&self, hash: &[u8; 32]) -> bool {
        Target::from_hash(hash) < *self
    }

    /// Compact encoding of this target.
    pub fn to_bits(&self) -> Result<u32, EncodingError> {
        target_to_bits(self)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_be_bytes())
    }
}

impl PartialOrd for Target {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Target {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.0.iter().rev().zip(other.0.iter().rev()) {
            match a.cmp(b) {
                Ordering::Equal => continue,
                ordering => return ordering,
            }
        }
        Ordering::Equal
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Convert a 256-bit target to compact "bits" representation.
///
/// `size` is the target's length in bytes; the mantissa is its top three
/// bytes. A mantissa with bit 23 set would read as negative, so it is shifted
/// right one byte and `size` bumped. Low-order bytes are truncated, never
/// rounded up.
pub fn target_to_bits(target: &Target) -> Result<u32, EncodingError> {
    let bytes = target.to_be_bytes();
    let first_nonzero = bytes.iter().position(|byte| *byte != 0).unwrap_or(32);
    let mut size = 32 - first_nonzero;

    // Take up to 3 bytes starting at the first non-zero one, zero-padded on the right
    let mut mantissa = (0..3).fold(0u32, |acc, i| {
        let byte = bytes.get(first_nonzero + i).copied().unwrap_or(0);
        (acc << 8) | byte as u32
    });

    if mantissa & COMPACT_SIGN_BIT != 0 {
        mantissa >>= 8;
        size += 1;
    }

    if size > 0xff {
        return Err(EncodingError::SizeOverflow(size));
    }
    if mantissa & !COMPACT_MANTISSA_MASK != 0 {
        return Err(EncodingError::MantissaOverflow(mantissa));
    }

    Ok(((size as u32) << 24) | mantissa)
}

/// Expand compact "bits" into a 256-bit target.
///
/// Target = mantissa * 256^(size - 3). Negative encodings expand to zero and
/// bytes shifted past bit 255 are dropped.
pub fn bits_to_target(bits: u32) -> Target {
    let size = (bits >> 24) as usize;
    let mantissa = bits & COMPACT_MANTISSA_MASK;

    if bits & COMPACT_SIGN_BIT != 0 || size == 0 {
        return Target::ZERO;
    }

    let mut bytes = [0u8; 32];
    let mantissa_bytes = mantissa.to_be_bytes();

    // Mantissa byte i (of 3) lands at big-endian position 32 - size + i
    for (i, byte) in mantissa_bytes[1..].iter().enumerate() {
        let position = 32 + i;
        if position >= size && position - size < 32 {
            bytes[position - size] = *byte;
        }
    }

    Target::from_be_bytes(bytes)
}
