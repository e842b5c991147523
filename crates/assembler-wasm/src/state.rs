//! Serializable state reported to the JavaScript host.

use assembler_core::hash::{count_leading_zeros, hash_to_display_hex};
use assembler_core::{BatchOutcome, BlockTemplate, MiningResult, RejectReason};
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {:?}", e)))
}

/// Mining statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MiningStats {
    /// Total hashes computed.
    pub total_hashes: u64,
    /// Current hash rate (hashes per second).
    pub hash_rate: f64,
    /// Whether a hash below the target was found.
    pub block_found: bool,
    /// Next nonce to try.
    pub current_nonce: u32,
    /// Elapsed time in milliseconds.
    pub elapsed_ms: f64,
    /// Winning hash (display format).
    pub best_hash: Option<String>,
    /// Number of leading zero bits in the winning hash.
    pub best_leading_zeros: u32,
    /// Whether every nonce has been tried.
    pub nonce_space_exhausted: bool,
}

impl MiningStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one batch outcome into the totals.
    pub fn record_batch(&mut self, outcome: &BatchOutcome) {
        match outcome {
            BatchOutcome::Found(solution) => {
                self.total_hashes += solution.attempts;
                self.block_found = true;
                self.current_nonce = solution.nonce;
                self.best_hash = Some(hash_to_display_hex(&solution.hash));
                self.best_leading_zeros = count_leading_zeros(&solution.hash);
            }
            BatchOutcome::Exhausted { hashes_computed, next_nonce } => {
                self.total_hashes += hashes_computed;
                match next_nonce {
                    Some(nonce) => self.current_nonce = *nonce,
                    None => self.nonce_space_exhausted = true,
                }
            }
        }
    }

    /// Update hash rate based on elapsed time.
    pub fn update_hash_rate(&mut self) {
        if self.elapsed_ms > 0.0 {
            self.hash_rate = (self.total_hashes as f64) / (self.elapsed_ms / 1000.0);
        }
    }

    /// Format hash rate for display.
    pub fn format_hash_rate(&self) -> String {
        if self.hash_rate >= 1_000_000_000.0 {
            format!("{:.2} GH/s", self.hash_rate / 1_000_000_000.0)
        } else if self.hash_rate >= 1_000_000.0 {
            format!("{:.2} MH/s", self.hash_rate / 1_000_000.0)
        } else if self.hash_rate >= 1_000.0 {
            format!("{:.2} KH/s", self.hash_rate / 1_000.0)
        } else {
            format!("{:.2} H/s", self.hash_rate)
        }
    }

    pub fn to_js(&self) -> Result<JsValue, JsValue> {
        to_js(self)
    }
}

/// Verdict for one submitted transaction record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptanceInfo {
    pub accepted: bool,
    /// Display-order txid when accepted.
    pub txid: Option<String>,
    pub reason: Option<String>,
}

impl AcceptanceInfo {
    pub fn accepted(txid: &[u8; 32]) -> Self {
        AcceptanceInfo {
            accepted: true,
            txid: Some(hash_to_display_hex(txid)),
            reason: None,
        }
    }

    pub fn rejected(reason: &RejectReason) -> Self {
        AcceptanceInfo {
            accepted: false,
            txid: None,
            reason: Some(reason.to_string()),
        }
    }

    pub fn to_js(&self) -> Result<JsValue, JsValue> {
        to_js(self)
    }
}

/// Totals after ingesting a batch of records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectionSummary {
    pub accepted: usize,
    pub rejected: usize,
    pub verdicts: Vec<AcceptanceInfo>,
}

impl SelectionSummary {
    pub fn to_js(&self) -> Result<JsValue, JsValue> {
        to_js(self)
    }
}

/// Header fields of a prepared block, for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateInfo {
    pub version: i32,
    /// Previous block hash (display format).
    pub prev_hash: String,
    /// Merkle root (display format).
    pub merkle_root: String,
    pub timestamp: u32,
    /// Difficulty bits.
    pub bits: u32,
    /// Full target, big-endian hex.
    pub target: String,
    pub transactions: usize,
}

impl From<&BlockTemplate> for TemplateInfo {
    fn from(template: &BlockTemplate) -> Self {
        TemplateInfo {
            version: template.header.version,
            prev_hash: hash_to_display_hex(&template.header.prev_block_hash),
            merkle_root: hash_to_display_hex(&template.header.merkle_root),
            timestamp: template.header.timestamp,
            bits: template.header.bits,
            target: template.target.to_hex(),
            transactions: template.txids.len(),
        }
    }
}

impl TemplateInfo {
    pub fn to_js(&self) -> Result<JsValue, JsValue> {
        to_js(self)
    }
}

/// Result of one `mine_batch` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchInfo {
    pub block_found: bool,
    /// The winning nonce (if found).
    pub nonce: Option<u32>,
    /// The block hash (if found).
    pub hash: Option<String>,
    /// Number of leading zero bits in hash.
    pub leading_zeros: u32,
    /// Hashes computed in this batch.
    pub hashes_computed: u64,
    /// Nonce the next batch starts from.
    pub next_nonce: Option<u32>,
}

impl From<&BatchOutcome> for BatchInfo {
    fn from(outcome: &BatchOutcome) -> Self {
        match outcome {
            BatchOutcome::Found(solution) => BatchInfo {
                block_found: true,
                nonce: Some(solution.nonce),
                hash: Some(hash_to_display_hex(&solution.hash)),
                leading_zeros: count_leading_zeros(&solution.hash),
                hashes_computed: solution.attempts,
                next_nonce: None,
            },
            BatchOutcome::Exhausted { hashes_computed, next_nonce } => BatchInfo {
                block_found: false,
                nonce: None,
                hash: None,
                leading_zeros: 0,
                hashes_computed: *hashes_computed,
                next_nonce: *next_nonce,
            },
        }
    }
}

impl BatchInfo {
    pub fn to_js(&self) -> Result<JsValue, JsValue> {
        to_js(self)
    }
}

/// The mined block, with hashes in display order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiningReport {
    pub header_hex: String,
    pub txids: Vec<String>,
    pub nonce: u32,
    pub merkle_root: String,
    pub block_hash: String,
}

impl From<&MiningResult> for MiningReport {
    fn from(result: &MiningResult) -> Self {
        MiningReport {
            header_hex: result.header_hex(),
            txids: result.txids_display(),
            nonce: result.nonce,
            merkle_root: result.merkle_root_display(),
            block_hash: result.block_hash_display(),
        }
    }
}

impl MiningReport {
    pub fn to_js(&self) -> Result<JsValue, JsValue> {
        to_js(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assembler_core::{Solution, Target};

    fn solution() -> Solution {
        let mut hash = [0xffu8; 32];
        hash[31] = 0x00;
        hash[30] = 0x0f;
        Solution { nonce: 42, hash, attempts: 3 }
    }

    #[test]
    fn test_record_batch_accumulates() {
        let mut stats = MiningStats::new();
        stats.record_batch(&BatchOutcome::Exhausted {
            hashes_computed: 1000,
            next_nonce: Some(1000),
        });
        stats.record_batch(&BatchOutcome::Exhausted {
            hashes_computed: 500,
            next_nonce: Some(1500),
        });

        assert_eq!(stats.total_hashes, 1500);
        assert_eq!(stats.current_nonce, 1500);
        assert!(!stats.block_found);

        stats.record_batch(&BatchOutcome::Found(solution()));
        assert_eq!(stats.total_hashes, 1503);
        assert!(stats.block_found);
        assert_eq!(stats.current_nonce, 42);
        assert_eq!(stats.best_leading_zeros, 12);
        assert!(stats.best_hash.as_deref().unwrap().starts_with("000f"));
    }

    #[test]
    fn test_record_batch_end_of_nonce_space() {
        let mut stats = MiningStats::new();
        stats.record_batch(&BatchOutcome::Exhausted { hashes_computed: 2, next_nonce: None });
        assert!(stats.nonce_space_exhausted);
    }

    #[test]
    fn test_hash_rate_display() {
        let mut stats = MiningStats::new();
        stats.total_hashes = 2_500_000;
        stats.elapsed_ms = 1000.0;
        stats.update_hash_rate();

        assert_eq!(stats.hash_rate, 2_500_000.0);
        assert_eq!(stats.format_hash_rate(), "2.50 MH/s");

        stats.hash_rate = 12.0;
        assert_eq!(stats.format_hash_rate(), "12.00 H/s");
    }

    #[test]
    fn test_batch_info_from_outcome() {
        let info = BatchInfo::from(&BatchOutcome::Found(solution()));
        assert!(info.block_found);
        assert_eq!(info.nonce, Some(42));
        assert_eq!(info.hashes_computed, 3);

        let info = BatchInfo::from(&BatchOutcome::Exhausted {
            hashes_computed: 9,
            next_nonce: Some(9),
        });
        assert!(!info.block_found);
        assert_eq!(info.next_nonce, Some(9));
    }

    #[test]
    fn test_acceptance_info() {
        let accepted = AcceptanceInfo::accepted(&[0x01; 32]);
        assert!(accepted.accepted);
        assert_eq!(accepted.txid.as_deref(), Some("01".repeat(32).as_str()));

        let rejected = AcceptanceInfo::rejected(&RejectReason::NoInputs);
        assert!(!rejected.accepted);
        assert_eq!(rejected.reason.as_deref(), Some("transaction has no inputs"));
    }

    #[test]
    fn test_template_info() {
        let target =
            Target::from_hex("0000ffff00000000000000000000000000000000000000000000000000000000")
                .unwrap();
        let header =
            assembler_core::BlockHeader::new(4, [0x11; 32], [0x22; 32], 1713571200, 0x1f00ffff);
        let template = BlockTemplate { header, target, txids: vec![[0x22; 32]] };

        let info = TemplateInfo::from(&template);
        assert_eq!(info.bits, 0x1f00ffff);
        assert_eq!(info.transactions, 1);
        assert_eq!(info.merkle_root, "22".repeat(32));
        assert_eq!(info.target, target.to_hex());
    }
}
