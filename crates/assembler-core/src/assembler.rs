//! Block assembly: txids, merkle root, header, nonce search.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::block::{current_timestamp, BlockHeader};
use crate::constants::{
    BLOCK_HEADER_SIZE, DEFAULT_BLOCK_VERSION, HEADER_TEMPLATE_SIZE, PLACEHOLDER_PREV_BLOCK_HASH,
};
use crate::difficulty::Target;
use crate::error::{MiningError, Result};
use crate::hash::{hash_from_display_hex, hash_to_display_hex};
use crate::merkle::compute_merkle_root;
use crate::pow::{search_parallel, Solution};
use crate::transaction::Transaction;

/// Header fields and search settings for block assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblerConfig {
    pub version: i32,
    /// Previous block hash, display order.
    pub prev_block_hash: String,
    /// Header timestamp. `None` uses the current time.
    pub timestamp: Option<u32>,
    /// Search threads. 1 searches on the calling thread.
    pub workers: usize,
    /// Give up after this many nonces.
    pub max_attempts: Option<u64>,
    /// Mine a block with an all-zero merkle root when no transactions are given.
    pub allow_empty_block: bool,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        AssemblerConfig {
            version: DEFAULT_BLOCK_VERSION,
            prev_block_hash: PLACEHOLDER_PREV_BLOCK_HASH.to_string(),
            timestamp: None,
            workers: 1,
            max_attempts: None,
            allow_empty_block: false,
        }
    }
}

impl AssemblerConfig {
    pub fn with_version(mut self, version: i32) -> Self {
        self.version = version;
        self
    }

    pub fn with_prev_block_hash(mut self, prev_block_hash: impl Into<String>) -> Self {
        self.prev_block_hash = prev_block_hash.into();
        self
    }

    pub fn with_timestamp(mut self, timestamp: u32) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u64) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn with_allow_empty_block(mut self, allow_empty_block: bool) -> Self {
        self.allow_empty_block = allow_empty_block;
        self
    }
}

/// A header awaiting its nonce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockTemplate {
    pub header: BlockHeader,
    pub target: Target,
    /// Included txids, internal byte order.
    pub txids: Vec<[u8; 32]>,
}

impl BlockTemplate {
    /// The 76 bytes the nonce search hashes over.
    pub fn header_template(&self) -> [u8; HEADER_TEMPLATE_SIZE] {
        self.header.serialize_without_nonce()
    }

    /// Fix the winning nonce into the header.
    pub fn complete(self, solution: Solution) -> MiningResult {
        let header = self.header.with_nonce(solution.nonce);
        MiningResult {
            header,
            merkle_root: header.merkle_root,
            nonce: solution.nonce,
            block_hash: solution.hash,
            txids: self.txids,
        }
    }
}

/// A mined block header and the transactions it commits to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiningResult {
    pub header: BlockHeader,
    /// Included txids, internal byte order.
    pub txids: Vec<[u8; 32]>,
    pub nonce: u32,
    pub merkle_root: [u8; 32],
    /// Block hash, internal byte order.
    pub block_hash: [u8; 32],
}

impl MiningResult {
    pub fn header_bytes(&self) -> [u8; BLOCK_HEADER_SIZE] {
        self.header.serialize()
    }

    pub fn header_hex(&self) -> String {
        hex::encode(self.header_bytes())
    }

    pub fn txids_display(&self) -> Vec<String> {
        self.txids.iter().map(hash_to_display_hex).collect()
    }

    pub fn merkle_root_display(&self) -> String {
        hash_to_display_hex(&self.merkle_root)
    }

    pub fn block_hash_display(&self) -> String {
        hash_to_display_hex(&self.block_hash)
    }
}

/// Assembles and mines blocks according to an [`AssemblerConfig`].
#[derive(Debug, Clone, Default)]
pub struct BlockAssembler {
    config: AssemblerConfig,
}

impl BlockAssembler {
    pub fn new(config: AssemblerConfig) -> Self {
        BlockAssembler { config }
    }

    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    /// Build the header for `transactions`, leaving the nonce at zero.
    pub fn prepare(&self, transactions: &[Transaction], target_hex: &str) -> Result<BlockTemplate> {
        let target = Target::from_hex(target_hex)?;
        let txids: Vec<[u8; 32]> = transactions.iter().map(Transaction::txid).collect();

        let merkle_root = match compute_merkle_root(&txids) {
            Some(root) => root,
            None if self.config.allow_empty_block => [0u8; 32],
            None => return Err(MiningError::EmptyBlock),
        };

        let prev_block_hash = hash_from_display_hex("prev_block_hash", &self.config.prev_block_hash)
            .map_err(|e| MiningError::InvalidPrevBlockHash(e.to_string()))?;
        let timestamp = self.config.timestamp.unwrap_or_else(current_timestamp);
        let bits = target.to_bits()?;

        let header = BlockHeader::new(
            self.config.version,
            prev_block_hash,
            merkle_root,
            timestamp,
            bits,
        );

        info!(
            transactions = txids.len(),
            merkle_root = %hash_to_display_hex(&merkle_root),
            bits,
            timestamp,
            "assembled block template"
        );

        Ok(BlockTemplate { header, target, txids })
    }

    /// Assemble a header over `transactions` and search for a nonce below `target_hex`.
    pub fn mine(&self, transactions: &[Transaction], target_hex: &str) -> Result<MiningResult> {
        let template = self.prepare(transactions, target_hex)?;
        let solution = search_parallel(
            &template.header_template(),
            &template.target,
            self.config.workers,
            self.config.max_attempts,
        )?;
        Ok(template.complete(solution))
    }
}
