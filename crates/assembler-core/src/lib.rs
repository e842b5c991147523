//! Core block assembly logic.
//!
//! This crate provides pure Rust implementations of:
//! - Mempool transaction decoding and legacy serialization
//! - Transaction IDs and the legacy signature-hash preimage
//! - P2PKH signature verification (DER + secp256k1)
//! - Transaction acceptance policy
//! - Merkle roots, compact difficulty targets and block headers
//! - Sequential, batched and multi-threaded proof-of-work search

pub mod assembler;
pub mod block;
pub mod constants;
pub mod difficulty;
pub mod error;
pub mod hash;
pub mod merkle;
pub mod policy;
pub mod pow;
pub mod script;
pub mod signature;
pub mod transaction;
pub mod varint;

pub use assembler::{AssemblerConfig, BlockAssembler, BlockTemplate, MiningResult};
pub use block::BlockHeader;
pub use difficulty::{bits_to_target, target_to_bits, Target};
pub use error::{
    DerError, EncodingError, MiningError, RejectReason, Result, ScriptError, TransactionError,
    VerifyError,
};
pub use hash::{double_sha256, hash_to_display_hex};
pub use merkle::compute_merkle_root;
pub use policy::{select_transactions, Acceptance, Selection, ValidationPolicy};
pub use pow::{mine_batch, search, search_parallel, BatchOutcome, SearchState, Solution};
pub use script::ScriptType;
pub use signature::{verify, verify_input, verify_transaction, SignatureReport};
pub use transaction::{Input, Output, Transaction, TransactionRecord};
pub use varint::encode_varint;
