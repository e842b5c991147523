//! WebAssembly bindings for the block assembler.
//!
//! This crate provides JavaScript-accessible APIs for:
//! - Validating mempool transaction records
//! - Preparing a block header over the accepted transactions
//! - Mining in host-sized nonce batches
//! - Reporting statistics and the mined header

use wasm_bindgen::prelude::*;

pub mod miner;
pub mod state;

// Re-export main types for JS access
pub use miner::BlockAssembler;

/// Initialize the WASM module with better panic messages.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Get the library version.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
