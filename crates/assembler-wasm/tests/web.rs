//! Browser tests for the JS-facing controller.

#![cfg(target_arch = "wasm32")]

use assembler_wasm::BlockAssembler;
use wasm_bindgen::JsValue;
use wasm_bindgen_test::*;

const EASY_TARGET: &str = "00ff000000000000000000000000000000000000000000000000000000000000";

fn fixture_json() -> String {
    format!(
        "[{}]",
        include_str!("../../assembler-core/tests/fixtures/p2wpkh.json")
    )
}

#[wasm_bindgen_test]
fn test_mine_in_batches() {
    let mut assembler = BlockAssembler::new(JsValue::UNDEFINED).unwrap();
    assembler.add_transactions_json(&fixture_json()).unwrap();
    assert_eq!(assembler.transaction_count(), 1);

    assembler.prepare(EASY_TARGET).unwrap();
    assert!(assembler.mine_batch(64).is_err());

    assembler.start_mining();
    while assembler.header_hex().is_none() {
        assembler.mine_batch(64).unwrap();
    }

    assert_eq!(assembler.header_hex().unwrap().len(), 160);
    assert!(!assembler.is_mining());
    assert!(assembler.mine_batch(64).is_err());
}

#[wasm_bindgen_test]
fn test_mine_without_prepare_fails() {
    let mut assembler = BlockAssembler::new(JsValue::NULL).unwrap();
    assert!(assembler.mine_batch(10).is_err());
}
