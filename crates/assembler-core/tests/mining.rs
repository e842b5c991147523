//! End-to-end block assembly over mempool fixtures.

use assembler_core::constants::{DEFAULT_TARGET_HEX, PLACEHOLDER_PREV_BLOCK_HASH};
use assembler_core::{
    select_transactions, AssemblerConfig, BlockAssembler, Target, TransactionRecord,
    ValidationPolicy,
};

fn record(json: &str) -> TransactionRecord {
    serde_json::from_str(json).unwrap()
}

fn fixtures() -> Vec<TransactionRecord> {
    vec![
        record(include_str!("fixtures/p2wpkh.json")),
        record(include_str!("fixtures/p2pkh.json")),
        record(include_str!("fixtures/p2pkh_two_inputs.json")),
    ]
}

#[test]
fn test_mine_single_segwit_funded_transaction() {
    let selection = select_transactions(&fixtures()[..1], &ValidationPolicy::default());
    assert_eq!(selection.accepted_count(), 1);

    let assembler = BlockAssembler::new(AssemblerConfig::default().with_timestamp(1713571200));
    let result = assembler.mine(&selection.transactions, DEFAULT_TARGET_HEX).unwrap();

    assert_eq!(result.nonce, 198324);
    assert_eq!(
        result.header_hex(),
        "04000000ca1d9311a01b4b5dc644a6932ed8a0b71f60a7062e5397030000000000000000\
         b22d4aacd0bfa07387008e7591d004a56b452ae632b7fcfe1481167c3e71e1ba\
         80052366ffff001fb4060300"
    );
    assert_eq!(
        result.block_hash_display(),
        "0000f4336d3fe4baf076cafdccfbc04f2f08bbc3ccc33bd4188cfb49f73d740c"
    );

    // Single transaction: merkle root is the txid
    assert_eq!(result.merkle_root, result.txids[0]);
    assert_eq!(
        result.txids_display(),
        vec!["bae1713e7c168114fefcb732e62a456ba504d091758e008773a0bfd0ac4a2db2".to_string()]
    );

    let target = Target::from_hex(DEFAULT_TARGET_HEX).unwrap();
    assert!(target.is_met_by(&result.block_hash));
    assert_eq!(result.header_bytes().len(), 80);
    assert_eq!(&result.header_bytes()[4..36], {
        let mut prev = hex::decode(PLACEHOLDER_PREV_BLOCK_HASH).unwrap();
        prev.reverse();
        prev
    }
    .as_slice());
}

#[test]
fn test_parallel_search_finds_same_block() {
    let selection = select_transactions(&fixtures()[..1], &ValidationPolicy::default());

    let config = AssemblerConfig::default()
        .with_timestamp(1713571200)
        .with_workers(4);
    let result = BlockAssembler::new(config)
        .mine(&selection.transactions, DEFAULT_TARGET_HEX)
        .unwrap();

    assert_eq!(result.nonce, 198324);
    assert_eq!(
        result.block_hash_display(),
        "0000f4336d3fe4baf076cafdccfbc04f2f08bbc3ccc33bd4188cfb49f73d740c"
    );
}

#[test]
fn test_mine_all_accepted_fixtures() {
    let records = fixtures();
    let selection = select_transactions(&records, &ValidationPolicy::default());
    assert_eq!(selection.accepted_count(), 3);

    let easy = "00ff000000000000000000000000000000000000000000000000000000000000";
    let assembler = BlockAssembler::new(AssemblerConfig::default().with_timestamp(1713571200));
    let result = assembler.mine(&selection.transactions, easy).unwrap();

    let expected: Vec<[u8; 32]> = selection.transactions.iter().map(|tx| tx.txid()).collect();
    assert_eq!(result.txids, expected);
    assert!(result.header.meets_target());
    assert_eq!(result.header.hash(), result.block_hash);
}
