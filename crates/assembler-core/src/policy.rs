//! Transaction acceptance policy.
//!
//! Decides which mempool records go into a block. Every record gets a
//! verdict; a rejected record never aborts the batch.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::constants::DUST_THRESHOLD;
use crate::error::{RejectReason, VerifyError};
use crate::hash::{hash_to_display_hex, reverse_bytes};
use crate::script::ScriptType;
use crate::signature::verify_input;
use crate::transaction::{Transaction, TransactionRecord};

/// Tunable acceptance rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationPolicy {
    /// Minimum value (satoshis) for non-OP_RETURN outputs.
    pub dust_threshold: u64,
    /// Reject inputs whose signatures cannot be checked cryptographically.
    pub require_signatures: bool,
    /// Accepted transaction versions. Empty accepts any version.
    pub allowed_versions: Vec<u32>,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        ValidationPolicy {
            dust_threshold: DUST_THRESHOLD,
            require_signatures: false,
            allowed_versions: Vec::new(),
        }
    }
}

impl ValidationPolicy {
    pub fn with_dust_threshold(mut self, dust_threshold: u64) -> Self {
        self.dust_threshold = dust_threshold;
        self
    }

    pub fn with_require_signatures(mut self, require_signatures: bool) -> Self {
        self.require_signatures = require_signatures;
        self
    }

    pub fn with_allowed_versions(mut self, allowed_versions: Vec<u32>) -> Self {
        self.allowed_versions = allowed_versions;
        self
    }

    /// Run every check against a decoded transaction.
    pub fn check(&self, tx: &Transaction) -> Result<(), RejectReason> {
        self.check_structure(tx)?;
        self.check_values(tx)?;
        self.check_authorization(tx)
    }

    fn check_structure(&self, tx: &Transaction) -> Result<(), RejectReason> {
        if tx.inputs.is_empty() {
            return Err(RejectReason::NoInputs);
        }
        if tx.outputs.is_empty() {
            return Err(RejectReason::NoOutputs);
        }
        if !self.allowed_versions.is_empty() && !self.allowed_versions.contains(&tx.version) {
            return Err(RejectReason::VersionNotAllowed(tx.version));
        }

        let mut spent = HashSet::with_capacity(tx.inputs.len());
        for input in &tx.inputs {
            if !spent.insert((input.previous_txid, input.previous_output_index)) {
                return Err(RejectReason::DuplicateOutpoint {
                    txid: hex::encode(reverse_bytes(&input.previous_txid)),
                    vout: input.previous_output_index,
                });
            }
        }

        for (index, input) in tx.inputs.iter().enumerate() {
            match (&input.prevout, input.is_coinbase) {
                (None, false) => return Err(RejectReason::MissingPrevout { index }),
                (Some(prevout), true) if prevout.value != 0 => {
                    return Err(RejectReason::CoinbaseWithValue {
                        index,
                        value: prevout.value,
                    })
                }
                _ => {}
            }
        }

        Ok(())
    }

    fn check_values(&self, tx: &Transaction) -> Result<(), RejectReason> {
        let input_value = tx
            .inputs
            .iter()
            .filter_map(|input| input.prevout.as_ref())
            .try_fold(0u64, |total, prevout| total.checked_add(prevout.value))
            .ok_or(RejectReason::ValueOverflow)?;
        let output_value = tx
            .outputs
            .iter()
            .try_fold(0u64, |total, output| total.checked_add(output.value))
            .ok_or(RejectReason::ValueOverflow)?;

        if output_value > input_value && !tx.is_coinbase() {
            return Err(RejectReason::NegativeFee {
                input_value,
                output_value,
            });
        }

        for (index, output) in tx.outputs.iter().enumerate() {
            if output.script_type != ScriptType::OpReturn && output.value < self.dust_threshold {
                return Err(RejectReason::Dust {
                    index,
                    value: output.value,
                    threshold: self.dust_threshold,
                });
            }
        }

        Ok(())
    }

    fn check_authorization(&self, tx: &Transaction) -> Result<(), RejectReason> {
        for (index, input) in tx.inputs.iter().enumerate() {
            if input.is_coinbase {
                continue;
            }
            let script_type = input
                .prevout
                .as_ref()
                .map(|prevout| prevout.script_type)
                .ok_or(RejectReason::MissingPrevout { index })?;

            match script_type {
                ScriptType::P2PKH => {
                    verify_input(tx, index)
                        .map_err(|source| RejectReason::Signature { index, source })?;
                }
                witness_type if witness_type.is_witness_program() && !self.require_signatures => {
                    if input.witness.is_empty() {
                        return Err(RejectReason::MissingWitness { index });
                    }
                }
                other => {
                    return Err(RejectReason::Signature {
                        index,
                        source: VerifyError::UnsupportedScriptType(other),
                    })
                }
            }
        }

        Ok(())
    }

    /// Decode and check one record.
    pub fn evaluate(&self, record: &TransactionRecord) -> Result<Transaction, RejectReason> {
        let tx = Transaction::from_record(record)?;
        self.check(&tx)?;
        Ok(tx)
    }
}

/// Verdict for one record, by position in the input batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Acceptance {
    pub index: usize,
    /// The txid (internal byte order) when accepted.
    pub verdict: Result<[u8; 32], RejectReason>,
}

impl Acceptance {
    pub fn is_accepted(&self) -> bool {
        self.verdict.is_ok()
    }
}

/// Accepted transactions, in input order, plus a verdict for every record.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub transactions: Vec<Transaction>,
    pub verdicts: Vec<Acceptance>,
}

impl Selection {
    pub fn accepted_count(&self) -> usize {
        self.transactions.len()
    }

    pub fn rejected(&self) -> impl Iterator<Item = (usize, &RejectReason)> {
        self.verdicts
            .iter()
            .filter_map(|acceptance| {
                acceptance
                    .verdict
                    .as_ref()
                    .err()
                    .map(|r| (acceptance.index, r))
            })
    }
}

/// Apply `policy` to every record.
pub fn select_transactions(records: &[TransactionRecord], policy: &ValidationPolicy) -> Selection {
    let mut selection = Selection::default();

    for (index, record) in records.iter().enumerate() {
        let verdict = match policy.evaluate(record) {
            Ok(tx) => {
                let txid = tx.txid();
                debug!(index, txid = %hash_to_display_hex(&txid), "accepted transaction");
                selection.transactions.push(tx);
                Ok(txid)
            }
            Err(reason) => {
                warn!(index, %reason, "rejected transaction");
                Err(reason)
            }
        };
        selection.verdicts.push(Acceptance { index, verdict });
    }

    debug!(
        accepted = selection.accepted_count(),
        total = records.len(),
        "transaction selection complete"
    );
    selection
}
