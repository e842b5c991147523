//! Transaction records, their parsed form, and canonical serialization.
//!
//! Records arrive in the mempool JSON shape with hex-encoded byte fields.
//! They are decoded exactly once into a [`Transaction`], which then
//! serializes to the legacy (non-witness) wire format used for txids and
//! for the legacy signature hash.

use serde::{Deserialize, Serialize};

use crate::constants::SIGHASH_ALL;
use crate::error::TransactionError;
use crate::hash::{double_sha256, hash_from_display_hex, hash_to_display_hex};
use crate::script::ScriptType;
use crate::varint::{encode_varint, encoded_len, write_var_bytes};

/// A transaction as found in a mempool JSON file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub version: u32,
    pub locktime: u32,
    pub vin: Vec<InputRecord>,
    pub vout: Vec<OutputRecord>,
}

/// An input of a [`TransactionRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRecord {
    /// Previous transaction id, display (big-endian) hex.
    pub txid: String,
    pub vout: u32,
    #[serde(default)]
    pub prevout: Option<OutputRecord>,
    #[serde(default)]
    pub scriptsig: String,
    #[serde(default)]
    pub scriptsig_asm: String,
    #[serde(default)]
    pub witness: Option<Vec<String>>,
    #[serde(default)]
    pub is_coinbase: bool,
    pub sequence: u32,
}

/// An output (or spent previous output) of a [`TransactionRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub scriptpubkey: String,
    #[serde(default)]
    pub scriptpubkey_asm: String,
    #[serde(default)]
    pub scriptpubkey_type: Option<String>,
    #[serde(default)]
    pub scriptpubkey_address: Option<String>,
    pub value: u64,
}

/// A decoded transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
    pub locktime: u32,
}

/// A decoded transaction input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Input {
    /// Previous txid in internal byte order.
    pub previous_txid: [u8; 32],
    pub previous_output_index: u32,
    pub script_sig: Vec<u8>,
    pub sequence: u32,
    pub witness: Vec<Vec<u8>>,
    /// The output being spent. Needed for verification only, never serialized.
    pub prevout: Option<Output>,
    pub is_coinbase: bool,
}

/// A decoded transaction output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    pub value: u64,
    pub script_pubkey: Vec<u8>,
    pub script_type: ScriptType,
}

fn decode_hex(field: &'static str, value: &str) -> Result<Vec<u8>, TransactionError> {
    hex::decode(value).map_err(|source| TransactionError::InvalidHex { field, source })
}

impl TryFrom<&OutputRecord> for Output {
    type Error = TransactionError;

    fn try_from(record: &OutputRecord) -> Result<Self, Self::Error> {
        let script_pubkey = decode_hex("scriptpubkey", &record.scriptpubkey)?;
        let script_type = ScriptType::resolve(record.scriptpubkey_type.as_deref(), &script_pubkey);

        Ok(Output {
            value: record.value,
            script_pubkey,
            script_type,
        })
    }
}

impl TryFrom<&InputRecord> for Input {
    type Error = TransactionError;

    fn try_from(record: &InputRecord) -> Result<Self, Self::Error> {
        let witness = record
            .witness
            .iter()
            .flatten()
            .map(|item| decode_hex("witness", item))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Input {
            previous_txid: hash_from_display_hex("txid", &record.txid)?,
            previous_output_index: record.vout,
            script_sig: decode_hex("scriptsig", &record.scriptsig)?,
            sequence: record.sequence,
            witness,
            prevout: record.prevout.as_ref().map(Output::try_from).transpose()?,
            is_coinbase: record.is_coinbase,
        })
    }
}

impl TryFrom<&TransactionRecord> for Transaction {
    type Error = TransactionError;

    fn try_from(record: &TransactionRecord) -> Result<Self, Self::Error> {
        Ok(Transaction {
            version: record.version,
            inputs: record.vin.iter().map(Input::try_from).collect::<Result<_, _>>()?,
            outputs: record.vout.iter().map(Output::try_from).collect::<Result<_, _>>()?,
            locktime: record.locktime,
        })
    }
}

impl Transaction {
    /// Decode a mempool record.
    pub fn from_record(record: &TransactionRecord) -> Result<Self, TransactionError> {
        Transaction::try_from(record)
    }

    /// Canonical legacy serialization (no witness data).
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.serialized_size());
        self.write(&mut out, None);
        out
    }

    /// The legacy signature-hash preimage for `input_index`.
    ///
    /// The signed input carries its previous output's scriptPubKey, every
    /// other scriptSig is replaced by zeros of the same length, and
    /// `SIGHASH_ALL` is appended after the locktime.
    pub fn sighash_preimage(&self, input_index: usize) -> Result<Vec<u8>, TransactionError> {
        let input = self.inputs.get(input_index).ok_or(TransactionError::InputOutOfRange {
            index: input_index,
            count: self.inputs.len(),
        })?;
        let prevout = input
            .prevout
            .as_ref()
            .ok_or(TransactionError::MissingPrevout { index: input_index })?;

        let mut out = Vec::with_capacity(self.serialized_size() + prevout.script_pubkey.len() + 4);
        self.write(&mut out, Some((input_index, &prevout.script_pubkey)));
        out.extend_from_slice(&SIGHASH_ALL.to_le_bytes());
        Ok(out)
    }

    /// Transaction id: double SHA256 of [`Transaction::serialize`], internal byte order.
    pub fn txid(&self) -> [u8; 32] {
        double_sha256(&self.serialize())
    }

    /// Transaction id as shown by block explorers.
    pub fn txid_display(&self) -> String {
        hash_to_display_hex(&self.txid())
    }

    /// Whether any input claims to be a coinbase input.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.iter().any(|input| input.is_coinbase)
    }

    /// Size in bytes of [`Transaction::serialize`].
    pub fn serialized_size(&self) -> usize {
        let inputs: usize = self
            .inputs
            .iter()
            .map(|input| 32 + 4 + var_bytes_len(&input.script_sig) + 4)
            .sum();
        let outputs: usize = self
            .outputs
            .iter()
            .map(|output| 8 + var_bytes_len(&output.script_pubkey))
            .sum();

        4 + encoded_len(self.inputs.len() as u64)
            + inputs
            + encoded_len(self.outputs.len() as u64)
            + outputs
            + 4
    }

    fn write(&self, out: &mut Vec<u8>, sighash: Option<(usize, &[u8])>) {
        out.extend_from_slice(&self.version.to_le_bytes());

        encode_varint(self.inputs.len() as u64, out);
        for (index, input) in self.inputs.iter().enumerate() {
            out.extend_from_slice(&input.previous_txid);
            out.extend_from_slice(&input.previous_output_index.to_le_bytes());

            match sighash {
                None => write_var_bytes(&input.script_sig, out),
                Some((signed, script_code)) if signed == index => write_var_bytes(script_code, out),
                Some(_) => {
                    encode_varint(input.script_sig.len() as u64, out);
                    out.resize(out.len() + input.script_sig.len(), 0);
                }
            }

            out.extend_from_slice(&input.sequence.to_le_bytes());
        }

        encode_varint(self.outputs.len() as u64, out);
        for output in &self.outputs {
            out.extend_from_slice(&output.value.to_le_bytes());
            write_var_bytes(&output.script_pubkey, out);
        }

        out.extend_from_slice(&self.locktime.to_le_bytes());
    }
}

fn var_bytes_len(bytes: &[u8]) -> usize {
    encoded_len(bytes.len() as u64) + bytes.len()
}
