//! scriptPubKey classification and scriptSig disassembly.
//!
//! Script types are decided once, when a transaction record is ingested, and
//! matched exhaustively afterwards. Only the P2PKH unlocking pattern
//! (`<sig> <pubkey>`) is taken apart; nothing here executes a script.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ScriptError;

const OP_0: u8 = 0x00;
const OP_PUSHDATA1: u8 = 0x4c;
const OP_PUSHDATA2: u8 = 0x4d;
const OP_PUSHDATA4: u8 = 0x4e;
const OP_1: u8 = 0x51;
const OP_RETURN: u8 = 0x6a;
const OP_DUP: u8 = 0x76;
const OP_EQUAL: u8 = 0x87;
const OP_EQUALVERIFY: u8 = 0x88;
const OP_HASH160: u8 = 0xa9;
const OP_CHECKSIG: u8 = 0xac;

/// Locking script template, using the mempool record tag names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScriptType {
    /// OP_DUP OP_HASH160 <20 bytes> OP_EQUALVERIFY OP_CHECKSIG
    #[serde(rename = "p2pkh")]
    P2PKH,
    /// OP_HASH160 <20 bytes> OP_EQUAL
    #[serde(rename = "p2sh")]
    P2SH,
    /// OP_0 <20 bytes>
    #[serde(rename = "v0_p2wpkh")]
    P2WPKH,
    /// OP_0 <32 bytes>
    #[serde(rename = "v0_p2wsh")]
    P2WSH,
    /// OP_1 <32 bytes>
    #[serde(rename = "v1_p2tr")]
    P2TR,
    /// OP_RETURN <data>
    #[serde(rename = "op_return")]
    OpReturn,
    #[serde(other, rename = "unknown")]
    Unknown,
}

impl ScriptType {
    /// Classify a scriptPubKey by its byte pattern.
    pub fn classify(script: &[u8]) -> Self {
        match script {
            [OP_DUP, OP_HASH160, 0x14, hash @ .., OP_EQUALVERIFY, OP_CHECKSIG]
                if hash.len() == 20 =>
            {
                ScriptType::P2PKH
            }
            [OP_HASH160, 0x14, hash @ .., OP_EQUAL] if hash.len() == 20 => ScriptType::P2SH,
            [OP_0, 0x14, program @ ..] if program.len() == 20 => ScriptType::P2WPKH,
            [OP_0, 0x20, program @ ..] if program.len() == 32 => ScriptType::P2WSH,
            [OP_1, 0x20, program @ ..] if program.len() == 32 => ScriptType::P2TR,
            [OP_RETURN, ..] => ScriptType::OpReturn,
            _ => ScriptType::Unknown,
        }
    }

    /// Parse a mempool `scriptpubkey_type` tag.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "p2pkh" => ScriptType::P2PKH,
            "p2sh" => ScriptType::P2SH,
            "v0_p2wpkh" => ScriptType::P2WPKH,
            "v0_p2wsh" => ScriptType::P2WSH,
            "v1_p2tr" => ScriptType::P2TR,
            "op_return" => ScriptType::OpReturn,
            _ => ScriptType::Unknown,
        }
    }

    /// Resolve the type of a scriptPubKey from its bytes. The record tag is
    /// only consulted when the bytes match no known template.
    pub fn resolve(tag: Option<&str>, script: &[u8]) -> Self {
        match ScriptType::classify(script) {
            ScriptType::Unknown => tag.map_or(ScriptType::Unknown, ScriptType::from_tag),
            known => known,
        }
    }

    /// Tag name as used by mempool records.
    pub fn tag(&self) -> &'static str {
        match self {
            ScriptType::P2PKH => "p2pkh",
            ScriptType::P2SH => "p2sh",
            ScriptType::P2WPKH => "v0_p2wpkh",
            ScriptType::P2WSH => "v0_p2wsh",
            ScriptType::P2TR => "v1_p2tr",
            ScriptType::OpReturn => "op_return",
            ScriptType::Unknown => "unknown",
        }
    }

    /// Whether spending this output is authorized by witness data.
    pub fn is_witness_program(&self) -> bool {
        matches!(self, ScriptType::P2WPKH | ScriptType::P2WSH | ScriptType::P2TR)
    }
}

impl fmt::Display for ScriptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One element of a disassembled script.
///
/// A data push yields two tokens, the push opcode followed by its data, the
/// same shape as a mempool `scriptsig_asm` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    Op(u8),
    Data(&'a [u8]),
}

/// Split a script into opcode and data tokens.
pub fn disassemble(script: &[u8]) -> Result<Vec<Token<'_>>, ScriptError> {
    let mut tokens = Vec::new();
    let mut offset = 0;

    while offset < script.len() {
        let opcode = script[offset];
        offset += 1;

        let push_len = match opcode {
            0x01..=0x4b => Some(opcode as usize),
            OP_PUSHDATA1 => Some(read_le(script, &mut offset, 1)?),
            OP_PUSHDATA2 => Some(read_le(script, &mut offset, 2)?),
            OP_PUSHDATA4 => Some(read_le(script, &mut offset, 4)?),
            _ => None,
        };

        tokens.push(Token::Op(opcode));

        if let Some(len) = push_len {
            let end = offset
                .checked_add(len)
                .filter(|end| *end <= script.len())
                .ok_or(ScriptError::TruncatedPush { offset, wanted: len })?;
            tokens.push(Token::Data(&script[offset..end]));
            offset = end;
        }
    }

    Ok(tokens)
}

fn read_le(script: &[u8], offset: &mut usize, width: usize) -> Result<usize, ScriptError> {
    let bytes = script
        .get(*offset..*offset + width)
        .ok_or(ScriptError::TruncatedPush { offset: *offset, wanted: width })?;
    *offset += width;
    Ok(bytes
        .iter()
        .rev()
        .fold(0usize, |acc, byte| (acc << 8) | *byte as usize))
}

/// Pull the DER signature (token 1) and public key (token 3) out of a P2PKH scriptSig.
pub fn p2pkh_signature_and_pubkey(script_sig: &[u8]) -> Result<(&[u8], &[u8]), ScriptError> {
    let tokens = disassemble(script_sig)?;
    if tokens.len() < 4 {
        return Err(ScriptError::TooFewTokens { expected: 4, found: tokens.len() });
    }

    let data_at = |index: usize| match tokens[index] {
        Token::Data(bytes) => Ok(bytes),
        Token::Op(_) => Err(ScriptError::NotData { index }),
    };

    Ok((data_at(1)?, data_at(3)?))
}
