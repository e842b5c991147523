//! P2PKH signature verification.
//!
//! The DER signature and public key are taken from the scriptSig, the message
//! is the double SHA256 of the legacy sighash preimage, and the check itself
//! is secp256k1 ECDSA.

use secp256k1::{ecdsa, Message, PublicKey, Secp256k1, Verification};
use tracing::debug;

use crate::error::{DerError, TransactionError, VerifyError};
use crate::hash::double_sha256;
use crate::script::{p2pkh_signature_and_pubkey, ScriptType};
use crate::transaction::Transaction;

const SEQUENCE_MARKER: u8 = 0x30;
const INTEGER_MARKER: u8 = 0x02;

/// Smallest well-formed encoding: header, two one-byte integers, sighash type.
const MIN_DER_LEN: usize = 9;

/// A DER signature split into fixed-width scalars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerSignature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    pub sighash_type: u8,
}

impl DerSignature {
    /// Parse `0x30 len 0x02 len r 0x02 len s sighash_type`.
    pub fn parse(bytes: &[u8]) -> Result<Self, DerError> {
        if bytes.len() < MIN_DER_LEN {
            return Err(DerError::TooShort(bytes.len()));
        }
        expect_marker("sequence", SEQUENCE_MARKER, bytes[0])?;

        // The declared length covers everything except the header and the sighash byte
        let declared = bytes[1] as usize;
        let actual = bytes.len() - 3;
        if declared != actual {
            return Err(DerError::LengthMismatch { declared, actual });
        }

        let body = &bytes[2..bytes.len() - 1];
        let mut offset = 0;
        let r = read_integer(body, &mut offset, "r")?;
        let s = read_integer(body, &mut offset, "s")?;
        if offset != body.len() {
            return Err(DerError::LengthMismatch {
                declared: offset,
                actual: body.len(),
            });
        }

        Ok(DerSignature {
            r,
            s,
            sighash_type: bytes[bytes.len() - 1],
        })
    }

    /// Raw 64-byte `r || s`.
    pub fn to_compact(&self) -> [u8; 64] {
        let mut compact = [0u8; 64];
        compact[..32].copy_from_slice(&self.r);
        compact[32..].copy_from_slice(&self.s);
        compact
    }
}

fn expect_marker(what: &'static str, expected: u8, got: u8) -> Result<(), DerError> {
    if got == expected {
        Ok(())
    } else {
        Err(DerError::WrongMarker { what, expected, got })
    }
}

fn read_integer(body: &[u8], offset: &mut usize, what: &'static str) -> Result<[u8; 32], DerError> {
    let header = body
        .get(*offset..*offset + 2)
        .ok_or(DerError::Truncated(what))?;
    expect_marker(what, INTEGER_MARKER, header[0])?;
    let len = header[1] as usize;
    *offset += 2;

    let mut value = body
        .get(*offset..*offset + len)
        .ok_or(DerError::Truncated(what))?;
    *offset += len;

    // A positive integer with its top bit set carries one leading zero
    if let [0x00, rest @ ..] = value {
        value = rest;
    }
    if value.len() > 32 {
        return Err(DerError::IntegerTooLong { what, len: value.len() });
    }

    let mut padded = [0u8; 32];
    padded[32 - value.len()..].copy_from_slice(value);
    Ok(padded)
}

/// Verify the P2PKH signature on one input.
pub fn verify_input(tx: &Transaction, input_index: usize) -> Result<(), VerifyError> {
    let secp = Secp256k1::verification_only();
    verify_input_with(&secp, tx, input_index)
}

/// Boolean view of [`verify_input`].
pub fn verify(tx: &Transaction, input_index: usize) -> bool {
    verify_input(tx, input_index).is_ok()
}

fn verify_input_with<C: Verification>(
    secp: &Secp256k1<C>,
    tx: &Transaction,
    input_index: usize,
) -> Result<(), VerifyError> {
    let input = tx
        .inputs
        .get(input_index)
        .ok_or(TransactionError::InputOutOfRange {
            index: input_index,
            count: tx.inputs.len(),
        })?;
    let prevout = input
        .prevout
        .as_ref()
        .ok_or(TransactionError::MissingPrevout { index: input_index })?;

    if prevout.script_type != ScriptType::P2PKH {
        return Err(VerifyError::UnsupportedScriptType(prevout.script_type));
    }
    if input.script_sig.is_empty() {
        return Err(VerifyError::EmptyScriptSig);
    }

    let (der, pubkey) = p2pkh_signature_and_pubkey(&input.script_sig)?;
    let signature = DerSignature::parse(der)?;
    let digest = double_sha256(&tx.sighash_preimage(input_index)?);

    let pubkey = PublicKey::from_slice(pubkey).map_err(|_| VerifyError::InvalidPublicKey)?;
    let mut sig = ecdsa::Signature::from_compact(&signature.to_compact())
        .map_err(|_| VerifyError::InvalidSignature)?;
    sig.normalize_s();

    let message = Message::from_digest(digest);
    secp.verify_ecdsa(&message, &sig, &pubkey)
        .map_err(|_| VerifyError::InvalidSignature)
}

/// Per-input verification outcome for a whole transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureReport {
    /// `(input_index, result)` for every non-coinbase input.
    pub results: Vec<(usize, Result<(), VerifyError>)>,
    pub valid_count: usize,
}

impl SignatureReport {
    /// True when every checked input verified.
    pub fn all_valid(&self) -> bool {
        self.valid_count == self.results.len()
    }

    /// First failing input, if any.
    pub fn first_failure(&self) -> Option<(usize, &VerifyError)> {
        self.results
            .iter()
            .find_map(|(index, result)| result.as_ref().err().map(|err| (*index, err)))
    }
}

/// Verify every non-coinbase input of `tx`.
pub fn verify_transaction(tx: &Transaction) -> SignatureReport {
    let secp = Secp256k1::verification_only();

    let results: Vec<_> = tx
        .inputs
        .iter()
        .enumerate()
        .filter(|(_, input)| !input.is_coinbase)
        .map(|(index, _)| (index, verify_input_with(&secp, tx, index)))
        .collect();
    let valid_count = results.iter().filter(|(_, result)| result.is_ok()).count();

    debug!(
        txid = %tx.txid_display(),
        checked = results.len(),
        valid = valid_count,
        "verified signatures"
    );

    SignatureReport { results, valid_count }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::TransactionRecord;
    use hex_literal::hex;

    const P2PKH_JSON: &str = include_str!("../tests/fixtures/p2pkh.json");
    const P2PKH_TWO_INPUTS_JSON: &str = include_str!("../tests/fixtures/p2pkh_two_inputs.json");
    const P2WPKH_JSON: &str = include_str!("../tests/fixtures/p2wpkh.json");

    fn load(json: &str) -> Transaction {
        let record: TransactionRecord = serde_json::from_str(json).unwrap();
        Transaction::from_record(&record).unwrap()
    }

    #[test]
    fn test_parse_der_strips_leading_zero() {
        let der = hex!(
            "3045022100f2797df51af15e9b0433d9c4bb730114c7a397a9b94dbc0c78581915523150f4"
            "0220372ff0c6d6ff8861f5fac2936c589d760978ba3436f0409e53542eb00f8f22f101"
        );
        let sig = DerSignature::parse(&der).unwrap();

        assert_eq!(
            sig.r,
            hex!("f2797df51af15e9b0433d9c4bb730114c7a397a9b94dbc0c78581915523150f4")
        );
        assert_eq!(
            sig.s,
            hex!("372ff0c6d6ff8861f5fac2936c589d760978ba3436f0409e53542eb00f8f22f1")
        );
        assert_eq!(sig.sighash_type, 0x01);
        assert_eq!(&sig.to_compact()[..32], &sig.r);
    }

    #[test]
    fn test_parse_der_pads_short_integers() {
        // r = 0x05, s = 0x0102
        let der = hex!("30070201050202010201");
        let sig = DerSignature::parse(&der).unwrap();
        assert_eq!(sig.r[31], 0x05);
        assert!(sig.r[..31].iter().all(|b| *b == 0));
        assert_eq!(&sig.s[30..], &[0x01, 0x02]);
    }

    #[test]
    fn test_parse_der_rejects_malformed() {
        assert_eq!(DerSignature::parse(&[0x30, 0x00]), Err(DerError::TooShort(2)));

        assert_eq!(
            DerSignature::parse(&hex!("31070201050202010201")),
            Err(DerError::WrongMarker { what: "sequence", expected: 0x30, got: 0x31 })
        );
        assert_eq!(
            DerSignature::parse(&hex!("30070301050202010201")),
            Err(DerError::WrongMarker { what: "r", expected: 0x02, got: 0x03 })
        );
        assert_eq!(
            DerSignature::parse(&hex!("30080201050202010201")),
            Err(DerError::LengthMismatch { declared: 8, actual: 7 })
        );
        // s claims 3 bytes, only 2 present
        assert_eq!(
            DerSignature::parse(&hex!("30070201050203010201")),
            Err(DerError::Truncated("s"))
        );
    }

    #[test]
    fn test_parse_der_rejects_oversized_integer() {
        let mut der = vec![0x30, 0x00, 0x02, 33];
        der.extend_from_slice(&[0x7f; 33]);
        der.extend_from_slice(&[0x02, 0x01, 0x01, 0x01]);
        der[1] = (der.len() - 3) as u8;

        assert_eq!(
            DerSignature::parse(&der),
            Err(DerError::IntegerTooLong { what: "r", len: 33 })
        );
    }

    #[test]
    fn test_verify_p2pkh_fixture() {
        let tx = load(P2PKH_JSON);
        assert_eq!(verify_input(&tx, 0), Ok(()));
        assert!(verify(&tx, 0));
    }

    #[test]
    fn test_verify_compressed_and_uncompressed_keys() {
        let tx = load(P2PKH_TWO_INPUTS_JSON);
        assert!(verify(&tx, 0));
        assert!(verify(&tx, 1));

        let report = verify_transaction(&tx);
        assert_eq!(report.valid_count, 2);
        assert!(report.all_valid());
        assert!(report.first_failure().is_none());
    }

    #[test]
    fn test_tampered_signature_fails() {
        let mut tx = load(P2PKH_JSON);
        // Flip a byte inside s. The scriptSig starts with push, 0x30, len, 0x02, 0x21,
        // then 33 bytes of r, then 0x02, 0x20 and s.
        tx.inputs[0].script_sig[45] ^= 0x01;

        assert_eq!(verify_input(&tx, 0), Err(VerifyError::InvalidSignature));
        assert!(!verify(&tx, 0));
    }

    #[test]
    fn test_tampered_output_fails() {
        let mut tx = load(P2PKH_JSON);
        tx.outputs[0].value += 1;
        assert_eq!(verify_input(&tx, 0), Err(VerifyError::InvalidSignature));
    }

    #[test]
    fn test_non_p2pkh_is_unsupported() {
        let tx = load(P2WPKH_JSON);
        assert_eq!(
            verify_input(&tx, 0),
            Err(VerifyError::UnsupportedScriptType(ScriptType::P2WPKH))
        );

        let report = verify_transaction(&tx);
        assert_eq!(report.valid_count, 0);
        assert_eq!(
            report.first_failure(),
            Some((0, &VerifyError::UnsupportedScriptType(ScriptType::P2WPKH)))
        );
    }

    #[test]
    fn test_empty_script_sig() {
        let mut tx = load(P2PKH_JSON);
        tx.inputs[0].script_sig.clear();
        assert_eq!(verify_input(&tx, 0), Err(VerifyError::EmptyScriptSig));
    }

    #[test]
    fn test_bad_public_key() {
        let mut tx = load(P2PKH_JSON);
        let len = tx.inputs[0].script_sig.len();
        // Compressed key prefix must be 0x02 or 0x03
        tx.inputs[0].script_sig[len - 33] = 0x05;
        assert_eq!(verify_input(&tx, 0), Err(VerifyError::InvalidPublicKey));
    }

    #[test]
    fn test_missing_input() {
        let tx = load(P2PKH_JSON);
        assert_eq!(
            verify_input(&tx, 1),
            Err(VerifyError::Preimage(TransactionError::InputOutOfRange { index: 1, count: 1 }))
        );
    }
}
