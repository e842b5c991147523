//! Error types for transaction ingestion, signature verification and mining.

use thiserror::Error;

use crate::script::ScriptType;

/// A transaction record could not be turned into wire bytes.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransactionError {
    #[error("malformed transaction: field `{field}` is not valid hex: {source}")]
    InvalidHex {
        field: &'static str,
        #[source]
        source: hex::FromHexError,
    },

    #[error("malformed transaction: field `{field}` must be {expected} bytes, got {actual}")]
    InvalidLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("input index {index} out of range ({count} inputs)")]
    InputOutOfRange { index: usize, count: usize },

    #[error("input {index} has no previous output attached")]
    MissingPrevout { index: usize },
}

/// A scriptSig could not be disassembled.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("push of {wanted} bytes at offset {offset} runs past the end of the script")]
    TruncatedPush { offset: usize, wanted: usize },

    #[error("expected at least {expected} script tokens, found {found}")]
    TooFewTokens { expected: usize, found: usize },

    #[error("token {index} is an opcode, expected pushed data")]
    NotData { index: usize },
}

/// A DER-encoded ECDSA signature is malformed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DerError {
    #[error("signature too short ({0} bytes)")]
    TooShort(usize),

    #[error("wrong {what} marker: expected {expected:#04x}, got {got:#04x}")]
    WrongMarker {
        what: &'static str,
        expected: u8,
        got: u8,
    },

    #[error("declared length {declared} does not match {actual} remaining bytes")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("signature truncated while reading {0}")]
    Truncated(&'static str),

    #[error("integer {what} is {len} bytes, wider than 32")]
    IntegerTooLong { what: &'static str, len: usize },
}

/// Why a single input failed signature verification.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VerifyError {
    #[error("script type {0} is not cryptographically verified")]
    UnsupportedScriptType(ScriptType),

    #[error("scriptSig is empty")]
    EmptyScriptSig,

    #[error("script parse error: {0}")]
    Script(#[from] ScriptError),

    #[error("signature format error: {0}")]
    Signature(#[from] DerError),

    #[error("cannot build signature hash preimage: {0}")]
    Preimage(#[from] TransactionError),

    #[error("public key rejected")]
    InvalidPublicKey,

    #[error("signature does not verify")]
    InvalidSignature,
}

/// Internal invariant violation while compacting a target.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("compact size {0} does not fit in one byte")]
    SizeOverflow(usize),

    #[error("compact mantissa {0:#x} exceeds 23 bits")]
    MantissaOverflow(u32),
}

/// Block assembly and nonce search failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MiningError {
    #[error("no transactions supplied and empty blocks are disabled")]
    EmptyBlock,

    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("invalid previous block hash: {0}")]
    InvalidPrevBlockHash(String),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error("nonce space exhausted without a hash below target")]
    NonceSpaceExhausted,

    #[error("gave up after {0} attempts")]
    AttemptLimitReached(u64),
}

pub type Result<T, E = MiningError> = std::result::Result<T, E>;

/// Why the acceptance policy turned a transaction away.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RejectReason {
    #[error(transparent)]
    Malformed(#[from] TransactionError),

    #[error("transaction has no inputs")]
    NoInputs,

    #[error("transaction has no outputs")]
    NoOutputs,

    #[error("version {0} is not allowed")]
    VersionNotAllowed(u32),

    #[error("outpoint {txid}:{vout} spent twice")]
    DuplicateOutpoint { txid: String, vout: u32 },

    #[error("input {index} has no previous output attached")]
    MissingPrevout { index: usize },

    #[error("coinbase input {index} spends a prevout worth {value}")]
    CoinbaseWithValue { index: usize, value: u64 },

    #[error("outputs ({output_value}) exceed inputs ({input_value})")]
    NegativeFee { input_value: u64, output_value: u64 },

    #[error("value total overflows u64")]
    ValueOverflow,

    #[error("output {index} value {value} is below the dust threshold {threshold}")]
    Dust { index: usize, value: u64, threshold: u64 },

    #[error("input {index} spends a witness program but carries no witness")]
    MissingWitness { index: usize },

    #[error("input {index}: {source}")]
    Signature {
        index: usize,
        #[source]
        source: VerifyError,
    },
}
