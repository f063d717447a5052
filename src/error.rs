//! Error types for transaction construction and signing

use thiserror::Error;

/// Why an address string was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("checksum mismatch")]
    Checksum,

    #[error("unexpected version byte 0x{0:02x}")]
    Version(u8),

    #[error("expected 25 decoded bytes, got {0}")]
    Length(usize),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DogecoinError {
    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(#[from] AddressError),

    #[error("Invalid redeem script: {0}")]
    InvalidRedeemScript(String),

    #[error("Invalid transaction input: {0}")]
    InvalidTransactionInput(String),

    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    #[error("Signature does not match any unsigned key of input {0}")]
    SignatureMismatch(usize),

    #[error("Slot {slot} of input {input} is already signed")]
    AlreadySigned { input: usize, slot: usize },

    #[error("Invalid signing context: {0}")]
    InvalidContext(String),

    #[error("Script execution failed: {0}")]
    ScriptExecution(String),
}

impl From<hex::FromHexError> for DogecoinError {
    fn from(err: hex::FromHexError) -> Self {
        DogecoinError::InvalidEncoding(format!("hex: {}", err))
    }
}

impl From<bs58::decode::Error> for DogecoinError {
    fn from(err: bs58::decode::Error) -> Self {
        DogecoinError::InvalidEncoding(format!("base58: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, DogecoinError>;
