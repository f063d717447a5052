//! Core transaction types

use crate::constants::SEQUENCE_FINAL;
use crate::error::{DogecoinError, Result};
use crate::multisig::SignatureSlots;
use crate::script::{build_p2sh_spend_script, RedeemScript};
use serde::{Deserialize, Serialize};

/// Hash type: 256-bit hash
pub type Hash = [u8; 32];

/// RIPEMD160(SHA256(x))
pub type Hash160 = [u8; 20];

/// Byte string type
pub type ByteString = Vec<u8>;

/// Reference to an unspent output: (txid, output index)
///
/// `txid` is stored in wire order. Hex txids use the reversed display order
/// shown by block explorers and RPC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: Hash,
    pub index: u32,
}

impl OutPoint {
    pub fn new(txid: Hash, index: u32) -> Self {
        Self { txid, index }
    }

    /// Parse a display-order hex txid
    pub fn from_hex(txid_hex: &str, index: u32) -> Result<Self> {
        let bytes = hex::decode(txid_hex)?;
        if bytes.len() != 32 {
            return Err(DogecoinError::InvalidEncoding(format!(
                "txid must be 32 bytes, got {}",
                bytes.len()
            )));
        }
        let mut txid = [0u8; 32];
        for (dst, src) in txid.iter_mut().zip(bytes.iter().rev()) {
            *dst = *src;
        }
        Ok(Self { txid, index })
    }

    /// Display-order hex txid
    pub fn txid_hex(&self) -> String {
        let mut display = self.txid;
        display.reverse();
        hex::encode(display)
    }
}

/// The script an input supplies to satisfy the output it spends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "InputScriptParts")]
pub enum InputScript {
    /// Wire bytes: empty while unsigned, a finished P2PKH spend, or a
    /// P2SH script read back from hex
    Raw(ByteString),

    /// P2SH multisig spend in progress
    Multisig {
        redeem_script: RedeemScript,
        slots: SignatureSlots,
    },
}

/// Unchecked serde form of [`InputScript`]
#[derive(Deserialize)]
enum InputScriptParts {
    Raw(ByteString),
    Multisig {
        redeem_script: RedeemScript,
        slots: SignatureSlots,
    },
}

impl TryFrom<InputScriptParts> for InputScript {
    type Error = DogecoinError;

    fn try_from(parts: InputScriptParts) -> Result<Self> {
        match parts {
            InputScriptParts::Raw(bytes) => Ok(InputScript::Raw(bytes)),
            InputScriptParts::Multisig { redeem_script, slots } => {
                if slots.len() != redeem_script.len() {
                    return Err(DogecoinError::InvalidRedeemScript(format!(
                        "{} signature slots for {} keys",
                        slots.len(),
                        redeem_script.len()
                    )));
                }
                Ok(InputScript::Multisig { redeem_script, slots })
            }
        }
    }
}

impl InputScript {
    pub fn empty() -> Self {
        InputScript::Raw(Vec::new())
    }

    /// Serialized script bytes as they appear on the wire
    pub fn to_bytes(&self) -> ByteString {
        match self {
            InputScript::Raw(bytes) => bytes.clone(),
            InputScript::Multisig { redeem_script, slots } => {
                build_p2sh_spend_script(slots, redeem_script)
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            InputScript::Raw(bytes) => bytes.is_empty(),
            InputScript::Multisig { .. } => false,
        }
    }
}

impl Default for InputScript {
    fn default() -> Self {
        Self::empty()
    }
}

/// Transaction input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInput {
    pub prevout: OutPoint,
    pub script_sig: InputScript,
    pub sequence: u32,
}

impl TransactionInput {
    /// Unsigned input spending `prevout`
    pub fn unsigned(prevout: OutPoint) -> Self {
        Self {
            prevout,
            script_sig: InputScript::empty(),
            sequence: SEQUENCE_FINAL,
        }
    }
}

/// Transaction output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOutput {
    /// Amount in koinu (1 DOGE = 100,000,000 koinu)
    pub value: u64,
    pub script_pubkey: ByteString,
}

/// Transaction: version, ordered inputs, ordered outputs, lock time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    pub lock_time: u32,
}
