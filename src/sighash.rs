//! Legacy signature digests for P2PKH and P2SH inputs

use crate::address::p2pkh_script_pubkey;
use crate::constants::*;
use crate::error::{DogecoinError, Result};
use crate::hash::{hash160, sha256d};
use crate::keys::PublicKey;
use crate::script::RedeemScript;
use crate::transaction::serialize_transaction;
use crate::types::*;
use log::trace;
use serde::{Deserialize, Serialize};

/// Which parts of the transaction a signature commits to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SighashType {
    All,
    None,
    Single,
    AllAnyoneCanPay,
    NoneAnyoneCanPay,
    SingleAnyoneCanPay,
}

impl SighashType {
    pub fn to_u32(self) -> u32 {
        match self {
            SighashType::All => SIGHASH_ALL,
            SighashType::None => SIGHASH_NONE,
            SighashType::Single => SIGHASH_SINGLE,
            SighashType::AllAnyoneCanPay => SIGHASH_ALL | SIGHASH_ANYONECANPAY,
            SighashType::NoneAnyoneCanPay => SIGHASH_NONE | SIGHASH_ANYONECANPAY,
            SighashType::SingleAnyoneCanPay => SIGHASH_SINGLE | SIGHASH_ANYONECANPAY,
        }
    }

    pub fn from_u32(value: u32) -> Result<Self> {
        match value {
            SIGHASH_ALL => Ok(SighashType::All),
            SIGHASH_NONE => Ok(SighashType::None),
            SIGHASH_SINGLE => Ok(SighashType::Single),
            v if v == SIGHASH_ALL | SIGHASH_ANYONECANPAY => Ok(SighashType::AllAnyoneCanPay),
            v if v == SIGHASH_NONE | SIGHASH_ANYONECANPAY => Ok(SighashType::NoneAnyoneCanPay),
            v if v == SIGHASH_SINGLE | SIGHASH_ANYONECANPAY => Ok(SighashType::SingleAnyoneCanPay),
            other => Err(DogecoinError::InvalidEncoding(format!(
                "unsupported sighash type 0x{:02x}",
                other
            ))),
        }
    }

    fn base(self) -> u32 {
        self.to_u32() & !SIGHASH_ANYONECANPAY
    }

    fn anyone_can_pay(self) -> bool {
        self.to_u32() & SIGHASH_ANYONECANPAY != 0
    }
}

impl Default for SighashType {
    fn default() -> Self {
        SighashType::All
    }
}

/// Script selector for digest computation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextScript {
    /// Single-key spend; the digest commits to the key's P2PKH script
    P2pkh(PublicKey),
    /// Multisig spend; the digest commits to the full redeem script
    P2sh(RedeemScript),
}

/// What a signature for one input commits to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningContext {
    pub script: ContextScript,
    pub sighash_type: SighashType,
}

impl SigningContext {
    pub fn p2pkh(pubkey: PublicKey) -> Self {
        Self {
            script: ContextScript::P2pkh(pubkey),
            sighash_type: SighashType::All,
        }
    }

    pub fn p2sh(redeem_script: RedeemScript) -> Self {
        Self {
            script: ContextScript::P2sh(redeem_script),
            sighash_type: SighashType::All,
        }
    }

    pub fn with_sighash_type(mut self, sighash_type: SighashType) -> Self {
        self.sighash_type = sighash_type;
        self
    }

    /// Build from the wire-level selector: 0 = P2PKH with a public key,
    /// 1 = P2SH with a redeem script
    pub fn from_parts(sig_type: u32, script: &[u8]) -> Result<Self> {
        match sig_type {
            0 => Ok(Self::p2pkh(PublicKey::from_slice(script)?)),
            1 => Ok(Self::p2sh(RedeemScript::parse(script)?)),
            other => Err(DogecoinError::InvalidContext(format!(
                "signature type must be 0 (P2PKH) or 1 (P2SH), got {}",
                other
            ))),
        }
    }

    /// Script placed in the signed input while hashing
    pub fn script_code(&self) -> ByteString {
        match &self.script {
            ContextScript::P2pkh(pubkey) => p2pkh_script_pubkey(&hash160(&pubkey.to_bytes())),
            ContextScript::P2sh(redeem_script) => redeem_script.to_bytes(),
        }
    }
}

/// Position of the input spending `prevout`
pub fn find_input(tx: &Transaction, prevout: &OutPoint) -> Result<usize> {
    tx.inputs
        .iter()
        .position(|input| input.prevout == *prevout)
        .ok_or_else(|| {
            DogecoinError::InvalidTransactionInput(format!(
                "no input spends {}:{}",
                prevout.txid_hex(),
                prevout.index
            ))
        })
}

/// The digest SIGHASH_SINGLE yields when the input has no matching output
fn single_without_output_digest() -> Hash {
    let mut one = [0u8; 32];
    one[0] = 1;
    one
}

/// ComputeDigest: tx × input × context → 32-byte digest
///
/// 1. Clone tx and blank every input script
/// 2. Put the context's script code into the target input
/// 3. Apply the sighash type's input/output masking
/// 4. Hash256(Serialize(tx') ‖ sighash_type as u32 LE)
pub fn compute_digest(tx: &Transaction, target_input: usize, ctx: &SigningContext) -> Result<Hash> {
    legacy_digest(tx, target_input, &ctx.script_code(), ctx.sighash_type)
}

/// Legacy digest over an explicit script code
///
/// The script verifier hashes whatever script is executing, which need not
/// come from a `SigningContext`.
pub fn legacy_digest(
    tx: &Transaction,
    target_input: usize,
    script_code: &[u8],
    sighash_type: SighashType,
) -> Result<Hash> {
    if target_input >= tx.inputs.len() {
        return Err(DogecoinError::InvalidTransactionInput(format!(
            "input {} out of range, transaction has {} inputs",
            target_input,
            tx.inputs.len()
        )));
    }

    let base = sighash_type.base();
    if base == SIGHASH_SINGLE && target_input >= tx.outputs.len() {
        return Ok(single_without_output_digest());
    }

    let mut tx_copy = tx.clone();
    for (i, input) in tx_copy.inputs.iter_mut().enumerate() {
        input.script_sig = if i == target_input {
            InputScript::Raw(script_code.to_vec())
        } else {
            InputScript::empty()
        };
        if i != target_input && (base == SIGHASH_NONE || base == SIGHASH_SINGLE) {
            input.sequence = 0;
        }
    }

    if base == SIGHASH_NONE {
        tx_copy.outputs.clear();
    } else if base == SIGHASH_SINGLE {
        tx_copy.outputs.truncate(target_input + 1);
        for output in tx_copy.outputs.iter_mut().take(target_input) {
            output.value = u64::MAX;
            output.script_pubkey.clear();
        }
    }

    if sighash_type.anyone_can_pay() {
        let input = tx_copy.inputs.swap_remove(target_input);
        tx_copy.inputs = vec![input];
    }

    let mut preimage = serialize_transaction(&tx_copy);
    preimage.extend_from_slice(&sighash_type.to_u32().to_le_bytes());
    let digest = sha256d(&preimage);
    trace!("sighash input {} ({:?}): {}", target_input, sighash_type, hex::encode(digest));
    Ok(digest)
}
