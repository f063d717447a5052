//! Combining co-signer signatures into a spendable input
//!
//! A P2SH multisig input collects one signature per redeem-script key slot.
//! Co-signers may sign in any order; each new signature is assigned to the
//! key it verifies against, and the spend script always lists signatures in
//! key order, which is the order CHECKMULTISIG consumes them in.

use crate::error::{DogecoinError, Result};
use crate::script::{build_p2pkh_spend_script, parse_pushes, RedeemScript};
use crate::sighash::{compute_digest, ContextScript, SighashType, SigningContext};
use crate::signer::{verify, Signature};
use crate::types::*;
use log::debug;
use serde::{Deserialize, Serialize};

/// One optional signature per redeem-script key, in key order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureSlots {
    slots: Vec<Option<Signature>>,
}

impl SignatureSlots {
    pub fn new(key_count: usize) -> Self {
        Self {
            slots: vec![None; key_count],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, slot: usize) -> Option<&Signature> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    pub fn is_filled(&self, slot: usize) -> bool {
        self.get(slot).is_some()
    }

    /// Store `signature` in an empty slot; returns false if the slot is
    /// taken or out of range
    pub fn fill(&mut self, slot: usize, signature: Signature) -> bool {
        match self.slots.get_mut(slot) {
            Some(entry @ None) => {
                *entry = Some(signature);
                true
            }
            _ => false,
        }
    }

    /// Filled signatures in ascending slot order
    pub fn filled(&self) -> impl Iterator<Item = &Signature> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    pub fn filled_count(&self) -> usize {
        self.filled().count()
    }

    pub fn meets_threshold(&self, threshold: usize) -> bool {
        self.filled_count() >= threshold
    }
}

/// Digest a signature commits to, using the sighash type it carries
fn digest_for(
    tx: &Transaction,
    target_input: usize,
    ctx: &SigningContext,
    signature: &Signature,
) -> Result<Hash> {
    let sighash_type = SighashType::from_u32(signature.sighash_byte() as u32)?;
    compute_digest(tx, target_input, &ctx.clone().with_sighash_type(sighash_type))
}

/// Recover the slot array of a P2SH input from its current script
///
/// Raw scripts come from a previously serialized partial transaction. Their
/// signatures are slotted the way CHECKMULTISIG walks keys: each signature
/// takes the next key, at or after the previous match, that it verifies
/// against.
fn recover_slots(
    tx: &Transaction,
    target_input: usize,
    ctx: &SigningContext,
    redeem_script: &RedeemScript,
) -> Result<SignatureSlots> {
    match &tx.inputs[target_input].script_sig {
        InputScript::Multisig {
            redeem_script: existing,
            slots,
        } => {
            if existing != redeem_script {
                return Err(DogecoinError::InvalidContext(format!(
                    "input {} is being signed for a different redeem script",
                    target_input
                )));
            }
            Ok(slots.clone())
        }
        InputScript::Raw(bytes) if bytes.is_empty() => Ok(SignatureSlots::new(redeem_script.len())),
        InputScript::Raw(bytes) => {
            let pushes = parse_pushes(bytes).map_err(|e| {
                DogecoinError::InvalidContext(format!(
                    "input {} script is not a multisig spend: {}",
                    target_input, e
                ))
            })?;
            if pushes.len() < 2 || !pushes[0].is_empty() {
                return Err(DogecoinError::InvalidContext(format!(
                    "input {} script is not a multisig spend",
                    target_input
                )));
            }
            if pushes[pushes.len() - 1] != redeem_script.to_bytes() {
                return Err(DogecoinError::InvalidContext(format!(
                    "input {} carries a different redeem script",
                    target_input
                )));
            }

            let mut slots = SignatureSlots::new(redeem_script.len());
            let mut next_key = 0;
            for raw in &pushes[1..pushes.len() - 1] {
                let signature = Signature::from_bytes(raw.clone())?;
                let digest = digest_for(tx, target_input, ctx, &signature)?;
                let slot = (next_key..redeem_script.len())
                    .find(|&i| verify(&digest, &signature, &redeem_script.pubkeys()[i]))
                    .ok_or_else(|| {
                        DogecoinError::InvalidContext(format!(
                            "existing signature in input {} matches no remaining key",
                            target_input
                        ))
                    })?;
                slots.fill(slot, signature);
                next_key = slot + 1;
            }
            Ok(slots)
        }
    }
}

/// Current signature slots of a P2SH input
pub fn signature_slots(
    tx: &Transaction,
    target_input: usize,
    ctx: &SigningContext,
) -> Result<SignatureSlots> {
    check_input(tx, target_input)?;
    match &ctx.script {
        ContextScript::P2sh(redeem_script) => recover_slots(tx, target_input, ctx, redeem_script),
        ContextScript::P2pkh(_) => Err(DogecoinError::InvalidContext(
            "signature slots exist only for P2SH inputs".to_string(),
        )),
    }
}

/// Has the input collected enough signatures to be spent?
pub fn is_complete(tx: &Transaction, target_input: usize, ctx: &SigningContext) -> Result<bool> {
    check_input(tx, target_input)?;
    match &ctx.script {
        ContextScript::P2pkh(_) => Ok(!tx.inputs[target_input].script_sig.is_empty()),
        ContextScript::P2sh(redeem_script) => Ok(recover_slots(tx, target_input, ctx, redeem_script)?
            .meets_threshold(redeem_script.threshold())),
    }
}

fn check_input(tx: &Transaction, target_input: usize) -> Result<()> {
    if target_input >= tx.inputs.len() {
        return Err(DogecoinError::InvalidTransactionInput(format!(
            "input {} out of range, transaction has {} inputs",
            target_input,
            tx.inputs.len()
        )));
    }
    Ok(())
}

/// ApplySignature: tx × input × context × sig → tx'
///
/// P2PKH: the input becomes <sig> <pubkey>; applying again overwrites.
///
/// P2SH:
/// 1. Recover the slots already filled for this input
/// 2. Walk keys in redeem-script order, skipping filled slots; the first key
///    the signature verifies against owns it
/// 3. Re-emit the spend script with signatures in slot order
///
/// Fails with `SignatureMismatch` when no unsigned key verifies,
/// `AlreadySigned` when the signature belongs to a filled slot and
/// `InvalidContext` when the input was started for another redeem script.
pub fn apply_signature(
    tx: &Transaction,
    target_input: usize,
    ctx: &SigningContext,
    signature: &Signature,
) -> Result<Transaction> {
    check_input(tx, target_input)?;

    let script_sig = match &ctx.script {
        ContextScript::P2pkh(pubkey) => {
            debug!("input {}: applying P2PKH signature", target_input);
            InputScript::Raw(build_p2pkh_spend_script(signature, pubkey))
        }
        ContextScript::P2sh(redeem_script) => {
            let mut slots = recover_slots(tx, target_input, ctx, redeem_script)?;
            let digest = digest_for(tx, target_input, ctx, signature)?;
            let keys = redeem_script.pubkeys();

            let owner = (0..keys.len())
                .filter(|&slot| !slots.is_filled(slot))
                .find(|&slot| verify(&digest, signature, &keys[slot]));

            let slot = match owner {
                Some(slot) => slot,
                None => {
                    let signed = (0..keys.len())
                        .filter(|&slot| slots.is_filled(slot))
                        .find(|&slot| verify(&digest, signature, &keys[slot]));
                    return Err(match signed {
                        Some(slot) => DogecoinError::AlreadySigned {
                            input: target_input,
                            slot,
                        },
                        None => DogecoinError::SignatureMismatch(target_input),
                    });
                }
            };

            slots.fill(slot, signature.clone());
            debug!(
                "input {}: signature assigned to key slot {} ({}/{} of {})",
                target_input,
                slot,
                slots.filled_count(),
                redeem_script.threshold(),
                redeem_script.len()
            );
            InputScript::Multisig {
                redeem_script: redeem_script.clone(),
                slots,
            }
        }
    };

    let mut next = tx.clone();
    next.inputs[target_input].script_sig = script_sig;
    Ok(next)
}
