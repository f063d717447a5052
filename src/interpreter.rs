//! Legacy script verifier
//!
//! A small stack machine covering the opcodes P2PKH and bare-multisig P2SH
//! spends need. Signatures are checked against the legacy sighash of the
//! transaction being verified, with the executing script as script code.

use crate::constants::*;
use crate::error::{DogecoinError, Result};
use crate::hash::hash160;
use crate::keys::PublicKey;
use crate::script::{parse_script, ScriptOp};
use crate::sighash::{legacy_digest, SighashType};
use crate::signer::{verify, Signature};
use crate::types::*;
use log::trace;

/// Signature checks bound to one input of one transaction
pub struct TransactionChecker<'a> {
    tx: &'a Transaction,
    input: usize,
}

impl<'a> TransactionChecker<'a> {
    pub fn new(tx: &'a Transaction, input: usize) -> Result<Self> {
        if input >= tx.inputs.len() {
            return Err(DogecoinError::InvalidTransactionInput(format!(
                "input {} out of range, transaction has {} inputs",
                input,
                tx.inputs.len()
            )));
        }
        Ok(Self { tx, input })
    }

    /// Malformed signatures and keys are a failed check, not an error
    fn check_sig(&self, signature: &[u8], pubkey: &[u8], script_code: &[u8]) -> Result<bool> {
        let signature = match Signature::from_bytes(signature.to_vec()) {
            Ok(sig) => sig,
            Err(_) => return Ok(false),
        };
        let pubkey = match PublicKey::from_slice(pubkey) {
            Ok(key) => key,
            Err(_) => return Ok(false),
        };
        let sighash_type = match SighashType::from_u32(signature.sighash_byte() as u32) {
            Ok(t) => t,
            Err(_) => return Ok(false),
        };
        let digest = legacy_digest(self.tx, self.input, script_code, sighash_type)?;
        Ok(verify(&digest, &signature, &pubkey))
    }
}

fn cast_to_bool(item: &[u8]) -> bool {
    for (i, byte) in item.iter().enumerate() {
        if *byte != 0 {
            // negative zero
            return !(i == item.len() - 1 && *byte == 0x80);
        }
    }
    false
}

fn pop(stack: &mut Vec<ByteString>) -> Result<ByteString> {
    stack
        .pop()
        .ok_or_else(|| DogecoinError::ScriptExecution("stack underflow".to_string()))
}

/// Small non-negative count as pushed by OP_0..OP_16
fn pop_count(stack: &mut Vec<ByteString>) -> Result<usize> {
    let item = pop(stack)?;
    match item.as_slice() {
        [] => Ok(0),
        [n] if *n <= 0x7f => Ok(*n as usize),
        _ => Err(DogecoinError::ScriptExecution(format!(
            "bad count encoding {}",
            hex::encode(&item)
        ))),
    }
}

/// EvalScript: script × stack → {true, false}
///
/// Runs every operation of `script` against `stack`. Returns `Ok(false)`
/// when a VERIFY-style opcode fails and an error when the script is
/// malformed, exceeds limits or uses an opcode outside the supported set.
pub fn eval_script(
    script: &[u8],
    stack: &mut Vec<ByteString>,
    checker: &TransactionChecker,
) -> Result<bool> {
    if script.len() > MAX_SCRIPT_SIZE {
        return Err(DogecoinError::ScriptExecution("script too large".to_string()));
    }

    let mut op_count = 0;
    for op in parse_script(script)? {
        let opcode = match op {
            ScriptOp::Push(data) => {
                stack.push(data);
                if stack.len() > MAX_STACK_SIZE {
                    return Err(DogecoinError::ScriptExecution("stack overflow".to_string()));
                }
                continue;
            }
            ScriptOp::Opcode(opcode) => opcode,
        };

        op_count += 1;
        if op_count > MAX_SCRIPT_OPS {
            return Err(DogecoinError::ScriptExecution(
                "operation limit exceeded".to_string(),
            ));
        }

        if !execute_opcode(opcode, script, stack, checker)? {
            return Ok(false);
        }

        if stack.len() > MAX_STACK_SIZE {
            return Err(DogecoinError::ScriptExecution("stack overflow".to_string()));
        }
    }

    Ok(true)
}

fn execute_opcode(
    opcode: u8,
    script: &[u8],
    stack: &mut Vec<ByteString>,
    checker: &TransactionChecker,
) -> Result<bool> {
    match opcode {
        OP_1NEGATE => {
            stack.push(vec![0x81]);
            Ok(true)
        }

        OP_1..=OP_16 => {
            stack.push(vec![opcode - OP_1 + 1]);
            Ok(true)
        }

        OP_VERIFY => Ok(cast_to_bool(&pop(stack)?)),

        OP_RETURN => Ok(false),

        OP_DUP => {
            let top = stack
                .last()
                .cloned()
                .ok_or_else(|| DogecoinError::ScriptExecution("stack underflow".to_string()))?;
            stack.push(top);
            Ok(true)
        }

        OP_HASH160 => {
            let item = pop(stack)?;
            stack.push(hash160(&item).to_vec());
            Ok(true)
        }

        OP_EQUAL | OP_EQUALVERIFY => {
            let a = pop(stack)?;
            let b = pop(stack)?;
            if opcode == OP_EQUALVERIFY {
                return Ok(a == b);
            }
            stack.push(if a == b { vec![1] } else { vec![] });
            Ok(true)
        }

        OP_CHECKSIG | OP_CHECKSIGVERIFY => {
            let pubkey = pop(stack)?;
            let signature = pop(stack)?;
            let ok = checker.check_sig(&signature, &pubkey, script)?;
            trace!("CHECKSIG -> {}", ok);
            if opcode == OP_CHECKSIGVERIFY {
                return Ok(ok);
            }
            stack.push(if ok { vec![1] } else { vec![] });
            Ok(true)
        }

        OP_CHECKMULTISIG | OP_CHECKMULTISIGVERIFY => {
            let ok = check_multisig(script, stack, checker)?;
            trace!("CHECKMULTISIG -> {}", ok);
            if opcode == OP_CHECKMULTISIGVERIFY {
                return Ok(ok);
            }
            stack.push(if ok { vec![1] } else { vec![] });
            Ok(true)
        }

        _ => Err(DogecoinError::ScriptExecution(format!(
            "unsupported opcode 0x{:02x}",
            opcode
        ))),
    }
}

/// Stack layout, top first: N, key_N..key_1, M, sig_M..sig_1, dummy
///
/// Signatures must appear in the same relative order as their keys; each
/// signature is tried against keys from the current position onward.
fn check_multisig(
    script: &[u8],
    stack: &mut Vec<ByteString>,
    checker: &TransactionChecker,
) -> Result<bool> {
    let key_count = pop_count(stack)?;
    if key_count > MAX_MULTISIG_KEYS {
        return Err(DogecoinError::ScriptExecution(format!(
            "{} keys exceeds {}",
            key_count, MAX_MULTISIG_KEYS
        )));
    }
    let mut keys = (0..key_count)
        .map(|_| pop(stack))
        .collect::<Result<Vec<_>>>()?;
    keys.reverse();

    let sig_count = pop_count(stack)?;
    if sig_count > key_count {
        return Err(DogecoinError::ScriptExecution(format!(
            "{} signatures for {} keys",
            sig_count, key_count
        )));
    }
    let mut sigs = (0..sig_count)
        .map(|_| pop(stack))
        .collect::<Result<Vec<_>>>()?;
    sigs.reverse();

    // the extra element consumed by CHECKMULTISIG
    pop(stack)?;

    let mut key_pos = 0;
    for signature in &sigs {
        loop {
            if key_pos >= keys.len() {
                return Ok(false);
            }
            let matched = checker.check_sig(signature, &keys[key_pos], script)?;
            key_pos += 1;
            if matched {
                break;
            }
        }
    }
    Ok(true)
}

/// OP_HASH160 <20 bytes> OP_EQUAL
pub fn is_p2sh_script(script_pubkey: &[u8]) -> bool {
    script_pubkey.len() == 23
        && script_pubkey[0] == OP_HASH160
        && script_pubkey[1] == HASH160_SIZE as u8
        && script_pubkey[22] == OP_EQUAL
}

fn is_push_only(script: &[u8]) -> Result<bool> {
    Ok(parse_script(script)?.iter().all(|op| match op {
        ScriptOp::Push(_) => true,
        ScriptOp::Opcode(code) => *code == OP_1NEGATE || (OP_1..=OP_16).contains(code),
    }))
}

/// VerifyScript: scriptSig × scriptPubKey → {true, false}
///
/// 1. Execute scriptSig on an empty stack
/// 2. Execute scriptPubKey on the resulting stack
/// 3. For P2SH outputs, execute the serialized redeem script from the
///    scriptSig's stack
/// 4. Succeed when exactly one true value remains
pub fn verify_script(
    script_sig: &[u8],
    script_pubkey: &[u8],
    checker: &TransactionChecker,
) -> Result<bool> {
    if !is_push_only(script_sig)? {
        return Ok(false);
    }

    let mut stack = Vec::new();
    if !eval_script(script_sig, &mut stack, checker)? {
        return Ok(false);
    }
    let p2sh_stack = stack.clone();

    if !eval_script(script_pubkey, &mut stack, checker)? {
        return Ok(false);
    }
    if !stack.last().map_or(false, |top| cast_to_bool(top)) {
        return Ok(false);
    }

    if is_p2sh_script(script_pubkey) {
        let mut stack = p2sh_stack;
        let redeem_script = pop(&mut stack)?;
        if !eval_script(&redeem_script, &mut stack, checker)? {
            return Ok(false);
        }
        return Ok(stack.len() == 1 && cast_to_bool(&stack[0]));
    }

    Ok(stack.len() == 1 && cast_to_bool(&stack[0]))
}

/// Verify input `input` of `tx` against the output script it spends
pub fn verify_input(tx: &Transaction, input: usize, script_pubkey: &[u8]) -> Result<bool> {
    let checker = TransactionChecker::new(tx, input)?;
    let script_sig = tx.inputs[input].script_sig.to_bytes();
    verify_script(&script_sig, script_pubkey, &checker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{p2pkh_script_pubkey, p2sh_script_pubkey};
    use crate::keys::{derive_private_key, PrivateKey};
    use crate::multisig::apply_signature;
    use crate::script::{push_data, RedeemScript};
    use crate::sighash::{compute_digest, SigningContext};
    use crate::signer::sign;
    use crate::transaction::{add_output, new_base, OutputTarget};

    const PHRASES: [&str; 3] = [
        "flame flock chunk trim modify raise rough client coin busy income smile",
        "shrug argue supply evolve alarm caught swamp tissue hollow apology youth ethics",
        "awesome beef hill broccoli strike poem rebel unique turn circle cool system",
    ];

    fn keys() -> Vec<PrivateKey> {
        PHRASES.iter().map(|p| derive_private_key(p, "").unwrap()).collect()
    }

    fn redeem() -> RedeemScript {
        RedeemScript::new(keys().iter().map(|k| k.public_key()).collect(), 2).unwrap()
    }

    fn unsigned_tx() -> Transaction {
        let tx = new_base(OutPoint::new([9; 32], 0));
        add_output(&tx, OutputTarget::Script(vec![OP_1]), 50_000)
    }

    fn signed_by(tx: &Transaction, signers: &[usize]) -> Transaction {
        let ctx = SigningContext::p2sh(redeem());
        let mut out = tx.clone();
        for &i in signers {
            let digest = compute_digest(tx, 0, &ctx).unwrap();
            let sig = sign(&digest, &keys()[i], SighashType::All).unwrap();
            out = apply_signature(&out, 0, &ctx, &sig).unwrap();
        }
        out
    }

    fn p2sh_pubkey_script() -> ByteString {
        p2sh_script_pubkey(&redeem().hash160())
    }

    #[test]
    fn test_p2pkh_spend_verifies() {
        let key = &keys()[0];
        let ctx = SigningContext::p2pkh(key.public_key());
        let tx = unsigned_tx();
        let digest = compute_digest(&tx, 0, &ctx).unwrap();
        let sig = sign(&digest, key, SighashType::All).unwrap();
        let signed = apply_signature(&tx, 0, &ctx, &sig).unwrap();

        let spk = p2pkh_script_pubkey(&hash160(&key.public_key().to_bytes()));
        assert!(verify_input(&signed, 0, &spk).unwrap());

        let other = p2pkh_script_pubkey(&hash160(&keys()[1].public_key().to_bytes()));
        assert!(!verify_input(&signed, 0, &other).unwrap());
    }

    #[test]
    fn test_p2pkh_wrong_key_signature_fails() {
        let key = &keys()[0];
        let ctx = SigningContext::p2pkh(key.public_key());
        let tx = unsigned_tx();
        let digest = compute_digest(&tx, 0, &ctx).unwrap();
        let sig = sign(&digest, &keys()[1], SighashType::All).unwrap();
        let signed = apply_signature(&tx, 0, &ctx, &sig).unwrap();

        let spk = p2pkh_script_pubkey(&hash160(&key.public_key().to_bytes()));
        assert!(!verify_input(&signed, 0, &spk).unwrap());
    }

    #[test]
    fn test_multisig_below_threshold_fails() {
        // too few stack items for CHECKMULTISIG, so execution errors out
        let tx = signed_by(&unsigned_tx(), &[1]);
        assert!(!matches!(verify_input(&tx, 0, &p2sh_pubkey_script()), Ok(true)));
        assert!(!matches!(
            verify_input(&unsigned_tx(), 0, &p2sh_pubkey_script()),
            Ok(true)
        ));
    }

    #[test]
    fn test_multisig_any_two_in_any_order_verify() {
        let orders: [&[usize]; 6] = [&[0, 1], &[1, 0], &[0, 2], &[2, 0], &[1, 2], &[2, 1]];
        for order in orders {
            let tx = signed_by(&unsigned_tx(), order);
            assert!(
                verify_input(&tx, 0, &p2sh_pubkey_script()).unwrap(),
                "order {:?}",
                order
            );
        }
    }

    #[test]
    fn test_multisig_all_three_signers_verify() {
        let tx = signed_by(&unsigned_tx(), &[2, 0, 1]);
        assert!(verify_input(&tx, 0, &p2sh_pubkey_script()).unwrap());
    }

    #[test]
    fn test_multisig_out_of_order_raw_script_fails() {
        let tx = unsigned_tx();
        let ctx = SigningContext::p2sh(redeem());
        let digest = compute_digest(&tx, 0, &ctx).unwrap();
        let sig0 = sign(&digest, &keys()[0], SighashType::All).unwrap();
        let sig1 = sign(&digest, &keys()[1], SighashType::All).unwrap();

        let mut script = vec![OP_0];
        push_data(&mut script, sig1.as_bytes());
        push_data(&mut script, sig0.as_bytes());
        push_data(&mut script, &redeem().to_bytes());

        let mut spent = tx.clone();
        spent.inputs[0].script_sig = InputScript::Raw(script);
        assert!(!verify_input(&spent, 0, &p2sh_pubkey_script()).unwrap());
    }

    #[test]
    fn test_multisig_wrong_redeem_hash_fails() {
        let tx = signed_by(&unsigned_tx(), &[0, 1]);
        let wrong = p2sh_script_pubkey(&[0u8; 20]);
        assert!(!verify_input(&tx, 0, &wrong).unwrap());
    }

    #[test]
    fn test_signature_from_other_transaction_fails() {
        let signed = signed_by(&unsigned_tx(), &[0, 1]);
        let mut altered = signed.clone();
        altered.outputs[0].value += 1;
        assert!(!verify_input(&altered, 0, &p2sh_pubkey_script()).unwrap());
    }

    #[test]
    fn test_op_return_output_is_unspendable() {
        let tx = unsigned_tx();
        let checker = TransactionChecker::new(&tx, 0).unwrap();
        assert!(!verify_script(&[OP_1], &[OP_RETURN], &checker).unwrap());
    }

    #[test]
    fn test_unsupported_opcode_errors() {
        let tx = unsigned_tx();
        let checker = TransactionChecker::new(&tx, 0).unwrap();
        assert!(matches!(
            verify_script(&[OP_1], &[0x93], &checker),
            Err(DogecoinError::ScriptExecution(_))
        ));
    }

    #[test]
    fn test_non_push_script_sig_rejected() {
        let tx = unsigned_tx();
        let checker = TransactionChecker::new(&tx, 0).unwrap();
        assert!(!verify_script(&[OP_1, OP_DUP], &[OP_EQUAL], &checker).unwrap());
    }

    #[test]
    fn test_checker_input_range() {
        let tx = unsigned_tx();
        assert!(matches!(
            TransactionChecker::new(&tx, 1),
            Err(DogecoinError::InvalidTransactionInput(_))
        ));
    }
}
