//! Script construction: redeem scripts, spend scripts and push encoding

use crate::address::encode_p2sh;
use crate::constants::*;
use crate::error::{DogecoinError, Result};
use crate::hash::hash160;
use crate::keys::PublicKey;
use crate::multisig::SignatureSlots;
use crate::network::NetworkParams;
use crate::signer::Signature;
use crate::types::{ByteString, Hash160};
use serde::{Deserialize, Serialize};

/// Append `data` to `script` using the smallest push encoding
pub fn push_data(script: &mut ByteString, data: &[u8]) {
    let len = data.len();
    if len == 0 {
        script.push(OP_0);
        return;
    }
    if len < OP_PUSHDATA1 as usize {
        script.push(len as u8);
    } else if len <= 0xff {
        script.push(OP_PUSHDATA1);
        script.push(len as u8);
    } else if len <= 0xffff {
        script.push(OP_PUSHDATA2);
        script.extend_from_slice(&(len as u16).to_le_bytes());
    } else {
        script.push(OP_PUSHDATA4);
        script.extend_from_slice(&(len as u32).to_le_bytes());
    }
    script.extend_from_slice(data);
}

/// One element of a script: either pushed data or a bare opcode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptOp {
    Push(ByteString),
    Opcode(u8),
}

/// Split a script into pushes and opcodes
///
/// Fails with `InvalidEncoding` when a push runs past the end of the script.
pub fn parse_script(script: &[u8]) -> Result<Vec<ScriptOp>> {
    let mut ops = Vec::new();
    let mut pos = 0;

    while pos < script.len() {
        let opcode = script[pos];
        pos += 1;

        let len = match opcode {
            OP_0 => {
                ops.push(ScriptOp::Push(Vec::new()));
                continue;
            }
            1..=0x4b => opcode as usize,
            OP_PUSHDATA1 => read_push_len(script, &mut pos, 1)?,
            OP_PUSHDATA2 => read_push_len(script, &mut pos, 2)?,
            OP_PUSHDATA4 => read_push_len(script, &mut pos, 4)?,
            _ => {
                ops.push(ScriptOp::Opcode(opcode));
                continue;
            }
        };

        let end = pos
            .checked_add(len)
            .filter(|end| *end <= script.len())
            .ok_or_else(|| {
                DogecoinError::InvalidEncoding(format!(
                    "push of {} bytes at offset {} overruns script of {} bytes",
                    len,
                    pos,
                    script.len()
                ))
            })?;
        ops.push(ScriptOp::Push(script[pos..end].to_vec()));
        pos = end;
    }

    Ok(ops)
}

fn read_push_len(script: &[u8], pos: &mut usize, width: usize) -> Result<usize> {
    if *pos + width > script.len() {
        return Err(DogecoinError::InvalidEncoding(
            "truncated push length".to_string(),
        ));
    }
    let mut buf = [0u8; 4];
    buf[..width].copy_from_slice(&script[*pos..*pos + width]);
    *pos += width;
    Ok(u32::from_le_bytes(buf) as usize)
}

/// Data items of a push-only script (a scriptSig)
pub fn parse_pushes(script: &[u8]) -> Result<Vec<ByteString>> {
    parse_script(script)?
        .into_iter()
        .map(|op| match op {
            ScriptOp::Push(data) => Ok(data),
            ScriptOp::Opcode(code) => Err(DogecoinError::InvalidEncoding(format!(
                "unexpected opcode 0x{:02x} in push-only script",
                code
            ))),
        })
        .collect()
}

/// OP_1..OP_16 for 1..=16
fn small_int_opcode(n: usize) -> u8 {
    OP_1 + (n as u8 - 1)
}

/// M-of-N CHECKMULTISIG redeem script with a fixed key order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RedeemScriptParts")]
pub struct RedeemScript {
    threshold: usize,
    pubkeys: Vec<PublicKey>,
}

/// Unchecked serde form of [`RedeemScript`]
#[derive(Deserialize)]
struct RedeemScriptParts {
    threshold: usize,
    pubkeys: Vec<PublicKey>,
}

impl TryFrom<RedeemScriptParts> for RedeemScript {
    type Error = DogecoinError;

    fn try_from(parts: RedeemScriptParts) -> Result<Self> {
        RedeemScript::new(parts.pubkeys, parts.threshold)
    }
}

impl RedeemScript {
    /// BuildRedeemScript: pubkeys × threshold → script
    ///
    /// Requires 1 ≤ threshold ≤ |pubkeys| ≤ 16. Key order is kept as given.
    pub fn new(pubkeys: Vec<PublicKey>, threshold: usize) -> Result<Self> {
        if pubkeys.is_empty() {
            return Err(DogecoinError::InvalidRedeemScript(
                "at least one public key is required".to_string(),
            ));
        }
        if pubkeys.len() > MAX_MULTISIG_KEYS {
            return Err(DogecoinError::InvalidRedeemScript(format!(
                "{} keys exceeds the maximum of {}",
                pubkeys.len(),
                MAX_MULTISIG_KEYS
            )));
        }
        if threshold < 1 || threshold > pubkeys.len() {
            return Err(DogecoinError::InvalidRedeemScript(format!(
                "threshold {} outside 1..={}",
                threshold,
                pubkeys.len()
            )));
        }
        Ok(Self { threshold, pubkeys })
    }

    /// Recover keys and threshold from `OP_M <pk>.. OP_N OP_CHECKMULTISIG`
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let invalid = |msg: &str| DogecoinError::InvalidRedeemScript(msg.to_string());
        let ops = parse_script(bytes).map_err(|e| invalid(&e.to_string()))?;
        if ops.len() < 4 {
            return Err(invalid("too short for a multisig script"));
        }

        let threshold = match ops[0] {
            ScriptOp::Opcode(op @ OP_1..=OP_16) => (op - OP_1 + 1) as usize,
            _ => return Err(invalid("missing threshold opcode")),
        };
        let count = match ops[ops.len() - 2] {
            ScriptOp::Opcode(op @ OP_1..=OP_16) => (op - OP_1 + 1) as usize,
            _ => return Err(invalid("missing key count opcode")),
        };
        if ops[ops.len() - 1] != ScriptOp::Opcode(OP_CHECKMULTISIG) {
            return Err(invalid("missing OP_CHECKMULTISIG"));
        }

        let key_ops = &ops[1..ops.len() - 2];
        if key_ops.len() != count {
            return Err(invalid("key count does not match pushed keys"));
        }
        let pubkeys = key_ops
            .iter()
            .map(|op| match op {
                ScriptOp::Push(data) => {
                    PublicKey::from_slice(data).map_err(|e| invalid(&e.to_string()))
                }
                ScriptOp::Opcode(_) => Err(invalid("expected a public key push")),
            })
            .collect::<Result<Vec<_>>>()?;

        let script = Self::new(pubkeys, threshold)?;
        // Reject non-minimal encodings so bytes and value stay in one-to-one correspondence.
        if script.to_bytes() != bytes {
            return Err(invalid("non-canonical encoding"));
        }
        Ok(script)
    }

    pub fn from_hex(hex_script: &str) -> Result<Self> {
        let bytes = hex::decode(hex_script)?;
        Self::parse(&bytes)
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn pubkeys(&self) -> &[PublicKey] {
        &self.pubkeys
    }

    pub fn len(&self) -> usize {
        self.pubkeys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pubkeys.is_empty()
    }

    /// OP_M <pk_1> .. <pk_N> OP_N OP_CHECKMULTISIG
    pub fn to_bytes(&self) -> ByteString {
        let mut script = Vec::with_capacity(3 + self.pubkeys.len() * (1 + COMPRESSED_PUBKEY_SIZE));
        script.push(small_int_opcode(self.threshold));
        for pubkey in &self.pubkeys {
            push_data(&mut script, &pubkey.to_bytes());
        }
        script.push(small_int_opcode(self.pubkeys.len()));
        script.push(OP_CHECKMULTISIG);
        script
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn hash160(&self) -> Hash160 {
        hash160(&self.to_bytes())
    }

    /// P2SH address paying to this script
    pub fn address(&self, params: &NetworkParams) -> String {
        encode_p2sh(&self.to_bytes(), params)
    }
}

/// BuildP2PKHSpendScript: <sig> <pubkey>
pub fn build_p2pkh_spend_script(signature: &Signature, pubkey: &PublicKey) -> ByteString {
    let mut script = Vec::with_capacity(signature.len() + COMPRESSED_PUBKEY_SIZE + 2);
    push_data(&mut script, signature.as_bytes());
    push_data(&mut script, &pubkey.to_bytes());
    script
}

/// BuildP2SHSpendScript: OP_0 <sig>.. <redeem script>
///
/// Signatures are emitted in slot order, which is the key order of the
/// redeem script. Empty slots are skipped and at most M signatures are
/// emitted, since CHECKMULTISIG consumes exactly M. The leading OP_0 is the
/// extra element CHECKMULTISIG pops, not a slot.
pub fn build_p2sh_spend_script(slots: &SignatureSlots, redeem_script: &RedeemScript) -> ByteString {
    let mut script = vec![OP_0];
    for signature in slots.filled().take(redeem_script.threshold()) {
        push_data(&mut script, signature.as_bytes());
    }
    push_data(&mut script, &redeem_script.to_bytes());
    script
}

/// Data-carrier output script: OP_RETURN <data>
pub fn data_carrier_script(data: &[u8]) -> ByteString {
    let mut script = vec![OP_RETURN];
    if !data.is_empty() {
        push_data(&mut script, data);
    }
    script
}
