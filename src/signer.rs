//! Deterministic ECDSA signing with DER encoding and low-s normalization

use crate::error::{DogecoinError, Result};
use crate::keys::{PrivateKey, PublicKey};
use crate::sighash::SighashType;
use crate::types::{ByteString, Hash};
use log::trace;
use secp256k1::{ecdsa, Message, Secp256k1};
use serde::{Deserialize, Serialize};

/// Shortest and longest DER signatures plus the trailing sighash byte
const MIN_SIGNATURE_SIZE: usize = 9;
const MAX_SIGNATURE_SIZE: usize = 73;

/// DER(r, s) followed by one sighash-type byte
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ByteString")]
pub struct Signature(ByteString);

impl TryFrom<ByteString> for Signature {
    type Error = DogecoinError;

    fn try_from(bytes: ByteString) -> Result<Self> {
        Signature::from_bytes(bytes)
    }
}

impl Signature {
    /// Wrap raw script-encoded signature bytes
    ///
    /// Only the length is checked here; the DER body is parsed when the
    /// signature is verified.
    pub fn from_bytes(bytes: ByteString) -> Result<Self> {
        if bytes.len() < MIN_SIGNATURE_SIZE || bytes.len() > MAX_SIGNATURE_SIZE {
            return Err(DogecoinError::InvalidEncoding(format!(
                "signature length {} outside {}..={}",
                bytes.len(),
                MIN_SIGNATURE_SIZE,
                MAX_SIGNATURE_SIZE
            )));
        }
        Ok(Signature(bytes))
    }

    pub fn from_hex(hex_sig: &str) -> Result<Self> {
        Self::from_bytes(hex::decode(hex_sig)?)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// DER body without the sighash byte
    pub fn der(&self) -> &[u8] {
        &self.0[..self.0.len() - 1]
    }

    /// Raw trailing sighash byte
    pub fn sighash_byte(&self) -> u8 {
        self.0[self.0.len() - 1]
    }
}

/// Sign: digest × k → DER(r, low s) ‖ sighash byte
///
/// The nonce is derived per RFC 6979 by libsecp256k1, so the same digest and
/// key always produce the same signature.
pub fn sign(digest: &Hash, private_key: &PrivateKey, sighash_type: SighashType) -> Result<Signature> {
    let secp = Secp256k1::signing_only();
    let message = Message::from_digest_slice(digest)
        .map_err(|e| DogecoinError::InvalidEncoding(format!("digest: {}", e)))?;

    let mut signature = secp.sign_ecdsa(&message, private_key.secret_key());
    signature.normalize_s();

    let mut bytes = signature.serialize_der().to_vec();
    bytes.push(sighash_type.to_u32() as u8);
    trace!("signed digest {} -> {}", hex::encode(digest), hex::encode(&bytes));
    Ok(Signature(bytes))
}

/// Verify a script-encoded signature against a digest and public key
///
/// High-s signatures are normalized before checking so that signatures
/// produced elsewhere still match their key.
pub fn verify(digest: &Hash, signature: &Signature, public_key: &PublicKey) -> bool {
    let secp = Secp256k1::verification_only();
    let message = match Message::from_digest_slice(digest) {
        Ok(msg) => msg,
        Err(_) => return false,
    };
    let mut parsed = match ecdsa::Signature::from_der(signature.der()) {
        Ok(sig) => sig,
        Err(_) => return false,
    };
    parsed.normalize_s();
    secp.verify_ecdsa(&message, &parsed, public_key.inner()).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::sha256d;
    use crate::keys::derive_private_key;

    fn key() -> PrivateKey {
        derive_private_key(
            "flame flock chunk trim modify raise rough client coin busy income smile",
            "",
        )
        .unwrap()
    }

    #[test]
    fn test_sign_is_deterministic() {
        let digest = sha256d(b"spend");
        let a = sign(&digest, &key(), SighashType::All).unwrap();
        let b = sign(&digest, &key(), SighashType::All).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_sign_appends_sighash_byte() {
        let digest = sha256d(b"spend");
        let signature = sign(&digest, &key(), SighashType::All).unwrap();
        assert_eq!(signature.sighash_byte(), 0x01);
        assert_eq!(signature.as_bytes()[0], 0x30);
        assert!(signature.len() >= 70 && signature.len() <= 73);
    }

    #[test]
    fn test_sign_produces_low_s() {
        let secp_order_half: [u8; 32] = [
            0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
            0xff, 0xff, 0x5d, 0x57, 0x6e, 0x73, 0x57, 0xa4, 0x50, 0x1d, 0xdf, 0xe9, 0x2f, 0x46,
            0x68, 0x1b, 0x20, 0xa0,
        ];
        for i in 0..16u8 {
            let digest = sha256d(&[i]);
            let signature = sign(&digest, &key(), SighashType::All).unwrap();
            let compact = ecdsa::Signature::from_der(signature.der())
                .unwrap()
                .serialize_compact();
            assert!(compact[32..] <= secp_order_half[..]);
        }
    }

    #[test]
    fn test_verify_accepts_own_signature() {
        let digest = sha256d(b"spend");
        let signature = sign(&digest, &key(), SighashType::All).unwrap();
        assert!(verify(&digest, &signature, &key().public_key()));
    }

    #[test]
    fn test_verify_rejects_other_digest_and_key() {
        let digest = sha256d(b"spend");
        let signature = sign(&digest, &key(), SighashType::All).unwrap();
        assert!(!verify(&sha256d(b"other"), &signature, &key().public_key()));

        let other = derive_private_key("another phrase", "").unwrap();
        assert!(!verify(&digest, &signature, &other.public_key()));
    }

    #[test]
    fn test_verify_rejects_malformed_der() {
        let signature = Signature::from_bytes(vec![0x30; 71]).unwrap();
        assert!(!verify(&sha256d(b"spend"), &signature, &key().public_key()));
    }

    #[test]
    fn test_signature_length_checked() {
        assert!(matches!(
            Signature::from_bytes(vec![0x30; 4]),
            Err(DogecoinError::InvalidEncoding(_))
        ));
        assert!(matches!(
            Signature::from_bytes(vec![0x30; 80]),
            Err(DogecoinError::InvalidEncoding(_))
        ));
        assert!(matches!(
            Signature::from_hex("zz"),
            Err(DogecoinError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn test_signature_serde_checks_length() {
        let signature = sign(&sha256d(b"spend"), &key(), SighashType::All).unwrap();
        let json = serde_json::to_string(&signature).unwrap();
        assert_eq!(serde_json::from_str::<Signature>(&json).unwrap(), signature);

        assert!(serde_json::from_str::<Signature>("[]").is_err());
        assert!(serde_json::from_str::<Signature>("[48, 1]").is_err());
        assert!(serde_json::from_str::<Signature>(&format!("{:?}", vec![48u8; 80])).is_err());
    }

    #[test]
    fn test_signature_hex_round_trip() {
        let signature = sign(&sha256d(b"spend"), &key(), SighashType::All).unwrap();
        assert_eq!(Signature::from_hex(&signature.to_hex()).unwrap(), signature);
    }
}
