//! Key derivation: mnemonic -> private key -> compressed public key

use crate::constants::{COMPRESSED_PUBKEY_SIZE, MNEMONIC_PBKDF2_ROUNDS, MNEMONIC_SALT_PREFIX};
use crate::error::{DogecoinError, Result};
use crate::hash::sha256;
use log::debug;
use pbkdf2::pbkdf2_hmac;
use secp256k1::{Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use std::fmt;

/// Non-zero secp256k1 scalar below the curve order
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PrivateKey(SecretKey);

impl PrivateKey {
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        SecretKey::from_slice(bytes)
            .map(PrivateKey)
            .map_err(|e| DogecoinError::InvalidPrivateKey(e.to_string()))
    }

    pub fn from_hex(hex_key: &str) -> Result<Self> {
        let bytes = hex::decode(hex_key)?;
        Self::from_slice(&bytes)
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.secret_bytes()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn public_key(&self) -> PublicKey {
        derive_public_key(self)
    }

    pub(crate) fn secret_key(&self) -> &SecretKey {
        &self.0
    }
}

// Keep key material out of logs and panic messages.
impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

/// Compressed secp256k1 public key
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey(secp256k1::PublicKey);

impl PublicKey {
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != COMPRESSED_PUBKEY_SIZE {
            return Err(DogecoinError::InvalidPublicKey(format!(
                "expected {} compressed bytes, got {}",
                COMPRESSED_PUBKEY_SIZE,
                bytes.len()
            )));
        }
        secp256k1::PublicKey::from_slice(bytes)
            .map(PublicKey)
            .map_err(|e| DogecoinError::InvalidPublicKey(e.to_string()))
    }

    pub fn from_hex(hex_key: &str) -> Result<Self> {
        let bytes = hex::decode(hex_key)?;
        Self::from_slice(&bytes)
    }

    pub fn to_bytes(&self) -> [u8; COMPRESSED_PUBKEY_SIZE] {
        self.0.serialize()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub(crate) fn inner(&self) -> &secp256k1::PublicKey {
        &self.0
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// DerivePrivateKey: words × salt → k
///
/// 1. Collapse whitespace in `words`; an empty phrase is rejected
/// 2. seed = PBKDF2-HMAC-SHA512(phrase, "mnemonic" ‖ salt, 2048)
/// 3. k = seed[0..32]
/// 4. While k = 0 or k ≥ n: k = SHA256(seed ‖ counter), counter = 1, 2, ...
pub fn derive_private_key(words: &str, salt: &str) -> Result<PrivateKey> {
    let phrase = words.split_whitespace().collect::<Vec<_>>().join(" ");
    if phrase.is_empty() {
        return Err(DogecoinError::InvalidMnemonic("empty phrase".to_string()));
    }

    let mut seed = [0u8; 64];
    let full_salt = format!("{}{}", MNEMONIC_SALT_PREFIX, salt);
    pbkdf2_hmac::<Sha512>(
        phrase.as_bytes(),
        full_salt.as_bytes(),
        MNEMONIC_PBKDF2_ROUNDS,
        &mut seed,
    );

    Ok(scalar_from_seed(&seed))
}

/// First 32 seed bytes as a scalar, or SHA256(seed ‖ counter) for
/// counter = 1, 2, ... until the result is a valid scalar
fn scalar_from_seed(seed: &[u8; 64]) -> PrivateKey {
    if let Ok(key) = SecretKey::from_slice(&seed[..32]) {
        return PrivateKey(key);
    }

    let mut counter: u32 = 0;
    loop {
        counter = counter.wrapping_add(1);
        let mut data = seed.to_vec();
        data.extend_from_slice(&counter.to_le_bytes());
        if let Ok(key) = SecretKey::from_slice(&sha256(&data)) {
            debug!("mnemonic scalar out of range, re-derived after {} rounds", counter);
            return PrivateKey(key);
        }
    }
}

/// DerivePublicKey: k → k·G (compressed)
pub fn derive_public_key(private_key: &PrivateKey) -> PublicKey {
    let secp = Secp256k1::signing_only();
    PublicKey(secp256k1::PublicKey::from_secret_key(&secp, private_key.secret_key()))
}
