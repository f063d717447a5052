//! Base58-check address encoding for P2PKH and P2SH outputs

use crate::constants::*;
use crate::error::{AddressError, DogecoinError, Result};
use crate::hash::{checksum, hash160};
use crate::keys::PublicKey;
use crate::network::NetworkParams;
use crate::types::{ByteString, Hash160};
use std::fmt;
use std::str::FromStr;

/// Decoded address: version byte and the 20-byte payload hash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    pub version: u8,
    pub hash: Hash160,
}

/// Output type an address pays to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressKind {
    P2pkh,
    P2sh,
}

impl Address {
    pub fn new(version: u8, hash: Hash160) -> Self {
        Self { version, hash }
    }

    /// base58(version ‖ hash160 ‖ checksum)
    pub fn encode(&self) -> String {
        let mut bytes = Vec::with_capacity(1 + HASH160_SIZE + 4);
        bytes.push(self.version);
        bytes.extend_from_slice(&self.hash);
        let check = checksum(&bytes);
        bytes.extend_from_slice(&check);
        bs58::encode(bytes).into_string()
    }

    /// Which output type this address pays to under `params`
    pub fn kind(&self, params: &NetworkParams) -> Result<AddressKind> {
        if self.version == params.p2pkh_version {
            Ok(AddressKind::P2pkh)
        } else if self.version == params.p2sh_version {
            Ok(AddressKind::P2sh)
        } else {
            Err(AddressError::Version(self.version).into())
        }
    }

    /// Canonical script_pubkey paying to this address
    pub fn script_pubkey(&self, params: &NetworkParams) -> Result<ByteString> {
        Ok(match self.kind(params)? {
            AddressKind::P2pkh => p2pkh_script_pubkey(&self.hash),
            AddressKind::P2sh => p2sh_script_pubkey(&self.hash),
        })
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for Address {
    type Err = DogecoinError;

    fn from_str(s: &str) -> Result<Self> {
        decode(s)
    }
}

/// OP_DUP OP_HASH160 <hash> OP_EQUALVERIFY OP_CHECKSIG
pub fn p2pkh_script_pubkey(hash: &Hash160) -> ByteString {
    let mut script = Vec::with_capacity(25);
    script.push(OP_DUP);
    script.push(OP_HASH160);
    script.push(HASH160_SIZE as u8);
    script.extend_from_slice(hash);
    script.push(OP_EQUALVERIFY);
    script.push(OP_CHECKSIG);
    script
}

/// OP_HASH160 <hash> OP_EQUAL
pub fn p2sh_script_pubkey(hash: &Hash160) -> ByteString {
    let mut script = Vec::with_capacity(23);
    script.push(OP_HASH160);
    script.push(HASH160_SIZE as u8);
    script.extend_from_slice(hash);
    script.push(OP_EQUAL);
    script
}

/// EncodeP2PKH: pubkey × network → address
pub fn encode_p2pkh(pubkey: &PublicKey, params: &NetworkParams) -> String {
    Address::new(params.p2pkh_version, hash160(&pubkey.to_bytes())).encode()
}

/// EncodeP2SH: redeem script × network → address
pub fn encode_p2sh(redeem_script: &[u8], params: &NetworkParams) -> String {
    Address::new(params.p2sh_version, hash160(redeem_script)).encode()
}

/// Decode: address → (version, hash160)
///
/// Accepts any version byte; use [`decode_for_network`] to pin the network.
pub fn decode(address: &str) -> Result<Address> {
    let bytes = bs58::decode(address).into_vec()?;
    if bytes.len() != 1 + HASH160_SIZE + 4 {
        return Err(AddressError::Length(bytes.len()).into());
    }

    let (payload, check) = bytes.split_at(1 + HASH160_SIZE);
    if checksum(payload)[..] != *check {
        return Err(AddressError::Checksum.into());
    }

    let mut hash = [0u8; HASH160_SIZE];
    hash.copy_from_slice(&payload[1..]);
    Ok(Address::new(payload[0], hash))
}

/// Decode and require a version byte belonging to `params`
pub fn decode_for_network(address: &str, params: &NetworkParams) -> Result<Address> {
    let decoded = decode(address)?;
    if !params.accepts_version(decoded.version) {
        return Err(AddressError::Version(decoded.version).into());
    }
    Ok(decoded)
}
