//! # dogecoin-tx
//!
//! Key derivation, address encoding and legacy transaction signing for
//! Dogecoin, with support for M-of-N P2SH multisig.
//!
//! ## Architecture
//!
//! The crate is layered bottom-up:
//! - Primitives (`hash`, `keys`, `address`, `script`)
//! - Transactions (`transaction`, `sighash`, `signer`)
//! - Co-signing (`multisig`, checked by the `interpreter`)
//! - The hex-boundary [`Dogecoin`] facade
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: every operation takes its inputs by reference and
//!    returns a new value; nothing is mutated in place
//! 2. **Order-Independent Co-Signing**: multisig signatures are slotted by the
//!    key they verify against, not by arrival order
//! 3. **Exact Version Pinning**: cryptographic dependencies are pinned
//!
//! ## Usage
//!
//! ```rust
//! use dogecoin_tx::{Dogecoin, Network};
//!
//! let doge = Dogecoin::new(Network::Testnet);
//! let privkey = doge
//!     .generate_my_privkey("flame flock chunk trim modify raise rough client coin busy income smile")
//!     .unwrap();
//! let pubkey = doge.generate_my_pubkey(&privkey).unwrap();
//! let address = doge.generate_address(&pubkey).unwrap();
//! assert_eq!(address, "nXyX8zFnwRjF4HyHiwHSc3rVbvxBZyq349");
//! ```

pub mod address;
pub mod constants;
pub mod error;
pub mod hash;
pub mod interpreter;
pub mod keys;
pub mod multisig;
pub mod network;
pub mod script;
pub mod sighash;
pub mod signer;
pub mod transaction;
pub mod types;

// Re-export commonly used types
pub use error::{AddressError, DogecoinError, Result};
pub use keys::{PrivateKey, PublicKey};
pub use multisig::SignatureSlots;
pub use network::{Network, NetworkParams};
pub use script::RedeemScript;
pub use sighash::{SighashType, SigningContext};
pub use signer::Signature;
pub use types::*;

/// Hex and base58 boundary over the typed API
///
/// Every binary value enters and leaves as lowercase hex; addresses as
/// base58-check strings.
///
/// # Examples
///
/// ```
/// use dogecoin_tx::{Dogecoin, Network};
///
/// let doge = Dogecoin::new(Network::Mainnet);
/// let pubkey = "032f7e2f0f3e912bf416234913b388393beb5092418fea986e45c0b9633adefd85";
/// assert_eq!(
///     doge.generate_address(pubkey).unwrap(),
///     "D8vTQyWt1TGXBKQ6h7dzMeGCN4ZteEKNXE"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dogecoin {
    params: NetworkParams,
}

impl Dogecoin {
    /// Facade for one of the built-in networks
    pub fn new(network: Network) -> Self {
        Self {
            params: network.params(),
        }
    }

    /// Facade for custom network parameters, e.g. loaded from JSON
    ///
    /// ```
    /// use dogecoin_tx::{Dogecoin, NetworkParams};
    ///
    /// let params = NetworkParams::from_json(
    ///     r#"{"p2pkh_version":113,"p2sh_version":196,"sighash_type":"all"}"#,
    /// )
    /// .unwrap();
    /// let doge = Dogecoin::with_params(params);
    /// assert_eq!(doge.params().p2sh_version, 0xc4);
    /// ```
    pub fn with_params(params: NetworkParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &NetworkParams {
        &self.params
    }

    /// Private key hex from a mnemonic phrase with an empty passphrase
    pub fn generate_my_privkey(&self, words: &str) -> Result<String> {
        self.generate_my_privkey_with_salt(words, "")
    }

    /// Private key hex from a mnemonic phrase and passphrase
    pub fn generate_my_privkey_with_salt(&self, words: &str, salt: &str) -> Result<String> {
        Ok(keys::derive_private_key(words, salt)?.to_hex())
    }

    /// Compressed public key hex for a private key hex
    pub fn generate_my_pubkey(&self, privkey: &str) -> Result<String> {
        Ok(PrivateKey::from_hex(privkey)?.public_key().to_hex())
    }

    /// P2PKH address for a compressed public key hex
    pub fn generate_address(&self, pubkey: &str) -> Result<String> {
        let pubkey = PublicKey::from_hex(pubkey)?;
        Ok(address::encode_p2pkh(&pubkey, &self.params))
    }

    /// M-of-N redeem script hex; key order is preserved
    ///
    /// ```
    /// use dogecoin_tx::{Dogecoin, DogecoinError, Network};
    ///
    /// let doge = Dogecoin::new(Network::Testnet);
    /// let keys = [
    ///     "032f7e2f0f3e912bf416234913b388393beb5092418fea986e45c0b9633adefd85",
    ///     "02a09e8182977710bab64472c0ecaf9e52255a890554a00a62facd05c0b13817f8",
    /// ];
    /// let redeem = doge.generate_redeem_script(&keys, 2).unwrap();
    /// assert!(redeem.starts_with("52") && redeem.ends_with("52ae"));
    ///
    /// assert!(matches!(
    ///     doge.generate_redeem_script(&keys, 3),
    ///     Err(DogecoinError::InvalidRedeemScript(_))
    /// ));
    /// ```
    pub fn generate_redeem_script(&self, pubkeys: &[&str], threshold: u32) -> Result<String> {
        let pubkeys = pubkeys
            .iter()
            .map(|key| PublicKey::from_hex(key))
            .collect::<Result<Vec<_>>>()?;
        Ok(RedeemScript::new(pubkeys, threshold as usize)?.to_hex())
    }

    /// P2SH address for a redeem script hex
    pub fn generate_multisig_address(&self, redeem_script: &str) -> Result<String> {
        Ok(RedeemScript::from_hex(redeem_script)?.address(&self.params))
    }

    /// Unsigned transaction hex spending `txids[i]:indexes[i]` and paying
    /// `amounts[j]` koinu to `addresses[j]`
    pub fn generate_raw_transaction(
        &self,
        txids: &[&str],
        indexes: &[u32],
        addresses: &[&str],
        amounts: &[u64],
    ) -> Result<String> {
        Ok(
            transaction::build_raw_transaction(txids, indexes, addresses, amounts, &self.params)?
                .to_hex(),
        )
    }

    /// Digest hex to sign for the input spending `txid:index`
    ///
    /// `sig_type` 0 takes a public key hex as `script`, 1 a redeem script hex.
    pub fn generate_sighash(
        &self,
        base_tx: &str,
        txid: &str,
        index: u32,
        sig_type: u32,
        script: &str,
    ) -> Result<String> {
        let tx = Transaction::from_hex(base_tx)?;
        let input = sighash::find_input(&tx, &OutPoint::from_hex(txid, index)?)?;
        let ctx = self.context(sig_type, script)?;
        Ok(hex::encode(sighash::compute_digest(&tx, input, &ctx)?))
    }

    /// Signature hex (DER plus sighash byte) over a 32-byte digest hex
    pub fn generate_signature(&self, message: &str, privkey: &str) -> Result<String> {
        let bytes = hex::decode(message)?;
        let digest: Hash = bytes.as_slice().try_into().map_err(|_| {
            DogecoinError::InvalidEncoding(format!("digest must be 32 bytes, got {}", bytes.len()))
        })?;
        let privkey = PrivateKey::from_hex(privkey)?;
        Ok(signer::sign(&digest, &privkey, self.params.sighash_type)?.to_hex())
    }

    /// Transaction hex with `signature` applied to the input spending
    /// `txid:index`
    ///
    /// For P2SH inputs this is called once per co-signer, in any order, each
    /// time on the output of the previous call.
    pub fn build_tx(
        &self,
        base_tx: &str,
        signature: &str,
        txid: &str,
        index: u32,
        sig_type: u32,
        script: &str,
    ) -> Result<String> {
        let tx = Transaction::from_hex(base_tx)?;
        let signature = Signature::from_hex(signature)?;
        let input = sighash::find_input(&tx, &OutPoint::from_hex(txid, index)?)?;
        let ctx = self.context(sig_type, script)?;
        Ok(multisig::apply_signature(&tx, input, &ctx, &signature)?.to_hex())
    }

    fn context(&self, sig_type: u32, script: &str) -> Result<SigningContext> {
        Ok(SigningContext::from_parts(sig_type, &hex::decode(script)?)?
            .with_sighash_type(self.params.sighash_type))
    }
}

impl Default for Dogecoin {
    fn default() -> Self {
        Self::new(Network::Mainnet)
    }
}
