//! Transaction construction and wire serialization

use crate::address::{decode_for_network, p2pkh_script_pubkey, p2sh_script_pubkey, Address, AddressKind};
use crate::constants::*;
use crate::error::{DogecoinError, Result};
use crate::hash::sha256d;
use crate::network::NetworkParams;
use crate::types::*;
use log::debug;

/// Where an output sends its amount
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    P2pkh(Hash160),
    P2sh(Hash160),
    /// Raw script, e.g. an OP_RETURN data carrier
    Script(ByteString),
}

impl OutputTarget {
    /// Resolve an address to the output type its version byte selects
    pub fn from_address(address: &Address, params: &NetworkParams) -> Result<Self> {
        Ok(match address.kind(params)? {
            AddressKind::P2pkh => OutputTarget::P2pkh(address.hash),
            AddressKind::P2sh => OutputTarget::P2sh(address.hash),
        })
    }

    pub fn script_pubkey(&self) -> ByteString {
        match self {
            OutputTarget::P2pkh(hash) => p2pkh_script_pubkey(hash),
            OutputTarget::P2sh(hash) => p2sh_script_pubkey(hash),
            OutputTarget::Script(script) => script.clone(),
        }
    }
}

/// NewBase: one unsigned input, no outputs, default version and lock time
pub fn new_base(first_utxo: OutPoint) -> Transaction {
    Transaction {
        version: DEFAULT_TX_VERSION,
        inputs: vec![TransactionInput::unsigned(first_utxo)],
        outputs: Vec::new(),
        lock_time: DEFAULT_LOCK_TIME,
    }
}

/// AddInput: append an unsigned input
pub fn add_input(tx: &Transaction, utxo: OutPoint) -> Transaction {
    let mut next = tx.clone();
    next.inputs.push(TransactionInput::unsigned(utxo));
    next
}

/// AddOutput: append an output paying `amount` to `target`
pub fn add_output(tx: &Transaction, target: OutputTarget, amount: u64) -> Transaction {
    let mut next = tx.clone();
    next.outputs.push(TransactionOutput {
        value: amount,
        script_pubkey: target.script_pubkey(),
    });
    next
}

/// Build an unsigned transaction from parallel reference arrays
///
/// `txids[i]`/`indexes[i]` name the spent outputs and `addresses[i]`/
/// `amounts[i]` the payments. All arguments are validated before anything
/// is built.
pub fn build_raw_transaction(
    txids: &[&str],
    indexes: &[u32],
    addresses: &[&str],
    amounts: &[u64],
    params: &NetworkParams,
) -> Result<Transaction> {
    if txids.len() != indexes.len() {
        return Err(DogecoinError::InvalidTransactionInput(format!(
            "{} txids but {} indexes",
            txids.len(),
            indexes.len()
        )));
    }
    if addresses.len() != amounts.len() {
        return Err(DogecoinError::InvalidTransactionInput(format!(
            "{} addresses but {} amounts",
            addresses.len(),
            amounts.len()
        )));
    }
    if txids.is_empty() {
        return Err(DogecoinError::InvalidTransactionInput(
            "at least one input is required".to_string(),
        ));
    }

    let utxos = txids
        .iter()
        .zip(indexes)
        .map(|(txid, index)| OutPoint::from_hex(txid, *index))
        .collect::<Result<Vec<_>>>()?;
    let targets = addresses
        .iter()
        .map(|address| {
            let decoded = decode_for_network(address, params)?;
            OutputTarget::from_address(&decoded, params)
        })
        .collect::<Result<Vec<_>>>()?;

    let mut tx = new_base(utxos[0]);
    for utxo in &utxos[1..] {
        tx = add_input(&tx, *utxo);
    }
    for (target, amount) in targets.into_iter().zip(amounts) {
        tx = add_output(&tx, target, *amount);
    }

    debug!(
        "built raw transaction with {} inputs and {} outputs",
        tx.inputs.len(),
        tx.outputs.len()
    );
    Ok(tx)
}

/// Encode a number as a compact-size integer
pub fn encode_varint(value: u64) -> Vec<u8> {
    if value < 0xfd {
        vec![value as u8]
    } else if value <= 0xffff {
        let mut result = vec![0xfd];
        result.extend_from_slice(&(value as u16).to_le_bytes());
        result
    } else if value <= 0xffffffff {
        let mut result = vec![0xfe];
        result.extend_from_slice(&(value as u32).to_le_bytes());
        result
    } else {
        let mut result = vec![0xff];
        result.extend_from_slice(&value.to_le_bytes());
        result
    }
}

/// Serialize: tx → bytes
///
/// version ‖ n_in ‖ (txid ‖ index ‖ len ‖ script ‖ sequence)* ‖
/// n_out ‖ (value ‖ len ‖ script)* ‖ lock_time
pub fn serialize_transaction(tx: &Transaction) -> ByteString {
    let mut out = Vec::new();
    out.extend_from_slice(&tx.version.to_le_bytes());

    out.extend_from_slice(&encode_varint(tx.inputs.len() as u64));
    for input in &tx.inputs {
        out.extend_from_slice(&input.prevout.txid);
        out.extend_from_slice(&input.prevout.index.to_le_bytes());
        let script = input.script_sig.to_bytes();
        out.extend_from_slice(&encode_varint(script.len() as u64));
        out.extend_from_slice(&script);
        out.extend_from_slice(&input.sequence.to_le_bytes());
    }

    out.extend_from_slice(&encode_varint(tx.outputs.len() as u64));
    for output in &tx.outputs {
        out.extend_from_slice(&output.value.to_le_bytes());
        out.extend_from_slice(&encode_varint(output.script_pubkey.len() as u64));
        out.extend_from_slice(&output.script_pubkey);
    }

    out.extend_from_slice(&tx.lock_time.to_le_bytes());
    out
}

/// Cursor over serialized transaction bytes
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| {
                DogecoinError::InvalidEncoding(format!(
                    "transaction truncated at offset {}, wanted {} more bytes",
                    self.pos, len
                ))
            })?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16> {
        let mut buf = [0u8; 2];
        buf.copy_from_slice(self.take(2)?);
        Ok(u16::from_le_bytes(buf))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(buf))
    }

    fn read_u64(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(buf))
    }

    /// Compact-size integer; only the minimal encoding is accepted so that
    /// re-serializing reproduces the input bytes
    fn read_varint(&mut self) -> Result<u64> {
        let (value, min) = match self.read_u8()? {
            0xfd => (self.read_u16()? as u64, 0xfd),
            0xfe => (self.read_u32()? as u64, 0x1_0000),
            0xff => (self.read_u64()?, 0x1_0000_0000),
            n => return Ok(n as u64),
        };
        if value < min {
            return Err(DogecoinError::InvalidEncoding(format!(
                "non-minimal compact size for {}",
                value
            )));
        }
        Ok(value)
    }

    /// Length prefix that must fit in the remaining bytes
    fn read_len(&mut self) -> Result<usize> {
        let len = self.read_varint()?;
        let remaining = (self.data.len() - self.pos) as u64;
        if len > remaining {
            return Err(DogecoinError::InvalidEncoding(format!(
                "length {} exceeds remaining {} bytes",
                len, remaining
            )));
        }
        Ok(len as usize)
    }

    fn read_bytes(&mut self) -> Result<ByteString> {
        let len = self.read_len()?;
        Ok(self.take(len)?.to_vec())
    }

    fn is_empty(&self) -> bool {
        self.pos == self.data.len()
    }
}

/// Deserialize: bytes → tx (inverse of [`serialize_transaction`])
pub fn deserialize_transaction(bytes: &[u8]) -> Result<Transaction> {
    let mut reader = Reader::new(bytes);
    let version = reader.read_u32()?;

    let input_count = reader.read_len()?;
    let mut inputs = Vec::with_capacity(input_count);
    for _ in 0..input_count {
        let mut txid = [0u8; 32];
        txid.copy_from_slice(reader.take(32)?);
        let index = reader.read_u32()?;
        let script_sig = reader.read_bytes()?;
        let sequence = reader.read_u32()?;
        inputs.push(TransactionInput {
            prevout: OutPoint { txid, index },
            script_sig: InputScript::Raw(script_sig),
            sequence,
        });
    }

    let output_count = reader.read_len()?;
    let mut outputs = Vec::with_capacity(output_count);
    for _ in 0..output_count {
        let value = reader.read_u64()?;
        let script_pubkey = reader.read_bytes()?;
        outputs.push(TransactionOutput { value, script_pubkey });
    }

    let lock_time = reader.read_u32()?;
    if !reader.is_empty() {
        return Err(DogecoinError::InvalidEncoding(format!(
            "{} trailing bytes after transaction",
            bytes.len() - reader.pos
        )));
    }

    Ok(Transaction {
        version,
        inputs,
        outputs,
        lock_time,
    })
}

impl Transaction {
    pub fn serialize(&self) -> ByteString {
        serialize_transaction(self)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        deserialize_transaction(bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.serialize())
    }

    pub fn from_hex(hex_tx: &str) -> Result<Self> {
        Self::deserialize(&hex::decode(hex_tx)?)
    }

    /// Display-order transaction id
    pub fn txid(&self) -> String {
        let mut hash = sha256d(&self.serialize());
        hash.reverse();
        hex::encode(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Network;

    const TXID_A: &str = "0101010101010101010101010101010101010101010101010101010101010101";
    const TXID_B: &str = "a1b2c3d4e5f60718293a4b5c6d7e8f90a1b2c3d4e5f60718293a4b5c6d7e8f90";

    #[test]
    fn test_new_base_defaults() {
        let tx = new_base(OutPoint::new([1; 32], 5));
        assert_eq!(tx.version, DEFAULT_TX_VERSION);
        assert_eq!(tx.lock_time, DEFAULT_LOCK_TIME);
        assert_eq!(tx.inputs.len(), 1);
        assert!(tx.outputs.is_empty());
        assert_eq!(tx.inputs[0].prevout.index, 5);
    }

    #[test]
    fn test_add_input_preserves_order_and_original() {
        let base = new_base(OutPoint::new([1; 32], 0));
        let tx = add_input(&base, OutPoint::new([2; 32], 1));
        let tx = add_input(&tx, OutPoint::new([3; 32], 2));
        assert_eq!(base.inputs.len(), 1);
        let indexes: Vec<u32> = tx.inputs.iter().map(|i| i.prevout.index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
    }

    #[test]
    fn test_serialize_layout() {
        let tx = new_base(OutPoint::new([0xaa; 32], 1));
        let tx = add_output(&tx, OutputTarget::Script(vec![0x51]), 0x0102);
        let bytes = serialize_transaction(&tx);

        let mut expected = vec![1, 0, 0, 0, 1];
        expected.extend_from_slice(&[0xaa; 32]);
        expected.extend_from_slice(&[1, 0, 0, 0]);
        expected.push(0);
        expected.extend_from_slice(&[0xff; 4]);
        expected.push(1);
        expected.extend_from_slice(&[0x02, 0x01, 0, 0, 0, 0, 0, 0]);
        expected.extend_from_slice(&[1, 0x51]);
        expected.extend_from_slice(&[0, 0, 0, 0]);
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_serialize_is_deterministic() {
        let tx = build_raw_transaction(
            &[TXID_A, TXID_B],
            &[0, 1],
            &["D8vTQyWt1TGXBKQ6h7dzMeGCN4ZteEKNXE"],
            &[100_000_000],
            &Network::Mainnet.params(),
        )
        .unwrap();
        assert_eq!(serialize_transaction(&tx), serialize_transaction(&tx.clone()));
    }

    #[test]
    fn test_deserialize_round_trip() {
        let tx = build_raw_transaction(
            &[TXID_A, TXID_B],
            &[0, 7],
            &["D8vTQyWt1TGXBKQ6h7dzMeGCN4ZteEKNXE", "AD3QpjjYuDD1nFhq7Nsv1f2hyfBHignMju"],
            &[5, 6],
            &Network::Mainnet.params(),
        )
        .unwrap();
        let bytes = tx.serialize();
        let parsed = Transaction::deserialize(&bytes).unwrap();
        assert_eq!(parsed, tx);
        assert_eq!(parsed.serialize(), bytes);
        assert_eq!(Transaction::from_hex(&tx.to_hex()).unwrap(), tx);
    }

    #[test]
    fn test_deserialize_rejects_truncated_and_trailing() {
        let tx = new_base(OutPoint::new([1; 32], 0));
        let bytes = tx.serialize();
        assert!(matches!(
            Transaction::deserialize(&bytes[..bytes.len() - 1]),
            Err(DogecoinError::InvalidEncoding(_))
        ));
        let mut extra = bytes.clone();
        extra.push(0);
        assert!(matches!(
            Transaction::deserialize(&extra),
            Err(DogecoinError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn test_deserialize_rejects_huge_counts() {
        let bytes = [1, 0, 0, 0, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff];
        assert!(matches!(
            Transaction::deserialize(&bytes),
            Err(DogecoinError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn test_deserialize_rejects_non_minimal_counts() {
        let tx = new_base(OutPoint::from_hex(TXID_A, 0).unwrap());
        let minimal = tx.serialize();
        assert_eq!(minimal[4], 1);

        // input count 1 written as fd 01 00
        let mut padded = minimal[..4].to_vec();
        padded.extend_from_slice(&[0xfd, 0x01, 0x00]);
        padded.extend_from_slice(&minimal[5..]);
        assert!(matches!(
            Transaction::deserialize(&padded),
            Err(DogecoinError::InvalidEncoding(_))
        ));

        for prefix in [
            vec![0xfd, 0xfc, 0x00],
            vec![0xfe, 0xff, 0xff, 0x00, 0x00],
            vec![0xff, 0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00],
        ] {
            let mut bytes = vec![1, 0, 0, 0];
            bytes.extend_from_slice(&prefix);
            assert!(matches!(
                Transaction::deserialize(&bytes),
                Err(DogecoinError::InvalidEncoding(_))
            ));
        }

        assert_eq!(Transaction::deserialize(&minimal).unwrap().serialize(), minimal);
    }

    #[test]
    fn test_from_hex_rejects_bad_hex() {
        assert!(matches!(
            Transaction::from_hex("0100zz"),
            Err(DogecoinError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn test_build_raw_transaction_mismatched_inputs() {
        let result = build_raw_transaction(
            &[TXID_A, TXID_B],
            &[0],
            &[],
            &[],
            &Network::Mainnet.params(),
        );
        assert!(matches!(result, Err(DogecoinError::InvalidTransactionInput(_))));
    }

    #[test]
    fn test_build_raw_transaction_mismatched_outputs() {
        let result = build_raw_transaction(
            &[TXID_A],
            &[0],
            &["D8vTQyWt1TGXBKQ6h7dzMeGCN4ZteEKNXE"],
            &[1, 2],
            &Network::Mainnet.params(),
        );
        assert!(matches!(result, Err(DogecoinError::InvalidTransactionInput(_))));
    }

    #[test]
    fn test_build_raw_transaction_requires_inputs() {
        let result = build_raw_transaction(&[], &[], &[], &[], &Network::Mainnet.params());
        assert!(matches!(result, Err(DogecoinError::InvalidTransactionInput(_))));
    }

    #[test]
    fn test_build_raw_transaction_rejects_wrong_network_address() {
        let result = build_raw_transaction(
            &[TXID_A],
            &[0],
            &["D8vTQyWt1TGXBKQ6h7dzMeGCN4ZteEKNXE"],
            &[1],
            &Network::Testnet.params(),
        );
        assert!(matches!(result, Err(DogecoinError::InvalidAddress(_))));
    }

    #[test]
    fn test_build_raw_transaction_output_scripts() {
        let tx = build_raw_transaction(
            &[TXID_A],
            &[0],
            &["nXyX8zFnwRjF4HyHiwHSc3rVbvxBZyq349", "2NDrN9dbgSbqU5fxuNNqNPUPbVS1RRTdpw3"],
            &[10, 20],
            &Network::Testnet.params(),
        )
        .unwrap();
        assert_eq!(
            hex::encode(&tx.outputs[0].script_pubkey),
            "76a914297c854e4eed2d880a9058d6aea24ce7b189f95e88ac"
        );
        assert_eq!(
            hex::encode(&tx.outputs[1].script_pubkey),
            "a914e207e30e7d94f0563d64f8d5527f1c22e874c92787"
        );
        assert_eq!(tx.outputs[1].value, 20);
    }

    #[test]
    fn test_build_raw_transaction_txid_order() {
        let tx = build_raw_transaction(&[TXID_B], &[3], &[], &[], &Network::Mainnet.params())
            .unwrap();
        assert_eq!(tx.inputs[0].prevout.txid_hex(), TXID_B);
        // Wire order is reversed display order
        let bytes = tx.serialize();
        assert_eq!(bytes[5], 0x90);
        assert_eq!(bytes[36], 0xa1);
    }

    #[test]
    fn test_txid_is_reversed_sha256d() {
        let tx = new_base(OutPoint::new([1; 32], 0));
        let mut hash = sha256d(&tx.serialize());
        hash.reverse();
        assert_eq!(tx.txid(), hex::encode(hash));
    }

    #[test]
    fn test_encode_varint_boundaries() {
        assert_eq!(encode_varint(0xfc), vec![0xfc]);
        assert_eq!(encode_varint(0xfd), vec![0xfd, 0xfd, 0x00]);
        assert_eq!(encode_varint(0x10000), vec![0xfe, 0x00, 0x00, 0x01, 0x00]);
        assert_eq!(encode_varint(0x100000000)[0], 0xff);
    }

    #[test]
    fn test_varint_round_trip_in_scripts() {
        let tx = new_base(OutPoint::new([1; 32], 0));
        let tx = add_output(&tx, OutputTarget::Script(vec![0x6a; 300]), 0);
        assert_eq!(Transaction::deserialize(&tx.serialize()).unwrap(), tx);
    }
}
