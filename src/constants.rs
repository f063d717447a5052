//! Dogecoin chain constants and script opcodes

/// Mainnet P2PKH version byte (addresses start with `D`)
pub const MAINNET_P2PKH_VERSION: u8 = 0x1e;

/// Mainnet P2SH version byte (addresses start with `9` or `A`)
pub const MAINNET_P2SH_VERSION: u8 = 0x16;

/// Testnet P2PKH version byte (addresses start with `n`)
pub const TESTNET_P2PKH_VERSION: u8 = 0x71;

/// Testnet P2SH version byte (addresses start with `2`)
pub const TESTNET_P2SH_VERSION: u8 = 0xc4;

/// Sighash flags
pub const SIGHASH_ALL: u32 = 0x01;
pub const SIGHASH_NONE: u32 = 0x02;
pub const SIGHASH_SINGLE: u32 = 0x03;
pub const SIGHASH_ANYONECANPAY: u32 = 0x80;

/// Version of transactions produced by the builder
pub const DEFAULT_TX_VERSION: u32 = 1;

/// Lock time of transactions produced by the builder
pub const DEFAULT_LOCK_TIME: u32 = 0;

/// Sequence number for final inputs
pub const SEQUENCE_FINAL: u32 = 0xffffffff;

/// Maximum number of keys in a bare CHECKMULTISIG redeem script
pub const MAX_MULTISIG_KEYS: usize = 16;

/// PBKDF2 rounds used when stretching a mnemonic
pub const MNEMONIC_PBKDF2_ROUNDS: u32 = 2048;

/// Salt prefix applied before the caller's passphrase
pub const MNEMONIC_SALT_PREFIX: &str = "mnemonic";

/// Size of a compressed public key
pub const COMPRESSED_PUBKEY_SIZE: usize = 33;

/// Size of a RIPEMD160(SHA256(x)) hash
pub const HASH160_SIZE: usize = 20;

// Opcodes used by the script builder and interpreter
pub const OP_0: u8 = 0x00;
pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;
pub const OP_PUSHDATA4: u8 = 0x4e;
pub const OP_1NEGATE: u8 = 0x4f;
pub const OP_1: u8 = 0x51;
pub const OP_16: u8 = 0x60;
pub const OP_VERIFY: u8 = 0x69;
pub const OP_RETURN: u8 = 0x6a;
pub const OP_DUP: u8 = 0x76;
pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_CHECKSIG: u8 = 0xac;
pub const OP_CHECKSIGVERIFY: u8 = 0xad;
pub const OP_CHECKMULTISIG: u8 = 0xae;
pub const OP_CHECKMULTISIGVERIFY: u8 = 0xaf;

/// Maximum stack size during script execution
pub const MAX_STACK_SIZE: usize = 1000;

/// Maximum number of non-push operations in a script
pub const MAX_SCRIPT_OPS: usize = 201;

/// Maximum script length
pub const MAX_SCRIPT_SIZE: usize = 10_000;
