//! Network selection and per-chain configuration

use crate::constants::*;
use crate::error::{DogecoinError, Result};
use crate::sighash::SighashType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported Dogecoin networks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    /// Built-in parameter table for this network
    pub fn params(self) -> NetworkParams {
        match self {
            Network::Mainnet => NetworkParams {
                p2pkh_version: MAINNET_P2PKH_VERSION,
                p2sh_version: MAINNET_P2SH_VERSION,
                sighash_type: SighashType::All,
            },
            Network::Testnet => NetworkParams {
                p2pkh_version: TESTNET_P2PKH_VERSION,
                p2sh_version: TESTNET_P2SH_VERSION,
                sighash_type: SighashType::All,
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
    }
}

impl FromStr for Network {
    type Err = DogecoinError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            other => Err(DogecoinError::InvalidEncoding(format!(
                "unknown network {:?}, expected \"mainnet\" or \"testnet\"",
                other
            ))),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Chain constants the engine reads instead of hardcoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkParams {
    pub p2pkh_version: u8,
    pub p2sh_version: u8,
    /// Sighash type committed to by digests and appended to signatures
    pub sighash_type: SighashType,
}

impl NetworkParams {
    /// Load a parameter table from JSON, e.g.
    /// `{"p2pkh_version":30,"p2sh_version":22,"sighash_type":"all"}`
    pub fn from_json(json: &str) -> Result<Self> {
        let params: NetworkParams = serde_json::from_str(json)
            .map_err(|e| DogecoinError::InvalidEncoding(format!("network params: {}", e)))?;
        if params.p2pkh_version == params.p2sh_version {
            return Err(DogecoinError::InvalidEncoding(
                "P2PKH and P2SH version bytes must differ".to_string(),
            ));
        }
        Ok(params)
    }

    pub fn to_json(&self) -> String {
        // Plain struct of integers and a unit enum; cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Does `version` belong to this network?
    pub fn accepts_version(&self, version: u8) -> bool {
        version == self.p2pkh_version || version == self.p2sh_version
    }
}

impl From<Network> for NetworkParams {
    fn from(network: Network) -> Self {
        network.params()
    }
}
