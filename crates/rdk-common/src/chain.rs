//! Chain primitives
//!
//! EVM chains the kit knows about, plus the two fixed-width values every chain interaction
//! passes around: account/contract [`Address`]es and transaction hashes ([`TxHash`]).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Chain primitive error
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// Unknown chain name or id
    #[error("Unknown chain: `{0}`")]
    UnknownChain(String),
    /// Invalid address
    #[error("Invalid address: `{0}`")]
    InvalidAddress(String),
    /// Invalid transaction hash
    #[error("Invalid transaction hash: `{0}`")]
    InvalidTxHash(String),
}

/// Supported EVM chains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    /// Ethereum mainnet
    Ethereum,
    /// Optimism mainnet
    Optimism,
    /// Base mainnet
    Base,
    /// Arbitrum One
    Arbitrum,
    /// Polygon PoS
    Polygon,
    /// Celo mainnet
    Celo,
    /// Celo Alfajores testnet
    Alfajores,
}

impl Chain {
    /// All known chains
    pub const ALL: [Chain; 7] = [
        Chain::Ethereum,
        Chain::Optimism,
        Chain::Base,
        Chain::Arbitrum,
        Chain::Polygon,
        Chain::Celo,
        Chain::Alfajores,
    ];

    /// EIP-155 chain id
    pub fn id(&self) -> u64 {
        match self {
            Chain::Ethereum => 1,
            Chain::Optimism => 10,
            Chain::Base => 8453,
            Chain::Arbitrum => 42161,
            Chain::Polygon => 137,
            Chain::Celo => 42220,
            Chain::Alfajores => 44787,
        }
    }

    /// Display name
    pub fn name(&self) -> &'static str {
        match self {
            Chain::Ethereum => "Ethereum",
            Chain::Optimism => "Optimism",
            Chain::Base => "Base",
            Chain::Arbitrum => "Arbitrum",
            Chain::Polygon => "Polygon",
            Chain::Celo => "Celo",
            Chain::Alfajores => "Alfajores",
        }
    }

    /// Look a chain up by its EIP-155 id
    pub fn from_id(id: u64) -> Option<Chain> {
        Chain::ALL.into_iter().find(|chain| chain.id() == id)
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name().to_lowercase())
    }
}

impl FromStr for Chain {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();

        if let Ok(id) = normalized.parse::<u64>() {
            return Chain::from_id(id).ok_or(Error::UnknownChain(s.to_owned()));
        }

        match normalized.as_str() {
            "ethereum" | "mainnet" => Ok(Chain::Ethereum),
            "optimism" | "op" => Ok(Chain::Optimism),
            "base" => Ok(Chain::Base),
            "arbitrum" => Ok(Chain::Arbitrum),
            "polygon" => Ok(Chain::Polygon),
            "celo" => Ok(Chain::Celo),
            "alfajores" => Ok(Chain::Alfajores),
            _ => Err(Error::UnknownChain(s.to_owned())),
        }
    }
}

fn decode_fixed_hex<const N: usize>(value: &str) -> Option<[u8; N]> {
    let stripped = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X"))?;
    if stripped.len() != N * 2 {
        return None;
    }

    let bytes = hex::decode(stripped).ok()?;
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Some(out)
}

/// 20 byte account or contract address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; 20]);

impl Address {
    /// The zero address
    pub const ZERO: Address = Address([0u8; 20]);

    /// Create from raw bytes
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed_hex::<20>(s.trim())
            .map(Address)
            .ok_or(Error::InvalidAddress(s.to_owned()))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// 32 byte transaction hash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxHash([u8; 32]);

impl TxHash {
    /// Create from raw bytes
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl FromStr for TxHash {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed_hex::<32>(s.trim())
            .map(TxHash)
            .ok_or(Error::InvalidTxHash(s.to_owned()))
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Serialize for TxHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TxHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        TxHash::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_from_str() {
        assert_eq!(Chain::from_str("Celo").unwrap(), Chain::Celo);
        assert_eq!(Chain::from_str("10").unwrap(), Chain::Optimism);
        assert_eq!(Chain::from_str(" OPTIMISM ").unwrap(), Chain::Optimism);
        assert!(Chain::from_str("solana").is_err());
        assert_eq!(Chain::Celo.to_string(), "celo");
    }

    #[test]
    fn test_address_round_trip() {
        let address = Address::from_str("0x765DE816845861e75A25fCA122bb6898B8B1282a").unwrap();
        assert_eq!(
            address.to_string(),
            "0x765de816845861e75a25fca122bb6898b8b1282a"
        );
        assert!(Address::from_str("0x1234").is_err());
        assert!(Address::from_str("765de816845861e75a25fca122bb6898b8b1282a").is_err());
    }

    #[test]
    fn test_tx_hash_parsing() {
        let hash = format!("0x{}", "a".repeat(64));
        assert_eq!(TxHash::from_str(&hash).unwrap().to_string(), hash);
        assert!(TxHash::from_str(&format!("0x{}", "g".repeat(64))).is_err());
        assert!(TxHash::from_str(&"a".repeat(66)).is_err());
    }
}
