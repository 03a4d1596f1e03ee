//! Chain connector traits
//!
//! The core never signs or talks to a node directly. A [`WalletConnector`] is the external,
//! already authenticated wallet session that signs and submits transactions, a [`ChainReader`]
//! is a read-only view of a chain (contract calls and receipts).

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::amount::Amount;
use crate::chain::{Address, Chain, TxHash};

/// Connector Error
#[derive(Debug, Error)]
pub enum Error {
    /// Error reported by the wallet or node, kept verbatim for classification
    #[error("{0}")]
    Provider(String),
    /// JSON-RPC error object
    #[error("RPC error {code}: {message}")]
    Rpc {
        /// Error code
        code: i64,
        /// Error message
        message: String,
    },
    /// Contract call reverted
    #[error("execution reverted: {0}")]
    Reverted(String),
    /// Response could not be decoded
    #[error("Could not decode response: {0}")]
    Decode(String),
    /// Transport Error
    #[error(transparent)]
    Transport(Box<dyn std::error::Error + Send + Sync>),
    /// Chain primitive Error
    #[error(transparent)]
    Chain(#[from] crate::chain::Error),
    /// Serde Error
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
    /// Custom
    #[error("`{0}`")]
    Custom(String),
}

/// How gas is chosen for a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GasSetting {
    /// Let the wallet estimate limit and fees
    #[default]
    Auto,
    /// Fixed ceiling
    Manual {
        /// Gas limit
        gas_limit: u64,
        /// Max fee per gas in wei
        max_fee_per_gas: u128,
    },
}

/// Unsigned contract call handed to the wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    /// Target contract
    pub to: Address,
    /// ABI encoded call data
    #[serde(with = "hex_data")]
    pub data: Vec<u8>,
    /// Native value sent along
    #[serde(default)]
    pub value: Amount,
}

impl TransactionRequest {
    /// Contract call without native value
    pub fn call(to: Address, data: Vec<u8>) -> Self {
        Self {
            to,
            data,
            value: Amount::ZERO,
        }
    }
}

/// Mined transaction receipt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    /// Transaction hash
    pub tx_hash: TxHash,
    /// `true` when the receipt status is `0x1`
    pub success: bool,
    /// Block the transaction was mined in
    pub block_number: Option<u64>,
    /// Gas used
    pub gas_used: Option<u64>,
}

/// Wallet session able to sign and submit transactions
#[async_trait]
pub trait WalletConnector: Debug {
    /// Connector Error
    type Err: Into<Error> + From<Error>;

    /// Connected account
    async fn address(&self) -> Result<Address, Self::Err>;

    /// EIP-155 id of the chain the wallet is connected to
    async fn chain_id(&self) -> Result<u64, Self::Err>;

    /// Ask the wallet to switch chain. Suspends until the user confirms or rejects.
    async fn switch_chain(&self, chain: Chain) -> Result<(), Self::Err>;

    /// Ask the wallet to sign and submit. Resolves with the hash once the wallet
    /// acknowledges the submission.
    async fn send_transaction(
        &self,
        request: TransactionRequest,
        gas: GasSetting,
    ) -> Result<TxHash, Self::Err>;
}

/// Read-only chain access
#[async_trait]
pub trait ChainReader: Debug {
    /// Connector Error
    type Err: Into<Error> + From<Error>;

    /// `eth_call` against the latest block, returning the raw return data
    async fn call(&self, to: &Address, data: &[u8]) -> Result<Vec<u8>, Self::Err>;

    /// Receipt of a transaction, `None` while not yet mined
    async fn transaction_receipt(
        &self,
        tx_hash: &TxHash,
    ) -> Result<Option<TransactionReceipt>, Self::Err>;
}

/// Shareable wallet connector
pub type DynWalletConnector = Arc<dyn WalletConnector<Err = Error> + Send + Sync>;

/// Shareable chain reader
pub type DynChainReader = Arc<dyn ChainReader<Err = Error> + Send + Sync>;

mod hex_data {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(data)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.trim_start_matches("0x")).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_transaction_request_serde() {
        let to = Address::from_str("0x765de816845861e75a25fca122bb6898b8b1282a").unwrap();
        let request = TransactionRequest::call(to, vec![0x09, 0x5e, 0xa7, 0xb3]);

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["data"], "0x095ea7b3");
        assert_eq!(json["value"], "0");

        let back: TransactionRequest = serde_json::from_value(json).unwrap();
        assert_eq!(back, request);
    }
}
