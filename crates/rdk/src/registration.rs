//! Registration Checker
//!
//! Reads a registry contract to tell whether an address is enrolled for reward attribution on
//! a chain. Registries were deployed with two incompatible interfaces, so the check walks an
//! ordered list of [`CallingConvention`]s and the first one that answers wins. When every
//! convention fails the address is reported as not registered.

use std::collections::HashMap;
use std::fmt;

use rdk_common::connector::{self, DynChainReader};
use rdk_common::{Address, Chain};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::chain::abi::{self, Token};

/// Partner protocol id used on Celo networks
pub const CELO_PROTOCOL_ID: &str = "mento";

/// Interface version of a registry contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallingConvention {
    /// `isUserRegistered(address,bytes32[]) -> bool[]`
    MultiProtocol,
    /// `isRegistered(address) -> bool`
    Legacy,
}

impl CallingConvention {
    /// Conventions in the order they are attempted
    pub const ORDER: [CallingConvention; 2] =
        [CallingConvention::MultiProtocol, CallingConvention::Legacy];

    /// Solidity signature of the view function
    pub fn signature(&self) -> &'static str {
        match self {
            CallingConvention::MultiProtocol => "isUserRegistered(address,bytes32[])",
            CallingConvention::Legacy => "isRegistered(address)",
        }
    }

    fn encode(&self, address: &Address, protocol_id: [u8; 32]) -> Vec<u8> {
        match self {
            CallingConvention::MultiProtocol => abi::encode_call(
                self.signature(),
                &[
                    Token::Address(*address),
                    Token::Array(vec![Token::FixedBytes32(protocol_id)]),
                ],
            ),
            CallingConvention::Legacy => {
                abi::encode_call(self.signature(), &[Token::Address(*address)])
            }
        }
    }

    fn decode(&self, data: &[u8]) -> Result<bool, connector::Error> {
        match self {
            CallingConvention::MultiProtocol => abi::decode_bool_array(data, 0)?
                .first()
                .copied()
                .ok_or_else(|| connector::Error::Decode("Empty registration result".to_string())),
            CallingConvention::Legacy => Ok(abi::decode_bool(data, 0)?),
        }
    }
}

impl fmt::Display for CallingConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallingConvention::MultiProtocol => write!(f, "multi_protocol"),
            CallingConvention::Legacy => write!(f, "legacy"),
        }
    }
}

/// A convention that did not produce an answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConventionFailure {
    /// Convention attempted
    pub convention: CallingConvention,
    /// Why it failed
    pub error: String,
}

/// Outcome of a registration check with every attempt recorded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationReport {
    /// Whether the address is registered. `false` when no convention answered.
    pub is_registered: bool,
    /// Convention that answered
    pub convention: Option<CallingConvention>,
    /// Conventions that failed, in attempt order
    pub failures: Vec<ConventionFailure>,
}

impl RegistrationReport {
    /// `true` when a convention answered, so `is_registered` reflects the contract state
    pub fn is_conclusive(&self) -> bool {
        self.convention.is_some()
    }
}

/// Protocol identifier a chain registers under: the partner protocol on Celo, else the
/// lowercased chain name
pub fn protocol_id(chain: Chain) -> String {
    match chain {
        Chain::Celo | Chain::Alfajores => CELO_PROTOCOL_ID.to_string(),
        chain => chain.name().to_lowercase(),
    }
}

/// Run the conventions in order against `reader`
#[instrument(skip(reader))]
pub async fn check_with_reader(
    reader: &DynChainReader,
    address: &Address,
    chain: Chain,
    contract: &Address,
) -> RegistrationReport {
    let mut failures = Vec::new();

    let protocol_id = match abi::bytes32_from_str(&protocol_id(chain)) {
        Ok(id) => id,
        Err(err) => {
            tracing::warn!("Cannot encode protocol id for {}: {}", chain, err);
            return RegistrationReport {
                is_registered: false,
                convention: None,
                failures,
            };
        }
    };

    for convention in CallingConvention::ORDER {
        let data = convention.encode(address, protocol_id);

        let result = match reader.call(contract, &data).await {
            Ok(output) => convention.decode(&output),
            Err(err) => Err(err),
        };

        match result {
            Ok(is_registered) => {
                return RegistrationReport {
                    is_registered,
                    convention: Some(convention),
                    failures,
                }
            }
            Err(err) => {
                tracing::warn!(
                    "Registration check via {} on {} failed: {}",
                    convention,
                    contract,
                    err
                );
                failures.push(ConventionFailure {
                    convention,
                    error: err.to_string(),
                });
            }
        }
    }

    RegistrationReport {
        is_registered: false,
        convention: None,
        failures,
    }
}

/// Registration Checker holding one chain reader per chain
#[derive(Debug, Clone, Default)]
pub struct RegistrationChecker {
    readers: HashMap<Chain, DynChainReader>,
}

impl RegistrationChecker {
    /// Create new [`RegistrationChecker`] without readers
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the reader used for `chain`
    pub fn with_reader(mut self, chain: Chain, reader: DynChainReader) -> Self {
        self.readers.insert(chain, reader);
        self
    }

    /// Chains a reader is configured for
    pub fn chains(&self) -> Vec<Chain> {
        self.readers.keys().copied().collect()
    }

    /// Whether `address` is registered on `contract`.
    ///
    /// Never fails: any error, including a chain without a reader, reads as not registered.
    pub async fn check_registration(
        &self,
        address: &Address,
        chain: Chain,
        contract: &Address,
    ) -> bool {
        self.check_registration_detailed(address, chain, contract)
            .await
            .is_registered
    }

    /// Like [`Self::check_registration`] but reporting every failed attempt
    pub async fn check_registration_detailed(
        &self,
        address: &Address,
        chain: Chain,
        contract: &Address,
    ) -> RegistrationReport {
        match self.readers.get(&chain) {
            Some(reader) => check_with_reader(reader, address, chain, contract).await,
            None => {
                tracing::warn!("No chain reader configured for {}", chain);
                RegistrationReport {
                    is_registered: false,
                    convention: None,
                    failures: Vec::new(),
                }
            }
        }
    }
}
