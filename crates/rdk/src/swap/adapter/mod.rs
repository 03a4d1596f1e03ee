//! Exchange family adapters
//!
//! An adapter knows how one family of venues is discovered, quoted and traded. The
//! orchestrator drives every family through the same state machine.

use std::fmt::{self, Debug};
use std::sync::Arc;

use async_trait::async_trait;
use rdk_common::connector::TransactionRequest;
use rdk_common::{Address, Amount, Chain, Error};
use serde::{Deserialize, Serialize};

pub mod amm;
pub mod broker;

pub use amm::AmmAdapter;
pub use broker::BrokerAdapter;

/// ERC-20 token taking part in a swap
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Asset {
    /// Ticker symbol
    pub symbol: String,
    /// Token contract
    pub address: Address,
    /// Decimals of the token
    pub decimals: u8,
}

impl Asset {
    /// Create new [`Asset`]
    pub fn new<S: Into<String>>(symbol: S, address: Address, decimals: u8) -> Self {
        Self {
            symbol: symbol.into(),
            address,
            decimals,
        }
    }

    /// One whole token in base units
    pub fn one(&self) -> Result<Amount, Error> {
        Ok(Amount::from_decimal_str("1", self.decimals)?)
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol)
    }
}

/// Venue able to trade two assets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Venue {
    /// Exchange provider, or the router for AMM venues
    pub provider: Address,
    /// Exchange id within the provider, zero for AMM venues
    #[serde(with = "hex_bytes32")]
    pub exchange_id: [u8; 32],
    /// Assets tradable on the venue
    pub assets: Vec<Address>,
}

impl Venue {
    /// Whether both assets trade on this venue
    pub fn trades(&self, source: &Address, target: &Address) -> bool {
        self.assets.contains(source) && self.assets.contains(target)
    }
}

/// Exchange family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeFamily {
    /// Broker with registered exchange providers and an on-chain quote
    Broker,
    /// Router based AMM
    Amm,
}

/// Where a rate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateSource {
    /// Quoted by the venue
    OnChain,
    /// Cross rate of USD spot prices, lower fidelity
    PriceFeedApproximation,
}

/// Units of target received per unit of source
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRate {
    /// Rate
    pub rate: f64,
    /// Source of the rate
    pub source: RateSource,
}

impl ExchangeRate {
    /// Whether the rate is only an approximation
    pub fn is_approximate(&self) -> bool {
        self.source == RateSource::PriceFeedApproximation
    }
}

/// Exchange family adapter
#[async_trait]
pub trait ExchangeAdapter: Debug {
    /// Family
    fn family(&self) -> ExchangeFamily;

    /// Chain the venues live on
    fn chain(&self) -> Chain;

    /// Locate a venue trading `source` for `target`, [`Error::NoExchangeFound`] otherwise
    async fn find_venue(&self, source: &Asset, target: &Asset) -> Result<Venue, Error>;

    /// Rate of `source` in `target`
    async fn exchange_rate(
        &self,
        venue: &Venue,
        source: &Asset,
        target: &Asset,
    ) -> Result<ExchangeRate, Error>;

    /// Expected output for `amount_in`
    async fn quote(
        &self,
        venue: &Venue,
        source: &Asset,
        target: &Asset,
        amount_in: Amount,
    ) -> Result<Amount, Error>;

    /// Contract that must be approved to pull `source`
    fn spender(&self, venue: &Venue) -> Address;

    /// Trade transaction
    fn build_swap(
        &self,
        venue: &Venue,
        source: &Asset,
        target: &Asset,
        amount_in: Amount,
        min_output: Amount,
        recipient: &Address,
    ) -> Result<TransactionRequest, Error>;
}

/// Type alias for a shareable exchange adapter
pub type DynExchangeAdapter = Arc<dyn ExchangeAdapter + Send + Sync>;

fn no_exchange(source: &Asset, target: &Asset) -> Error {
    Error::NoExchangeFound {
        source_token: source.symbol.clone(),
        target_token: target.symbol.clone(),
    }
}

/// Whole units of `amount` as a float, for rate display only
fn to_units(amount: Amount, decimals: u8) -> f64 {
    amount.to_u128() as f64 / 10f64.powi(i32::from(decimals))
}

mod hex_bytes32 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
        let value = String::deserialize(deserializer)?;
        let bytes = hex::decode(value.trim_start_matches("0x")).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 32 bytes"))
    }
}
