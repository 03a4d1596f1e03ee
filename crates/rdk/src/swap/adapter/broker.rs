//! Broker exchanges
//!
//! A broker contract lists exchange providers, each provider lists exchanges with their asset
//! sets. Quotes and trades go through the broker.

use async_trait::async_trait;
use rdk_common::connector::{DynChainReader, TransactionRequest};
use rdk_common::{Address, Amount, Chain, Error};
use tracing::instrument;

use super::{
    no_exchange, to_units, Asset, ExchangeAdapter, ExchangeFamily, ExchangeRate, RateSource,
    Venue,
};
use crate::chain::abi::{self, Token};

/// `getExchangeProviders()` on the broker
pub const GET_EXCHANGE_PROVIDERS: &str = "getExchangeProviders()";
/// `getExchanges()` on a provider
pub const GET_EXCHANGES: &str = "getExchanges()";
/// `getAmountOut(...)` on the broker
pub const GET_AMOUNT_OUT: &str = "getAmountOut(address,bytes32,address,address,uint256)";
/// `swapIn(...)` on the broker
pub const SWAP_IN: &str = "swapIn(address,bytes32,address,address,uint256,uint256)";

/// Broker style exchange family
#[derive(Debug, Clone)]
pub struct BrokerAdapter {
    reader: DynChainReader,
    broker: Address,
    chain: Chain,
}

impl BrokerAdapter {
    /// Create new [`BrokerAdapter`]
    pub fn new(reader: DynChainReader, broker: Address, chain: Chain) -> Self {
        Self {
            reader,
            broker,
            chain,
        }
    }

    async fn exchange_providers(&self) -> Result<Vec<Address>, Error> {
        let data = abi::encode_call(GET_EXCHANGE_PROVIDERS, &[]);
        let output = self.reader.call(&self.broker, &data).await?;
        Ok(abi::decode_address_array(&output, 0)?)
    }

    async fn exchanges(&self, provider: &Address) -> Result<Vec<([u8; 32], Vec<Address>)>, Error> {
        let data = abi::encode_call(GET_EXCHANGES, &[]);
        let output = self.reader.call(provider, &data).await?;
        Ok(abi::decode_exchanges(&output, 0)?)
    }
}

#[async_trait]
impl ExchangeAdapter for BrokerAdapter {
    fn family(&self) -> ExchangeFamily {
        ExchangeFamily::Broker
    }

    fn chain(&self) -> Chain {
        self.chain
    }

    /// First exchange, in provider then exchange order, listing both assets
    #[instrument(skip(self))]
    async fn find_venue(&self, source: &Asset, target: &Asset) -> Result<Venue, Error> {
        for provider in self.exchange_providers().await? {
            for (exchange_id, assets) in self.exchanges(&provider).await? {
                let venue = Venue {
                    provider,
                    exchange_id,
                    assets,
                };

                if venue.trades(&source.address, &target.address) {
                    tracing::debug!(
                        "Found {}/{} on provider {} exchange 0x{}",
                        source,
                        target,
                        provider,
                        hex::encode(exchange_id)
                    );
                    return Ok(venue);
                }
            }
        }

        Err(no_exchange(source, target))
    }

    async fn exchange_rate(
        &self,
        venue: &Venue,
        source: &Asset,
        target: &Asset,
    ) -> Result<ExchangeRate, Error> {
        let one = source.one()?;
        let out = self.quote(venue, source, target, one).await?;

        Ok(ExchangeRate {
            rate: to_units(out, target.decimals),
            source: RateSource::OnChain,
        })
    }

    async fn quote(
        &self,
        venue: &Venue,
        source: &Asset,
        target: &Asset,
        amount_in: Amount,
    ) -> Result<Amount, Error> {
        let data = abi::encode_call(
            GET_AMOUNT_OUT,
            &[
                Token::Address(venue.provider),
                Token::FixedBytes32(venue.exchange_id),
                Token::Address(source.address),
                Token::Address(target.address),
                Token::Uint(amount_in),
            ],
        );

        let output = self.reader.call(&self.broker, &data).await?;
        Ok(abi::decode_uint(&output, 0)?)
    }

    fn spender(&self, _venue: &Venue) -> Address {
        self.broker
    }

    fn build_swap(
        &self,
        venue: &Venue,
        source: &Asset,
        target: &Asset,
        amount_in: Amount,
        min_output: Amount,
        _recipient: &Address,
    ) -> Result<TransactionRequest, Error> {
        Ok(TransactionRequest::call(
            self.broker,
            abi::encode_call(
                SWAP_IN,
                &[
                    Token::Address(venue.provider),
                    Token::FixedBytes32(venue.exchange_id),
                    Token::Address(source.address),
                    Token::Address(target.address),
                    Token::Uint(amount_in),
                    Token::Uint(min_output),
                ],
            ),
        ))
    }
}
