//! Router based AMM exchanges
//!
//! Trades go through a Uniswap V2 style router along a direct two hop path. The router has no
//! spot rate view, so displayed rates come from the price feed.

use async_trait::async_trait;
use rdk_common::connector::{self, DynChainReader, TransactionRequest};
use rdk_common::util::unix_time;
use rdk_common::{Address, Amount, Chain, Error};

use super::{no_exchange, Asset, ExchangeAdapter, ExchangeFamily, ExchangeRate, RateSource, Venue};
use crate::chain::abi::{self, Token};
use crate::price::{self, DynPriceFeed};

/// `getAmountsOut(uint256,address[])` on the router
pub const GET_AMOUNTS_OUT: &str = "getAmountsOut(uint256,address[])";
/// `swapExactTokensForTokens(...)` on the router
pub const SWAP_EXACT_TOKENS_FOR_TOKENS: &str =
    "swapExactTokensForTokens(uint256,uint256,address[],address,uint256)";

/// Seconds a signed trade stays valid
pub const SWAP_DEADLINE_SECS: u64 = 20 * 60;

/// AMM exchange family
#[derive(Debug, Clone)]
pub struct AmmAdapter {
    reader: DynChainReader,
    router: Address,
    chain: Chain,
    price_feed: DynPriceFeed,
}

impl AmmAdapter {
    /// Create new [`AmmAdapter`]
    pub fn new(
        reader: DynChainReader,
        router: Address,
        chain: Chain,
        price_feed: DynPriceFeed,
    ) -> Self {
        Self {
            reader,
            router,
            chain,
            price_feed,
        }
    }

    fn path(source: &Asset, target: &Asset) -> Token {
        Token::Array(vec![
            Token::Address(source.address),
            Token::Address(target.address),
        ])
    }

    async fn call_amounts_out(
        &self,
        source: &Asset,
        target: &Asset,
        amount_in: Amount,
    ) -> Result<Vec<u8>, connector::Error> {
        let data = abi::encode_call(
            GET_AMOUNTS_OUT,
            &[Token::Uint(amount_in), Self::path(source, target)],
        );
        self.reader.call(&self.router, &data).await
    }

    fn last_amount(output: &[u8]) -> Result<Amount, Error> {
        abi::decode_uint_array(output, 0)?
            .last()
            .copied()
            .ok_or_else(|| Error::Chain("Router returned no amounts".to_string()))
    }

    async fn amounts_out(
        &self,
        source: &Asset,
        target: &Asset,
        amount_in: Amount,
    ) -> Result<Amount, Error> {
        let output = self.call_amounts_out(source, target, amount_in).await?;
        Self::last_amount(&output)
    }
}

#[async_trait]
impl ExchangeAdapter for AmmAdapter {
    fn family(&self) -> ExchangeFamily {
        ExchangeFamily::Amm
    }

    fn chain(&self) -> Chain {
        self.chain
    }

    /// A pair exists when the router can quote one unit along the direct path.
    ///
    /// A revert or an empty quote means there is no pair. Node failures are surfaced as chain
    /// errors so the caller can retry.
    async fn find_venue(&self, source: &Asset, target: &Asset) -> Result<Venue, Error> {
        let output = match self.call_amounts_out(source, target, source.one()?).await {
            Ok(output) => output,
            Err(connector::Error::Reverted(reason)) => {
                tracing::debug!("Router cannot quote {}/{}: {}", source, target, reason);
                return Err(no_exchange(source, target));
            }
            Err(err) => return Err(err.into()),
        };

        match Self::last_amount(&output) {
            Ok(out) if out > Amount::ZERO => Ok(Venue {
                provider: self.router,
                exchange_id: [0u8; 32],
                assets: vec![source.address, target.address],
            }),
            Ok(_) => Err(no_exchange(source, target)),
            Err(err) => {
                tracing::debug!("Unreadable quote for {}/{}: {}", source, target, err);
                Err(no_exchange(source, target))
            }
        }
    }

    async fn exchange_rate(
        &self,
        _venue: &Venue,
        source: &Asset,
        target: &Asset,
    ) -> Result<ExchangeRate, Error> {
        let rate = price::cross_rate(&self.price_feed, &source.symbol, &target.symbol).await?;

        Ok(ExchangeRate {
            rate,
            source: RateSource::PriceFeedApproximation,
        })
    }

    async fn quote(
        &self,
        _venue: &Venue,
        source: &Asset,
        target: &Asset,
        amount_in: Amount,
    ) -> Result<Amount, Error> {
        self.amounts_out(source, target, amount_in).await
    }

    fn spender(&self, _venue: &Venue) -> Address {
        self.router
    }

    fn build_swap(
        &self,
        _venue: &Venue,
        source: &Asset,
        target: &Asset,
        amount_in: Amount,
        min_output: Amount,
        recipient: &Address,
    ) -> Result<TransactionRequest, Error> {
        let deadline = Amount::from(unix_time() + SWAP_DEADLINE_SECS);

        Ok(TransactionRequest::call(
            self.router,
            abi::encode_call(
                SWAP_EXACT_TOKENS_FOR_TOKENS,
                &[
                    Token::Uint(amount_in),
                    Token::Uint(min_output),
                    Self::path(source, target),
                    Token::Address(*recipient),
                    Token::Uint(deadline),
                ],
            ),
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rdk_fake_chain::FakeChain;

    use super::*;
    use crate::price::StaticPriceFeed;

    const ROUTER: Address = Address::new([0xee; 20]);

    fn weth() -> Asset {
        Asset::new("WETH", Address::new([0x01; 20]), 18)
    }

    fn usdc() -> Asset {
        Asset::new("USDC", Address::new([0x02; 20]), 6)
    }

    fn adapter(fake: &FakeChain) -> AmmAdapter {
        AmmAdapter::new(
            Arc::new(fake.clone()),
            ROUTER,
            Chain::Optimism,
            Arc::new(StaticPriceFeed::new([("WETH", 3000.0), ("USDC", 1.0)])),
        )
    }

    #[tokio::test]
    async fn test_venue_and_quote() {
        let fake = FakeChain::new(Chain::Optimism);
        fake.set_call_handler(ROUTER, abi::selector(GET_AMOUNTS_OUT), |data| {
            let amount_in = abi::decode_uint(&data[4..], 0).map_err(|e| e.to_string())?;
            // 1 WETH (1e18) -> 3000 USDC (3e9)
            let out = amount_in.to_u128() / 1_000_000_000_000 * 3000;
            Ok(abi::encode(&[Token::Array(vec![
                Token::Uint(amount_in),
                Token::Uint(Amount::from(out)),
            ])]))
        })
        .await;

        let adapter = adapter(&fake);
        let venue = adapter.find_venue(&weth(), &usdc()).await.unwrap();
        assert_eq!(venue.provider, ROUTER);

        let out = adapter
            .quote(&venue, &weth(), &usdc(), Amount::from_decimal_str("2", 18).unwrap())
            .await
            .unwrap();
        assert_eq!(out, Amount::from_decimal_str("6000", 6).unwrap());
    }

    #[tokio::test]
    async fn test_revert_is_no_exchange() {
        let fake = FakeChain::new(Chain::Optimism);
        fake.set_call_revert(ROUTER, abi::selector(GET_AMOUNTS_OUT), "INSUFFICIENT_LIQUIDITY")
            .await;

        assert!(matches!(
            adapter(&fake).find_venue(&weth(), &usdc()).await,
            Err(Error::NoExchangeFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_zero_quote_is_no_exchange() {
        let fake = FakeChain::new(Chain::Optimism);
        fake.set_call_response(
            ROUTER,
            abi::selector(GET_AMOUNTS_OUT),
            abi::encode(&[Token::Array(vec![
                Token::Uint(Amount::from(1u128)),
                Token::Uint(Amount::ZERO),
            ])]),
        )
        .await;

        assert!(matches!(
            adapter(&fake).find_venue(&weth(), &usdc()).await,
            Err(Error::NoExchangeFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_node_outage_is_chain_error() {
        let fake = FakeChain::new(Chain::Optimism);
        fake.fail_calls("network error: connection refused").await;

        let err = adapter(&fake).find_venue(&weth(), &usdc()).await.unwrap_err();
        match err {
            Error::Chain(message) => assert!(message.contains("connection refused")),
            err => panic!("unexpected error: {err}"),
        }
    }

    #[tokio::test]
    async fn test_rate_is_labeled_approximate() {
        let fake = FakeChain::new(Chain::Optimism);
        let adapter = adapter(&fake);
        let venue = Venue {
            provider: ROUTER,
            exchange_id: [0; 32],
            assets: vec![],
        };

        let rate = adapter.exchange_rate(&venue, &weth(), &usdc()).await.unwrap();
        assert_eq!(rate.rate, 3000.0);
        assert!(rate.is_approximate());
        assert_eq!(fake.call_count(abi::selector(GET_AMOUNTS_OUT)).await, 0);
    }

    #[test]
    fn test_build_swap_path_and_recipient() {
        let fake = FakeChain::new(Chain::Optimism);
        let recipient = Address::new([0x09; 20]);
        let venue = Venue {
            provider: ROUTER,
            exchange_id: [0; 32],
            assets: vec![],
        };

        let request = adapter(&fake)
            .build_swap(
                &venue,
                &weth(),
                &usdc(),
                Amount::from(10u64),
                Amount::from(9u64),
                &recipient,
            )
            .unwrap();

        let args = &request.data[4..];
        assert_eq!(request.to, ROUTER);
        assert_eq!(abi::decode_address(args, 3).unwrap(), recipient);
        assert_eq!(
            abi::decode_address_array(args, 2).unwrap(),
            vec![weth().address, usdc().address]
        );
    }
}
