//! External price feed
//!
//! Used by exchange families without an on-chain rate call to derive an approximate cross
//! rate from USD spot prices.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rdk_common::Error;
use serde::Deserialize;
use tokio::sync::Mutex;
use url::Url;

/// How long fetched prices are served from cache
pub const PRICE_CACHE_DURATION: Duration = Duration::from_secs(300);

/// Default price endpoint (CoinGecko compatible)
pub const DEFAULT_PRICE_API: &str = "https://api.coingecko.com/api/v3/simple/price";

/// Source of USD spot prices
#[async_trait]
pub trait PriceFeed: Debug {
    /// USD price of one whole unit of `symbol`
    async fn usd_price(&self, symbol: &str) -> Result<f64, Error>;
}

/// Type alias for a shareable price feed
pub type DynPriceFeed = Arc<dyn PriceFeed + Send + Sync>;

/// Approximate `source -> target` rate from USD prices
pub async fn cross_rate(feed: &DynPriceFeed, source: &str, target: &str) -> Result<f64, Error> {
    let source_price = feed.usd_price(source).await?;
    let target_price = feed.usd_price(target).await?;

    if target_price <= 0.0 || !target_price.is_finite() {
        return Err(Error::Custom(format!("No usable price for {target}")));
    }

    Ok(source_price / target_price)
}

fn coingecko_id(symbol: &str) -> Option<&'static str> {
    let id = match symbol.to_uppercase().as_str() {
        "CELO" => "celo",
        "CUSD" => "celo-dollar",
        "CEUR" => "celo-euro",
        "CREAL" => "celo-real-creal",
        "CKES" => "celo-kenyan-shilling",
        "USDC" => "usd-coin",
        "USDT" => "tether",
        "ETH" | "WETH" => "ethereum",
        "OP" => "optimism",
        "ARB" => "arbitrum",
        _ => return None,
    };
    Some(id)
}

fn fallback_price(symbol: &str) -> Option<f64> {
    let price = match symbol.to_uppercase().as_str() {
        "CUSD" | "USDC" | "USDT" => 1.0,
        "CEUR" => 1.08,
        "CREAL" => 0.18,
        "CKES" => 0.0077,
        "CELO" => 0.5,
        "ETH" | "WETH" => 3000.0,
        "OP" => 1.5,
        "ARB" => 0.6,
        _ => return None,
    };
    Some(price)
}

#[derive(Debug, Deserialize)]
struct UsdQuote {
    usd: f64,
}

/// HTTP price feed with a five minute cache and static fallbacks
#[derive(Debug, Clone)]
pub struct HttpPriceFeed {
    client: reqwest::Client,
    endpoint: Url,
    prices: Arc<Mutex<HashMap<String, (f64, Instant)>>>,
}

impl HttpPriceFeed {
    /// Create new [`HttpPriceFeed`] against `endpoint`
    pub fn new(endpoint: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            prices: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Create new [`HttpPriceFeed`] against [`DEFAULT_PRICE_API`]
    pub fn coingecko() -> Result<Self, Error> {
        let endpoint = Url::parse(DEFAULT_PRICE_API).map_err(|e| Error::Custom(e.to_string()))?;
        Ok(Self::new(endpoint))
    }

    async fn fetch_fresh_price(&self, symbol: &str) -> Result<f64, Error> {
        let id = coingecko_id(symbol)
            .ok_or_else(|| Error::Custom(format!("No price id for {symbol}")))?;

        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[("ids", id), ("vs_currencies", "usd")])
            .send()
            .await
            .map_err(|e| Error::Custom(e.to_string()))?
            .json::<HashMap<String, UsdQuote>>()
            .await
            .map_err(|e| Error::Custom(e.to_string()))?;

        let price = response
            .get(id)
            .map(|quote| quote.usd)
            .ok_or_else(|| Error::Custom(format!("Price response missing {id}")))?;

        self.prices
            .lock()
            .await
            .insert(symbol.to_uppercase(), (price, Instant::now()));

        Ok(price)
    }
}

#[async_trait]
impl PriceFeed for HttpPriceFeed {
    async fn usd_price(&self, symbol: &str) -> Result<f64, Error> {
        {
            let prices = self.prices.lock().await;
            if let Some((price, fetched_at)) = prices.get(&symbol.to_uppercase()) {
                if fetched_at.elapsed() < PRICE_CACHE_DURATION {
                    return Ok(*price);
                }
            }
        }

        match self.fetch_fresh_price(symbol).await {
            Ok(price) => Ok(price),
            Err(e) => {
                tracing::warn!("Failed to fetch price of {}, using fallback: {}", symbol, e);
                fallback_price(symbol)
                    .ok_or_else(|| Error::Custom(format!("No price available for {symbol}")))
            }
        }
    }
}

/// Fixed prices
#[derive(Debug, Clone, Default)]
pub struct StaticPriceFeed {
    prices: HashMap<String, f64>,
}

impl StaticPriceFeed {
    /// Create new [`StaticPriceFeed`]
    pub fn new<I, S>(prices: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        Self {
            prices: prices
                .into_iter()
                .map(|(symbol, price)| (symbol.as_ref().to_uppercase(), price))
                .collect(),
        }
    }
}

#[async_trait]
impl PriceFeed for StaticPriceFeed {
    async fn usd_price(&self, symbol: &str) -> Result<f64, Error> {
        self.prices
            .get(&symbol.to_uppercase())
            .copied()
            .ok_or_else(|| Error::Custom(format!("No price available for {symbol}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cross_rate() {
        let feed: DynPriceFeed = Arc::new(StaticPriceFeed::new([("CELO", 0.5), ("cUSD", 1.0)]));

        assert_eq!(cross_rate(&feed, "CELO", "cUSD").await.unwrap(), 0.5);
        assert_eq!(cross_rate(&feed, "cusd", "celo").await.unwrap(), 2.0);
        assert!(cross_rate(&feed, "CELO", "DOGE").await.is_err());
    }

    #[tokio::test]
    async fn test_zero_target_price() {
        let feed: DynPriceFeed = Arc::new(StaticPriceFeed::new([("A", 1.0), ("B", 0.0)]));
        assert!(cross_rate(&feed, "A", "B").await.is_err());
    }

    #[tokio::test]
    async fn test_http_feed_falls_back() {
        // Nothing listens on port 9, the fetch fails and the static fallback is served
        let feed = HttpPriceFeed::new(Url::parse("http://127.0.0.1:9/price").unwrap());

        assert_eq!(feed.usd_price("cUSD").await.unwrap(), 1.0);
        assert!(feed.usd_price("DOGE").await.is_err());
    }
}
