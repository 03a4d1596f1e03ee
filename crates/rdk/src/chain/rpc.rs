//! JSON-RPC chain reader

use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rdk_common::connector::{self, ChainReader, TransactionReceipt};
use rdk_common::{Address, Chain, TxHash};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::instrument;
use url::Url;

/// Default per request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

/// Read-only chain access over a node's JSON-RPC endpoint
#[derive(Debug)]
pub struct JsonRpcReader {
    client: Client,
    url: Url,
    chain: Chain,
    request_id: AtomicU64,
}

impl JsonRpcReader {
    /// Create new [`JsonRpcReader`]
    pub fn new(chain: Chain, url: Url) -> Result<Self, connector::Error> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|err| connector::Error::Transport(Box::new(err)))?;

        Ok(Self::with_client(chain, url, client))
    }

    /// Create new [`JsonRpcReader`] with a preconfigured client
    pub fn with_client(chain: Chain, url: Url, client: Client) -> Self {
        Self {
            client,
            url,
            chain,
            request_id: AtomicU64::new(1),
        }
    }

    /// Chain this reader was configured for
    pub fn chain(&self) -> Chain {
        self.chain
    }

    /// Raw JSON-RPC call
    #[instrument(skip(self, params), fields(url = %self.url))]
    pub async fn rpc_call(&self, method: &str, params: Value) -> Result<Value, connector::Error> {
        let body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": self.request_id.fetch_add(1, Ordering::Relaxed),
        });

        let response: RpcResponse = self
            .client
            .post(self.url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|err| connector::Error::Transport(Box::new(err)))?
            .json()
            .await
            .map_err(|err| connector::Error::Transport(Box::new(err)))?;

        if let Some(error) = response.error {
            let message = match error.data {
                Some(data) if !data.is_null() => format!("{} ({})", error.message, data),
                _ => error.message,
            };

            if message.contains("revert") {
                return Err(connector::Error::Reverted(message));
            }

            return Err(connector::Error::Rpc {
                code: error.code,
                message,
            });
        }

        response
            .result
            .ok_or_else(|| connector::Error::Decode("RPC response missing 'result' field".into()))
    }

    /// `eth_chainId`
    pub async fn chain_id(&self) -> Result<u64, connector::Error> {
        let result = self.rpc_call("eth_chainId", json!([])).await?;
        parse_quantity(&result)
    }
}

#[async_trait]
impl ChainReader for JsonRpcReader {
    type Err = connector::Error;

    async fn call(&self, to: &Address, data: &[u8]) -> Result<Vec<u8>, Self::Err> {
        let result = self
            .rpc_call(
                "eth_call",
                json!([{ "to": to.to_string(), "data": format!("0x{}", hex::encode(data)) }, "latest"]),
            )
            .await?;

        let hex_data = result
            .as_str()
            .ok_or_else(|| connector::Error::Decode("Invalid eth_call result".into()))?;

        hex::decode(hex_data.trim_start_matches("0x"))
            .map_err(|err| connector::Error::Decode(err.to_string()))
    }

    async fn transaction_receipt(
        &self,
        tx_hash: &TxHash,
    ) -> Result<Option<TransactionReceipt>, Self::Err> {
        let result = self
            .rpc_call("eth_getTransactionReceipt", json!([tx_hash.to_string()]))
            .await?;

        if result.is_null() {
            return Ok(None);
        }

        parse_receipt(&result).map(Some)
    }
}

fn parse_quantity(value: &Value) -> Result<u64, connector::Error> {
    let hex_str = value
        .as_str()
        .ok_or_else(|| connector::Error::Decode(format!("Expected quantity, got {value}")))?;

    u64::from_str_radix(hex_str.trim_start_matches("0x"), 16)
        .map_err(|err| connector::Error::Decode(format!("Parse quantity {hex_str}: {err}")))
}

fn parse_receipt(value: &Value) -> Result<TransactionReceipt, connector::Error> {
    let tx_hash = value
        .get("transactionHash")
        .and_then(Value::as_str)
        .ok_or_else(|| connector::Error::Decode("Receipt missing transactionHash".into()))?;

    // Pre-Byzantium receipts have no status, they carry a root instead
    let success = match value.get("status") {
        Some(status) => parse_quantity(status)? == 1,
        None => true,
    };

    Ok(TransactionReceipt {
        tx_hash: TxHash::from_str(tx_hash)?,
        success,
        block_number: value
            .get("blockNumber")
            .filter(|v| !v.is_null())
            .map(parse_quantity)
            .transpose()?,
        gas_used: value
            .get("gasUsed")
            .filter(|v| !v.is_null())
            .map(parse_quantity)
            .transpose()?,
    })
}
