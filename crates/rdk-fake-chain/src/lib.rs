//! RDK Fake Chain Backend
//!
//! Used for testing where wallet interactions and contract reads are scripted.
//!
//! A [`FakeChain`] plays both roles the core needs from the outside world: the user's wallet
//! ([`WalletConnector`]) and a read-only node ([`ChainReader`]). Contract calls are answered by
//! handlers keyed by `(contract, selector)`, and submissions can be scripted to fail so gas
//! fallback and error classification paths can be exercised deterministically.

#![doc = include_str!("../README.md")]

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use error::Error;
use rdk_common::connector::{
    self, ChainReader, GasSetting, TransactionReceipt, TransactionRequest, WalletConnector,
};
use rdk_common::{Address, Chain, TxHash};
use tokio::sync::Mutex;
use tracing::instrument;

pub mod error;

/// Handler answering a contract call with raw return data or a revert reason
pub type CallHandler = Arc<dyn Fn(&[u8]) -> Result<Vec<u8>, String> + Send + Sync>;

/// Default account of the fake wallet
pub const DEFAULT_ADDRESS: Address = Address::new([0x11; 20]);

/// One recorded submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendAttempt {
    /// What the wallet was asked to sign
    pub request: TransactionRequest,
    /// Gas setting used for the attempt
    pub gas: GasSetting,
    /// Hash handed back, `None` when the attempt failed
    pub tx_hash: Option<TxHash>,
}

/// Fake wallet and chain
#[derive(Clone)]
pub struct FakeChain {
    address: Address,
    chain_id: Arc<AtomicU64>,
    switch_failure: Arc<Mutex<Option<String>>>,
    switch_requests: Arc<Mutex<Vec<Chain>>>,
    send_failures: Arc<Mutex<VecDeque<String>>>,
    send_attempts: Arc<Mutex<Vec<SendAttempt>>>,
    send_delay: Option<Duration>,
    handlers: Arc<Mutex<HashMap<(Address, [u8; 4]), CallHandler>>>,
    call_failure: Arc<Mutex<Option<String>>>,
    call_log: Arc<Mutex<Vec<(Address, Vec<u8>)>>>,
    reverted_txs: Arc<Mutex<HashSet<TxHash>>>,
    revert_all: Arc<Mutex<bool>>,
    pending_polls: Arc<Mutex<u32>>,
    receipt_polls: Arc<AtomicU64>,
    nonce: Arc<AtomicU64>,
}

impl fmt::Debug for FakeChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FakeChain")
            .field("address", &self.address)
            .field("chain_id", &self.chain_id.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl FakeChain {
    /// Create new [`FakeChain`] with the wallet connected to `chain`
    pub fn new(chain: Chain) -> Self {
        Self::new_with_address(chain, DEFAULT_ADDRESS)
    }

    /// Create new [`FakeChain`] with a custom wallet account
    pub fn new_with_address(chain: Chain, address: Address) -> Self {
        Self {
            address,
            chain_id: Arc::new(AtomicU64::new(chain.id())),
            switch_failure: Arc::new(Mutex::new(None)),
            switch_requests: Arc::new(Mutex::new(Vec::new())),
            send_failures: Arc::new(Mutex::new(VecDeque::new())),
            send_attempts: Arc::new(Mutex::new(Vec::new())),
            send_delay: None,
            handlers: Arc::new(Mutex::new(HashMap::new())),
            call_failure: Arc::new(Mutex::new(None)),
            call_log: Arc::new(Mutex::new(Vec::new())),
            reverted_txs: Arc::new(Mutex::new(HashSet::new())),
            revert_all: Arc::new(Mutex::new(false)),
            pending_polls: Arc::new(Mutex::new(0)),
            receipt_polls: Arc::new(AtomicU64::new(0)),
            nonce: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Delay every submission, simulating a wallet waiting on the user
    pub fn with_send_delay(mut self, delay: Duration) -> Self {
        self.send_delay = Some(delay);
        self
    }

    /// Move the wallet to another chain without a switch request
    pub fn set_chain_id(&self, chain_id: u64) {
        self.chain_id.store(chain_id, Ordering::SeqCst);
    }

    /// Make the next chain switch requests fail with `message`
    pub async fn fail_switch_chain(&self, message: &str) {
        *self.switch_failure.lock().await = Some(message.to_owned());
    }

    /// Chains the wallet was asked to switch to
    pub async fn switch_requests(&self) -> Vec<Chain> {
        self.switch_requests.lock().await.clone()
    }

    /// Make the next submissions fail with the given provider messages, in order
    pub async fn fail_next_sends<I, S>(&self, messages: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.send_failures
            .lock()
            .await
            .extend(messages.into_iter().map(Into::into));
    }

    /// Every submission made so far, failed ones included
    pub async fn send_attempts(&self) -> Vec<SendAttempt> {
        self.send_attempts.lock().await.clone()
    }

    /// Answer calls to `contract` with `selector` using `handler`
    pub async fn set_call_handler<F>(&self, contract: Address, selector: [u8; 4], handler: F)
    where
        F: Fn(&[u8]) -> Result<Vec<u8>, String> + Send + Sync + 'static,
    {
        self.handlers
            .lock()
            .await
            .insert((contract, selector), Arc::new(handler));
    }

    /// Answer calls to `contract` with `selector` with fixed return data
    pub async fn set_call_response(&self, contract: Address, selector: [u8; 4], data: Vec<u8>) {
        self.set_call_handler(contract, selector, move |_| Ok(data.clone()))
            .await;
    }

    /// Make calls to `contract` with `selector` revert
    pub async fn set_call_revert(&self, contract: Address, selector: [u8; 4], reason: &str) {
        let reason = reason.to_owned();
        self.set_call_handler(contract, selector, move |_| Err(reason.clone()))
            .await;
    }

    /// Fail every call with a provider error until [`Self::restore_calls`], simulating a node
    /// outage
    pub async fn fail_calls(&self, message: &str) {
        *self.call_failure.lock().await = Some(message.to_owned());
    }

    /// Serve calls from the handlers again
    pub async fn restore_calls(&self) {
        *self.call_failure.lock().await = None;
    }

    /// Number of calls made with `selector`, any contract
    pub async fn call_count(&self, selector: [u8; 4]) -> usize {
        self.call_log
            .lock()
            .await
            .iter()
            .filter(|(_, data)| data.get(..4) == Some(&selector[..]))
            .count()
    }

    /// Mark a submitted transaction as reverted
    pub async fn revert_transaction(&self, tx_hash: TxHash) {
        self.reverted_txs.lock().await.insert(tx_hash);
    }

    /// Mine every future transaction with a failing status
    pub async fn revert_all_transactions(&self) {
        *self.revert_all.lock().await = true;
    }

    /// Report receipts as missing for the next `polls` receipt requests
    pub async fn hold_receipts(&self, polls: u32) {
        *self.pending_polls.lock().await = polls;
    }

    /// Number of receipt requests served
    pub fn receipt_polls(&self) -> u64 {
        self.receipt_polls.load(Ordering::SeqCst)
    }

    fn next_tx_hash(&self) -> TxHash {
        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst) + 1;
        let mut bytes = [0u8; 32];
        bytes[..20].copy_from_slice(self.address.as_bytes());
        bytes[24..].copy_from_slice(&nonce.to_be_bytes());
        TxHash::new(bytes)
    }
}

#[async_trait]
impl WalletConnector for FakeChain {
    type Err = connector::Error;

    async fn address(&self) -> Result<Address, Self::Err> {
        Ok(self.address)
    }

    async fn chain_id(&self) -> Result<u64, Self::Err> {
        Ok(self.chain_id.load(Ordering::SeqCst))
    }

    #[instrument(skip(self))]
    async fn switch_chain(&self, chain: Chain) -> Result<(), Self::Err> {
        self.switch_requests.lock().await.push(chain);

        if let Some(message) = self.switch_failure.lock().await.take() {
            return Err(Error::Scripted(message).into());
        }

        self.chain_id.store(chain.id(), Ordering::SeqCst);
        Ok(())
    }

    #[instrument(skip_all)]
    async fn send_transaction(
        &self,
        request: TransactionRequest,
        gas: GasSetting,
    ) -> Result<TxHash, Self::Err> {
        if let Some(delay) = self.send_delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self.send_failures.lock().await.pop_front();

        let tx_hash = match &failure {
            Some(_) => None,
            None => Some(self.next_tx_hash()),
        };

        self.send_attempts.lock().await.push(SendAttempt {
            request,
            gas,
            tx_hash,
        });

        match (failure, tx_hash) {
            (Some(message), _) => {
                tracing::debug!("Scripted send failure: {}", message);
                Err(Error::Scripted(message).into())
            }
            (None, Some(tx_hash)) => {
                if *self.revert_all.lock().await {
                    self.reverted_txs.lock().await.insert(tx_hash);
                }
                Ok(tx_hash)
            }
            (None, None) => Err(Error::Scripted("no hash".to_string()).into()),
        }
    }
}

#[async_trait]
impl ChainReader for FakeChain {
    type Err = connector::Error;

    async fn call(&self, to: &Address, data: &[u8]) -> Result<Vec<u8>, Self::Err> {
        self.call_log.lock().await.push((*to, data.to_vec()));

        if let Some(message) = self.call_failure.lock().await.clone() {
            return Err(Error::Scripted(message).into());
        }

        let selector: [u8; 4] = data
            .get(..4)
            .and_then(|s| s.try_into().ok())
            .ok_or(Error::ShortCallData)?;

        let handler = self
            .handlers
            .lock()
            .await
            .get(&(*to, selector))
            .cloned()
            .ok_or_else(|| Error::NoHandler(format!("{to} 0x{}", hex_selector(&selector))))?;

        handler(data).map_err(connector::Error::Reverted)
    }

    async fn transaction_receipt(
        &self,
        tx_hash: &TxHash,
    ) -> Result<Option<TransactionReceipt>, Self::Err> {
        self.receipt_polls.fetch_add(1, Ordering::SeqCst);

        {
            let mut pending = self.pending_polls.lock().await;
            if *pending > 0 {
                *pending -= 1;
                return Ok(None);
            }
        }

        let known = self
            .send_attempts
            .lock()
            .await
            .iter()
            .any(|attempt| attempt.tx_hash.as_ref() == Some(tx_hash));

        if !known {
            return Ok(None);
        }

        let success = !self.reverted_txs.lock().await.contains(tx_hash);

        Ok(Some(TransactionReceipt {
            tx_hash: *tx_hash,
            success,
            block_number: Some(1),
            gas_used: Some(21_000),
        }))
    }
}

fn hex_selector(selector: &[u8; 4]) -> String {
    selector.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SELECTOR: [u8; 4] = [0xde, 0xad, 0xbe, 0xef];

    #[tokio::test]
    async fn test_scripted_send_failures_then_success() {
        let chain = FakeChain::new(Chain::Celo);
        chain.fail_next_sends(["gas required exceeds allowance"]).await;

        let request = TransactionRequest::call(Address::ZERO, vec![1, 2, 3, 4]);

        assert!(chain
            .send_transaction(request.clone(), GasSetting::Auto)
            .await
            .is_err());

        let manual = GasSetting::Manual {
            gas_limit: 500_000,
            max_fee_per_gas: 50_000_000_000,
        };
        let tx_hash = chain.send_transaction(request, manual).await.unwrap();

        let attempts = chain.send_attempts().await;
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0].gas, GasSetting::Auto);
        assert_eq!(attempts[1].gas, manual);
        assert_eq!(attempts[1].tx_hash, Some(tx_hash));

        let receipt = chain.transaction_receipt(&tx_hash).await.unwrap().unwrap();
        assert!(receipt.success);
    }

    #[tokio::test]
    async fn test_call_handlers() {
        let chain = FakeChain::new(Chain::Celo);
        let contract = Address::new([0x22; 20]);

        chain.set_call_response(contract, SELECTOR, vec![7; 32]).await;
        assert_eq!(
            chain.call(&contract, &SELECTOR).await.unwrap(),
            vec![7; 32]
        );

        chain.set_call_revert(contract, SELECTOR, "nope").await;
        assert!(matches!(
            chain.call(&contract, &SELECTOR).await,
            Err(connector::Error::Reverted(_))
        ));

        assert!(chain.call(&Address::ZERO, &SELECTOR).await.is_err());
        assert_eq!(chain.call_count(SELECTOR).await, 3);
    }

    #[tokio::test]
    async fn test_call_outage() {
        let chain = FakeChain::new(Chain::Celo);
        let contract = Address::new([0x22; 20]);
        chain.set_call_response(contract, SELECTOR, vec![1; 32]).await;

        chain.fail_calls("connection refused").await;
        assert!(matches!(
            chain.call(&contract, &SELECTOR).await,
            Err(connector::Error::Provider(message)) if message == "connection refused"
        ));

        chain.restore_calls().await;
        assert_eq!(chain.call(&contract, &SELECTOR).await.unwrap(), vec![1; 32]);
    }

    #[tokio::test]
    async fn test_switch_chain() {
        let chain = FakeChain::new(Chain::Ethereum);

        chain.fail_switch_chain("User rejected the request").await;
        assert!(chain.switch_chain(Chain::Celo).await.is_err());
        assert_eq!(chain.chain_id().await.unwrap(), Chain::Ethereum.id());

        chain.switch_chain(Chain::Celo).await.unwrap();
        assert_eq!(chain.chain_id().await.unwrap(), Chain::Celo.id());
        assert_eq!(
            chain.switch_requests().await,
            vec![Chain::Celo, Chain::Celo]
        );
    }

    #[tokio::test]
    async fn test_held_and_reverted_receipts() {
        let chain = FakeChain::new(Chain::Base);
        let request = TransactionRequest::call(Address::ZERO, vec![0; 4]);
        let tx_hash = chain
            .send_transaction(request, GasSetting::Auto)
            .await
            .unwrap();

        chain.hold_receipts(2).await;
        chain.revert_transaction(tx_hash).await;

        assert!(chain.transaction_receipt(&tx_hash).await.unwrap().is_none());
        assert!(chain.transaction_receipt(&tx_hash).await.unwrap().is_none());
        let receipt = chain.transaction_receipt(&tx_hash).await.unwrap().unwrap();
        assert!(!receipt.success);
        assert_eq!(chain.receipt_polls(), 3);
    }
}
