//! Swap Orchestrator
//!
//! Drives one token exchange at a time through network checks, approval, submission and
//! confirmation. The observable [`SwapState`] is published on a watch channel and, for every
//! transition, as an [`Event::SwapStatusChanged`].
//!
//! Submission makes at most two attempts: automatic gas first, then one retry with the manual
//! ceiling from [`SwapSettings`]. A user rejection is never retried.

use std::time::Duration;

use rdk_common::connector::{
    DynChainReader, DynWalletConnector, GasSetting, TransactionReceipt, TransactionRequest,
};
use rdk_common::{
    amount, Amount, Chain, Error, TransactionError, TransactionErrorKind, TxHash,
};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::instrument;

use crate::chain::{erc20_allowance, erc20_approve};
use crate::event::{Event, EventBus};

pub mod adapter;
mod classify;
mod status;

pub use adapter::{
    AmmAdapter, Asset, BrokerAdapter, DynExchangeAdapter, ExchangeAdapter, ExchangeFamily,
    ExchangeRate, RateSource, Venue,
};
pub use classify::classify;
pub use status::{SwapError, SwapState, SwapStatus};

/// Swap settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapSettings {
    /// Gas limit used by the fallback attempt
    pub manual_gas_limit: u64,
    /// Max fee per gas (wei) used by the fallback attempt
    pub manual_max_fee_per_gas: u128,
    /// How long to wait for a receipt before giving up
    pub confirmation_timeout_secs: u64,
    /// Delay between receipt polls
    pub poll_interval_ms: u64,
    /// Slippage tolerance when a swap does not set one
    pub default_slippage_percent: f64,
}

impl Default for SwapSettings {
    fn default() -> Self {
        Self {
            manual_gas_limit: 500_000,
            manual_max_fee_per_gas: 50_000_000_000,
            confirmation_timeout_secs: 300,
            poll_interval_ms: 2_000,
            default_slippage_percent: 0.5,
        }
    }
}

impl SwapSettings {
    /// Gas setting of the fallback attempt
    pub fn manual_gas(&self) -> GasSetting {
        GasSetting::Manual {
            gas_limit: self.manual_gas_limit,
            max_fee_per_gas: self.manual_max_fee_per_gas,
        }
    }

    /// Receipt wait timeout
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    /// Receipt poll interval
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// What to swap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapParams {
    /// Token sold
    pub source: Asset,
    /// Token bought
    pub target: Asset,
    /// Amount of `source` in base units
    pub amount: Amount,
    /// Slippage tolerance in percent, settings default when unset
    #[serde(default)]
    pub slippage_tolerance_percent: Option<f64>,
}

impl SwapParams {
    /// Create new [`SwapParams`] with the default slippage
    pub fn new(source: Asset, target: Asset, amount: Amount) -> Self {
        Self {
            source,
            target,
            amount,
            slippage_tolerance_percent: None,
        }
    }

    /// Set the slippage tolerance
    pub fn with_slippage(mut self, slippage_tolerance_percent: f64) -> Self {
        self.slippage_tolerance_percent = Some(slippage_tolerance_percent);
        self
    }

    fn validate(&self, default_slippage: f64) -> Result<f64, Error> {
        if self.amount == Amount::ZERO {
            return Err(Error::Validation("Swap amount must be positive".to_string()));
        }

        if self.source.address == self.target.address {
            return Err(Error::Validation(format!(
                "Cannot swap {} for itself",
                self.source
            )));
        }

        let slippage = self.slippage_tolerance_percent.unwrap_or(default_slippage);
        amount::slippage_to_bps(slippage)?;
        Ok(slippage)
    }
}

/// Result of a completed swap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapOutcome {
    /// Swap transaction
    pub tx_hash: TxHash,
    /// Approval transaction, if one was needed
    pub approval_tx_hash: Option<TxHash>,
    /// Venue traded on
    pub venue: Venue,
    /// Amount sold
    pub amount_in: Amount,
    /// Quoted output
    pub expected_output: Amount,
    /// Output floor after slippage
    pub min_output: Amount,
    /// Swap receipt
    pub receipt: TransactionReceipt,
}

/// Swap Orchestrator for one exchange family
#[derive(Debug)]
pub struct SwapOrchestrator {
    wallet: DynWalletConnector,
    reader: DynChainReader,
    adapter: DynExchangeAdapter,
    settings: SwapSettings,
    state: watch::Sender<SwapState>,
    events: EventBus,
}

impl SwapOrchestrator {
    /// Create new [`SwapOrchestrator`]
    pub fn new(
        wallet: DynWalletConnector,
        reader: DynChainReader,
        adapter: DynExchangeAdapter,
        settings: SwapSettings,
    ) -> Self {
        let (state, _) = watch::channel(SwapState::default());

        Self {
            wallet,
            reader,
            adapter,
            settings,
            state,
            events: EventBus::default(),
        }
    }

    /// Publish status changes on an existing bus
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    /// Chain the exchange requires
    pub fn chain(&self) -> Chain {
        self.adapter.chain()
    }

    /// Snapshot of the observable state
    pub fn state(&self) -> SwapState {
        self.state.borrow().clone()
    }

    /// Current status
    pub fn status(&self) -> SwapStatus {
        self.state.borrow().status
    }

    /// Failure reason, once failed
    pub fn error(&self) -> Option<SwapError> {
        self.state.borrow().error.clone()
    }

    /// Swap transaction hash, once submitted
    pub fn tx_hash(&self) -> Option<TxHash> {
        self.state.borrow().tx_hash
    }

    /// Whether the last swap completed
    pub fn is_completed(&self) -> bool {
        self.state.borrow().is_completed()
    }

    /// Watch state changes
    pub fn subscribe(&self) -> watch::Receiver<SwapState> {
        self.state.subscribe()
    }

    /// Abandon the current attempt.
    ///
    /// Only local state is reset, a submitted transaction still finalizes on-chain.
    pub fn reset(&self) {
        let previous = self.state.send_replace(SwapState::default());
        if previous.status != SwapStatus::Idle {
            tracing::debug!("Swap reset from {}", previous.status);
            self.publish();
        }
    }

    fn publish(&self) {
        let state = self.state();
        self.events.publish(Event::SwapStatusChanged {
            status: state.status,
            tx_hash: state.tx_hash,
        });
    }

    fn transition(&self, next: SwapStatus) -> Result<(), Error> {
        let mut from = SwapStatus::Idle;

        let moved = self.state.send_if_modified(|state| {
            from = state.status;
            if state.status.can_transition_to(next) {
                state.status = next;
                true
            } else {
                false
            }
        });

        if !moved {
            return Err(Error::Validation(format!(
                "Cannot move swap from {from} to {next}"
            )));
        }

        tracing::debug!("Swap {} -> {}", from, next);
        self.publish();
        Ok(())
    }

    /// Record `err` as the failure reason and hand it back
    fn fail(&self, err: Error) -> Error {
        let swap_error = SwapError::from(&err);

        let failed = self.state.send_if_modified(|state| {
            if !state.status.can_transition_to(SwapStatus::Failed) {
                return false;
            }
            tracing::debug!("Swap {} -> failed: {}", state.status, swap_error.message);
            state.status = SwapStatus::Failed;
            state.error = Some(swap_error.clone());
            true
        });

        if failed {
            self.publish();
        }

        err
    }

    /// Compare the wallet chain with the exchange chain.
    ///
    /// Moves to `Ready` on a match and to `WrongNetwork` otherwise.
    #[instrument(skip(self))]
    pub async fn check_network(&self) -> Result<bool, Error> {
        let expected = self.adapter.chain();
        let current = self.wallet.chain_id().await?;
        let on_expected = current == expected.id();

        let next = if on_expected {
            SwapStatus::Ready
        } else {
            tracing::debug!("Wallet on chain {}, exchange needs {}", current, expected);
            SwapStatus::WrongNetwork
        };

        if self.status() != next {
            self.transition(next)?;
        }

        Ok(on_expected)
    }

    /// Ask the wallet to switch to the exchange chain.
    ///
    /// A rejection or wallet error fails the swap.
    #[instrument(skip(self))]
    pub async fn switch_network(&self) -> Result<(), Error> {
        if self.status() != SwapStatus::WrongNetwork && self.check_network().await? {
            return Ok(());
        }

        self.transition(SwapStatus::SwitchingNetwork)?;

        let expected = self.adapter.chain();
        if let Err(err) = self.wallet.switch_chain(expected).await {
            let err = classify(&err.to_string());
            tracing::warn!("Wallet did not switch to {}: {}", expected, err.raw);
            return Err(self.fail(err.into()));
        }

        match self.wallet.chain_id().await {
            Ok(id) if id == expected.id() => self.transition(SwapStatus::Ready),
            Ok(id) => {
                self.transition(SwapStatus::WrongNetwork)?;
                Err(wrong_network(id, expected))
            }
            Err(err) => Err(self.fail(err.into())),
        }
    }

    /// Rate of `source` in `target`, located on the first matching venue
    pub async fn exchange_rate(
        &self,
        source: &Asset,
        target: &Asset,
    ) -> Result<ExchangeRate, Error> {
        let venue = self.adapter.find_venue(source, target).await?;
        self.adapter.exchange_rate(&venue, source, target).await
    }

    /// Approve the venue to pull `amount` of `token` unless the allowance already covers it.
    ///
    /// Returns the approval hash when one was sent.
    #[instrument(skip(self, venue))]
    pub async fn approve_if_needed(
        &self,
        venue: &Venue,
        token: &Asset,
        amount: Amount,
    ) -> Result<Option<TxHash>, Error> {
        let owner = self.wallet.address().await?;
        let spender = self.adapter.spender(venue);
        let allowance = erc20_allowance(&self.reader, &token.address, &owner, &spender).await?;

        if allowance >= amount {
            tracing::debug!("Allowance of {} covers {}", token, amount.to_u128());
            return Ok(None);
        }

        self.transition(SwapStatus::Approving)?;

        let request = erc20_approve(&token.address, &spender, amount);
        let tx_hash = self.submit_with_gas_fallback(request).await?;
        self.wait_for_confirmation(&tx_hash).await?;

        tracing::debug!("Approved {} for {}", token, spender);
        Ok(Some(tx_hash))
    }

    /// Submit with automatic gas, retrying exactly once with the manual ceiling
    pub async fn submit_with_gas_fallback(
        &self,
        request: TransactionRequest,
    ) -> Result<TxHash, Error> {
        match self
            .wallet
            .send_transaction(request.clone(), GasSetting::Auto)
            .await
        {
            Ok(tx_hash) => return Ok(tx_hash),
            Err(err) => {
                let err = classify(&err.to_string());
                if err.kind == TransactionErrorKind::UserRejected {
                    return Err(err.into());
                }

                tracing::warn!(
                    "Submission with automatic gas failed ({}), retrying with manual gas: {}",
                    err.kind,
                    err.raw
                );
            }
        }

        self.wallet
            .send_transaction(request, self.settings.manual_gas())
            .await
            .map_err(|err| classify(&err.to_string()).into())
    }

    /// Build and submit the trade, moving through `Swapping` to `TransactionSubmitted`
    #[instrument(skip(self, venue))]
    pub async fn execute_swap(
        &self,
        venue: &Venue,
        source: &Asset,
        target: &Asset,
        amount: Amount,
        min_output: Amount,
    ) -> Result<TxHash, Error> {
        self.transition(SwapStatus::Swapping)?;

        let recipient = self.wallet.address().await?;
        let request =
            self.adapter
                .build_swap(venue, source, target, amount, min_output, &recipient)?;

        self.transition(SwapStatus::TransactionPending)?;
        let tx_hash = self.submit_with_gas_fallback(request).await?;

        self.state.send_modify(|state| state.tx_hash = Some(tx_hash));
        self.transition(SwapStatus::TransactionSubmitted)?;

        Ok(tx_hash)
    }

    /// Poll until the transaction is mined or the confirmation timeout elapses.
    ///
    /// A failing receipt is a [`TransactionErrorKind::Reverted`] error, the timeout a
    /// [`TransactionErrorKind::Timeout`] one.
    pub async fn wait_for_confirmation(
        &self,
        tx_hash: &TxHash,
    ) -> Result<TransactionReceipt, Error> {
        let poll = async {
            loop {
                match self.reader.transaction_receipt(tx_hash).await {
                    Ok(Some(receipt)) => break receipt,
                    Ok(None) => {}
                    Err(err) => tracing::warn!("Receipt poll for {} failed: {}", tx_hash, err),
                }
                tokio::time::sleep(self.settings.poll_interval()).await;
            }
        };

        let receipt = tokio::time::timeout(self.settings.confirmation_timeout(), poll)
            .await
            .map_err(|_| {
                TransactionError::new(
                    TransactionErrorKind::Timeout,
                    format!(
                        "No receipt for {} after {}s",
                        tx_hash, self.settings.confirmation_timeout_secs
                    ),
                )
            })?;

        if !receipt.success {
            return Err(TransactionError::new(
                TransactionErrorKind::Reverted,
                format!("Transaction {tx_hash} reverted"),
            )
            .into());
        }

        Ok(receipt)
    }

    /// Run a full swap.
    ///
    /// On the wrong chain the state is left at `WrongNetwork` so the caller can
    /// [`Self::switch_network`] and call again. Any other failure ends in `Failed`.
    #[instrument(skip_all, fields(source = %params.source, target = %params.target))]
    pub async fn swap(&self, params: SwapParams) -> Result<SwapOutcome, Error> {
        let status = self.status();
        if status.is_busy() {
            return Err(Error::Validation(format!(
                "A swap is already in progress ({status})"
            )));
        }
        if status.is_terminal() {
            self.reset();
        }

        let slippage = params.validate(self.settings.default_slippage_percent)?;

        match self.run_swap(&params, slippage).await {
            Ok(outcome) => Ok(outcome),
            Err(err) if self.status() == SwapStatus::WrongNetwork => Err(err),
            Err(err) => Err(self.fail(err)),
        }
    }

    async fn run_swap(&self, params: &SwapParams, slippage: f64) -> Result<SwapOutcome, Error> {
        if !self.check_network().await? {
            let current = self.wallet.chain_id().await?;
            return Err(wrong_network(current, self.adapter.chain()));
        }

        let venue = self
            .adapter
            .find_venue(&params.source, &params.target)
            .await?;
        let expected_output = self
            .adapter
            .quote(&venue, &params.source, &params.target, params.amount)
            .await?;
        let min_output = expected_output.apply_slippage(slippage)?;

        let approval_tx_hash = self
            .approve_if_needed(&venue, &params.source, params.amount)
            .await?;

        let tx_hash = self
            .execute_swap(
                &venue,
                &params.source,
                &params.target,
                params.amount,
                min_output,
            )
            .await?;

        self.transition(SwapStatus::TransactionConfirming)?;
        let receipt = self.wait_for_confirmation(&tx_hash).await?;
        self.transition(SwapStatus::Completed)?;

        tracing::info!(
            "Swapped {} {} for at least {} {} in {}",
            params.amount.to_decimal_string(params.source.decimals),
            params.source,
            min_output.to_decimal_string(params.target.decimals),
            params.target,
            tx_hash
        );

        Ok(SwapOutcome {
            tx_hash,
            approval_tx_hash,
            venue,
            amount_in: params.amount,
            expected_output,
            min_output,
            receipt,
        })
    }
}

fn wrong_network(current: u64, expected: Chain) -> Error {
    let current = Chain::from_id(current)
        .map(|chain| chain.to_string())
        .unwrap_or_else(|| format!("chain {current}"));

    Error::Chain(format!(
        "Wallet is connected to {current}, {expected} is required"
    ))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rdk_common::{Address, ErrorCode};
    use rdk_fake_chain::FakeChain;

    use super::*;
    use crate::chain::abi::{self, Token};
    use crate::swap::adapter::broker::{GET_AMOUNT_OUT, GET_EXCHANGES, GET_EXCHANGE_PROVIDERS};

    const BROKER: Address = Address::new([0xb0; 20]);
    const PROVIDER: Address = Address::new([0xa0; 20]);
    const ALLOWANCE: &str = "allowance(address,address)";

    fn celo() -> Asset {
        Asset::new("CELO", Address::new([0x01; 20]), 18)
    }

    fn cusd() -> Asset {
        Asset::new("cUSD", Address::new([0x02; 20]), 18)
    }

    fn settings() -> SwapSettings {
        SwapSettings {
            confirmation_timeout_secs: 10,
            poll_interval_ms: 10,
            ..Default::default()
        }
    }

    /// Fake Celo broker quoting 1:1, with the given allowance on the source token
    async fn scripted(wallet_chain: Chain, allowance: Amount) -> (FakeChain, SwapOrchestrator) {
        let fake = FakeChain::new(wallet_chain);

        fake.set_call_response(
            BROKER,
            abi::selector(GET_EXCHANGE_PROVIDERS),
            abi::encode(&[Token::Array(vec![Token::Address(PROVIDER)])]),
        )
        .await;
        fake.set_call_response(
            PROVIDER,
            abi::selector(GET_EXCHANGES),
            abi::encode_exchanges(&[([0x01; 32], vec![celo().address, cusd().address])]),
        )
        .await;
        fake.set_call_handler(BROKER, abi::selector(GET_AMOUNT_OUT), |data| {
            let amount_in = abi::decode_uint(&data[4..], 4).map_err(|e| e.to_string())?;
            Ok(abi::encode(&[Token::Uint(amount_in)]))
        })
        .await;
        fake.set_call_response(
            celo().address,
            abi::selector(ALLOWANCE),
            abi::encode(&[Token::Uint(allowance)]),
        )
        .await;

        let adapter = BrokerAdapter::new(Arc::new(fake.clone()), BROKER, Chain::Celo);
        let orchestrator = SwapOrchestrator::new(
            Arc::new(fake.clone()),
            Arc::new(fake.clone()),
            Arc::new(adapter),
            settings(),
        );

        (fake, orchestrator)
    }

    fn hundred() -> Amount {
        Amount::from_decimal_str("100", 18).unwrap()
    }

    fn params() -> SwapParams {
        SwapParams::new(celo(), cusd(), hundred()).with_slippage(0.5)
    }

    fn transaction_kind(err: &Error) -> Option<TransactionErrorKind> {
        match err {
            Error::Transaction(err) => Some(err.kind),
            _ => None,
        }
    }

    #[tokio::test]
    async fn test_swap_with_approval() {
        let (fake, orchestrator) = scripted(Chain::Celo, Amount::ZERO).await;
        let mut events = orchestrator.events.subscribe();

        let outcome = orchestrator.swap(params()).await.unwrap();

        assert_eq!(outcome.expected_output, hundred());
        assert_eq!(
            outcome.min_output,
            Amount::from_decimal_str("99.5", 18).unwrap()
        );
        assert!(outcome.approval_tx_hash.is_some());
        assert!(outcome.receipt.success);

        let attempts = fake.send_attempts().await;
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0].request.to, celo().address);
        assert_eq!(attempts[1].request.to, BROKER);
        assert!(attempts.iter().all(|a| a.gas == GasSetting::Auto));

        assert!(orchestrator.is_completed());
        assert_eq!(orchestrator.tx_hash(), Some(outcome.tx_hash));
        assert_eq!(orchestrator.error(), None);

        let mut seen = Vec::new();
        while let Ok(Event::SwapStatusChanged { status, .. }) = events.try_recv() {
            seen.push(status);
        }
        assert_eq!(
            seen,
            vec![
                SwapStatus::Ready,
                SwapStatus::Approving,
                SwapStatus::Swapping,
                SwapStatus::TransactionPending,
                SwapStatus::TransactionSubmitted,
                SwapStatus::TransactionConfirming,
                SwapStatus::Completed,
            ]
        );
    }

    #[tokio::test]
    async fn test_sufficient_allowance_skips_approval() {
        let (fake, orchestrator) = scripted(Chain::Celo, Amount::MAX).await;

        let outcome = orchestrator.swap(params()).await.unwrap();

        assert_eq!(outcome.approval_tx_hash, None);
        assert_eq!(fake.send_attempts().await.len(), 1);
    }

    #[tokio::test]
    async fn test_unlimited_allowance_skips_approval() {
        let (fake, orchestrator) = scripted(Chain::Celo, Amount::ZERO).await;
        fake.set_call_response(celo().address, abi::selector(ALLOWANCE), vec![0xff; 32])
            .await;

        let outcome = orchestrator.swap(params()).await.unwrap();

        assert_eq!(outcome.approval_tx_hash, None);
        assert_eq!(fake.send_attempts().await.len(), 1);
        assert_eq!(orchestrator.status(), SwapStatus::Completed);
    }

    #[tokio::test]
    async fn test_gas_fallback_retries_once() {
        let (fake, orchestrator) = scripted(Chain::Celo, Amount::MAX).await;
        fake.fail_next_sends(["cannot estimate gas; transaction may fail"])
            .await;

        orchestrator.swap(params()).await.unwrap();

        let attempts = fake.send_attempts().await;
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0].gas, GasSetting::Auto);
        assert_eq!(attempts[1].gas, settings().manual_gas());
        assert!(attempts[1].tx_hash.is_some());
    }

    #[tokio::test]
    async fn test_gas_fallback_gives_up_after_second_failure() {
        let (fake, orchestrator) = scripted(Chain::Celo, Amount::MAX).await;
        fake.fail_next_sends([
            "gas required exceeds allowance",
            "max fee per gas less than block base fee",
            "never reached",
        ])
        .await;

        let err = orchestrator.swap(params()).await.unwrap_err();

        assert_eq!(transaction_kind(&err), Some(TransactionErrorKind::GasFee));
        assert_eq!(fake.send_attempts().await.len(), 2);
        assert_eq!(orchestrator.status(), SwapStatus::Failed);
        assert_eq!(orchestrator.error().unwrap().code, ErrorCode::GasFee);
    }

    #[tokio::test]
    async fn test_user_rejection_is_not_retried() {
        let (fake, orchestrator) = scripted(Chain::Celo, Amount::MAX).await;
        fake.fail_next_sends(["User rejected the request."]).await;

        let err = orchestrator.swap(params()).await.unwrap_err();

        assert_eq!(
            transaction_kind(&err),
            Some(TransactionErrorKind::UserRejected)
        );
        assert!(!err.is_retryable());
        assert_eq!(fake.send_attempts().await.len(), 1);
        assert_eq!(orchestrator.status(), SwapStatus::Failed);
    }

    #[tokio::test]
    async fn test_wrong_network_then_switch() {
        let (fake, orchestrator) = scripted(Chain::Ethereum, Amount::MAX).await;

        let err = orchestrator.swap(params()).await.unwrap_err();
        assert!(matches!(err, Error::Chain(_)));
        assert_eq!(orchestrator.status(), SwapStatus::WrongNetwork);
        assert!(fake.send_attempts().await.is_empty());

        orchestrator.switch_network().await.unwrap();
        assert_eq!(orchestrator.status(), SwapStatus::Ready);
        assert_eq!(fake.switch_requests().await, vec![Chain::Celo]);

        orchestrator.swap(params()).await.unwrap();
        assert!(orchestrator.is_completed());
    }

    #[tokio::test]
    async fn test_switch_rejected_fails() {
        let (fake, orchestrator) = scripted(Chain::Base, Amount::MAX).await;
        fake.fail_switch_chain("User rejected the request.").await;

        assert!(!orchestrator.check_network().await.unwrap());
        let err = orchestrator.switch_network().await.unwrap_err();

        assert_eq!(
            transaction_kind(&err),
            Some(TransactionErrorKind::UserRejected)
        );
        assert_eq!(orchestrator.status(), SwapStatus::Failed);
    }

    #[tokio::test]
    async fn test_switch_on_right_chain_is_noop() {
        let (fake, orchestrator) = scripted(Chain::Celo, Amount::MAX).await;

        orchestrator.switch_network().await.unwrap();

        assert_eq!(orchestrator.status(), SwapStatus::Ready);
        assert!(fake.switch_requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_reverted_receipt_is_an_error() {
        let (fake, orchestrator) = scripted(Chain::Celo, Amount::MAX).await;
        fake.revert_all_transactions().await;

        let err = orchestrator.swap(params()).await.unwrap_err();

        assert_eq!(transaction_kind(&err), Some(TransactionErrorKind::Reverted));
        assert_eq!(orchestrator.status(), SwapStatus::Failed);
        assert!(orchestrator.tx_hash().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmation_timeout() {
        let (fake, orchestrator) = scripted(Chain::Celo, Amount::MAX).await;
        fake.hold_receipts(u32::MAX).await;

        let err = orchestrator.swap(params()).await.unwrap_err();

        assert_eq!(transaction_kind(&err), Some(TransactionErrorKind::Timeout));
        assert!(err.is_retryable());
        assert!(orchestrator.error().unwrap().retryable);
        assert!(fake.receipt_polls() > 1);
    }

    #[tokio::test]
    async fn test_no_exchange_found_fails() {
        let (_, orchestrator) = scripted(Chain::Celo, Amount::MAX).await;
        let ceur = Asset::new("cEUR", Address::new([0x03; 20]), 18);

        let err = orchestrator
            .swap(SwapParams::new(celo(), ceur, hundred()))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NoExchangeFound { .. }));
        assert_eq!(
            orchestrator.error().unwrap().code,
            ErrorCode::NoExchangeFound
        );
    }

    #[tokio::test]
    async fn test_invalid_params_leave_state_untouched() {
        let (_, orchestrator) = scripted(Chain::Celo, Amount::MAX).await;

        let zero = SwapParams::new(celo(), cusd(), Amount::ZERO);
        assert!(matches!(
            orchestrator.swap(zero).await,
            Err(Error::Validation(_))
        ));

        let same = SwapParams::new(celo(), celo(), hundred());
        assert!(orchestrator.swap(same).await.is_err());

        let slippage = params().with_slippage(150.0);
        assert!(orchestrator.swap(slippage).await.is_err());

        assert_eq!(orchestrator.status(), SwapStatus::Idle);
    }

    #[tokio::test]
    async fn test_new_swap_after_terminal_state() {
        let (fake, orchestrator) = scripted(Chain::Celo, Amount::MAX).await;
        fake.fail_next_sends(["User denied transaction signature"]).await;

        assert!(orchestrator.swap(params()).await.is_err());
        assert_eq!(orchestrator.status(), SwapStatus::Failed);

        orchestrator.swap(params()).await.unwrap();
        assert!(orchestrator.is_completed());
        assert_eq!(orchestrator.error(), None);
    }

    #[tokio::test]
    async fn test_exchange_rate() {
        let (_, orchestrator) = scripted(Chain::Celo, Amount::MAX).await;

        let rate = orchestrator.exchange_rate(&celo(), &cusd()).await.unwrap();
        assert_eq!(rate.rate, 1.0);
        assert_eq!(rate.source, RateSource::OnChain);
    }

    #[test]
    fn test_min_output_example() {
        let expected = Amount::from_decimal_str("100", 18).unwrap();
        assert_eq!(
            expected.apply_slippage(0.5).unwrap().to_decimal_string(18),
            "99.5"
        );
    }
}
