//! Swap to ledger hand-off

use rdk_common::database::CompletionReceipt;
use rdk_common::{ActionRef, Error, Proof};
use tracing::instrument;

use crate::ledger::Ledger;
use crate::swap::{SwapOrchestrator, SwapOutcome, SwapParams};

/// Complete `action_ref` for `user_id` with the swap transaction as proof
pub async fn complete_with_swap(
    ledger: &Ledger,
    user_id: &str,
    action_ref: &ActionRef,
    outcome: &SwapOutcome,
) -> Result<CompletionReceipt, Error> {
    let proof = Proof::tx_hash(outcome.tx_hash.to_string());
    ledger.complete_action(user_id, action_ref, proof).await
}

/// Run a swap and, once it is confirmed, complete `action_ref` with it.
///
/// A failed swap leaves the ledger untouched. If the completion fails after a confirmed swap
/// the swap outcome is lost to the caller but remains visible through the orchestrator state.
#[instrument(skip(orchestrator, ledger, params))]
pub async fn swap_and_complete(
    orchestrator: &SwapOrchestrator,
    ledger: &Ledger,
    user_id: &str,
    action_ref: &ActionRef,
    params: SwapParams,
) -> Result<(SwapOutcome, CompletionReceipt), Error> {
    // Fail fast before asking the wallet for anything
    ledger.resolve_action(action_ref).await?;

    let outcome = orchestrator.swap(params).await?;
    let receipt = complete_with_swap(ledger, user_id, action_ref, &outcome).await?;

    Ok((outcome, receipt))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rdk_common::{
        Action, Address, Amount, Chain, RewardTemplate, RewardType, UserActionStatus,
    };
    use rdk_fake_chain::FakeChain;
    use serde_json::json;

    use super::*;
    use crate::chain::abi::{self, Token};
    use crate::ledger::LedgerSettings;
    use crate::swap::adapter::broker::{GET_AMOUNT_OUT, GET_EXCHANGES, GET_EXCHANGE_PROVIDERS};
    use crate::swap::{Asset, BrokerAdapter, SwapSettings, SwapStatus};

    const BROKER: Address = Address::new([0xb0; 20]);
    const PROVIDER: Address = Address::new([0xa0; 20]);

    fn celo() -> Asset {
        Asset::new("CELO", Address::new([0x01; 20]), 18)
    }

    fn cusd() -> Asset {
        Asset::new("cUSD", Address::new([0x02; 20]), 18)
    }

    fn get_cusd() -> Action {
        Action {
            id: "get-cusd".to_string(),
            title: "Get cUSD Stablecoins".to_string(),
            description: "Swap CELO for cUSD".to_string(),
            category: "defi".to_string(),
            chain: "celo".to_string(),
            difficulty: Default::default(),
            prerequisites: vec![],
            steps: vec![],
            rewards: vec![RewardTemplate::new(
                RewardType::Social,
                json!({ "role": "Stable Holder" }),
            )],
        }
    }

    async fn ledger() -> Ledger {
        let db = rdk_sqlite::ledger::memory::new_with_actions(vec![get_cusd()])
            .await
            .unwrap();
        Ledger::new(Arc::new(db), LedgerSettings::default())
    }

    async fn orchestrator(fake: &FakeChain) -> SwapOrchestrator {
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
            abi::selector("allowance(address,address)"),
            abi::encode(&[Token::Uint(Amount::MAX)]),
        )
        .await;

        SwapOrchestrator::new(
            Arc::new(fake.clone()),
            Arc::new(fake.clone()),
            Arc::new(BrokerAdapter::new(
                Arc::new(fake.clone()),
                BROKER,
                Chain::Celo,
            )),
            SwapSettings {
                poll_interval_ms: 10,
                ..Default::default()
            },
        )
    }

    fn params() -> SwapParams {
        SwapParams::new(celo(), cusd(), Amount::from_decimal_str("10", 18).unwrap())
    }

    #[tokio::test]
    async fn test_swap_and_complete() {
        let fake = FakeChain::new(Chain::Celo);
        let orchestrator = orchestrator(&fake).await;
        let ledger = ledger().await;
        let action_ref = ActionRef::by_title("Get cUSD Stablecoins");

        let (outcome, receipt) =
            swap_and_complete(&orchestrator, &ledger, "user-1", &action_ref, params())
                .await
                .unwrap();

        assert_eq!(receipt.user_action.status, UserActionStatus::Completed);
        assert_eq!(
            receipt.user_action.proof,
            Some(Proof::tx_hash(outcome.tx_hash.to_string()))
        );
        assert_eq!(receipt.rewards.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_swap_leaves_ledger_untouched() {
        let fake = FakeChain::new(Chain::Celo);
        let orchestrator = orchestrator(&fake).await;
        fake.fail_next_sends(["User rejected the request."]).await;
        let ledger = ledger().await;

        let err = swap_and_complete(
            &orchestrator,
            &ledger,
            "user-1",
            &ActionRef::by_id("get-cusd"),
            params(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Transaction(_)));
        assert_eq!(orchestrator.status(), SwapStatus::Failed);
        assert!(ledger.list_user_actions("user-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_action_never_reaches_wallet() {
        let fake = FakeChain::new(Chain::Celo);
        let orchestrator = orchestrator(&fake).await;
        let ledger = ledger().await;

        let err = swap_and_complete(
            &orchestrator,
            &ledger,
            "user-1",
            &ActionRef::by_id("does-not-exist"),
            params(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::ActionNotFound(_)));
        assert!(fake.send_attempts().await.is_empty());
        assert_eq!(orchestrator.status(), SwapStatus::Idle);
    }
}
