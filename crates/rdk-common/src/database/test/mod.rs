//! Macro with default tests
//!
//! This set is generic and checks the default and expected behaviour for a ledger database
//! implementation
#![allow(clippy::unwrap_used)]

use serde_json::json;
use uuid::Uuid;

use super::*;
use crate::action::{RewardTemplate, RewardType, UserActionStatus, SYNTHETIC_PREFIX};

fn cusd_action() -> Action {
    Action {
        id: "get-cusd".to_string(),
        title: "Get cUSD Stablecoins".to_string(),
        description: "Swap CELO for cUSD".to_string(),
        category: "defi".to_string(),
        chain: "celo".to_string(),
        difficulty: Default::default(),
        prerequisites: vec![],
        steps: vec!["Open the swap".to_string(), "Confirm".to_string()],
        rewards: vec![RewardTemplate::new(
            RewardType::Social,
            json!({ "role": "Stable Holder" }),
        )],
    }
}

fn two_reward_action() -> Action {
    Action {
        id: "bridge-to-base".to_string(),
        title: "Bridge to Base".to_string(),
        description: String::new(),
        category: "bridge".to_string(),
        chain: "base".to_string(),
        difficulty: Default::default(),
        prerequisites: vec!["get-cusd".to_string()],
        steps: vec![],
        rewards: vec![
            RewardTemplate::new(RewardType::Points, json!({ "points": 50 })),
            RewardTemplate::new(RewardType::Badge, json!({ "badge": "Bridger" })),
        ],
    }
}

fn tx_proof() -> Proof {
    Proof::tx_hash(format!("0x{}", "a".repeat(64)))
}

/// Adding the same action id twice keeps the first entry
pub async fn add_action_is_idempotent<DB>(db: DB)
where
    DB: LedgerDatabase<Err = Error>,
{
    let action = cusd_action();
    assert!(db.add_action(action.clone()).await.unwrap());

    let mut edited = action.clone();
    edited.description = "changed".to_string();
    assert!(!db.add_action(edited).await.unwrap());

    let stored = db.get_action(&action.id).await.unwrap().unwrap();
    assert_eq!(stored, action);
    assert_eq!(db.list_actions().await.unwrap().len(), 1);
}

/// Actions are found by exact title
pub async fn find_action_by_title<DB>(db: DB)
where
    DB: LedgerDatabase<Err = Error>,
{
    db.add_action(cusd_action()).await.unwrap();

    let found = db
        .get_action_by_title("Get cUSD Stablecoins")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, "get-cusd");

    assert!(db
        .get_action_by_title("get cusd stablecoins")
        .await
        .unwrap()
        .is_none());
    assert!(db.get_action("missing").await.unwrap().is_none());
}

/// Completing twice issues rewards once
pub async fn complete_twice<DB>(db: DB)
where
    DB: LedgerDatabase<Err = Error>,
{
    let action = two_reward_action();
    db.add_action(action.clone()).await.unwrap();

    let receipt = db
        .complete_user_action(Completion::new("alice", action.clone(), tx_proof(), 100))
        .await
        .unwrap();

    assert_eq!(receipt.user_action.status, UserActionStatus::Completed);
    assert_eq!(receipt.user_action.completed_at, Some(100));
    assert_eq!(receipt.user_action.proof, Some(tx_proof()));
    assert_eq!(receipt.rewards.len(), 2);
    assert!(receipt.rewards.iter().all(|reward| !reward.claimed));

    let second = db
        .complete_user_action(Completion::new("alice", action.clone(), tx_proof(), 200))
        .await;
    assert!(matches!(second, Err(Error::AlreadyCompleted)));

    let rewards = db.list_user_rewards("alice").await.unwrap();
    assert_eq!(rewards.len(), action.rewards.len());

    let record = db
        .get_user_action("alice", &action.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.completed_at, Some(100));
}

/// Concurrent completions of the same pair succeed exactly once
pub async fn concurrent_completion_issues_once<DB>(db: DB)
where
    DB: LedgerDatabase<Err = Error>,
{
    let action = cusd_action();
    db.add_action(action.clone()).await.unwrap();

    let attempts = (0..8).map(|i| {
        db.complete_user_action(Completion::new("bob", action.clone(), tx_proof(), 100 + i))
    });
    let results = futures::future::join_all(attempts).await;

    let successes = results.iter().filter(|result| result.is_ok()).count();
    assert_eq!(successes, 1);
    assert!(results
        .iter()
        .filter(|result| result.is_err())
        .all(|result| matches!(result, Err(Error::AlreadyCompleted))));

    assert_eq!(db.list_user_rewards("bob").await.unwrap().len(), 1);
    assert_eq!(db.list_user_actions("bob").await.unwrap().len(), 1);
}

/// Completing an action missing from the catalog persists it
pub async fn completion_persists_unknown_action<DB>(db: DB)
where
    DB: LedgerDatabase<Err = Error>,
{
    let mut action = cusd_action();
    action.id = "synthetic-register-on-optimism".to_string();
    action.title = "Register on Optimism".to_string();
    action.rewards = vec![];

    assert!(db.get_action(&action.id).await.unwrap().is_none());

    let receipt = db
        .complete_user_action(Completion::new("carol", action.clone(), tx_proof(), 5))
        .await
        .unwrap();
    assert!(receipt.rewards.is_empty());

    let stored = db.get_action(&action.id).await.unwrap().unwrap();
    assert_eq!(stored.title, "Register on Optimism");
}

/// Seeding a title already taken by a persisted synthetic action adds the catalog entry
pub async fn seed_after_synthetic_title<DB>(db: DB)
where
    DB: LedgerDatabase<Err = Error>,
{
    let mut synthetic = cusd_action();
    synthetic.id = format!("{SYNTHETIC_PREFIX}register-on-celo");
    synthetic.title = "Register on Celo".to_string();
    synthetic.rewards = vec![];

    db.complete_user_action(Completion::new("dora", synthetic.clone(), tx_proof(), 5))
        .await
        .unwrap();

    let mut seeded = synthetic.clone();
    seeded.id = "register-celo".to_string();
    assert!(db.add_action(seeded.clone()).await.unwrap());
    assert!(!db.add_action(seeded).await.unwrap());

    assert_eq!(db.list_actions().await.unwrap().len(), 2);
    let by_title = db
        .get_action_by_title("Register on Celo")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_title.id, "register-celo");
    assert!(db.get_action(&synthetic.id).await.unwrap().is_some());
}

/// Claiming twice leaves the first claim time in place
pub async fn claim_once<DB>(db: DB)
where
    DB: LedgerDatabase<Err = Error>,
{
    let action = cusd_action();
    db.add_action(action.clone()).await.unwrap();
    let receipt = db
        .complete_user_action(Completion::new("dave", action, tx_proof(), 10))
        .await
        .unwrap();
    let reward_id = receipt.rewards[0].id;

    let claimed = db.claim_reward(&reward_id, 20).await.unwrap();
    assert!(claimed.claimed);
    assert_eq!(claimed.claimed_at, Some(20));

    let second = db.claim_reward(&reward_id, 30).await;
    assert!(matches!(second, Err(Error::AlreadyClaimed)));

    let stored = db.get_reward(&reward_id).await.unwrap().unwrap();
    assert!(stored.claimed);
    assert_eq!(stored.claimed_at, Some(20));
}

/// Claiming a reward that does not exist
pub async fn claim_unknown_reward<DB>(db: DB)
where
    DB: LedgerDatabase<Err = Error>,
{
    let result = db.claim_reward(&Uuid::new_v4(), 1).await;
    assert!(matches!(result, Err(Error::UnknownReward(_))));
}

/// Starting never regresses a record
pub async fn start_never_regresses<DB>(db: DB)
where
    DB: LedgerDatabase<Err = Error>,
{
    let action = cusd_action();
    db.add_action(action.clone()).await.unwrap();

    let started = db.start_user_action("erin", &action.id, 1).await.unwrap();
    assert_eq!(started.status, UserActionStatus::InProgress);
    assert_eq!(started.started_at, Some(1));

    let again = db.start_user_action("erin", &action.id, 2).await.unwrap();
    assert_eq!(again.id, started.id);
    assert_eq!(again.started_at, Some(1));

    let receipt = db
        .complete_user_action(Completion::new("erin", action.clone(), tx_proof(), 3))
        .await
        .unwrap();
    assert_eq!(receipt.user_action.id, started.id);
    assert_eq!(receipt.user_action.started_at, Some(1));

    let after = db.start_user_action("erin", &action.id, 4).await.unwrap();
    assert_eq!(after.status, UserActionStatus::Completed);
    assert_eq!(after.completed_at, Some(3));
}

/// Starting an action missing from the catalog
pub async fn start_unknown_action<DB>(db: DB)
where
    DB: LedgerDatabase<Err = Error>,
{
    let result = db.start_user_action("frank", "missing", 1).await;
    assert!(matches!(result, Err(Error::UnknownAction(_))));
}

/// Records are scoped per user
pub async fn per_user_isolation<DB>(db: DB)
where
    DB: LedgerDatabase<Err = Error>,
{
    let action = cusd_action();
    db.add_action(action.clone()).await.unwrap();
    db.add_action(two_reward_action()).await.unwrap();

    db.complete_user_action(Completion::new("gina", action.clone(), tx_proof(), 1))
        .await
        .unwrap();
    db.complete_user_action(Completion::new("hank", action.clone(), tx_proof(), 2))
        .await
        .unwrap();
    db.start_user_action("hank", "bridge-to-base", 3)
        .await
        .unwrap();

    assert_eq!(db.list_user_actions("gina").await.unwrap().len(), 1);
    assert_eq!(db.list_user_actions("hank").await.unwrap().len(), 2);
    assert_eq!(db.list_user_rewards("gina").await.unwrap().len(), 1);
    assert_eq!(db.list_user_rewards("hank").await.unwrap().len(), 1);
    assert!(db.list_user_rewards("nobody").await.unwrap().is_empty());
}

/// Proofs of any shape are stored verbatim
pub async fn proof_stored_verbatim<DB>(db: DB)
where
    DB: LedgerDatabase<Err = Error>,
{
    let action = cusd_action();
    db.add_action(action.clone()).await.unwrap();

    let proof = Proof::new(json!({ "note": "screenshot", "nested": { "n": [1, 2, 3] } }));
    db.complete_user_action(Completion::new("ivy", action.clone(), proof.clone(), 1))
        .await
        .unwrap();

    let record = db
        .get_user_action("ivy", &action.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.proof, Some(proof));
}

/// Unit test that is expected to be passed for a correct ledger database implementation
#[macro_export]
macro_rules! ledger_db_test {
    ($make_db_fn:ident) => {
        ledger_db_test!(
            $make_db_fn,
            add_action_is_idempotent,
            find_action_by_title,
            complete_twice,
            concurrent_completion_issues_once,
            completion_persists_unknown_action,
            seed_after_synthetic_title,
            claim_once,
            claim_unknown_reward,
            start_never_regresses,
            start_unknown_action,
            per_user_isolation,
            proof_stored_verbatim
        );
    };
    ($make_db_fn:ident, $($name:ident),+ $(,)?) => {
        $(
            #[tokio::test]
            async fn $name() {
                use std::time::{SystemTime, UNIX_EPOCH};
                let now = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .expect("Time went backwards");

                rdk_common::database::test::$name($make_db_fn(format!("test_{}_{}", now.as_nanos(), stringify!($name))).await).await;
            }
        )+
    };
}
