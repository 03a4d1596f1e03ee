//! Action/Reward Ledger
//!
//! Tracks which user completed which action and materializes one claimable reward per reward
//! template on completion. Exactly-once issuance is delegated to the storage backend, which
//! performs the "not yet completed" check and the write as one atomic conditional write.

use std::sync::Arc;

use rdk_common::database::{Completion, CompletionReceipt, DynLedgerDatabase};
use rdk_common::state::check_reward_claim;
use rdk_common::util::unix_time;
use rdk_common::{Action, ActionRef, Error, Proof, UserAction, UserReward};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::event::{Event, EventBus};
use crate::proof;

mod progress;
mod registry;

pub use progress::{ActionProgress, RewardSummary};
pub use registry::{synthetic_id, WellKnownRegistry, DEFAULT_WELL_KNOWN, SYNTHETIC_PREFIX};

/// What the ledger does with proofs that fail validation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProofPolicy {
    /// Log and accept
    Advisory,
    /// Reject with a validation error
    #[default]
    Enforce,
}

/// Ledger settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSettings {
    /// Proof policy applied in [`Ledger::complete_action`]
    #[serde(default)]
    pub proof_policy: ProofPolicy,
    /// Titles added to the default well-known registry
    #[serde(default)]
    pub extra_well_known: Vec<String>,
}

/// Action/Reward Ledger
#[derive(Debug, Clone)]
pub struct Ledger {
    localstore: DynLedgerDatabase,
    registry: Arc<WellKnownRegistry>,
    proof_policy: ProofPolicy,
    events: EventBus,
}

fn require_user(user_id: &str) -> Result<(), Error> {
    if user_id.trim().is_empty() {
        return Err(Error::Authentication("No user id".to_string()));
    }
    Ok(())
}

impl Ledger {
    /// Create new [`Ledger`]
    pub fn new(localstore: DynLedgerDatabase, settings: LedgerSettings) -> Self {
        let mut registry = WellKnownRegistry::default();
        registry.extend(settings.extra_well_known);

        Self {
            localstore,
            registry: Arc::new(registry),
            proof_policy: settings.proof_policy,
            events: EventBus::default(),
        }
    }

    /// Publish events on an existing bus
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    /// Event bus the ledger publishes on
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Well-known external actions
    pub fn registry(&self) -> &WellKnownRegistry {
        &self.registry
    }

    /// Add an action to the catalog, returns `false` if the id was already known
    #[instrument(skip_all, fields(action_id = %action.id))]
    pub async fn add_action(&self, action: Action) -> Result<bool, Error> {
        if action.id.trim().is_empty() || action.title.trim().is_empty() {
            return Err(Error::Validation(
                "Action requires an id and a title".to_string(),
            ));
        }

        Ok(self.localstore.add_action(action).await?)
    }

    /// The catalog
    pub async fn list_actions(&self) -> Result<Vec<Action>, Error> {
        Ok(self.localstore.list_actions().await?)
    }

    /// Resolve a reference to a catalog or well-known action.
    ///
    /// The id wins when present. A title that is neither in the catalog nor in the well-known
    /// registry is [`Error::ActionNotFound`].
    #[instrument(skip(self))]
    pub async fn resolve_action(&self, action_ref: &ActionRef) -> Result<Action, Error> {
        action_ref.validate()?;

        if let Some(id) = action_ref.id.as_deref().filter(|id| !id.trim().is_empty()) {
            if let Some(action) = self.localstore.get_action(id).await? {
                return Ok(action);
            }

            if let Some(action) = self.registry.lookup_id(id) {
                return Ok(action);
            }

            if action_ref.title.is_none() {
                return Err(Error::ActionNotFound(id.to_string()));
            }
        }

        let title = action_ref
            .title
            .as_deref()
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .ok_or_else(|| Error::ActionNotFound(action_ref.to_string()))?;

        if let Some(action) = self.localstore.get_action_by_title(title).await? {
            return Ok(action);
        }

        match self.registry.lookup_title(title) {
            Some(synthetic) => {
                // A persisted synthetic action keeps its derived id
                match self.localstore.get_action(&synthetic.id).await? {
                    Some(action) => Ok(action),
                    None => {
                        tracing::debug!("Resolved {} to synthetic {}", title, synthetic.id);
                        Ok(synthetic)
                    }
                }
            }
            None => Err(Error::ActionNotFound(title.to_string())),
        }
    }

    /// Move the user's record to in progress. A completed record is returned unchanged.
    #[instrument(skip(self))]
    pub async fn start_action(
        &self,
        user_id: &str,
        action_ref: &ActionRef,
    ) -> Result<UserAction, Error> {
        require_user(user_id)?;
        let action = self.resolve_action(action_ref).await?;

        if action.id.starts_with(SYNTHETIC_PREFIX) {
            self.localstore.add_action(action.clone()).await?;
        }

        let user_action = self
            .localstore
            .start_user_action(user_id, &action.id, unix_time())
            .await?;

        self.events.publish(Event::ActionStarted {
            user_id: user_id.to_string(),
            action_id: action.id,
        });

        Ok(user_action)
    }

    /// Complete an action and issue its rewards.
    ///
    /// Fails with [`Error::AlreadyCompleted`] if the user completed it before, in which case no
    /// reward is issued. The proof is stored verbatim.
    #[instrument(skip(self, proof))]
    pub async fn complete_action(
        &self,
        user_id: &str,
        action_ref: &ActionRef,
        proof: Proof,
    ) -> Result<CompletionReceipt, Error> {
        require_user(user_id)?;
        let action = self.resolve_action(action_ref).await?;

        if let Err(err) = proof::validate_proof(&proof) {
            match self.proof_policy {
                ProofPolicy::Enforce => return Err(err),
                ProofPolicy::Advisory => {
                    tracing::warn!("Accepting proof for {} that failed validation: {}", action.id, err)
                }
            }
        }

        let completion = Completion::new(user_id, action, proof, unix_time());
        let receipt = self.localstore.complete_user_action(completion).await?;

        tracing::info!(
            "User {} completed {}, issued {} rewards",
            user_id,
            receipt.user_action.action_id,
            receipt.rewards.len()
        );

        self.events.publish(Event::ActionCompleted {
            user_id: user_id.to_string(),
            action_id: receipt.user_action.action_id.clone(),
            reward_ids: receipt.rewards.iter().map(|reward| reward.id).collect(),
        });

        Ok(receipt)
    }

    /// Claim a reward. A second claim fails with [`Error::AlreadyClaimed`].
    #[instrument(skip(self))]
    pub async fn claim_reward(&self, reward_id: &Uuid) -> Result<UserReward, Error> {
        let reward = self.localstore.claim_reward(reward_id, unix_time()).await?;

        tracing::info!("User {} claimed reward {}", reward.user_id, reward.id);

        self.events.publish(Event::RewardClaimed {
            user_id: reward.user_id.clone(),
            reward_id: reward.id,
        });

        Ok(reward)
    }

    /// Claim a reward on behalf of `user_id`.
    ///
    /// Rewards of other users are reported as not found.
    pub async fn claim_user_reward(
        &self,
        user_id: &str,
        reward_id: &Uuid,
    ) -> Result<UserReward, Error> {
        require_user(user_id)?;

        match self.localstore.get_reward(reward_id).await? {
            Some(reward) if reward.user_id == user_id => {
                // Storage still guards the claim against a concurrent writer
                check_reward_claim(reward.claimed)?;
                self.claim_reward(reward_id).await
            }
            _ => Err(Error::RewardNotFound(reward_id.to_string())),
        }
    }

    /// All progress records of a user
    pub async fn list_user_actions(&self, user_id: &str) -> Result<Vec<UserAction>, Error> {
        require_user(user_id)?;
        Ok(self.localstore.list_user_actions(user_id).await?)
    }

    /// All rewards of a user
    pub async fn list_user_rewards(&self, user_id: &str) -> Result<Vec<UserReward>, Error> {
        require_user(user_id)?;
        Ok(self.localstore.list_user_rewards(user_id).await?)
    }

    /// User actions split into in progress and completed
    pub async fn action_progress(&self, user_id: &str) -> Result<ActionProgress, Error> {
        Ok(ActionProgress::partition(
            self.list_user_actions(user_id).await?,
        ))
    }

    /// User rewards split into pending and claimed
    pub async fn reward_summary(&self, user_id: &str) -> Result<RewardSummary, Error> {
        Ok(RewardSummary::partition(
            self.list_user_rewards(user_id).await?,
        ))
    }
}
