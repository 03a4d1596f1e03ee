//! RDK Database

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::action::{Action, Proof, UserAction, UserReward};

#[cfg(feature = "test")]
pub mod test;

/// RDK_database error
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database Error
    #[error(transparent)]
    Database(Box<dyn std::error::Error + Send + Sync>),
    /// Duplicate entry
    #[error("Duplicate entry")]
    Duplicate,
    /// The (user, action) pair is already completed
    #[error("Action already completed")]
    AlreadyCompleted,
    /// Reward already claimed
    #[error("Reward already claimed")]
    AlreadyClaimed,
    /// Unknown action
    #[error("Unknown action: {0}")]
    UnknownAction(String),
    /// Unknown reward
    #[error("Unknown reward: {0}")]
    UnknownReward(String),
    /// Invalid state transition
    #[error("Invalid state transition")]
    InvalidStateTransition(crate::state::Error),
    /// Serde Error
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
    /// Internal error
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl From<crate::state::Error> for Error {
    fn from(state: crate::state::Error) -> Self {
        match state {
            crate::state::Error::AlreadyCompleted => Error::AlreadyCompleted,
            crate::state::Error::AlreadyClaimed => Error::AlreadyClaimed,
            _ => Error::InvalidStateTransition(state),
        }
    }
}

/// Everything a backend needs to complete a (user, action) pair in one atomic write
#[derive(Debug, Clone)]
pub struct Completion {
    /// User id
    pub user_id: String,
    /// Action being completed. Inserted if the catalog does not hold it yet.
    pub action: Action,
    /// Completion evidence, stored verbatim
    pub proof: Proof,
    /// Unix time of completion
    pub completed_at: u64,
    /// One reward per template of `action`
    pub rewards: Vec<UserReward>,
}

impl Completion {
    /// Build a completion, materializing one unclaimed reward per template
    pub fn new(user_id: &str, action: Action, proof: Proof, completed_at: u64) -> Self {
        let rewards = action
            .rewards
            .iter()
            .map(|template| UserReward::issue(user_id, &action.id, template, completed_at))
            .collect();

        Self {
            user_id: user_id.to_owned(),
            action,
            proof,
            completed_at,
            rewards,
        }
    }
}

/// Result of a successful completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionReceipt {
    /// The completed record
    pub user_action: UserAction,
    /// Rewards issued by this completion
    pub rewards: Vec<UserReward>,
}

/// Ledger Database trait
///
/// Implementations MUST make [`LedgerDatabase::complete_user_action`] and
/// [`LedgerDatabase::claim_reward`] atomic conditional writes: concurrent callers racing on the
/// same `(user_id, action_id)` or reward id observe exactly one success.
#[async_trait]
pub trait LedgerDatabase: Debug {
    /// Ledger Database Error
    type Err: Into<Error> + From<Error>;

    /// Add action to the catalog if its id is not known yet.
    ///
    /// Returns `true` when the action was inserted. Titles are not unique, a catalog entry may
    /// share its title with a synthetic action persisted earlier.
    async fn add_action(&self, action: Action) -> Result<bool, Self::Err>;
    /// Get action by id
    async fn get_action(&self, action_id: &str) -> Result<Option<Action>, Self::Err>;
    /// Get action by exact title, catalog entries win over synthetic ones
    async fn get_action_by_title(&self, title: &str) -> Result<Option<Action>, Self::Err>;
    /// List the catalog
    async fn list_actions(&self) -> Result<Vec<Action>, Self::Err>;

    /// Get the progress record of a user for an action
    async fn get_user_action(
        &self,
        user_id: &str,
        action_id: &str,
    ) -> Result<Option<UserAction>, Self::Err>;
    /// Move the record to `IN_PROGRESS`, creating it if needed.
    ///
    /// A record already in progress or completed is returned unchanged.
    async fn start_user_action(
        &self,
        user_id: &str,
        action_id: &str,
        started_at: u64,
    ) -> Result<UserAction, Self::Err>;
    /// Complete the action and issue its rewards.
    ///
    /// Fails with [`Error::AlreadyCompleted`] when the record is already `COMPLETED`, in which
    /// case nothing is written.
    async fn complete_user_action(
        &self,
        completion: Completion,
    ) -> Result<CompletionReceipt, Self::Err>;
    /// All progress records of a user
    async fn list_user_actions(&self, user_id: &str) -> Result<Vec<UserAction>, Self::Err>;

    /// Get reward by id
    async fn get_reward(&self, reward_id: &Uuid) -> Result<Option<UserReward>, Self::Err>;
    /// All rewards of a user
    async fn list_user_rewards(&self, user_id: &str) -> Result<Vec<UserReward>, Self::Err>;
    /// Flip `claimed` to true and stamp `claimed_at`.
    ///
    /// Fails with [`Error::AlreadyClaimed`] if the reward was claimed before, leaving the first
    /// `claimed_at` untouched, and with [`Error::UnknownReward`] if it does not exist.
    async fn claim_reward(
        &self,
        reward_id: &Uuid,
        claimed_at: u64,
    ) -> Result<UserReward, Self::Err>;
}

/// Type alias for a shareable ledger database
pub type DynLedgerDatabase = Arc<dyn LedgerDatabase<Err = Error> + Send + Sync>;
