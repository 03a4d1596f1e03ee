//! Progress projections over the unfiltered ledger lists

use rdk_common::{UserAction, UserActionStatus, UserReward};
use serde::{Deserialize, Serialize};

/// A user's actions split by status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionProgress {
    /// Started but not completed
    pub in_progress: Vec<UserAction>,
    /// Completed
    pub completed: Vec<UserAction>,
}

impl ActionProgress {
    /// Partition records; not started records count as in progress
    pub fn partition(user_actions: Vec<UserAction>) -> Self {
        let (completed, in_progress) = user_actions
            .into_iter()
            .partition(|user_action| user_action.status == UserActionStatus::Completed);

        Self {
            in_progress,
            completed,
        }
    }
}

/// A user's rewards split by claim state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardSummary {
    /// Not claimed yet
    pub pending: Vec<UserReward>,
    /// Claimed
    pub claimed: Vec<UserReward>,
}

impl RewardSummary {
    /// Partition rewards by `claimed`
    pub fn partition(rewards: Vec<UserReward>) -> Self {
        let (claimed, pending) = rewards.into_iter().partition(|reward| reward.claimed);

        Self { pending, claimed }
    }
}

#[cfg(test)]
mod tests {
    use rdk_common::{RewardTemplate, RewardType};
    use serde_json::json;

    use super::*;

    #[test]
    fn test_partition_actions() {
        let mut started = UserAction::new("alice", "a");
        started.status = UserActionStatus::InProgress;
        let mut done = UserAction::new("alice", "b");
        done.status = UserActionStatus::Completed;
        let fresh = UserAction::new("alice", "c");

        let progress = ActionProgress::partition(vec![started, done, fresh]);
        assert_eq!(progress.in_progress.len(), 2);
        assert_eq!(progress.completed.len(), 1);
        assert_eq!(progress.completed[0].action_id, "b");
    }

    #[test]
    fn test_partition_rewards() {
        let template = RewardTemplate::new(RewardType::Badge, json!({}));
        let pending = UserReward::issue("alice", "a", &template, 1);
        let mut claimed = UserReward::issue("alice", "a", &template, 1);
        claimed.claimed = true;
        claimed.claimed_at = Some(2);

        let summary = RewardSummary::partition(vec![pending.clone(), claimed]);
        assert_eq!(summary.pending, vec![pending]);
        assert_eq!(summary.claimed.len(), 1);
    }
}
