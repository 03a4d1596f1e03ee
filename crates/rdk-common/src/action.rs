//! Action catalog and ledger records

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::Error;

/// Prefix of every synthetic action id
pub const SYNTHETIC_PREFIX: &str = "synthetic-";

/// How hard an action is to complete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    /// No prior experience needed
    #[default]
    #[serde(alias = "Beginner")]
    Beginner,
    /// Some on-chain experience needed
    #[serde(alias = "Intermediate")]
    Intermediate,
    /// Multi-step flows across protocols
    #[serde(alias = "Advanced")]
    Advanced,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Difficulty {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "beginner" => Ok(Difficulty::Beginner),
            "intermediate" => Ok(Difficulty::Intermediate),
            "advanced" => Ok(Difficulty::Advanced),
            _ => Err(Error::Validation(format!("Unknown difficulty `{s}`"))),
        }
    }
}

/// Kind of reward a template materializes into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RewardType {
    /// Fungible token payout
    Token,
    /// Non fungible token
    Nft,
    /// Social recognition (role, shout-out, follow)
    Social,
    /// Profile badge
    Badge,
    /// Off-chain points
    Points,
}

impl fmt::Display for RewardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RewardType::Token => "TOKEN",
            RewardType::Nft => "NFT",
            RewardType::Social => "SOCIAL",
            RewardType::Badge => "BADGE",
            RewardType::Points => "POINTS",
        };
        write!(f, "{s}")
    }
}

impl FromStr for RewardType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "TOKEN" => Ok(RewardType::Token),
            "NFT" => Ok(RewardType::Nft),
            "SOCIAL" => Ok(RewardType::Social),
            "BADGE" => Ok(RewardType::Badge),
            "POINTS" => Ok(RewardType::Points),
            _ => Err(Error::Validation(format!("Unknown reward type `{s}`"))),
        }
    }
}

/// Reward template attached to an [`Action`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardTemplate {
    /// Reward type
    #[serde(rename = "type")]
    pub reward_type: RewardType,
    /// Free form details copied onto each issued [`UserReward`]
    #[serde(default)]
    pub details: Value,
}

impl RewardTemplate {
    /// Create new [`RewardTemplate`]
    pub fn new(reward_type: RewardType, details: Value) -> Self {
        Self {
            reward_type,
            details,
        }
    }
}

/// Catalog entry describing a completable task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    /// Action id
    pub id: String,
    /// Unique title
    pub title: String,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Category (e.g. `defi`, `social`, `onboarding`)
    #[serde(default)]
    pub category: String,
    /// Chain the action happens on
    #[serde(default)]
    pub chain: String,
    /// Difficulty
    #[serde(default)]
    pub difficulty: Difficulty,
    /// Titles or ids of actions that should be completed first
    #[serde(default)]
    pub prerequisites: Vec<String>,
    /// Ordered instructions
    #[serde(default)]
    pub steps: Vec<String>,
    /// Reward templates issued on completion
    #[serde(default)]
    pub rewards: Vec<RewardTemplate>,
}

/// Reference to an action, by id and/or title
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRef {
    /// Action id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Action title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl ActionRef {
    /// Reference by id
    pub fn by_id<S: Into<String>>(id: S) -> Self {
        Self {
            id: Some(id.into()),
            title: None,
        }
    }

    /// Reference by title
    pub fn by_title<S: Into<String>>(title: S) -> Self {
        Self {
            id: None,
            title: Some(title.into()),
        }
    }

    /// Ensure the reference carries at least one non empty field
    pub fn validate(&self) -> Result<(), Error> {
        let has_id = self.id.as_deref().is_some_and(|id| !id.trim().is_empty());
        let has_title = self
            .title
            .as_deref()
            .is_some_and(|title| !title.trim().is_empty());

        if has_id || has_title {
            Ok(())
        } else {
            Err(Error::Validation(
                "Action reference requires an id or a title".to_string(),
            ))
        }
    }
}

impl fmt::Display for ActionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.id, &self.title) {
            (Some(id), _) => write!(f, "id:{id}"),
            (None, Some(title)) => write!(f, "title:{title}"),
            (None, None) => write!(f, "<empty>"),
        }
    }
}

/// Completion evidence, kept verbatim
///
/// Usually `{"txHash": "0x.."}` or `{"url": "https://..", "platform": "twitter"}`, but any
/// JSON value is accepted and stored as is.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Proof(Value);

impl Proof {
    /// Key used for transaction hash proofs
    pub const TX_HASH_KEY: &'static str = "txHash";
    /// Key used for profile url proofs
    pub const URL_KEY: &'static str = "url";
    /// Key naming the platform of a profile url proof
    pub const PLATFORM_KEY: &'static str = "platform";

    /// Wrap an arbitrary value
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// `{"txHash": hash}`
    pub fn tx_hash<S: Into<String>>(hash: S) -> Self {
        Self(serde_json::json!({ Self::TX_HASH_KEY: hash.into() }))
    }

    /// `{"platform": platform, "url": url}`
    pub fn profile_url<P: Into<String>, U: Into<String>>(platform: P, url: U) -> Self {
        Self(serde_json::json!({
            Self::PLATFORM_KEY: platform.into(),
            Self::URL_KEY: url.into(),
        }))
    }

    /// Transaction hash carried by the proof, if any.
    ///
    /// A bare JSON string is treated as a hash too.
    pub fn as_tx_hash(&self) -> Option<&str> {
        match &self.0 {
            Value::String(s) => Some(s.as_str()),
            Value::Object(map) => map.get(Self::TX_HASH_KEY).and_then(Value::as_str),
            _ => None,
        }
    }

    /// Profile url carried by the proof, if any
    pub fn as_url(&self) -> Option<&str> {
        self.0.get(Self::URL_KEY).and_then(Value::as_str)
    }

    /// Platform named by the proof, if any
    pub fn platform(&self) -> Option<&str> {
        self.0.get(Self::PLATFORM_KEY).and_then(Value::as_str)
    }

    /// Inner value
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Consume into the inner value
    pub fn into_value(self) -> Value {
        self.0
    }
}

/// Progress of a user against an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserActionStatus {
    /// Not started
    #[default]
    NotStarted,
    /// Started but not yet completed
    InProgress,
    /// Completed, rewards issued
    Completed,
}

impl fmt::Display for UserActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UserActionStatus::NotStarted => "NOT_STARTED",
            UserActionStatus::InProgress => "IN_PROGRESS",
            UserActionStatus::Completed => "COMPLETED",
        };
        write!(f, "{s}")
    }
}

impl FromStr for UserActionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NOT_STARTED" => Ok(UserActionStatus::NotStarted),
            "IN_PROGRESS" => Ok(UserActionStatus::InProgress),
            "COMPLETED" => Ok(UserActionStatus::Completed),
            _ => Err(Error::Validation(format!("Unknown action status `{s}`"))),
        }
    }
}

/// One user's progress record against one [`Action`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAction {
    /// Record id
    pub id: Uuid,
    /// User id
    pub user_id: String,
    /// Action id
    pub action_id: String,
    /// Status
    pub status: UserActionStatus,
    /// Completion evidence
    pub proof: Option<Proof>,
    /// Unix time the action was started
    pub started_at: Option<u64>,
    /// Unix time the action was completed
    pub completed_at: Option<u64>,
}

impl UserAction {
    /// Fresh record in [`UserActionStatus::NotStarted`]
    pub fn new<U: Into<String>, A: Into<String>>(user_id: U, action_id: A) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            action_id: action_id.into(),
            status: UserActionStatus::NotStarted,
            proof: None,
            started_at: None,
            completed_at: None,
        }
    }

    /// Whether the record is completed
    pub fn is_completed(&self) -> bool {
        self.status == UserActionStatus::Completed
    }
}

/// Materialized, individually claimable reward
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserReward {
    /// Reward id
    pub id: Uuid,
    /// User id
    pub user_id: String,
    /// Action the reward was issued for
    pub action_id: String,
    /// Reward type
    #[serde(rename = "type")]
    pub reward_type: RewardType,
    /// Copy of the template details at issuance time
    pub details: Value,
    /// Whether the reward was claimed
    pub claimed: bool,
    /// Unix time of the claim
    pub claimed_at: Option<u64>,
    /// Unix time of issuance
    pub issued_at: u64,
}

impl UserReward {
    /// Issue an unclaimed reward from a template
    pub fn issue(user_id: &str, action_id: &str, template: &RewardTemplate, issued_at: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_owned(),
            action_id: action_id.to_owned(),
            reward_type: template.reward_type,
            details: template.details.clone(),
            claimed: false,
            claimed_at: None,
            issued_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_action_deserialize_defaults() {
        let action: Action = serde_json::from_value(json!({
            "id": "get-cusd",
            "title": "Get cUSD Stablecoins",
            "difficulty": "Beginner",
            "rewards": [{ "type": "SOCIAL", "details": { "role": "Stable Holder" } }]
        }))
        .unwrap();

        assert_eq!(action.difficulty, Difficulty::Beginner);
        assert!(action.steps.is_empty());
        assert_eq!(action.rewards.len(), 1);
        assert_eq!(action.rewards[0].reward_type, RewardType::Social);
    }

    #[test]
    fn test_action_ref_validate() {
        assert!(ActionRef::by_id("a").validate().is_ok());
        assert!(ActionRef::by_title("Register on Optimism").validate().is_ok());
        assert!(ActionRef::default().validate().is_err());
        assert!(ActionRef::by_title("   ").validate().is_err());
    }

    #[test]
    fn test_proof_accessors() {
        let hash = format!("0x{}", "a".repeat(64));
        assert_eq!(Proof::tx_hash(hash.clone()).as_tx_hash(), Some(hash.as_str()));
        assert_eq!(Proof::new(json!(hash.clone())).as_tx_hash(), Some(hash.as_str()));

        let proof = Proof::profile_url("github", "https://github.com/octocat");
        assert_eq!(proof.as_url(), Some("https://github.com/octocat"));
        assert_eq!(proof.platform(), Some("github"));
        assert_eq!(proof.as_tx_hash(), None);
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            UserActionStatus::NotStarted,
            UserActionStatus::InProgress,
            UserActionStatus::Completed,
        ] {
            assert_eq!(UserActionStatus::from_str(&status.to_string()).unwrap(), status);
        }
    }
}
