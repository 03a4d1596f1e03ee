//! SQLite Ledger Database

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use rdk_common::action::SYNTHETIC_PREFIX;
use rdk_common::database::{self, Completion, CompletionReceipt, LedgerDatabase};
use rdk_common::state::check_user_action_transition;
use rdk_common::{
    Action, Difficulty, Proof, RewardType, UserAction, UserActionStatus, UserReward,
};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use tracing::instrument;
use uuid::Uuid;

use crate::common::{open_connection, AsyncSqlite};

pub mod error;
pub mod memory;
mod migrations;

use error::Error;

const ACTION_COLUMNS: &str =
    "id, title, description, category, chain, difficulty, prerequisites, steps, rewards";
const USER_ACTION_COLUMNS: &str =
    "id, user_id, action_id, status, proof, started_at, completed_at";
const USER_REWARD_COLUMNS: &str =
    "id, user_id, action_id, reward_type, details, claimed, claimed_at, issued_at";

/// Ledger SQLite Database
#[derive(Debug, Clone)]
pub struct LedgerSqliteDatabase {
    db: AsyncSqlite,
}

impl LedgerSqliteDatabase {
    /// Open (and migrate) the database at `path`. `:memory:` opens a private in-memory database.
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, database::Error> {
        let path = path
            .as_ref()
            .to_str()
            .ok_or(Error::CouldNotInitialize)?
            .to_owned();

        let db = tokio::task::spawn_blocking(move || -> Result<Connection, Error> {
            let mut conn = open_connection(&path)?;
            migrations::migrate(&mut conn)?;
            Ok(conn)
        })
        .await
        .map_err(|err| Error::Join(err.to_string()))??;

        Ok(Self {
            db: AsyncSqlite::new(db),
        })
    }
}

#[async_trait]
impl LedgerDatabase for LedgerSqliteDatabase {
    type Err = database::Error;

    #[instrument(skip_all, fields(action_id = %action.id))]
    async fn add_action(&self, action: Action) -> Result<bool, Self::Err> {
        Ok(self
            .db
            .call(move |conn| insert_action_if_absent(conn, &action))
            .await?)
    }

    #[instrument(skip(self))]
    async fn get_action(&self, action_id: &str) -> Result<Option<Action>, Self::Err> {
        let action_id = action_id.to_owned();
        Ok(self
            .db
            .call(move |conn| {
                conn.query_row(
                    &format!("SELECT {ACTION_COLUMNS} FROM action WHERE id = ?1"),
                    params![action_id],
                    raw_action,
                )
                .optional()?
                .map(RawAction::try_into_action)
                .transpose()
            })
            .await?)
    }

    #[instrument(skip(self))]
    async fn get_action_by_title(&self, title: &str) -> Result<Option<Action>, Self::Err> {
        let title = title.to_owned();
        Ok(self
            .db
            .call(move |conn| {
                // A seeded entry shadows a synthetic action persisted under the same title
                conn.query_row(
                    &format!(
                        "SELECT {ACTION_COLUMNS} FROM action WHERE title = ?1 ORDER BY id LIKE ?2, id LIMIT 1"
                    ),
                    params![title, format!("{SYNTHETIC_PREFIX}%")],
                    raw_action,
                )
                .optional()?
                .map(RawAction::try_into_action)
                .transpose()
            })
            .await?)
    }

    #[instrument(skip(self))]
    async fn list_actions(&self) -> Result<Vec<Action>, Self::Err> {
        Ok(self
            .db
            .call(move |conn| {
                let mut stmt =
                    conn.prepare_cached(&format!("SELECT {ACTION_COLUMNS} FROM action ORDER BY id"))?;
                let raws = stmt
                    .query_map([], raw_action)?
                    .collect::<Result<Vec<_>, _>>()?;
                raws.into_iter().map(RawAction::try_into_action).collect()
            })
            .await?)
    }

    #[instrument(skip(self))]
    async fn get_user_action(
        &self,
        user_id: &str,
        action_id: &str,
    ) -> Result<Option<UserAction>, Self::Err> {
        let user_id = user_id.to_owned();
        let action_id = action_id.to_owned();
        Ok(self
            .db
            .call(move |conn| select_user_action(conn, &user_id, &action_id))
            .await?)
    }

    #[instrument(skip(self))]
    async fn start_user_action(
        &self,
        user_id: &str,
        action_id: &str,
        started_at: u64,
    ) -> Result<UserAction, Self::Err> {
        let user_id = user_id.to_owned();
        let action_id = action_id.to_owned();

        Ok(self
            .db
            .call(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

                let exists: bool = tx.query_row(
                    "SELECT EXISTS(SELECT 1 FROM action WHERE id = ?1)",
                    params![action_id],
                    |row| row.get(0),
                )?;
                if !exists {
                    return Err(database::Error::UnknownAction(action_id).into());
                }

                let user_action = match select_user_action(&tx, &user_id, &action_id)? {
                    None => {
                        let mut user_action = UserAction::new(user_id.as_str(), action_id.as_str());
                        user_action.status = UserActionStatus::InProgress;
                        user_action.started_at = Some(started_at);
                        tx.execute(
                            &format!(
                                "INSERT INTO user_action ({USER_ACTION_COLUMNS}) VALUES (?1, ?2, ?3, ?4, NULL, ?5, NULL)"
                            ),
                            params![
                                user_action.id.to_string(),
                                user_action.user_id,
                                user_action.action_id,
                                user_action.status.to_string(),
                                started_at as i64,
                            ],
                        )?;
                        user_action
                    }
                    Some(mut user_action)
                        if check_user_action_transition(
                            user_action.status,
                            UserActionStatus::InProgress,
                        )
                        .is_ok() =>
                    {
                        user_action.status = UserActionStatus::InProgress;
                        user_action.started_at = Some(started_at);
                        tx.execute(
                            "UPDATE user_action SET status = ?1, started_at = ?2 WHERE id = ?3 AND status = 'NOT_STARTED'",
                            params![
                                user_action.status.to_string(),
                                started_at as i64,
                                user_action.id.to_string()
                            ],
                        )?;
                        user_action
                    }
                    // Already in progress or completed
                    Some(user_action) => user_action,
                };

                tx.commit()?;
                Ok(user_action)
            })
            .await?)
    }

    #[instrument(skip_all, fields(user_id = %completion.user_id, action_id = %completion.action.id))]
    async fn complete_user_action(
        &self,
        completion: Completion,
    ) -> Result<CompletionReceipt, Self::Err> {
        Ok(self
            .db
            .call(move |conn| {
                let Completion {
                    user_id,
                    action,
                    proof,
                    completed_at,
                    rewards,
                } = completion;

                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

                insert_action_if_absent(&tx, &action)?;

                let proof_json = serde_json::to_string(&proof)?;

                let user_action = match select_user_action(&tx, &user_id, &action.id)? {
                    Some(mut user_action) => {
                        check_user_action_transition(
                            user_action.status,
                            UserActionStatus::Completed,
                        )
                        .map_err(database::Error::from)?;

                        // Compare and swap on the status, a concurrent writer leaves 0 rows
                        let updated = tx.execute(
                            "UPDATE user_action SET status = 'COMPLETED', proof = ?1, completed_at = ?2 WHERE id = ?3 AND status != 'COMPLETED'",
                            params![proof_json, completed_at as i64, user_action.id.to_string()],
                        )?;
                        if updated != 1 {
                            return Err(database::Error::AlreadyCompleted.into());
                        }

                        user_action.status = UserActionStatus::Completed;
                        user_action.proof = Some(proof);
                        user_action.completed_at = Some(completed_at);
                        user_action
                    }
                    None => {
                        let mut user_action = UserAction::new(user_id.as_str(), action.id.as_str());
                        user_action.status = UserActionStatus::Completed;
                        user_action.completed_at = Some(completed_at);

                        let inserted = tx.execute(
                            &format!(
                                "INSERT INTO user_action ({USER_ACTION_COLUMNS}) VALUES (?1, ?2, ?3, 'COMPLETED', ?4, NULL, ?5)"
                            ),
                            params![
                                user_action.id.to_string(),
                                user_action.user_id,
                                user_action.action_id,
                                proof_json,
                                completed_at as i64,
                            ],
                        );

                        match inserted.map_err(Error::from) {
                            Ok(_) => {}
                            Err(Error::Sqlite(rusqlite::Error::SqliteFailure(err, _)))
                                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                            {
                                return Err(database::Error::AlreadyCompleted.into());
                            }
                            Err(err) => return Err(err),
                        }

                        user_action.proof = Some(proof);
                        user_action
                    }
                };

                for reward in &rewards {
                    tx.execute(
                        &format!(
                            "INSERT INTO user_reward ({USER_REWARD_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, 0, NULL, ?6)"
                        ),
                        params![
                            reward.id.to_string(),
                            reward.user_id,
                            reward.action_id,
                            reward.reward_type.to_string(),
                            serde_json::to_string(&reward.details)?,
                            reward.issued_at as i64,
                        ],
                    )?;
                }

                tx.commit()?;

                Ok(CompletionReceipt {
                    user_action,
                    rewards,
                })
            })
            .await?)
    }

    #[instrument(skip(self))]
    async fn list_user_actions(&self, user_id: &str) -> Result<Vec<UserAction>, Self::Err> {
        let user_id = user_id.to_owned();
        Ok(self
            .db
            .call(move |conn| {
                let mut stmt = conn.prepare_cached(&format!(
                    "SELECT {USER_ACTION_COLUMNS} FROM user_action WHERE user_id = ?1 ORDER BY action_id"
                ))?;
                let raws = stmt
                    .query_map(params![user_id], raw_user_action)?
                    .collect::<Result<Vec<_>, _>>()?;
                raws.into_iter()
                    .map(RawUserAction::try_into_user_action)
                    .collect()
            })
            .await?)
    }

    #[instrument(skip(self))]
    async fn get_reward(&self, reward_id: &Uuid) -> Result<Option<UserReward>, Self::Err> {
        let reward_id = reward_id.to_string();
        Ok(self
            .db
            .call(move |conn| select_reward(conn, &reward_id))
            .await?)
    }

    #[instrument(skip(self))]
    async fn list_user_rewards(&self, user_id: &str) -> Result<Vec<UserReward>, Self::Err> {
        let user_id = user_id.to_owned();
        Ok(self
            .db
            .call(move |conn| {
                let mut stmt = conn.prepare_cached(&format!(
                    "SELECT {USER_REWARD_COLUMNS} FROM user_reward WHERE user_id = ?1 ORDER BY issued_at, id"
                ))?;
                let raws = stmt
                    .query_map(params![user_id], raw_user_reward)?
                    .collect::<Result<Vec<_>, _>>()?;
                raws.into_iter()
                    .map(RawUserReward::try_into_user_reward)
                    .collect()
            })
            .await?)
    }

    #[instrument(skip(self))]
    async fn claim_reward(
        &self,
        reward_id: &Uuid,
        claimed_at: u64,
    ) -> Result<UserReward, Self::Err> {
        let reward_id = reward_id.to_string();
        Ok(self
            .db
            .call(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

                let updated = tx.execute(
                    "UPDATE user_reward SET claimed = 1, claimed_at = ?1 WHERE id = ?2 AND claimed = 0",
                    params![claimed_at as i64, reward_id],
                )?;

                let reward = select_reward(&tx, &reward_id)?
                    .ok_or_else(|| database::Error::UnknownReward(reward_id.clone()))?;

                if updated == 0 {
                    return Err(database::Error::AlreadyClaimed.into());
                }

                tx.commit()?;
                Ok(reward)
            })
            .await?)
    }
}

fn insert_action_if_absent(conn: &Connection, action: &Action) -> Result<bool, Error> {
    let inserted = conn.execute(
        &format!(
            "INSERT INTO action ({ACTION_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) ON CONFLICT(id) DO NOTHING"
        ),
        params![
            action.id,
            action.title,
            action.description,
            action.category,
            action.chain,
            action.difficulty.to_string(),
            serde_json::to_string(&action.prerequisites)?,
            serde_json::to_string(&action.steps)?,
            serde_json::to_string(&action.rewards)?,
        ],
    )?;

    Ok(inserted == 1)
}

fn select_user_action(
    conn: &Connection,
    user_id: &str,
    action_id: &str,
) -> Result<Option<UserAction>, Error> {
    conn.query_row(
        &format!(
            "SELECT {USER_ACTION_COLUMNS} FROM user_action WHERE user_id = ?1 AND action_id = ?2"
        ),
        params![user_id, action_id],
        raw_user_action,
    )
    .optional()?
    .map(RawUserAction::try_into_user_action)
    .transpose()
}

fn select_reward(conn: &Connection, reward_id: &str) -> Result<Option<UserReward>, Error> {
    conn.query_row(
        &format!("SELECT {USER_REWARD_COLUMNS} FROM user_reward WHERE id = ?1"),
        params![reward_id],
        raw_user_reward,
    )
    .optional()?
    .map(RawUserReward::try_into_user_reward)
    .transpose()
}

struct RawAction {
    id: String,
    title: String,
    description: String,
    category: String,
    chain: String,
    difficulty: String,
    prerequisites: String,
    steps: String,
    rewards: String,
}

fn raw_action(row: &Row<'_>) -> rusqlite::Result<RawAction> {
    Ok(RawAction {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        category: row.get(3)?,
        chain: row.get(4)?,
        difficulty: row.get(5)?,
        prerequisites: row.get(6)?,
        steps: row.get(7)?,
        rewards: row.get(8)?,
    })
}

impl RawAction {
    fn try_into_action(self) -> Result<Action, Error> {
        Ok(Action {
            id: self.id,
            title: self.title,
            description: self.description,
            category: self.category,
            chain: self.chain,
            difficulty: Difficulty::from_str(&self.difficulty)?,
            prerequisites: serde_json::from_str(&self.prerequisites)?,
            steps: serde_json::from_str(&self.steps)?,
            rewards: serde_json::from_str(&self.rewards)?,
        })
    }
}

struct RawUserAction {
    id: String,
    user_id: String,
    action_id: String,
    status: String,
    proof: Option<String>,
    started_at: Option<i64>,
    completed_at: Option<i64>,
}

fn raw_user_action(row: &Row<'_>) -> rusqlite::Result<RawUserAction> {
    Ok(RawUserAction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        action_id: row.get(2)?,
        status: row.get(3)?,
        proof: row.get(4)?,
        started_at: row.get(5)?,
        completed_at: row.get(6)?,
    })
}

impl RawUserAction {
    fn try_into_user_action(self) -> Result<UserAction, Error> {
        Ok(UserAction {
            id: Uuid::from_str(&self.id)?,
            user_id: self.user_id,
            action_id: self.action_id,
            status: UserActionStatus::from_str(&self.status)?,
            proof: self
                .proof
                .map(|proof| serde_json::from_str::<Proof>(&proof))
                .transpose()?,
            started_at: self.started_at.map(|t| t as u64),
            completed_at: self.completed_at.map(|t| t as u64),
        })
    }
}

struct RawUserReward {
    id: String,
    user_id: String,
    action_id: String,
    reward_type: String,
    details: String,
    claimed: bool,
    claimed_at: Option<i64>,
    issued_at: i64,
}

fn raw_user_reward(row: &Row<'_>) -> rusqlite::Result<RawUserReward> {
    Ok(RawUserReward {
        id: row.get(0)?,
        user_id: row.get(1)?,
        action_id: row.get(2)?,
        reward_type: row.get(3)?,
        details: row.get(4)?,
        claimed: row.get(5)?,
        claimed_at: row.get(6)?,
        issued_at: row.get(7)?,
    })
}

impl RawUserReward {
    fn try_into_user_reward(self) -> Result<UserReward, Error> {
        Ok(UserReward {
            id: Uuid::from_str(&self.id)?,
            user_id: self.user_id,
            action_id: self.action_id,
            reward_type: RewardType::from_str(&self.reward_type)?,
            details: serde_json::from_str(&self.details)?,
            claimed: self.claimed,
            claimed_at: self.claimed_at.map(|t| t as u64),
            issued_at: self.issued_at as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use rdk_common::ledger_db_test;

    use super::*;

    async fn provide_db(_name: String) -> LedgerSqliteDatabase {
        memory::empty().await.unwrap()
    }

    ledger_db_test!(provide_db);

    #[tokio::test]
    async fn test_reopen_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.sqlite");

        {
            let db = LedgerSqliteDatabase::new(&path).await.unwrap();
            let action = Action {
                id: "a".to_string(),
                title: "A".to_string(),
                description: String::new(),
                category: String::new(),
                chain: String::new(),
                difficulty: Difficulty::Advanced,
                prerequisites: vec![],
                steps: vec![],
                rewards: vec![],
            };
            assert!(db.add_action(action).await.unwrap());
        }

        let db = LedgerSqliteDatabase::new(&path).await.unwrap();
        let action = db.get_action("a").await.unwrap().unwrap();
        assert_eq!(action.difficulty, Difficulty::Advanced);
    }
}
