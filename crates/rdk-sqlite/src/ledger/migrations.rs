use rusqlite::Connection;

use super::error::Error;

/// Latest database version
pub const DB_VERSION: u32 = 1;

/// Schema definition
const INIT_SQL: &str = r#"
-- Action catalog
CREATE TABLE IF NOT EXISTS action (
id TEXT PRIMARY KEY,
title TEXT NOT NULL,
description TEXT NOT NULL,
category TEXT NOT NULL,
chain TEXT NOT NULL,
difficulty TEXT NOT NULL,
prerequisites TEXT NOT NULL,
steps TEXT NOT NULL,
rewards TEXT NOT NULL
);

-- One progress record per (user, action)
CREATE TABLE IF NOT EXISTS user_action (
id TEXT PRIMARY KEY,
user_id TEXT NOT NULL,
action_id TEXT NOT NULL REFERENCES action(id),
status TEXT CHECK ( status IN ('NOT_STARTED', 'IN_PROGRESS', 'COMPLETED' ) ) NOT NULL,
proof TEXT,
started_at INTEGER,
completed_at INTEGER,
UNIQUE (user_id, action_id)
);

CREATE INDEX IF NOT EXISTS action_title_index ON action(title);

CREATE INDEX IF NOT EXISTS user_action_user_id_index ON user_action(user_id);

-- Materialized rewards
CREATE TABLE IF NOT EXISTS user_reward (
id TEXT PRIMARY KEY,
user_id TEXT NOT NULL,
action_id TEXT NOT NULL REFERENCES action(id),
reward_type TEXT NOT NULL,
details TEXT NOT NULL,
claimed INTEGER NOT NULL DEFAULT 0 CHECK ( claimed IN (0, 1) ),
claimed_at INTEGER,
issued_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS user_reward_user_id_index ON user_reward(user_id);
"#;

/// Bring the schema to [`DB_VERSION`]
pub fn migrate(conn: &mut Connection) -> Result<(), Error> {
    let version: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if version > DB_VERSION {
        tracing::error!(
            "Database version {} is newer than supported version {}",
            version,
            DB_VERSION
        );
        return Err(Error::CouldNotInitialize);
    }

    if version < DB_VERSION {
        let tx = conn.transaction()?;
        tx.execute_batch(INIT_SQL)?;
        tx.pragma_update(None, "user_version", DB_VERSION)?;
        tx.commit()?;
        tracing::info!("Migrated ledger database to version {}", DB_VERSION);
    }

    Ok(())
}
