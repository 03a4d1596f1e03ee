//! In-memory database that is provided by the `rdk-sqlite` crate, mainly for testing purposes.
use rdk_common::database::{self, LedgerDatabase};
use rdk_common::Action;

use super::LedgerSqliteDatabase;

/// Creates a new in-memory [`LedgerSqliteDatabase`] instance
pub async fn empty() -> Result<LedgerSqliteDatabase, database::Error> {
    LedgerSqliteDatabase::new(":memory:").await
}

/// Creates a new in-memory [`LedgerSqliteDatabase`] seeded with a catalog
pub async fn new_with_actions(
    actions: Vec<Action>,
) -> Result<LedgerSqliteDatabase, database::Error> {
    let db = empty().await?;

    for action in actions {
        db.add_action(action).await?;
    }

    Ok(db)
}
