//! SQLite Database Error

use rdk_common::database;
use thiserror::Error;

/// SQLite Database Error
#[derive(Debug, Error)]
pub enum Error {
    /// SQLite Error
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    /// Serde Error
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
    /// Uuid Error
    #[error(transparent)]
    Uuid(#[from] uuid::Error),
    /// Stored value could not be parsed
    #[error(transparent)]
    Rdk(#[from] rdk_common::Error),
    /// Domain Error raised inside a transaction
    #[error(transparent)]
    Database(#[from] database::Error),
    /// Duplicate entry
    #[error("Duplicate entry")]
    Duplicate,
    /// Connection lock poisoned by a panicking call
    #[error("Connection lock poisoned")]
    Poisoned,
    /// Blocking task failed
    #[error("Blocking task failed: {0}")]
    Join(String),
    /// Could Not Initialize Db
    #[error("Could not initialize Db")]
    CouldNotInitialize,
}

impl From<Error> for database::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Database(err) => err,
            Error::Duplicate => database::Error::Duplicate,
            Error::Serde(err) => database::Error::Serde(err),
            err => database::Error::Database(Box::new(err)),
        }
    }
}
