use std::sync::{Arc, Mutex};
use std::time::Instant;

use rusqlite::{ffi, Connection, ErrorCode};

use crate::ledger::error::Error;

/// How many ms is considered a slow call, and it'd be logged for further debugging
const SLOW_QUERY_THRESHOLD_MS: u128 = 20;

/// Open a configured rusqlite connection to a SQLite database.
pub fn open_connection(path: &str) -> Result<Connection, Error> {
    let is_memory = path.contains(":memory:");

    let conn = if is_memory {
        Connection::open_in_memory()?
    } else {
        Connection::open(path)?
    };

    conn.pragma_update(None, "busy_timeout", 5000)?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "temp_store", "memory")?;

    if !is_memory {
        conn.pragma_update(None, "journal_mode", "wal")?;
        conn.pragma_update(None, "synchronous", "normal")?;
    }

    Ok(conn)
}

/// Async handle to a single rusqlite connection.
///
/// Every call runs on the blocking pool while holding the connection, so calls are serialized
/// and a transaction never interleaves with another writer.
#[derive(Debug, Clone)]
pub struct AsyncSqlite {
    inner: Arc<Mutex<Connection>>,
}

impl AsyncSqlite {
    /// Wrap a connection
    pub fn new(conn: Connection) -> Self {
        Self {
            inner: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run `f` against the connection
    pub async fn call<F, T>(&self, f: F) -> Result<T, Error>
    where
        F: FnOnce(&mut Connection) -> Result<T, Error> + Send + 'static,
        T: Send + 'static,
    {
        let inner = self.inner.clone();

        tokio::task::spawn_blocking(move || {
            let start = Instant::now();
            let mut conn = inner.lock().map_err(|_| Error::Poisoned)?;
            let result = f(&mut *conn).map_err(map_constraint);

            let duration = start.elapsed();
            if duration.as_millis() > SLOW_QUERY_THRESHOLD_MS {
                tracing::warn!("[SLOW QUERY] Took {} ms", duration.as_millis());
            }

            result
        })
        .await
        .map_err(|err| Error::Join(err.to_string()))?
    }
}

/// Primary key and unique violations become [`Error::Duplicate`]
fn map_constraint(err: Error) -> Error {
    if let Error::Sqlite(rusqlite::Error::SqliteFailure(
        ffi::Error {
            code,
            extended_code,
        },
        _,
    )) = &err
    {
        if *code == ErrorCode::ConstraintViolation
            && (*extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                || *extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE)
        {
            return Error::Duplicate;
        }
    }

    err
}
