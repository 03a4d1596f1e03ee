//! SQLite storage backend for RDK

mod common;
pub mod ledger;

pub use ledger::LedgerSqliteDatabase;
