//! Building the ledger and registration checker from [`Settings`]

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use rdk::chain::JsonRpcReader;
use rdk::connector::DynChainReader;
use rdk::ledger::Ledger;
use rdk::rdk_database::DynLedgerDatabase;
use rdk::registration::RegistrationChecker;
use rdk::Action;
use rdk_fake_chain::FakeChain;
use rdk_sqlite::LedgerSqliteDatabase;
use url::Url;

use crate::config::{ChainBackend, ChainConfig, Database, DatabaseEngine, Settings};

/// Default SQLite file name inside the work directory
pub const DEFAULT_DB_FILE: &str = "rdk-server.sqlite";

/// Open the configured storage backend
pub async fn setup_database(work_dir: &Path, database: &Database) -> Result<DynLedgerDatabase> {
    let localstore: DynLedgerDatabase = match database.engine {
        DatabaseEngine::Sqlite => {
            let path = database
                .path
                .as_ref()
                .map(|path| work_dir.join(path))
                .unwrap_or_else(|| work_dir.join(DEFAULT_DB_FILE));
            tracing::info!("Using sqlite database at {}", path.display());
            Arc::new(LedgerSqliteDatabase::new(path).await?)
        }
        DatabaseEngine::Memory => {
            tracing::warn!("Using in-memory database, progress is lost on restart");
            Arc::new(rdk_sqlite::ledger::memory::empty().await?)
        }
    };

    Ok(localstore)
}

/// Add catalog entries whose id is not known yet, returns how many were added
pub async fn seed_actions(ledger: &Ledger, actions: &[Action]) -> Result<usize> {
    let mut added = 0;

    for action in actions {
        if ledger.add_action(action.clone()).await? {
            added += 1;
        } else {
            tracing::debug!("Action {} already in catalog", action.id);
        }
    }

    Ok(added)
}

/// One reader per configured chain
pub fn setup_registration_checker(chains: &[ChainConfig]) -> Result<RegistrationChecker> {
    let mut checker = RegistrationChecker::new();

    for config in chains {
        let reader: DynChainReader = match config.backend {
            ChainBackend::Rpc => {
                let rpc_url = config
                    .rpc_url
                    .as_deref()
                    .ok_or_else(|| anyhow!("Chain {} requires an rpc_url", config.chain))?;
                Arc::new(JsonRpcReader::new(config.chain, Url::parse(rpc_url)?)?)
            }
            ChainBackend::Fake => {
                tracing::warn!("Using fake chain reader for {}", config.chain);
                Arc::new(FakeChain::new(config.chain))
            }
        };

        checker = checker.with_reader(config.chain, reader);
    }

    Ok(checker)
}

/// Ledger over the configured storage, with the seed catalog added
pub async fn setup_ledger(work_dir: &Path, settings: &Settings) -> Result<Ledger> {
    let localstore = setup_database(work_dir, &settings.database).await?;
    let ledger = Ledger::new(localstore, settings.ledger.clone());

    let added = seed_actions(&ledger, &settings.actions).await?;
    tracing::info!(
        "Catalog seeded, {} of {} configured actions were new",
        added,
        settings.actions.len()
    );

    Ok(ledger)
}
