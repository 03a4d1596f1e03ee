//! Server settings, derived from `config.toml`

use std::path::PathBuf;

use config::{Config, ConfigError, File};
use rdk::ledger::LedgerSettings;
use rdk::{Action, Chain};
use serde::{Deserialize, Serialize};

/// Listen address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Info {
    /// Host to bind
    pub listen_host: String,
    /// Port to bind
    pub listen_port: u16,
}

impl Default for Info {
    fn default() -> Self {
        Self {
            listen_host: "127.0.0.1".to_string(),
            listen_port: 8085,
        }
    }
}

/// Storage engine
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseEngine {
    /// SQLite file in the work directory
    #[default]
    Sqlite,
    /// In-memory SQLite, lost on restart
    Memory,
}

impl std::str::FromStr for DatabaseEngine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(DatabaseEngine::Sqlite),
            "memory" => Ok(DatabaseEngine::Memory),
            _ => Err(format!("Unknown database engine: {s}")),
        }
    }
}

/// Database settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Database {
    /// Engine
    pub engine: DatabaseEngine,
    /// SQLite file, `rdk-server.sqlite` in the work directory when unset
    pub path: Option<String>,
}

/// Where chain reads for a chain go
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChainBackend {
    /// Node JSON-RPC endpoint
    #[default]
    Rpc,
    /// Scriptable in-process chain, every registry lookup reads as not registered
    Fake,
}

/// Chain used by the registration checker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Chain
    pub chain: Chain,
    /// Backend
    #[serde(default)]
    pub backend: ChainBackend,
    /// JSON-RPC endpoint, required by the `rpc` backend
    pub rpc_url: Option<String>,
}

/// Where log output goes
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LoggingOutput {
    /// Console only
    #[default]
    Stdout,
    /// Daily rolling file in `<work_dir>/logs` only
    File,
    /// Console and file
    Both,
}

impl std::str::FromStr for LoggingOutput {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stdout" => Ok(LoggingOutput::Stdout),
            "file" => Ok(LoggingOutput::File),
            "both" => Ok(LoggingOutput::Both),
            _ => Err(format!("Unknown logging output: {s}")),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    /// Output
    #[serde(default)]
    pub output: LoggingOutput,
    /// Console level, `info` when unset
    pub console_level: Option<String>,
    /// File level, `debug` when unset
    pub file_level: Option<String>,
}

/// RDK server settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Listen address
    #[serde(default)]
    pub info: Info,
    /// Storage
    #[serde(default)]
    pub database: Database,
    /// Ledger behaviour
    #[serde(default)]
    pub ledger: LedgerSettings,
    /// Chains the registration checker can read
    #[serde(default)]
    pub chains: Vec<ChainConfig>,
    /// Catalog seed, added on start when the id is not known yet
    #[serde(default)]
    pub actions: Vec<Action>,
    /// Logging
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Settings {
    /// Load settings from `config_file_name`, falling back to defaults if it cannot be read
    #[must_use]
    pub fn new<P>(config_file_name: Option<P>) -> Self
    where
        P: Into<PathBuf>,
    {
        let default_settings = Self::default();
        // attempt to construct settings with file
        let from_file = Self::new_from_default(&default_settings, config_file_name);
        match from_file {
            Ok(f) => f,
            Err(e) => {
                tracing::error!("Error reading config file, falling back to defaults. Error: {e}");
                default_settings
            }
        }
    }

    fn new_from_default<P>(
        default: &Settings,
        config_file_name: Option<P>,
    ) -> Result<Self, ConfigError>
    where
        P: Into<PathBuf>,
    {
        let mut default_config_file_name = home::home_dir()
            .ok_or(ConfigError::NotFound("Config Path".to_string()))?
            .join(crate::DEFAULT_WORK_DIR);

        default_config_file_name.push("config.toml");
        let config: String = match config_file_name {
            Some(value) => value.into().to_string_lossy().to_string(),
            None => default_config_file_name.to_string_lossy().to_string(),
        };
        let builder = Config::builder();
        let config: Config = builder
            // use defaults
            .add_source(Config::try_from(default)?)
            // override with file contents
            .add_source(File::with_name(&config))
            .build()?;
        let settings: Settings = config.try_deserialize()?;

        for chain in &settings.chains {
            if chain.backend == ChainBackend::Rpc && chain.rpc_url.is_none() {
                return Err(ConfigError::Message(format!(
                    "Chain {} uses the rpc backend but has no rpc_url",
                    chain.chain
                )));
            }
        }

        Ok(settings)
    }
}
