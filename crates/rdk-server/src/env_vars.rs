//! Environment variable overrides

use std::env;
use std::str::FromStr;

use anyhow::{anyhow, bail, Result};
use rdk::ledger::ProofPolicy;

use crate::config::{DatabaseEngine, LoggingOutput, Settings};

pub const ENV_LISTEN_HOST: &str = "RDK_SERVER_LISTEN_HOST";
pub const ENV_LISTEN_PORT: &str = "RDK_SERVER_LISTEN_PORT";
// Database
pub const DATABASE_ENV_VAR: &str = "RDK_SERVER_DATABASE";
pub const ENV_DATABASE_PATH: &str = "RDK_SERVER_DATABASE_PATH";
// Ledger
pub const ENV_PROOF_POLICY: &str = "RDK_SERVER_PROOF_POLICY";
pub const ENV_EXTRA_WELL_KNOWN: &str = "RDK_SERVER_EXTRA_WELL_KNOWN";
// Logging
pub const ENV_LOGGING_OUTPUT: &str = "RDK_SERVER_LOGGING_OUTPUT";
pub const ENV_LOGGING_CONSOLE_LEVEL: &str = "RDK_SERVER_LOGGING_CONSOLE_LEVEL";
pub const ENV_LOGGING_FILE_LEVEL: &str = "RDK_SERVER_LOGGING_FILE_LEVEL";

impl Settings {
    /// Apply `RDK_SERVER_*` overrides
    pub fn from_env(&mut self) -> Result<Self> {
        if let Ok(host) = env::var(ENV_LISTEN_HOST) {
            self.info.listen_host = host;
        }

        if let Ok(port) = env::var(ENV_LISTEN_PORT) {
            self.info.listen_port = port
                .parse()
                .map_err(|_| anyhow!("Invalid {}: {}", ENV_LISTEN_PORT, port))?;
        }

        if let Ok(database) = env::var(DATABASE_ENV_VAR) {
            self.database.engine = DatabaseEngine::from_str(&database).map_err(|err| anyhow!(err))?;
        }

        if let Ok(path) = env::var(ENV_DATABASE_PATH) {
            self.database.path = Some(path);
        }

        if let Ok(policy) = env::var(ENV_PROOF_POLICY) {
            self.ledger.proof_policy = match policy.to_lowercase().as_str() {
                "advisory" => ProofPolicy::Advisory,
                "enforce" => ProofPolicy::Enforce,
                _ => bail!("Unknown proof policy: {}", policy),
            };
        }

        // Comma separated, added to the titles from the config file
        if let Ok(titles) = env::var(ENV_EXTRA_WELL_KNOWN) {
            self.ledger.extra_well_known.extend(
                titles
                    .split(',')
                    .map(str::trim)
                    .filter(|title| !title.is_empty())
                    .map(str::to_string),
            );
        }

        if let Ok(output) = env::var(ENV_LOGGING_OUTPUT) {
            match LoggingOutput::from_str(&output) {
                Ok(output) => self.logging.output = output,
                Err(_) => tracing::warn!(
                    "Invalid logging output '{}' in environment variable. Valid options: stdout, file, both",
                    output
                ),
            }
        }

        if let Ok(level) = env::var(ENV_LOGGING_CONSOLE_LEVEL) {
            self.logging.console_level = Some(level);
        }

        if let Ok(level) = env::var(ENV_LOGGING_FILE_LEVEL) {
            self.logging.file_level = Some(level);
        }

        Ok(self.clone())
    }
}
