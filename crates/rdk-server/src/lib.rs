//! RDK server lib

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::cli::CLIArgs;
use crate::config::{LoggingConfig, LoggingOutput, Settings};

pub mod cli;
pub mod config;
pub mod env_vars;
pub mod setup;

/// Work directory under the home directory when none is given
pub const DEFAULT_WORK_DIR: &str = ".rdk-server";

const NOISY_CRATES: &str = "hyper=warn,h2=warn,rustls=warn,reqwest=warn,tower_http=info";

fn expand_path(path: &str) -> Option<PathBuf> {
    if let Some(remainder) = path.strip_prefix("~/") {
        home::home_dir().map(|home_dir| home_dir.join(remainder))
    } else {
        Some(PathBuf::from(path))
    }
}

/// Work directory from the arguments or the default, created if missing
pub async fn get_work_directory(args: &CLIArgs) -> Result<PathBuf> {
    let work_dir = match &args.work_dir {
        Some(work_dir) => match expand_path(work_dir) {
            Some(work_dir) => work_dir,
            None => bail!("Could not expand work directory {}", work_dir),
        },
        None => match home::home_dir() {
            Some(home_dir) => home_dir.join(DEFAULT_WORK_DIR),
            None => bail!("Could not find home directory"),
        },
    };

    std::fs::create_dir_all(&work_dir)?;

    Ok(work_dir)
}

/// Settings from the config file, when there is one, with environment overrides applied
pub fn load_settings(work_dir: &Path, config_path: Option<String>) -> Result<Settings> {
    let config_path = match config_path {
        Some(config_path) => expand_path(&config_path),
        None => Some(work_dir.join("config.toml")),
    };

    let mut settings = match config_path {
        Some(config_path) if config_path.exists() => Settings::new(Some(config_path)),
        Some(config_path) => {
            tracing::info!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            Settings::default()
        }
        None => Settings::default(),
    };

    settings.from_env()
}

fn env_filter(level: Option<&str>, default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{},{}",
            level.unwrap_or(default_level),
            NOISY_CRATES
        ))
    })
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides the configured levels. The returned guard flushes the file writer and
/// must be held for as long as the server runs.
pub fn setup_tracing(work_dir: &Path, logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let console_layer = || {
        fmt::layer()
            .with_target(true)
            .with_filter(env_filter(logging.console_level.as_deref(), "info"))
    };

    let file_writer = || -> Result<_> {
        let appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix("rdk-server")
            .filename_suffix("log")
            .build(work_dir.join("logs"))?;
        Ok(tracing_appender::non_blocking(appender))
    };

    match logging.output {
        LoggingOutput::Stdout => {
            tracing_subscriber::registry().with(console_layer()).try_init()?;
            Ok(None)
        }
        LoggingOutput::File => {
            let (writer, guard) = file_writer()?;
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer)
                        .with_filter(env_filter(logging.file_level.as_deref(), "debug")),
                )
                .try_init()?;
            Ok(Some(guard))
        }
        LoggingOutput::Both => {
            let (writer, guard) = file_writer()?;
            tracing_subscriber::registry()
                .with(console_layer())
                .with(
                    fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer)
                        .with_filter(env_filter(logging.file_level.as_deref(), "debug")),
                )
                .try_init()?;
            Ok(Some(guard))
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Could not listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Build the ledger and serve the HTTP api until ctrl-c
pub async fn run_server(work_dir: &Path, settings: &Settings) -> Result<()> {
    let ledger = setup::setup_ledger(work_dir, settings).await?;
    let registration = setup::setup_registration_checker(&settings.chains)?;
    tracing::info!(
        "Registration checks enabled for {} chains",
        registration.chains().len()
    );

    let router = rdk_axum::create_rdk_router(Arc::new(ledger), Arc::new(registration)).await?;

    let listen_addr = format!(
        "{}:{}",
        settings.info.listen_host, settings.info.listen_port
    );
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    tracing::info!("rdk-server listening on {}", listen_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
