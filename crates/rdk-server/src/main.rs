//! RDK server
#![warn(missing_docs)]
#![warn(rustdoc::bare_urls)]

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use rdk_server::cli::CLIArgs;
use rdk_server::{get_work_directory, load_settings, setup_tracing};
use tokio::runtime::Runtime;

fn main() -> Result<()> {
    let rt = Arc::new(Runtime::new()?);

    rt.block_on(async {
        let args = CLIArgs::parse();
        let work_dir = get_work_directory(&args).await?;
        let settings = load_settings(&work_dir, args.config.clone())?;

        // Held until the server stops so buffered file logs are flushed
        let _guard = if args.enable_logging {
            setup_tracing(&work_dir, &settings.logging)?
        } else {
            None
        };

        rdk_server::run_server(&work_dir, &settings).await
    })
}
