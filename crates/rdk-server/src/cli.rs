use clap::Parser;

/// Command line arguments
#[derive(Debug, Parser)]
#[command(about = "A rewards ledger server", author = env!("CARGO_PKG_AUTHORS"), version = env!("CARGO_PKG_VERSION"))]
pub struct CLIArgs {
    #[arg(
        short,
        long,
        help = "Use the <directory> as the location of the database, config and logs",
        required = false
    )]
    /// Work directory
    pub work_dir: Option<String>,
    #[arg(
        short,
        long,
        help = "Use the <file name> as the location of the config file",
        required = false
    )]
    /// Config file
    pub config: Option<String>,
    #[arg(long, help = "Enable logging output", default_value_t = false)]
    /// Enable logging
    pub enable_logging: bool,
}
