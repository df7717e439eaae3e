use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "datatransfer")]
#[command(about = "Moves files between storage backends or announces them on a queue")]
pub struct CliArgs {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "datatransfer.toml", conflicts_with = "from_env")]
    pub config: String,

    /// Load configuration from INGEST_*/READ_*/WRITE_* environment variables
    #[arg(long)]
    pub from_env: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// List the batch that would be processed without transferring anything
    #[arg(long)]
    pub dry_run: bool,

    /// Repeat the run every N seconds instead of running once
    #[arg(long, value_name = "SECONDS")]
    pub every: Option<u64>,
}
