use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use hotswap_core::InstallMode;

mod completion;
mod dispatch;
mod render;

use completion::CliCompletionShell;
use dispatch::run_cli;

#[derive(Parser, Debug)]
#[command(name = "hotswap")]
#[command(about = "Over-the-air content update lifecycle driver", long_about = None)]
struct Cli {
    /// Host configuration file (defaults to <state dir>/hotswap.toml)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Overrides the configured state directory
    #[arg(long)]
    state_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show installed packages and persisted lifecycle state
    Status,
    /// Install a staged package described by a metadata JSON file
    Install {
        metadata: PathBuf,
        #[arg(long, value_parser = parse_install_mode, default_value = "immediate")]
        mode: InstallMode,
        /// Seconds the app must spend in the background before an on-next-resume install applies
        #[arg(long = "min-background", default_value_t = 0)]
        min_background: u64,
    },
    /// Simulate a process start
    Start,
    /// Simulate returning to the foreground after a background period
    Resume {
        #[arg(long)]
        background: u64,
    },
    /// Confirm the applied update
    Confirm,
    /// Simulate expiry of the rollback safety net
    Expire,
    /// Check whether a package hash previously rolled back
    Failed { hash: String },
    /// Forget every rolled-back package hash
    ClearFailed,
    /// Compute the content manifest hash of a directory
    Hash { dir: PathBuf },
    /// Compute (or read the cached) hash of the bundled content
    BinaryHash,
    Completions {
        #[arg(value_enum)]
        shell: CliCompletionShell,
    },
}

fn parse_install_mode(value: &str) -> Result<InstallMode, String> {
    InstallMode::parse(value).map_err(|err| err.to_string())
}

fn init_tracing() {
    let filter = std::env::var("HOTSWAP_LOG")
        .ok()
        .and_then(|directives| tracing_subscriber::EnvFilter::try_new(directives).ok())
        .or_else(|| tracing_subscriber::EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    run_cli(cli).await
}
