//! devloop - development-loop coordinator
//!
//! Watches note directories, re-runs the site sync on change and keeps the
//! development server running, restarting it when pages appear or disappear.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use anyhow::Result;
use clap::{Parser, Subcommand};
use devloop::{load_config, render_config, render_snapshot};
use devloop_coordinator::Coordinator;
use std::path::PathBuf;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "devloop")]
#[command(about = "Watch, sync and serve in one development loop")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync, start the server and watch for changes (default)
    Run,
    /// Print the structural snapshot of a directory
    Snapshot {
        /// Directory to enumerate; defaults to the configured sync output
        dir: Option<PathBuf>,
    },
    /// Print the effective configuration
    Config,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            1
        }
    };
    debug!(code, "Exiting");
    std::process::exit(code);
}

#[tokio::main]
async fn run(cli: Cli) -> Result<i32> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => Ok(Coordinator::new(config)?.run().await?),
        Commands::Snapshot { dir } => {
            let dir = dir.unwrap_or_else(|| config.sync.output_dir.clone());
            print!("{}", render_snapshot(&dir)?);
            Ok(0)
        }
        Commands::Config => {
            print!("{}", render_config(&config)?);
            Ok(0)
        }
    }
}

/// Initialize logging system
///
/// Logs go to stderr so `snapshot` and `config` output stays pipeable.
/// `RUST_LOG` wins over `--verbose` when set.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{}={level},devloop_core={level},devloop_watcher={level},devloop_coordinator={level}",
            env!("CARGO_CRATE_NAME")
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
