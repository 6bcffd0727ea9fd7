//! offlinemap - download map regions for offline use.

mod commands;
mod error;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use offlinemap::config::ConfigFile;
use offlinemap::logging::init_logging;

use crate::commands::{download, list, remove};
use crate::error::CliError;

#[derive(Debug, Parser)]
#[command(name = "offlinemap", author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to ~/.config/offlinemap/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Download a region into a new offline package
    Download(download::DownloadArgs),
    /// List completed packages
    List,
    /// Delete a completed package
    Remove(remove::RemoveArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = match &cli.config {
        Some(path) => ConfigFile::load_from(path)?,
        None => ConfigFile::load()?,
    };
    let _guard = init_logging(&config.logging)?;

    match cli.command {
        Command::Download(args) => download::run(args, &config).await,
        Command::List => list::run(&config).await,
        Command::Remove(args) => remove::run(args, &config).await,
    }
}
