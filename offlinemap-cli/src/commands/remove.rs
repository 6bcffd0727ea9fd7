//! The `remove` command.

use clap::Args;
use offlinemap::config::ConfigFile;
use offlinemap::JobId;

use super::common::build_downloader;
use crate::error::CliError;

#[derive(Debug, Args)]
pub struct RemoveArgs {
    /// ID of the package to delete, as printed by `list`
    pub id: String,
}

pub async fn run(args: RemoveArgs, config: &ConfigFile) -> Result<(), CliError> {
    let id: JobId = args
        .id
        .parse()
        .map_err(|e| CliError::InvalidArgument(format!("{}: {}", args.id, e)))?;

    let downloader = build_downloader(config, None).await?;
    if downloader.remove_package_by_id(id).await? {
        println!("Removed package {}", id);
        Ok(())
    } else {
        Err(CliError::InvalidArgument(format!("no package with ID {}", id)))
    }
}
