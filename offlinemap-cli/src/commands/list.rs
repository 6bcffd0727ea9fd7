//! The `list` command.

use chrono::Local;
use offlinemap::config::ConfigFile;

use super::common::build_downloader;
use crate::error::CliError;

/// Prints every completed package in the configured package directory.
pub async fn run(config: &ConfigFile) -> Result<(), CliError> {
    let downloader = build_downloader(config, None).await?;
    let packages = downloader.list_completed_packages();

    if packages.is_empty() {
        println!("No packages in {}", config.storage.package_dir.display());
        return Ok(());
    }

    for package in &packages {
        let completed = package.completed_at.with_timezone(&Local);
        println!("{}  {}", package.id(), package.map_id());
        println!("  Completed: {}", completed.format("%Y-%m-%d %H:%M"));
        println!("  Resources: {}", package.resource_count);
        if package.missing_count() > 0 {
            println!("  Missing:   {}", package.missing_count());
        }
        println!("  Location:  {}", package.location);
    }
    println!();
    println!("{} package(s)", packages.len());
    Ok(())
}
