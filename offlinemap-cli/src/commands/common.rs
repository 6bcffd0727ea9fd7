//! Common types and utilities shared across CLI commands.

use std::sync::Arc;
use std::time::Duration;

use clap::ValueEnum;
use offlinemap::config::ConfigFile;
use offlinemap::notify::Notifier;
use offlinemap::provider::{AssumeOnline, Connectivity, ReqwestFetcher, TcpConnectivity};
use offlinemap::store::DirectoryPackageStore;
use offlinemap::{ImageQuality, OfflineMapDownloader};
use tracing::debug;

use crate::error::CliError;

/// How long the reachability probe may take before the network counts as down.
const CONNECTIVITY_TIMEOUT: Duration = Duration::from_secs(5);

/// Tile image quality selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
pub enum QualityArg {
    /// Lossless PNG at full color depth
    #[default]
    Full,
    /// 32-color PNG
    Png32,
    /// 64-color PNG
    Png64,
    /// 128-color PNG
    Png128,
    /// 256-color PNG
    Png256,
    /// JPEG at 70% quality
    Jpg70,
    /// JPEG at 80% quality
    Jpg80,
    /// JPEG at 90% quality
    Jpg90,
}

impl From<QualityArg> for ImageQuality {
    fn from(quality: QualityArg) -> Self {
        match quality {
            QualityArg::Full => ImageQuality::Full,
            QualityArg::Png32 => ImageQuality::Png32,
            QualityArg::Png64 => ImageQuality::Png64,
            QualityArg::Png128 => ImageQuality::Png128,
            QualityArg::Png256 => ImageQuality::Png256,
            QualityArg::Jpg70 => ImageQuality::Jpeg70,
            QualityArg::Jpg80 => ImageQuality::Jpeg80,
            QualityArg::Jpg90 => ImageQuality::Jpeg90,
        }
    }
}

/// Chooses the reachability probe configured for the tile server.
fn connectivity_for(config: &ConfigFile) -> Arc<dyn Connectivity> {
    if !config.download.connectivity_check {
        return Arc::new(AssumeOnline);
    }
    match TcpConnectivity::for_url(&config.endpoints.base_url, CONNECTIVITY_TIMEOUT) {
        Some(probe) => {
            debug!(address = %probe.address(), "Probing tile server before downloads");
            Arc::new(probe)
        }
        None => Arc::new(AssumeOnline),
    }
}

/// Builds a downloader over the configured package directory and restores
/// the packages already stored there.
pub async fn build_downloader(
    config: &ConfigFile,
    notifier: Option<Arc<dyn Notifier>>,
) -> Result<OfflineMapDownloader, CliError> {
    let downloader_config = config.downloader_config();
    let fetcher = ReqwestFetcher::with_timeout(downloader_config.fetch_timeout)?;
    let store = DirectoryPackageStore::new(config.storage.package_dir.clone());

    let mut builder =
        OfflineMapDownloader::builder(downloader_config, Arc::new(fetcher), Arc::new(store))
            .connectivity(connectivity_for(config));
    if let Some(notifier) = notifier {
        builder = builder.notifier(notifier);
    }

    let downloader = builder.build();
    let restored = downloader.restore_packages().await?;
    debug!(restored, dir = %config.storage.package_dir.display(), "Package directory scanned");
    Ok(downloader)
}
