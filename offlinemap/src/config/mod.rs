//! Downloader and application configuration.

mod downloader;
mod file;

pub use downloader::{
    DownloaderConfig, DEFAULT_FETCH_TIMEOUT, DEFAULT_MAX_CONCURRENT_FETCHES, DEFAULT_MAX_TILES,
};
pub use file::{
    config_dir, config_file_path, default_package_dir, ConfigError, ConfigFile, DownloadSettings,
    EndpointsSettings, StorageSettings,
};
