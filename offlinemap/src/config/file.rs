//! INI configuration file.
//!
//! ```ini
//! [endpoints]
//! base_url = https://a.tiles.mapbox.com/v3/
//! retina = true
//!
//! [download]
//! max_concurrent_fetches = 8
//! fetch_timeout_secs = 60
//! max_tiles = 100000
//! connectivity_check = true
//!
//! [storage]
//! package_dir = ~/.local/share/offlinemap
//!
//! [logging]
//! level = info
//! file = /var/log/offlinemap.log
//! ```
//!
//! Missing sections and keys fall back to their defaults.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use super::downloader::{
    DownloaderConfig, DEFAULT_FETCH_TIMEOUT, DEFAULT_MAX_CONCURRENT_FETCHES, DEFAULT_MAX_TILES,
};
use crate::logging::LoggingConfig;
use crate::plan::{Endpoints, DEFAULT_BASE_URL};

const APP_DIR: &str = "offlinemap";
const CONFIG_FILE_NAME: &str = "config.ini";

/// Errors raised while loading or saving the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid value '{value}' for {section}.{key}: {reason}")]
    InvalidValue {
        section: &'static str,
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Directory holding the configuration file.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Default location of the configuration file.
pub fn config_file_path() -> PathBuf {
    config_dir().join(CONFIG_FILE_NAME)
}

/// Default root of the package store.
///
/// The store keeps unfinished packages under `partial/` and finished ones
/// under `packages/` inside this directory.
pub fn default_package_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// `[endpoints]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointsSettings {
    pub base_url: String,
    pub retina: bool,
}

impl Default for EndpointsSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            retina: true,
        }
    }
}

/// `[download]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSettings {
    pub max_concurrent_fetches: usize,
    pub fetch_timeout_secs: u64,
    pub max_tiles: u64,
    /// Probe the tile server before fetching marker data.
    pub connectivity_check: bool,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT.as_secs(),
            max_tiles: DEFAULT_MAX_TILES,
            connectivity_check: true,
        }
    }
}

/// `[storage]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageSettings {
    pub package_dir: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            package_dir: default_package_dir(),
        }
    }
}

/// Contents of the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub endpoints: EndpointsSettings,
    pub download: DownloadSettings,
    pub storage: StorageSettings,
    pub logging: LoggingConfig,
}

impl ConfigFile {
    /// Load from the default location, or defaults if no file exists.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_file_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text).map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })
    }

    /// Parse INI text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            message: e.to_string(),
        })?;

        let defaults = Self::default();
        let reader = Reader { ini: &ini };

        let endpoints = EndpointsSettings {
            base_url: reader
                .string("endpoints", "base_url")
                .unwrap_or(defaults.endpoints.base_url),
            retina: reader
                .parsed("endpoints", "retina", parse_bool)?
                .unwrap_or(defaults.endpoints.retina),
        };

        let download = DownloadSettings {
            max_concurrent_fetches: reader
                .parsed("download", "max_concurrent_fetches", parse_positive::<usize>)?
                .unwrap_or(defaults.download.max_concurrent_fetches),
            fetch_timeout_secs: reader
                .parsed("download", "fetch_timeout_secs", parse_positive::<u64>)?
                .unwrap_or(defaults.download.fetch_timeout_secs),
            max_tiles: reader
                .parsed("download", "max_tiles", parse_positive::<u64>)?
                .unwrap_or(defaults.download.max_tiles),
            connectivity_check: reader
                .parsed("download", "connectivity_check", parse_bool)?
                .unwrap_or(defaults.download.connectivity_check),
        };

        let storage = StorageSettings {
            package_dir: reader
                .string("storage", "package_dir")
                .map(|s| expand_tilde(&s))
                .unwrap_or(defaults.storage.package_dir),
        };

        let logging = LoggingConfig {
            level: reader
                .string("logging", "level")
                .unwrap_or(defaults.logging.level),
            file: reader.string("logging", "file").map(|s| expand_tilde(&s)),
        };

        Ok(Self {
            endpoints,
            download,
            storage,
            logging,
        })
    }

    /// Write to an explicit path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        self.to_ini().write_to_file(path).map_err(io_err)
    }

    /// Write to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        ini.with_section(Some("endpoints"))
            .set("base_url", self.endpoints.base_url.as_str())
            .set("retina", self.endpoints.retina.to_string());
        ini.with_section(Some("download"))
            .set(
                "max_concurrent_fetches",
                self.download.max_concurrent_fetches.to_string(),
            )
            .set(
                "fetch_timeout_secs",
                self.download.fetch_timeout_secs.to_string(),
            )
            .set("max_tiles", self.download.max_tiles.to_string())
            .set(
                "connectivity_check",
                self.download.connectivity_check.to_string(),
            );
        ini.with_section(Some("storage")).set(
            "package_dir",
            self.storage.package_dir.display().to_string(),
        );
        let mut logging = ini.with_section(Some("logging"));
        logging.set("level", self.logging.level.as_str());
        if let Some(file) = &self.logging.file {
            logging.set("file", file.display().to_string());
        }
        ini
    }

    /// Downloader configuration described by this file.
    pub fn downloader_config(&self) -> DownloaderConfig {
        let endpoints =
            Endpoints::new(self.endpoints.base_url.clone()).with_retina(self.endpoints.retina);
        DownloaderConfig::new(endpoints)
            .with_max_concurrent_fetches(self.download.max_concurrent_fetches)
            .with_fetch_timeout(Duration::from_secs(self.download.fetch_timeout_secs))
            .with_max_tiles(self.download.max_tiles)
    }
}

struct Reader<'a> {
    ini: &'a Ini,
}

impl Reader<'_> {
    fn string(&self, section: &str, key: &str) -> Option<String> {
        self.ini
            .get_from(Some(section), key)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    fn parsed<T>(
        &self,
        section: &'static str,
        key: &'static str,
        parse: fn(&str) -> Result<T, String>,
    ) -> Result<Option<T>, ConfigError> {
        match self.string(section, key) {
            None => Ok(None),
            Some(value) => parse(&value)
                .map(Some)
                .map_err(|reason| ConfigError::InvalidValue {
                    section,
                    key,
                    value,
                    reason,
                }),
        }
    }
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err("expected true or false".to_string()),
    }
}

fn parse_positive<T>(value: &str) -> Result<T, String>
where
    T: FromStr + PartialOrd + Default,
    T::Err: std::fmt::Display,
{
    let parsed = value.parse::<T>().map_err(|e| e.to_string())?;
    if parsed <= T::default() {
        return Err("must be greater than zero".to_string());
    }
    Ok(parsed)
}

fn expand_tilde(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}
