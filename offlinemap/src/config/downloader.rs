//! Runtime configuration of the downloader.

use std::time::Duration;

use crate::plan::Endpoints;

/// Default number of resources fetched at once.
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 8;

/// Default per-request timeout.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Default cap on the number of tiles a single job may request.
pub const DEFAULT_MAX_TILES: u64 = 100_000;

/// Configuration for the download orchestrator.
#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    /// Tile server URLs and retina preference.
    pub endpoints: Endpoints,

    /// Maximum concurrent resource fetches.
    pub max_concurrent_fetches: usize,

    /// Timeout applied to every fetch.
    pub fetch_timeout: Duration,

    /// Jobs whose zoom range covers more tiles are rejected up front.
    pub max_tiles: u64,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            endpoints: Endpoints::default(),
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            max_tiles: DEFAULT_MAX_TILES,
        }
    }
}

impl DownloaderConfig {
    /// Create a configuration for the given endpoints.
    pub fn new(endpoints: Endpoints) -> Self {
        Self {
            endpoints,
            ..Default::default()
        }
    }

    /// Set the maximum concurrent fetches. Zero is raised to one.
    pub fn with_max_concurrent_fetches(mut self, max: usize) -> Self {
        self.max_concurrent_fetches = max.max(1);
        self
    }

    /// Set the per-fetch timeout.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Set the tile cap.
    pub fn with_max_tiles(mut self, max: u64) -> Self {
        self.max_tiles = max;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DownloaderConfig::default();
        assert_eq!(config.max_concurrent_fetches, 8);
        assert_eq!(config.fetch_timeout, Duration::from_secs(60));
        assert_eq!(config.max_tiles, 100_000);
        assert_eq!(config.endpoints.base_url(), crate::plan::DEFAULT_BASE_URL);
    }

    #[test]
    fn test_builder_pattern() {
        let config = DownloaderConfig::new(Endpoints::new("http://localhost:8080/v3"))
            .with_max_concurrent_fetches(0)
            .with_fetch_timeout(Duration::from_secs(5))
            .with_max_tiles(10);

        assert_eq!(config.endpoints.base_url(), "http://localhost:8080/v3/");
        assert_eq!(config.max_concurrent_fetches, 1);
        assert_eq!(config.fetch_timeout, Duration::from_secs(5));
        assert_eq!(config.max_tiles, 10);
    }
}
