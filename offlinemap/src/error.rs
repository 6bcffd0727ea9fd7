//! Download error type.

use thiserror::Error;

use crate::coord::CoordError;
use crate::job::JobState;
use crate::provider::FetchError;
use crate::store::StoreError;

/// Errors reported by the download orchestrator.
///
/// Cloneable so the error can be carried by completion events.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DownloadError {
    /// The requested region or zoom range is invalid.
    #[error("invalid region: {0}")]
    InvalidRegion(#[from] CoordError),

    /// The network is unreachable.
    #[error("no network connectivity")]
    NoConnectivity,

    /// Marker data is not a GeoJSON feature collection.
    #[error("malformed marker data: {0}")]
    MalformedMarkerData(String),

    /// A tolerated resource failed to download.
    #[error("failed to fetch {url}: {source}")]
    ResourceFetch { url: String, source: FetchError },

    /// Metadata or marker data failed to download, aborting the job.
    #[error("failed to fetch required resource {url}: {source}")]
    CriticalResourceFetch { url: String, source: FetchError },

    /// The package store failed.
    #[error("package store error: {0}")]
    Store(#[from] StoreError),

    /// The job was cancelled by the client.
    #[error("download cancelled")]
    Cancelled,

    /// Another job is already in progress.
    #[error("downloader is busy ({0})")]
    Busy(JobState),
}

impl DownloadError {
    /// True for errors that end a job.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            DownloadError::ResourceFetch { .. } | DownloadError::MalformedMarkerData(_)
        )
    }
}

/// Result type for download operations.
pub type DownloadResult<T> = Result<T, DownloadError>;
