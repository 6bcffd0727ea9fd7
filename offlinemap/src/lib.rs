//! offlinemap - Offline map package downloader
//!
//! Downloads every raster tile of a map region over a zoom range, plus the
//! map's metadata, marker data and marker icons, into a self-contained
//! package that can be browsed without a network connection.
//!
//! # Architecture
//!
//! - [`coord`]: Web Mercator tile indexing for a region and zoom
//! - [`plan`]: URL plan of a job (metadata, marker data, tiles, icons)
//! - [`markers`]: marker icon discovery from GeoJSON marker data
//! - [`job`]: job identity, parameters, lifecycle state machine, progress
//! - [`downloader`]: the orchestrator driving one job at a time
//! - [`store`]: package storage backends
//! - [`package`]: completed packages and the package library
//! - [`notify`]: lifecycle and progress events
//! - [`provider`]: HTTP fetching and connectivity probes
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use offlinemap::config::DownloaderConfig;
//! use offlinemap::coord::CoordinateRegion;
//! use offlinemap::downloader::OfflineMapDownloader;
//! use offlinemap::job::DownloadRequest;
//! use offlinemap::notify::ChannelNotifier;
//! use offlinemap::provider::ReqwestFetcher;
//! use offlinemap::store::DirectoryPackageStore;
//!
//! let (notifier, mut events) = ChannelNotifier::new();
//! let downloader = OfflineMapDownloader::builder(
//!     DownloaderConfig::default(),
//!     Arc::new(ReqwestFetcher::new()?),
//!     Arc::new(DirectoryPackageStore::new("/var/lib/offlinemap")),
//! )
//! .notifier(Arc::new(notifier))
//! .build();
//!
//! let region = CoordinateRegion::new(40.7128, -74.0060, 0.05, 0.05);
//! downloader
//!     .begin_downloading(DownloadRequest::new("examples.map-zr0njcqy", region, 12, 15))
//!     .await?;
//!
//! while let Some(event) = events.recv().await {
//!     println!("{:?}", event);
//! }
//! ```

use std::future::Future;
use std::pin::Pin;

pub mod config;
pub mod coord;
pub mod downloader;
pub mod error;
pub mod job;
pub mod logging;
pub mod markers;
pub mod notify;
pub mod package;
pub mod plan;
pub mod provider;
pub mod store;

/// Boxed future type for dyn-compatible async traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub use config::DownloaderConfig;
pub use downloader::OfflineMapDownloader;
pub use error::{DownloadError, DownloadResult};
pub use job::{DownloadRequest, ImageQuality, JobId, JobState};
pub use notify::DownloadEvent;
pub use package::CompletedPackage;
