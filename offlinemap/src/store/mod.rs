//! Durable package storage.
//!
//! A download writes into a package that is opened with the job manifest,
//! receives one write per fetched resource, and is then either finalized into
//! a [`PackageRecord`] or discarded. Stores are dyn-compatible so the
//! orchestrator can hold any backend behind an `Arc<dyn PackageStore>`.

mod directory;
mod memory;

pub use directory::DirectoryPackageStore;
pub use memory::MemoryPackageStore;

use std::path::Path;

use bytes::Bytes;
use thiserror::Error;

use crate::job::{JobId, JobManifest};
use crate::package::{CompletedPackage, PackageRecord};
use crate::BoxFuture;

/// Errors raised by package stores.
///
/// I/O failures carry their message rather than the source error so the
/// error can travel inside cloned download events.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Filesystem operation failed.
    #[error("I/O error at {path}: {message}")]
    Io { path: String, message: String },

    /// A persisted manifest could not be read back.
    #[error("corrupt package manifest at {path}: {message}")]
    Corrupt { path: String, message: String },

    /// A package for this job is already open.
    #[error("package {0} is already open")]
    AlreadyOpen(JobId),

    /// No open package exists for this handle.
    #[error("no open package for job {0}")]
    NotOpen(JobId),

    /// The backend refused the operation.
    #[error("store rejected operation: {0}")]
    Rejected(String),
}

impl StoreError {
    pub(crate) fn io(path: &Path, error: std::io::Error) -> Self {
        StoreError::Io {
            path: path.display().to_string(),
            message: error.to_string(),
        }
    }
}

/// Handle to a package that is open for writing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageHandle {
    job_id: JobId,
    location: String,
}

impl PackageHandle {
    pub fn new(job_id: JobId, location: impl Into<String>) -> Self {
        Self {
            job_id,
            location: location.into(),
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Where the in-progress package lives.
    pub fn location(&self) -> &str {
        &self.location
    }
}

/// Sink for downloaded resources, keyed by job ID.
pub trait PackageStore: Send + Sync {
    /// Opens a new package and persists the job manifest with it.
    fn open<'a>(
        &'a self,
        manifest: &'a JobManifest,
    ) -> BoxFuture<'a, Result<PackageHandle, StoreError>>;

    /// Persists the body of one resource.
    fn write<'a>(
        &'a self,
        handle: &'a PackageHandle,
        url: &'a str,
        data: Bytes,
    ) -> BoxFuture<'a, Result<(), StoreError>>;

    /// Seals the package. `missing` lists the planned URLs that were tolerated
    /// as failed.
    fn finalize<'a>(
        &'a self,
        handle: &'a PackageHandle,
        missing: Vec<String>,
    ) -> BoxFuture<'a, Result<PackageRecord, StoreError>>;

    /// Drops an open package and everything written to it.
    fn discard<'a>(&'a self, handle: &'a PackageHandle) -> BoxFuture<'a, Result<(), StoreError>>;

    /// Deletes a finalized package.
    fn delete<'a>(&'a self, package: &'a CompletedPackage)
        -> BoxFuture<'a, Result<(), StoreError>>;

    /// Reads back every finalized package.
    fn load(&self) -> BoxFuture<'_, Result<Vec<PackageRecord>, StoreError>>;
}
