//! Completed package types.

use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::job::{JobId, JobManifest};

/// Durable description of a finished package as the store keeps it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    /// Job manifest written when the package was opened.
    pub manifest: JobManifest,

    /// Backing storage location (directory path or store-specific URI).
    pub location: String,

    /// Number of resources persisted in the package.
    pub resource_count: usize,

    /// Planned URLs that failed and were tolerated.
    #[serde(default)]
    pub missing: Vec<String>,

    /// When the package was finalized.
    pub completed_at: DateTime<Utc>,
}

impl PackageRecord {
    pub fn id(&self) -> JobId {
        self.manifest.job_id
    }

    pub fn map_id(&self) -> &str {
        &self.manifest.map_id
    }

    pub fn missing_count(&self) -> usize {
        self.missing.len()
    }
}

struct Shared {
    record: PackageRecord,
    valid: AtomicBool,
}

/// A finished offline package.
///
/// Cloned handles share one validity flag, so removing a package is visible
/// to every holder through [`is_valid`](Self::is_valid). Field access goes
/// through [`Deref`] to the underlying [`PackageRecord`].
#[derive(Clone)]
pub struct CompletedPackage {
    shared: Arc<Shared>,
}

impl CompletedPackage {
    pub fn new(record: PackageRecord) -> Self {
        Self {
            shared: Arc::new(Shared {
                record,
                valid: AtomicBool::new(true),
            }),
        }
    }

    pub fn record(&self) -> &PackageRecord {
        &self.shared.record
    }

    /// False once the package has been removed.
    pub fn is_valid(&self) -> bool {
        self.shared.valid.load(Ordering::Acquire)
    }

    /// Marks the package as removed for every holder.
    pub fn invalidate(&self) {
        self.shared.valid.store(false, Ordering::Release);
    }
}

impl Deref for CompletedPackage {
    type Target = PackageRecord;

    fn deref(&self) -> &Self::Target {
        &self.shared.record
    }
}

impl PartialEq for CompletedPackage {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for CompletedPackage {}

impl fmt::Debug for CompletedPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletedPackage")
            .field("id", &self.id())
            .field("map_id", &self.map_id())
            .field("location", &self.location)
            .field("resource_count", &self.resource_count)
            .field("missing", &self.missing_count())
            .field("valid", &self.is_valid())
            .finish()
    }
}

#[cfg(test)]
pub(crate) fn sample_record(map_id: &str) -> PackageRecord {
    use std::collections::BTreeMap;

    let job_id = JobId::generate();
    PackageRecord {
        manifest: JobManifest {
            job_id,
            map_id: map_id.to_string(),
            entries: BTreeMap::new(),
        },
        location: format!("memory://{}", job_id),
        resource_count: 3,
        missing: vec![],
        completed_at: Utc::now(),
    }
}
