//! In-memory package store.
//!
//! Keeps every package in a `DashMap`. Used by tests and by callers that only
//! need packages for the lifetime of the process.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use super::{PackageHandle, PackageStore, StoreError};
use crate::job::{JobId, JobManifest};
use crate::package::{CompletedPackage, PackageRecord};
use crate::BoxFuture;

#[derive(Debug)]
struct OpenPackage {
    manifest: JobManifest,
    resources: BTreeMap<String, Bytes>,
}

#[derive(Debug)]
struct SealedPackage {
    record: PackageRecord,
    resources: BTreeMap<String, Bytes>,
}

/// Package store backed by process memory.
#[derive(Debug, Default)]
pub struct MemoryPackageStore {
    open: DashMap<JobId, OpenPackage>,
    sealed: DashMap<JobId, SealedPackage>,
    /// Sealed IDs in finalization order, so `load` is deterministic.
    order: Mutex<Vec<JobId>>,
    discarded: Mutex<Vec<JobId>>,
    reject_writes: AtomicBool,
    reject_deletes: AtomicBool,
}

impl MemoryPackageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail.
    pub fn set_reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    /// Makes every subsequent package deletion fail.
    pub fn set_reject_deletes(&self, reject: bool) {
        self.reject_deletes.store(reject, Ordering::SeqCst);
    }

    pub fn is_open(&self, job_id: JobId) -> bool {
        self.open.contains_key(&job_id)
    }

    /// IDs of packages discarded so far, oldest first.
    pub fn discarded(&self) -> Vec<JobId> {
        self.discarded.lock().clone()
    }

    /// Body of a resource in an open or sealed package.
    pub fn resource(&self, job_id: JobId, url: &str) -> Option<Bytes> {
        if let Some(open) = self.open.get(&job_id) {
            return open.resources.get(url).cloned();
        }
        self.sealed
            .get(&job_id)
            .and_then(|sealed| sealed.resources.get(url).cloned())
    }

    /// Number of resources in an open or sealed package.
    pub fn resource_count(&self, job_id: JobId) -> usize {
        if let Some(open) = self.open.get(&job_id) {
            return open.resources.len();
        }
        self.sealed
            .get(&job_id)
            .map(|sealed| sealed.resources.len())
            .unwrap_or(0)
    }

    pub fn sealed_count(&self) -> usize {
        self.sealed.len()
    }

    fn location(job_id: JobId) -> String {
        format!("memory://{}", job_id)
    }
}

impl PackageStore for MemoryPackageStore {
    fn open<'a>(
        &'a self,
        manifest: &'a JobManifest,
    ) -> BoxFuture<'a, Result<PackageHandle, StoreError>> {
        Box::pin(async move {
            let job_id = manifest.job_id;
            if self.open.contains_key(&job_id) || self.sealed.contains_key(&job_id) {
                return Err(StoreError::AlreadyOpen(job_id));
            }

            self.open.insert(
                job_id,
                OpenPackage {
                    manifest: manifest.clone(),
                    resources: BTreeMap::new(),
                },
            );
            debug!(job_id = %job_id, "Opened in-memory package");

            Ok(PackageHandle::new(job_id, Self::location(job_id)))
        })
    }

    fn write<'a>(
        &'a self,
        handle: &'a PackageHandle,
        url: &'a str,
        data: Bytes,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            if self.reject_writes.load(Ordering::SeqCst) {
                return Err(StoreError::Rejected(format!("write of {}", url)));
            }

            let mut open = self
                .open
                .get_mut(&handle.job_id())
                .ok_or(StoreError::NotOpen(handle.job_id()))?;
            open.resources.insert(url.to_string(), data);
            Ok(())
        })
    }

    fn finalize<'a>(
        &'a self,
        handle: &'a PackageHandle,
        missing: Vec<String>,
    ) -> BoxFuture<'a, Result<PackageRecord, StoreError>> {
        Box::pin(async move {
            let job_id = handle.job_id();
            let (_, open) = self
                .open
                .remove(&job_id)
                .ok_or(StoreError::NotOpen(job_id))?;

            let record = PackageRecord {
                manifest: open.manifest,
                location: Self::location(job_id),
                resource_count: open.resources.len(),
                missing,
                completed_at: Utc::now(),
            };

            self.sealed.insert(
                job_id,
                SealedPackage {
                    record: record.clone(),
                    resources: open.resources,
                },
            );
            self.order.lock().push(job_id);

            Ok(record)
        })
    }

    fn discard<'a>(&'a self, handle: &'a PackageHandle) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let job_id = handle.job_id();
            self.open.remove(&job_id);
            self.discarded.lock().push(job_id);
            debug!(job_id = %job_id, "Discarded in-memory package");
            Ok(())
        })
    }

    fn delete<'a>(
        &'a self,
        package: &'a CompletedPackage,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let job_id = package.id();
            if self.reject_deletes.load(Ordering::SeqCst) {
                return Err(StoreError::Rejected(format!("delete of {}", job_id)));
            }
            self.sealed.remove(&job_id);
            self.order.lock().retain(|id| *id != job_id);
            Ok(())
        })
    }

    fn load(&self) -> BoxFuture<'_, Result<Vec<PackageRecord>, StoreError>> {
        Box::pin(async move {
            let order = self.order.lock().clone();
            Ok(order
                .iter()
                .filter_map(|id| self.sealed.get(id).map(|s| s.record.clone()))
                .collect())
        })
    }
}
