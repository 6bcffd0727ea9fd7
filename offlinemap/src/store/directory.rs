//! Filesystem package store.
//!
//! Layout under the root directory:
//!
//! ```text
//! partial/<job-id>/manifest.json       written on open
//! partial/<job-id>/resources/<sha256>  one file per resource
//! packages/<job-id>/...                same layout once finalized
//! ```
//!
//! Resource files are named by the SHA-256 of their URL; the manifest maps
//! URLs back to files. Finalizing rewrites the manifest with the completion
//! record and renames the directory from `partial/` to `packages/`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{debug, info, warn};

use super::{PackageHandle, PackageStore, StoreError};
use crate::job::{JobId, JobManifest};
use crate::package::{CompletedPackage, PackageRecord};
use crate::BoxFuture;

const PARTIAL_DIR: &str = "partial";
const PACKAGES_DIR: &str = "packages";
const RESOURCES_DIR: &str = "resources";
const MANIFEST_FILE: &str = "manifest.json";

/// On-disk manifest of a package directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ManifestFile {
    job: JobManifest,
    /// URL to resource file name.
    resources: BTreeMap<String, String>,
    #[serde(default)]
    missing: Vec<String>,
    #[serde(default)]
    completed_at: Option<DateTime<Utc>>,
}

/// Package store writing each package to its own directory.
#[derive(Debug)]
pub struct DirectoryPackageStore {
    root: PathBuf,
    /// Resource index of every open package.
    open: DashMap<JobId, ManifestFile>,
}

impl DirectoryPackageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            open: DashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn partial_dir(&self, job_id: JobId) -> PathBuf {
        self.root.join(PARTIAL_DIR).join(job_id.to_string())
    }

    fn package_dir(&self, job_id: JobId) -> PathBuf {
        self.root.join(PACKAGES_DIR).join(job_id.to_string())
    }

    /// File name a resource URL is stored under.
    pub fn resource_file_name(url: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    async fn write_manifest(dir: &Path, manifest: &ManifestFile) -> Result<(), StoreError> {
        let path = dir.join(MANIFEST_FILE);
        let json = serde_json::to_vec_pretty(manifest).map_err(|e| StoreError::Corrupt {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        fs::write(&path, json)
            .await
            .map_err(|e| StoreError::io(&path, e))
    }

    async fn read_manifest(dir: &Path) -> Result<ManifestFile, StoreError> {
        let path = dir.join(MANIFEST_FILE);
        let data = fs::read(&path).await.map_err(|e| StoreError::io(&path, e))?;
        serde_json::from_slice(&data).map_err(|e| StoreError::Corrupt {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    fn record_from(manifest: ManifestFile, dir: &Path) -> Result<PackageRecord, StoreError> {
        let completed_at = manifest.completed_at.ok_or_else(|| StoreError::Corrupt {
            path: dir.join(MANIFEST_FILE).display().to_string(),
            message: "package was never finalized".to_string(),
        })?;

        Ok(PackageRecord {
            location: dir.display().to_string(),
            resource_count: manifest.resources.len(),
            missing: manifest.missing,
            manifest: manifest.job,
            completed_at,
        })
    }
}

impl PackageStore for DirectoryPackageStore {
    fn open<'a>(
        &'a self,
        manifest: &'a JobManifest,
    ) -> BoxFuture<'a, Result<PackageHandle, StoreError>> {
        Box::pin(async move {
            let job_id = manifest.job_id;
            let dir = self.partial_dir(job_id);

            if self.open.contains_key(&job_id) || fs::try_exists(&dir).await.unwrap_or(false) {
                return Err(StoreError::AlreadyOpen(job_id));
            }

            let resources = dir.join(RESOURCES_DIR);
            fs::create_dir_all(&resources)
                .await
                .map_err(|e| StoreError::io(&resources, e))?;

            let file = ManifestFile {
                job: manifest.clone(),
                resources: BTreeMap::new(),
                missing: Vec::new(),
                completed_at: None,
            };
            Self::write_manifest(&dir, &file).await?;
            self.open.insert(job_id, file);

            debug!(job_id = %job_id, path = %dir.display(), "Opened package directory");
            Ok(PackageHandle::new(job_id, dir.display().to_string()))
        })
    }

    fn write<'a>(
        &'a self,
        handle: &'a PackageHandle,
        url: &'a str,
        data: Bytes,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let job_id = handle.job_id();
            if !self.open.contains_key(&job_id) {
                return Err(StoreError::NotOpen(job_id));
            }

            let name = Self::resource_file_name(url);
            let path = self.partial_dir(job_id).join(RESOURCES_DIR).join(&name);
            fs::write(&path, &data)
                .await
                .map_err(|e| StoreError::io(&path, e))?;

            // The package may have been discarded while the file was written.
            match self.open.get_mut(&job_id) {
                Some(mut file) => {
                    file.resources.insert(url.to_string(), name);
                    Ok(())
                }
                None => Err(StoreError::NotOpen(job_id)),
            }
        })
    }

    fn finalize<'a>(
        &'a self,
        handle: &'a PackageHandle,
        missing: Vec<String>,
    ) -> BoxFuture<'a, Result<PackageRecord, StoreError>> {
        Box::pin(async move {
            let job_id = handle.job_id();
            let (_, mut file) = self
                .open
                .remove(&job_id)
                .ok_or(StoreError::NotOpen(job_id))?;

            file.missing = missing;
            file.completed_at = Some(Utc::now());

            let partial = self.partial_dir(job_id);
            Self::write_manifest(&partial, &file).await?;

            let packages = self.root.join(PACKAGES_DIR);
            fs::create_dir_all(&packages)
                .await
                .map_err(|e| StoreError::io(&packages, e))?;

            let target = self.package_dir(job_id);
            fs::rename(&partial, &target)
                .await
                .map_err(|e| StoreError::io(&target, e))?;

            info!(
                job_id = %job_id,
                path = %target.display(),
                resources = file.resources.len(),
                missing = file.missing.len(),
                "Package finalized"
            );

            Self::record_from(file, &target)
        })
    }

    fn discard<'a>(&'a self, handle: &'a PackageHandle) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let job_id = handle.job_id();
            self.open.remove(&job_id);

            let dir = self.partial_dir(job_id);
            match fs::remove_dir_all(&dir).await {
                Ok(()) => {
                    debug!(job_id = %job_id, "Discarded package directory");
                    Ok(())
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(StoreError::io(&dir, e)),
            }
        })
    }

    fn delete<'a>(
        &'a self,
        package: &'a CompletedPackage,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let dir = self.package_dir(package.id());
            match fs::remove_dir_all(&dir).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(StoreError::io(&dir, e)),
            }
        })
    }

    fn load(&self) -> BoxFuture<'_, Result<Vec<PackageRecord>, StoreError>> {
        Box::pin(async move {
            let packages = self.root.join(PACKAGES_DIR);
            let mut entries = match fs::read_dir(&packages).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
                Err(e) => return Err(StoreError::io(&packages, e)),
            };

            let mut records = Vec::new();
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| StoreError::io(&packages, e))?
            {
                let dir = entry.path();
                if !dir.is_dir() {
                    continue;
                }

                match Self::read_manifest(&dir)
                    .await
                    .and_then(|manifest| Self::record_from(manifest, &dir))
                {
                    Ok(record) => records.push(record),
                    Err(e) => warn!(path = %dir.display(), error = %e, "Skipping unreadable package"),
                }
            }

            records.sort_by(|a, b| a.completed_at.cmp(&b.completed_at));
            Ok(records)
        })
    }
}
