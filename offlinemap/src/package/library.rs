//! Collection of completed packages.

use parking_lot::RwLock;

use super::record::CompletedPackage;
use crate::job::JobId;

/// Insertion-ordered set of completed packages.
///
/// Readable while a job is running; the orchestrator is the only writer.
#[derive(Debug, Default)]
pub struct PackageLibrary {
    packages: RwLock<Vec<CompletedPackage>>,
}

impl PackageLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_packages(packages: impl IntoIterator<Item = CompletedPackage>) -> Self {
        let library = Self::new();
        for package in packages {
            library.add(package);
        }
        library
    }

    /// Snapshot of the packages in insertion order.
    pub fn list(&self) -> Vec<CompletedPackage> {
        self.packages.read().clone()
    }

    pub fn len(&self) -> usize {
        self.packages.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.read().is_empty()
    }

    pub fn get(&self, id: JobId) -> Option<CompletedPackage> {
        self.packages.read().iter().find(|p| p.id() == id).cloned()
    }

    /// Appends a package. Returns false if its ID is already present.
    pub fn add(&self, package: CompletedPackage) -> bool {
        let mut packages = self.packages.write();
        if packages.iter().any(|p| p.id() == package.id()) {
            return false;
        }
        packages.push(package);
        true
    }

    /// Detaches a package by ID, invalidating it.
    pub fn remove(&self, id: JobId) -> Option<CompletedPackage> {
        let mut packages = self.packages.write();
        let index = packages.iter().position(|p| p.id() == id)?;
        let package = packages.remove(index);
        package.invalidate();
        Some(package)
    }
}
