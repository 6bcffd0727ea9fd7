//! Completed offline packages.
//!
//! A [`PackageRecord`] is what a store persists about a finished package; a
//! [`CompletedPackage`] is the shared handle clients hold, and the
//! [`PackageLibrary`] is the process-wide list of them.

mod library;
mod record;

pub use library::PackageLibrary;
pub use record::{CompletedPackage, PackageRecord};

#[cfg(test)]
pub(crate) use record::sample_record;
