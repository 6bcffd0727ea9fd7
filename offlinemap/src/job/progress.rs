//! Progress counters for the active job.
//!
//! Counters are atomics so readers never block. Recording a written resource
//! and resetting the counters serialize on the written-URL ledger, and the
//! run's cancellation token is checked under that lock: once a cancel or
//! suspend has cancelled the token, no further write can be counted.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressSnapshot {
    pub files_written: usize,
    pub files_expected: usize,
}

impl ProgressSnapshot {
    /// Progress as a ratio (0.0 to 1.0).
    pub fn ratio(&self) -> f64 {
        if self.files_expected == 0 {
            0.0
        } else {
            self.files_written as f64 / self.files_expected as f64
        }
    }
}

/// Shared progress counters of the active job.
#[derive(Debug, Default)]
pub struct ProgressCounters {
    files_written: AtomicUsize,
    files_expected: AtomicUsize,
    written: Mutex<HashSet<String>>,
}

impl ProgressCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixes the expected count for a new job and clears the ledger.
    pub fn begin(&self, files_expected: usize) {
        let mut written = self.written.lock();
        written.clear();
        self.files_written.store(0, Ordering::SeqCst);
        self.files_expected.store(files_expected, Ordering::SeqCst);
    }

    /// Records `url` as persisted unless `token` has been cancelled.
    ///
    /// `on_recorded` runs under the ledger lock with the updated snapshot, so
    /// notifications it emits are ordered before any later reset.
    pub fn record_written<F>(
        &self,
        url: &str,
        token: &CancellationToken,
        on_recorded: F,
    ) -> Option<ProgressSnapshot>
    where
        F: FnOnce(ProgressSnapshot),
    {
        let mut written = self.written.lock();
        if token.is_cancelled() {
            return None;
        }
        if !written.insert(url.to_string()) {
            return Some(self.snapshot());
        }

        let files_written = self.files_written.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = ProgressSnapshot {
            files_written,
            files_expected: self.files_expected.load(Ordering::SeqCst),
        };
        on_recorded(snapshot);
        Some(snapshot)
    }

    /// Whether `url` has already been persisted for the current job.
    pub fn is_written(&self, url: &str) -> bool {
        self.written.lock().contains(url)
    }

    /// Returns the URLs from `urls` that have not been persisted yet.
    pub fn pending<'a, I>(&self, urls: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let written = self.written.lock();
        urls.into_iter()
            .filter(|url| !written.contains(url.as_str()))
            .cloned()
            .collect()
    }

    /// Resets both counters to zero and forgets every written URL.
    pub fn reset(&self) {
        let mut written = self.written.lock();
        written.clear();
        self.files_written.store(0, Ordering::SeqCst);
        self.files_expected.store(0, Ordering::SeqCst);
    }

    pub fn files_written(&self) -> usize {
        self.files_written.load(Ordering::SeqCst)
    }

    pub fn files_expected(&self) -> usize {
        self.files_expected.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            files_written: self.files_written(),
            files_expected: self.files_expected(),
        }
    }
}
