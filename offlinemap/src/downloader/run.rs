//! Fetch runs.
//!
//! A run keeps at most `max_concurrent_fetches` fetches in flight on a
//! `JoinSet`, refilling the window as each completes. Fetches only produce
//! bytes; the run loop itself persists them, so the store sees one writer.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::OfflineMapDownloader;
use crate::error::DownloadError;
use crate::job::{JobId, Transition};
use crate::notify::DownloadEvent;
use crate::package::CompletedPackage;
use crate::plan::FrozenPlan;
use crate::provider::{FetchError, Fetcher};
use crate::store::PackageHandle;

/// Fetches `url`, turning an elapsed `timeout` into [`FetchError::Timeout`].
pub(super) async fn fetch_with_timeout(
    fetcher: &dyn Fetcher,
    url: &str,
    timeout: Duration,
) -> Result<Bytes, FetchError> {
    match tokio::time::timeout(timeout, fetcher.fetch(url, timeout)).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout {
            url: url.to_string(),
            timeout_secs: timeout.as_secs(),
        }),
    }
}

pub(super) struct FetchRun {
    pub(super) downloader: OfflineMapDownloader,
    pub(super) job_id: JobId,
    pub(super) plan: Arc<FrozenPlan>,
    pub(super) handle: PackageHandle,
    pub(super) token: CancellationToken,
    pub(super) pending: Vec<String>,
}

impl FetchRun {
    pub(super) async fn execute(self) {
        let FetchRun {
            downloader,
            job_id,
            plan,
            handle,
            token,
            pending,
        } = self;
        let inner = &downloader.inner;
        let limit = inner.config.max_concurrent_fetches.max(1);
        let timeout = inner.config.fetch_timeout;

        debug!(pending = pending.len(), limit, "Fetch run started");

        let mut queue = pending.into_iter();
        let mut tasks: JoinSet<(String, Result<Bytes, FetchError>)> = JoinSet::new();
        let mut failed = 0usize;

        loop {
            while tasks.len() < limit && !token.is_cancelled() {
                let Some(url) = queue.next() else {
                    break;
                };
                let fetcher = Arc::clone(&inner.fetcher);
                let token = token.clone();
                tasks.spawn(async move {
                    let result = tokio::select! {
                        biased;
                        _ = token.cancelled() => Err(FetchError::Transport {
                            url: url.clone(),
                            cause: "cancelled".to_string(),
                        }),
                        result = fetch_with_timeout(fetcher.as_ref(), &url, timeout) => result,
                    };
                    (url, result)
                });
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };
            if token.is_cancelled() {
                // Dropping the set aborts the remaining fetches.
                return;
            }

            let (url, result) = match joined {
                Ok(output) => output,
                Err(e) => {
                    warn!(error = %e, "Fetch task did not complete");
                    continue;
                }
            };

            match result {
                Ok(data) => {
                    let size = data.len();
                    if let Err(e) = inner.store.write(&handle, &url, data).await {
                        if token.is_cancelled() {
                            return;
                        }
                        error!(url = %url, error = %e, "Failed to persist resource");
                        downloader.fail_run(job_id, &token, e.into()).await;
                        return;
                    }
                    if downloader.record_written(job_id, &url, &token) {
                        trace!(url = %url, bytes = size, "Resource persisted");
                    }
                }
                Err(e) => {
                    let critical = plan.kind_of(&url).is_some_and(|kind| kind.is_critical());
                    warn!(url = %url, error = %e, critical, "Resource fetch failed");
                    if critical {
                        let error = DownloadError::CriticalResourceFetch { url, source: e };
                        downloader.fail_run(job_id, &token, error).await;
                        return;
                    }
                    failed += 1;
                    inner.notifier.notify(DownloadEvent::PartialFailure {
                        job_id,
                        error: DownloadError::ResourceFetch { url, source: e },
                    });
                }
            }
        }

        if token.is_cancelled() {
            return;
        }
        debug!(failed, "Fetch run attempted every pending resource");
        downloader.finish_run(job_id, &token, &plan).await;
    }
}

impl OfflineMapDownloader {
    /// Aborts the job from inside its own run.
    async fn fail_run(&self, job_id: JobId, token: &CancellationToken, error: DownloadError) {
        let mut slot = self.inner.control.lock().await;
        if token.is_cancelled() {
            return;
        }
        let Some(job) = slot.as_mut().filter(|job| job.id == job_id) else {
            return;
        };
        // Detach rather than abort: this task is the run.
        job.run.take();
        self.teardown(&mut slot, Transition::Fail, error).await;
    }

    /// Concludes a run that attempted every pending URL.
    ///
    /// Failed critical fetches have already ended the job, but a fetch task
    /// can also die without a result. The job fails if metadata or marker
    /// data is still missing; otherwise the package is finalized, tolerating
    /// missing tiles and icons.
    async fn finish_run(&self, job_id: JobId, token: &CancellationToken, plan: &FrozenPlan) {
        let mut slot = self.inner.control.lock().await;
        if token.is_cancelled() {
            return;
        }
        let Some(job) = slot.as_mut().filter(|job| job.id == job_id) else {
            return;
        };
        job.run.take();
        let Some(handle) = job.handle.clone() else {
            return;
        };

        let counters = &self.inner.counters;
        let critical = plan
            .resources()
            .iter()
            .find(|r| r.kind.is_critical() && !counters.is_written(&r.url));
        if let Some(resource) = critical {
            let error = DownloadError::CriticalResourceFetch {
                url: resource.url.clone(),
                source: FetchError::Transport {
                    url: resource.url.clone(),
                    cause: "fetch did not complete".to_string(),
                },
            };
            self.teardown(&mut slot, Transition::Fail, error).await;
            return;
        }

        let missing: Vec<String> = plan
            .urls()
            .filter(|url| !counters.is_written(url))
            .cloned()
            .collect();
        let missing_count = missing.len();

        let record = match self.inner.store.finalize(&handle, missing).await {
            Ok(record) => record,
            Err(e) => {
                self.teardown(&mut slot, Transition::Fail, e.into()).await;
                return;
            }
        };

        if let Some(job) = slot.take() {
            job.token.cancel();
        }
        let package = CompletedPackage::new(record);
        self.inner.library.add(package.clone());
        counters.reset();
        self.transition(job_id, Transition::Complete);

        info!(
            location = %package.location,
            resources = package.resource_count,
            missing = missing_count,
            "Download complete"
        );
        self.inner.notifier.notify(DownloadEvent::Completed {
            job_id,
            package: Some(package),
            error: None,
        });
    }
}
