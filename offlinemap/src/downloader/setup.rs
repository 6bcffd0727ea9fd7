//! Job setup: marker discovery, plan freezing and package opening.

use std::sync::Arc;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::OfflineMapDownloader;
use crate::error::DownloadError;
use crate::job::{JobParameters, JobState, Transition};
use crate::markers::resolve_icon_urls;
use crate::notify::DownloadEvent;
use crate::plan::ResourcePlan;

use super::run::fetch_with_timeout;

impl OfflineMapDownloader {
    /// Runs the setup phase of a freshly started job.
    ///
    /// Exits silently if the job was cancelled in the meantime.
    pub(super) async fn prepare(
        self,
        params: JobParameters,
        mut plan: ResourcePlan,
        token: CancellationToken,
    ) {
        let job_id = params.id;
        let mut prefetched: Option<(String, Bytes)> = None;

        if let Some(url) = plan.marker_data_url().map(str::to_string) {
            let online = tokio::select! {
                biased;
                _ = token.cancelled() => return,
                online = self.inner.connectivity.is_available() => online,
            };
            if !online {
                self.abort_job(job_id, DownloadError::NoConnectivity).await;
                return;
            }

            let fetched = tokio::select! {
                biased;
                _ = token.cancelled() => return,
                result = fetch_with_timeout(
                    self.inner.fetcher.as_ref(),
                    &url,
                    self.inner.config.fetch_timeout,
                ) => result,
            };

            match fetched {
                Ok(data) => {
                    match resolve_icon_urls(&data, &self.inner.config.endpoints) {
                        Ok(icons) => {
                            let found = icons.len();
                            let added = plan.extend_icons(icons);
                            debug!(found, added, "Marker icons added to plan");
                        }
                        Err(e) => {
                            warn!(url = %url, error = %e, "Ignoring malformed marker data");
                            self.inner.notifier.notify(DownloadEvent::PartialFailure {
                                job_id,
                                error: DownloadError::MalformedMarkerData(e.to_string()),
                            });
                        }
                    }
                    prefetched = Some((url, data));
                }
                Err(e) => {
                    // Maps without markers answer 404 here.
                    warn!(url = %url, error = %e, "Marker data unavailable, continuing without markers");
                    plan.remove_marker_data();
                    self.inner.notifier.notify(DownloadEvent::PartialFailure {
                        job_id,
                        error: DownloadError::ResourceFetch { url, source: e },
                    });
                }
            }
        }

        let plan = Arc::new(plan.freeze());
        let manifest = params.manifest();

        let mut slot = self.inner.control.lock().await;
        if token.is_cancelled() || !slot.as_ref().is_some_and(|job| job.id == job_id) {
            return;
        }

        let handle = match self.inner.store.open(&manifest).await {
            Ok(handle) => handle,
            Err(e) => {
                let first = self.abort_transition();
                self.teardown(&mut slot, first, e.into()).await;
                return;
            }
        };

        self.inner.counters.begin(plan.len());
        self.inner.notifier.notify(DownloadEvent::InitialCount {
            job_id,
            expected: plan.len(),
        });
        info!(expected = plan.len(), location = %handle.location(), "Download plan ready");

        if let Some(job) = slot.as_mut() {
            job.plan = Some(Arc::clone(&plan));
            job.handle = Some(handle.clone());
        }

        if self.state() != JobState::Running {
            // Suspend holds the control lock, so the state cannot change under
            // us here. The resumed run fetches the marker data again.
            if let Some((url, _)) = prefetched {
                debug!(url = %url, "Dropping marker data fetched before suspend");
            }
            debug!("Job suspended during setup, waiting for resume");
            return;
        }

        if let Some((url, data)) = prefetched {
            if let Err(e) = self.inner.store.write(&handle, &url, data).await {
                self.teardown(&mut slot, Transition::Fail, e.into()).await;
                return;
            }
            self.record_written(job_id, &url, &token);
        }

        if let Some(job) = slot.as_mut() {
            self.start_run(job);
        }
    }
}
