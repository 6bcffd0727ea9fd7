//! Download orchestrator.
//!
//! [`OfflineMapDownloader`] owns the single active job. A job goes through
//! three phases:
//!
//! 1. **Start** (`begin_downloading`): validate, assign an ID, build the static
//!    plan and spawn the setup task.
//! 2. **Setup**: optionally fetch marker data and add its icons to the plan,
//!    freeze the plan, open the package and announce the expected count.
//! 3. **Fetch runs**: a bounded window of concurrent fetches over every
//!    planned URL not yet written. Suspending stops the run; resuming starts a
//!    new one over what is still missing.
//!
//! Control operations serialize on one async lock, which also guards every
//! store call that changes the package lifecycle. Each job has a cancellation
//! token and each fetch run a child of it, so cancelling the job stops the
//! run and suspending stops only the run.

mod run;
mod setup;

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::DownloaderConfig;
use crate::error::{DownloadError, DownloadResult};
use crate::job::{
    DownloadRequest, JobId, JobParameters, JobState, JobStateMachine, ProgressCounters,
    ProgressSnapshot, Transition,
};
use crate::notify::{DownloadEvent, Notifier, TracingNotifier};
use crate::package::{CompletedPackage, PackageLibrary};
use crate::plan::{build_static_plan, FrozenPlan};
use crate::provider::{AssumeOnline, Connectivity, Fetcher};
use crate::store::{PackageHandle, PackageStore};

use run::FetchRun;

/// Coordinates offline map downloads.
///
/// Cheap to clone; clones share the same job, counters and library.
#[derive(Clone)]
pub struct OfflineMapDownloader {
    inner: Arc<Inner>,
}

struct Inner {
    config: DownloaderConfig,
    fetcher: Arc<dyn Fetcher>,
    store: Arc<dyn PackageStore>,
    notifier: Arc<dyn Notifier>,
    connectivity: Arc<dyn Connectivity>,
    library: PackageLibrary,
    counters: ProgressCounters,
    status: Mutex<Status>,
    control: AsyncMutex<Option<ActiveJob>>,
}

/// State visible to non-blocking readers.
#[derive(Default)]
struct Status {
    machine: JobStateMachine,
    job_id: Option<JobId>,
}

/// The job occupying the downloader. Present exactly while the state is not
/// `Available`.
struct ActiveJob {
    id: JobId,
    params: JobParameters,
    token: CancellationToken,
    /// Set once setup has frozen the plan.
    plan: Option<Arc<FrozenPlan>>,
    /// Set once setup has opened the package.
    handle: Option<PackageHandle>,
    run: Option<RunHandle>,
}

struct RunHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl RunHandle {
    fn stop(self) {
        self.token.cancel();
        self.task.abort();
    }
}

/// Builder for [`OfflineMapDownloader`].
pub struct DownloaderBuilder {
    config: DownloaderConfig,
    fetcher: Arc<dyn Fetcher>,
    store: Arc<dyn PackageStore>,
    notifier: Arc<dyn Notifier>,
    connectivity: Arc<dyn Connectivity>,
    packages: Vec<CompletedPackage>,
}

impl DownloaderBuilder {
    /// Event sink. Defaults to logging every event.
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Reachability probe. Defaults to assuming the network is up.
    pub fn connectivity(mut self, connectivity: Arc<dyn Connectivity>) -> Self {
        self.connectivity = connectivity;
        self
    }

    /// Packages completed in earlier sessions.
    pub fn packages(mut self, packages: impl IntoIterator<Item = CompletedPackage>) -> Self {
        self.packages.extend(packages);
        self
    }

    pub fn build(self) -> OfflineMapDownloader {
        OfflineMapDownloader {
            inner: Arc::new(Inner {
                config: self.config,
                fetcher: self.fetcher,
                store: self.store,
                notifier: self.notifier,
                connectivity: self.connectivity,
                library: PackageLibrary::with_packages(self.packages),
                counters: ProgressCounters::new(),
                status: Mutex::new(Status::default()),
                control: AsyncMutex::new(None),
            }),
        }
    }
}

impl OfflineMapDownloader {
    pub fn builder(
        config: DownloaderConfig,
        fetcher: Arc<dyn Fetcher>,
        store: Arc<dyn PackageStore>,
    ) -> DownloaderBuilder {
        DownloaderBuilder {
            config,
            fetcher,
            store,
            notifier: Arc::new(TracingNotifier),
            connectivity: Arc::new(AssumeOnline),
            packages: Vec::new(),
        }
    }

    pub fn config(&self) -> &DownloaderConfig {
        &self.inner.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> JobState {
        self.inner.status.lock().machine.state()
    }

    /// ID of the job occupying the downloader, if any.
    pub fn active_job(&self) -> Option<JobId> {
        self.inner.status.lock().job_id
    }

    /// Files written and expected for the active job.
    pub fn progress(&self) -> ProgressSnapshot {
        self.inner.counters.snapshot()
    }

    /// Starts downloading `request`.
    ///
    /// The region and zoom range are validated before anything else; an
    /// invalid request leaves the state untouched. Fails with
    /// [`DownloadError::Busy`] unless the downloader is `Available`. Returns
    /// once the job is `Running`; planning and fetching continue in the
    /// background and report through the notifier.
    pub async fn begin_downloading(&self, request: DownloadRequest) -> DownloadResult<JobId> {
        let tile_count = request.validate(self.inner.config.max_tiles)?;

        let mut slot = self.inner.control.lock().await;
        let state = self.state();
        if state != JobState::Available {
            return Err(DownloadError::Busy(state));
        }

        let job_id = JobId::generate();
        let params = request.into_parameters(job_id);
        let plan = build_static_plan(&params, &self.inner.config.endpoints)?;
        let token = CancellationToken::new();

        info!(
            job_id = %job_id,
            map_id = %params.map_id,
            min_zoom = params.min_zoom,
            max_zoom = params.max_zoom,
            tiles = tile_count,
            markers = params.include_markers,
            "Starting offline map download"
        );

        *slot = Some(ActiveJob {
            id: job_id,
            params: params.clone(),
            token: token.clone(),
            plan: None,
            handle: None,
            run: None,
        });
        self.transition(job_id, Transition::Start);

        let span = info_span!("download_setup", job_id = %job_id);
        tokio::spawn(self.clone().prepare(params, plan, token).instrument(span));

        Ok(job_id)
    }

    /// Cancels the active job, discarding its package.
    ///
    /// No-op unless a job is running or suspended. Returns whether a job was
    /// cancelled.
    pub async fn cancel(&self) -> bool {
        let mut slot = self.inner.control.lock().await;
        self.teardown(&mut slot, Transition::Cancel, DownloadError::Cancelled)
            .await
    }

    /// Aborts the active job with `error`.
    ///
    /// Like [`cancel`](Self::cancel), but the completion event carries the
    /// given error.
    pub async fn cancel_immediately(&self, error: DownloadError) -> bool {
        let mut slot = self.inner.control.lock().await;
        let first = self.abort_transition();
        self.teardown(&mut slot, first, error).await
    }

    /// Pauses the running job, keeping its package and counters.
    pub async fn suspend(&self) -> bool {
        let mut slot = self.inner.control.lock().await;
        let Some(job) = slot.as_mut() else {
            return false;
        };
        if !self.can_apply(Transition::Suspend) {
            return false;
        }

        // The run must stop counting writes before the state leaves Running.
        if let Some(run) = job.run.take() {
            run.stop();
        }
        self.transition(job.id, Transition::Suspend);
        info!(
            job_id = %job.id,
            written = self.inner.counters.files_written(),
            expected = self.inner.counters.files_expected(),
            "Download suspended"
        );
        true
    }

    /// Resumes a suspended job, fetching every planned URL not yet written.
    pub async fn resume(&self) -> bool {
        let mut slot = self.inner.control.lock().await;
        let Some(job) = slot.as_mut() else {
            return false;
        };
        if self.transition(job.id, Transition::Resume).is_none() {
            return false;
        }

        info!(job_id = %job.id, "Download resumed");
        // Suspended during setup: setup starts the run once the package is open.
        self.start_run(job);
        true
    }

    /// Completed packages in insertion order.
    pub fn list_completed_packages(&self) -> Vec<CompletedPackage> {
        self.inner.library.list()
    }

    /// Removes a completed package. See [`remove_package_by_id`](Self::remove_package_by_id).
    pub async fn remove_package(&self, package: &CompletedPackage) -> DownloadResult<bool> {
        self.remove_package_by_id(package.id()).await
    }

    /// Deletes a completed package from the store, then invalidates it and
    /// detaches it from the library.
    ///
    /// Returns `Ok(false)` for an unknown ID. A package whose deletion fails
    /// stays listed and valid.
    pub async fn remove_package_by_id(&self, id: JobId) -> DownloadResult<bool> {
        let Some(package) = self.inner.library.get(id) else {
            debug!(package_id = %id, "No package to remove");
            return Ok(false);
        };

        if let Err(e) = self.inner.store.delete(&package).await {
            warn!(package_id = %id, error = %e, "Failed to delete package");
            return Err(e.into());
        }
        self.inner.library.remove(id);
        info!(package_id = %id, location = %package.location, "Package removed");
        Ok(true)
    }

    /// Adds every package the store already holds to the library.
    ///
    /// Returns the number of packages added.
    pub async fn restore_packages(&self) -> DownloadResult<usize> {
        let mut added = 0;
        for record in self.inner.store.load().await? {
            if self.inner.library.add(CompletedPackage::new(record)) {
                added += 1;
            }
        }
        debug!(added, "Restored packages from store");
        Ok(added)
    }

    /// Applies `transition` and announces the new state.
    fn transition(&self, job_id: JobId, transition: Transition) -> Option<JobState> {
        let state = {
            let mut status = self.inner.status.lock();
            let state = status.machine.apply(transition)?;
            status.job_id = state.is_active().then_some(job_id);
            state
        };

        debug!(job_id = %job_id, ?transition, state = %state, "Job state changed");
        self.inner
            .notifier
            .notify(DownloadEvent::StateChanged { job_id, state });
        Some(state)
    }

    /// Whether `transition` applies to the current state.
    fn can_apply(&self, transition: Transition) -> bool {
        self.inner.status.lock().machine.target(transition).is_some()
    }

    /// First transition of an abort: `Fail` while running, `Cancel` otherwise.
    fn abort_transition(&self) -> Transition {
        if self.state() == JobState::Running {
            Transition::Fail
        } else {
            Transition::Cancel
        }
    }

    /// Counts `url` as written and reports progress, unless `token` is cancelled.
    fn record_written(&self, job_id: JobId, url: &str, token: &CancellationToken) -> bool {
        let notifier = &self.inner.notifier;
        self.inner
            .counters
            .record_written(url, token, |snapshot| {
                notifier.notify(DownloadEvent::Progress {
                    job_id,
                    written: snapshot.files_written,
                    expected: snapshot.files_expected,
                });
            })
            .is_some()
    }

    /// Starts a fetch run over the unwritten URLs, if the package is open.
    fn start_run(&self, job: &mut ActiveJob) {
        let (Some(plan), Some(handle)) = (job.plan.clone(), job.handle.clone()) else {
            return;
        };

        let token = job.token.child_token();
        let pending = self.inner.counters.pending(plan.urls());
        debug!(job_id = %job.id, pending = pending.len(), "Starting fetch run");

        let run = FetchRun {
            downloader: self.clone(),
            job_id: job.id,
            plan,
            handle,
            token: token.clone(),
            pending,
        };
        let span = info_span!("fetch_run", job_id = %job.id);
        let task = tokio::spawn(run.execute().instrument(span));
        job.run = Some(RunHandle { token, task });
    }

    /// Ends the job in `slot` without a package.
    ///
    /// Enters `Canceling` through `first`, stops all work, resets the
    /// counters, discards the package, settles to `Available` and emits the
    /// completion event. Returns false if `first` does not apply.
    async fn teardown(
        &self,
        slot: &mut Option<ActiveJob>,
        first: Transition,
        error: DownloadError,
    ) -> bool {
        if slot.is_none() || !self.can_apply(first) {
            return false;
        }
        let Some(mut job) = slot.take() else {
            return false;
        };

        job.token.cancel();
        if let Some(run) = job.run.take() {
            run.stop();
        }
        self.transition(job.id, first);
        self.inner.counters.reset();

        if let Some(handle) = job.handle.take() {
            if let Err(e) = self.inner.store.discard(&handle).await {
                warn!(job_id = %job.id, error = %e, "Failed to discard package");
            }
        }

        self.transition(job.id, Transition::Settle);
        match &error {
            DownloadError::Cancelled => info!(job_id = %job.id, "Download cancelled"),
            other => warn!(
                job_id = %job.id,
                map_id = %job.params.map_id,
                error = %other,
                "Download aborted"
            ),
        }
        self.inner.notifier.notify(DownloadEvent::Completed {
            job_id: job.id,
            package: None,
            error: Some(error),
        });
        true
    }

    /// Aborts job `job_id` with `error` if it is still the active job.
    async fn abort_job(&self, job_id: JobId, error: DownloadError) {
        let mut slot = self.inner.control.lock().await;
        if !slot.as_ref().is_some_and(|job| job.id == job_id) {
            return;
        }
        let first = self.abort_transition();
        self.teardown(&mut slot, first, error).await;
    }
}
