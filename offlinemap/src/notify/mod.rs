//! Download lifecycle events and their sinks.
//!
//! For a job, `InitialCount` precedes every `Progress` event and `Completed`
//! follows all of them. Every terminal outcome emits exactly one `Completed`.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::DownloadError;
use crate::job::{JobId, JobState};
use crate::package::CompletedPackage;

/// Event emitted by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadEvent {
    /// The job state machine moved.
    StateChanged { job_id: JobId, state: JobState },

    /// The plan is frozen; `expected` files will be fetched.
    InitialCount { job_id: JobId, expected: usize },

    /// A resource was persisted.
    Progress {
        job_id: JobId,
        written: usize,
        expected: usize,
    },

    /// The job ended, with a package on success or an error otherwise.
    Completed {
        job_id: JobId,
        package: Option<CompletedPackage>,
        error: Option<DownloadError>,
    },

    /// A non-fatal problem the job tolerated.
    PartialFailure { job_id: JobId, error: DownloadError },
}

impl DownloadEvent {
    pub fn job_id(&self) -> JobId {
        match self {
            DownloadEvent::StateChanged { job_id, .. }
            | DownloadEvent::InitialCount { job_id, .. }
            | DownloadEvent::Progress { job_id, .. }
            | DownloadEvent::Completed { job_id, .. }
            | DownloadEvent::PartialFailure { job_id, .. } => *job_id,
        }
    }
}

/// Receiver of download events.
///
/// Called from the orchestrator's tasks, sometimes while internal locks are
/// held, so implementations must not block or call back into the downloader.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: DownloadEvent);
}

/// Forwards events into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<DownloadEvent>,
}

impl ChannelNotifier {
    /// Creates the notifier and the receiving end of its channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DownloadEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, event: DownloadEvent) {
        // Receiver dropped: nobody is listening any more.
        let _ = self.tx.send(event);
    }
}

/// Logs every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, event: DownloadEvent) {
        match event {
            DownloadEvent::StateChanged { job_id, state } => {
                info!(job_id = %job_id, state = %state, "Job state changed");
            }
            DownloadEvent::InitialCount { job_id, expected } => {
                info!(job_id = %job_id, expected, "Download plan ready");
            }
            DownloadEvent::Progress {
                job_id,
                written,
                expected,
            } => {
                debug!(job_id = %job_id, written, expected, "Download progress");
            }
            DownloadEvent::Completed {
                job_id,
                package: Some(package),
                ..
            } => {
                info!(
                    job_id = %job_id,
                    location = %package.location,
                    resources = package.resource_count,
                    missing = package.missing_count(),
                    "Download completed"
                );
            }
            DownloadEvent::Completed { job_id, error, .. } => {
                let error = error.map(|e| e.to_string()).unwrap_or_default();
                warn!(job_id = %job_id, error = %error, "Download ended without a package");
            }
            DownloadEvent::PartialFailure { job_id, error } => {
                warn!(job_id = %job_id, error = %error, "Resource skipped");
            }
        }
    }
}

/// Sends every event to each inner notifier in order.
pub struct FanoutNotifier {
    sinks: Vec<Box<dyn Notifier>>,
}

impl FanoutNotifier {
    pub fn new(sinks: Vec<Box<dyn Notifier>>) -> Self {
        Self { sinks }
    }
}

impl Notifier for FanoutNotifier {
    fn notify(&self, event: DownloadEvent) {
        for sink in &self.sinks {
            sink.notify(event.clone());
        }
    }
}
