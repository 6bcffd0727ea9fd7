//! Download job model: identity, parameters, lifecycle and progress.

mod params;
mod progress;
mod state;

pub use params::{DownloadRequest, ImageQuality, JobId, JobManifest, JobParameters};
pub use progress::{ProgressCounters, ProgressSnapshot};
pub use state::{JobState, JobStateMachine, Transition};
