//! Lifecycle state machine of the single active download job.
//!
//! ```text
//!              start              suspend
//!  Available ────────► Running ──────────► Suspended
//!      ▲               │  │  ▲                 │
//!      │     complete  │  │  └──── resume ─────┘
//!      ├───────────────┘  │                    │
//!      │           cancel │ fail        cancel │
//!      │                  ▼                    │
//!      └──── settle ── Canceling ◄─────────────┘
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of the downloader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum JobState {
    /// Ready to accept a new job.
    #[default]
    Available,
    /// A job is fetching resources.
    Running,
    /// A job is paused and can be resumed or cancelled.
    Suspended,
    /// A job is being torn down.
    Canceling,
}

impl JobState {
    /// Whether a job currently occupies the downloader.
    pub fn is_active(&self) -> bool {
        !matches!(self, JobState::Available)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Available => "available",
            JobState::Running => "running",
            JobState::Suspended => "suspended",
            JobState::Canceling => "canceling",
        };
        f.write_str(name)
    }
}

/// Transitions the orchestrator can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Start,
    Suspend,
    Resume,
    Cancel,
    Complete,
    Fail,
    /// Second half of cancel and fail: teardown finished.
    Settle,
}

/// State machine guarding the single-active-job invariant.
#[derive(Debug, Clone, Default)]
pub struct JobStateMachine {
    state: JobState,
}

impl JobStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Returns the state `transition` would lead to, or `None` if it is a
    /// no-op from the current state.
    pub fn target(&self, transition: Transition) -> Option<JobState> {
        use JobState::*;

        match (self.state, transition) {
            (Available, Transition::Start) => Some(Running),
            (Running, Transition::Suspend) => Some(Suspended),
            (Suspended, Transition::Resume) => Some(Running),
            (Running | Suspended, Transition::Cancel) => Some(Canceling),
            (Running, Transition::Complete) => Some(Available),
            (Running, Transition::Fail) => Some(Canceling),
            (Canceling, Transition::Settle) => Some(Available),
            _ => None,
        }
    }

    /// Applies `transition`, returning the new state if anything changed.
    pub fn apply(&mut self, transition: Transition) -> Option<JobState> {
        let next = self.target(transition)?;
        self.state = next;
        Some(next)
    }
}
