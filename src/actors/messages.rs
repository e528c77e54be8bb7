//! Message types for actor communication

use std::time::Duration;

use tokio::sync::oneshot;

use crate::monitors::state::Transition;

/// Commands that can be sent to the SchedulerActor
#[derive(Debug)]
pub enum SchedulerCommand {
    /// Run a probe round immediately, without moving the next scheduled one
    ///
    /// Used for testing and manual refresh operations.
    RunNow {
        /// Channel to send the round summary back
        respond_to: oneshot::Sender<RoundSummary>,
    },

    /// Gracefully shut down the scheduler
    ///
    /// A round in progress is finished first.
    Shutdown,
}

/// What one probe round did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoundSummary {
    /// Number of targets probed
    pub probed: usize,

    /// Number of probes that succeeded
    pub reachable: usize,

    /// Announced transitions, keyed by target host
    pub transitions: Vec<(String, Transition)>,

    /// Wall clock time spent probing
    pub elapsed: Duration,
}
