//! SchedulerActor - Drives the fixed-interval probe rounds
//!
//! ## Message Flow
//!
//! ```text
//! Round start → Probe targets → Monitor::record_outcome → [ProbeLog, MetricsWriter, AlertDispatcher]
//!     ↑                                                              │
//!     └──── sleep(interval - elapsed) ◄──────────────────────────────┘
//!             ↑
//!             └─── Commands (RunNow, Shutdown) and cancellation
//! ```
//!
//! Rounds are paced against the wall clock: the time spent probing is taken
//! off the following sleep. A round that overruns the interval is followed
//! immediately by the next one. Rounds never overlap.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::monitor::Monitor;
use crate::monitors::probe::Prober;
use crate::monitors::state::Transition;

use super::messages::{RoundSummary, SchedulerCommand};

/// Time to wait after a round that took `elapsed`.
pub fn pacing(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}

/// Probe every target once and feed the outcomes to the monitor.
///
/// At most `max_parallel` probes are in flight at a time; each target is
/// probed exactly once.
#[instrument(skip_all, fields(targets = monitor.targets().len()))]
pub async fn run_round(monitor: &Monitor, prober: &dyn Prober, max_parallel: usize) -> RoundSummary {
    let started = Instant::now();

    // boxed so the round future stays Send inside a spawned actor
    let pending: Vec<BoxFuture<'_, (String, bool, Option<Transition>)>> = monitor
        .targets()
        .iter()
        .map(|target| -> BoxFuture<'_, _> {
            Box::pin(async move {
                let outcome = prober.probe(target).await;
                let recorded = monitor.record_outcome(target, outcome).await;
                (target.host.clone(), outcome.success, recorded.transition)
            })
        })
        .collect();

    let results = stream::iter(pending)
        .buffer_unordered(max_parallel.max(1))
        .collect::<Vec<_>>()
        .await;

    let mut summary = RoundSummary {
        probed: results.len(),
        ..Default::default()
    };
    for (host, success, transition) in results {
        if success {
            summary.reachable += 1;
        }
        if let Some(transition) = transition {
            summary.transitions.push((host, transition));
        }
    }
    summary.elapsed = started.elapsed();

    debug!(
        "round finished: {}/{} reachable in {:?}",
        summary.reachable, summary.probed, summary.elapsed
    );
    summary
}

pub struct SchedulerActor {
    monitor: Arc<Monitor>,

    prober: Arc<dyn Prober>,

    /// Time between round starts
    interval: Duration,

    max_parallel: usize,

    /// Command receiver for control messages
    command_rx: mpsc::Receiver<SchedulerCommand>,

    cancel: CancellationToken,
}

impl SchedulerActor {
    pub fn new(
        monitor: Arc<Monitor>,
        prober: Arc<dyn Prober>,
        interval: Duration,
        max_parallel: usize,
        command_rx: mpsc::Receiver<SchedulerCommand>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            monitor,
            prober,
            interval,
            max_parallel,
            command_rx,
            cancel,
        }
    }

    /// Run the actor's main loop
    ///
    /// The first round starts right away. The loop runs until:
    /// - the cancellation token fires
    /// - A Shutdown command is received
    /// - The command channel is closed
    #[instrument(skip(self), fields(interval = ?self.interval))]
    pub async fn run(mut self) {
        info!(
            "monitoring {} targets every {:?}",
            self.monitor.targets().len(),
            self.interval
        );

        'rounds: loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let summary = self.round().await;
            let deadline = Instant::now() + pacing(self.interval, summary.elapsed);
            if summary.elapsed >= self.interval {
                warn!(
                    "probe round took {:?}, longer than the interval",
                    summary.elapsed
                );
            }

            loop {
                tokio::select! {
                    biased;

                    _ = self.cancel.cancelled() => {
                        debug!("cancelled while waiting for the next round");
                        break 'rounds;
                    }

                    cmd = self.command_rx.recv() => match cmd {
                        Some(SchedulerCommand::RunNow { respond_to }) => {
                            debug!("received RunNow command");
                            let summary = self.round().await;
                            let _ = respond_to.send(summary);
                        }
                        Some(SchedulerCommand::Shutdown) => {
                            debug!("received shutdown command");
                            break 'rounds;
                        }
                        None => {
                            warn!("command channel closed, shutting down");
                            break 'rounds;
                        }
                    },

                    _ = sleep_until(deadline) => break,
                }
            }
        }

        info!("scheduler stopped");
    }

    async fn round(&self) -> RoundSummary {
        run_round(&self.monitor, self.prober.as_ref(), self.max_parallel).await
    }
}

/// Handle for controlling a SchedulerActor
pub struct SchedulerHandle {
    sender: mpsc::Sender<SchedulerCommand>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Spawn a new scheduler actor
    pub fn spawn(
        monitor: Arc<Monitor>,
        prober: Arc<dyn Prober>,
        interval: Duration,
        max_parallel: usize,
        cancel: CancellationToken,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);

        let actor = SchedulerActor::new(monitor, prober, interval, max_parallel, cmd_rx, cancel);
        let task = tokio::spawn(actor.run());

        Self {
            sender: cmd_tx,
            task,
        }
    }

    /// Run a round now and wait for its summary
    ///
    /// The request is served between rounds.
    pub async fn run_now(&self) -> Result<RoundSummary> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SchedulerCommand::RunNow { respond_to: tx })
            .await
            .context("failed to send RunNow command")?;

        rx.await.context("failed to receive round summary")
    }

    /// Gracefully shut down the scheduler
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(SchedulerCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }

    /// Wait for the actor to exit
    pub async fn join(self) -> Result<()> {
        let Self { sender, task } = self;
        let result = task.await.context("scheduler task failed");
        drop(sender);
        result
    }
}
