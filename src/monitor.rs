//! The long-lived controller shared by the scheduler and the command server.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, instrument, warn};

use crate::alerts::{AlertDispatcher, DispatchReport};
use crate::channel::Notifier;
use crate::metrics::MetricsWriter;
use crate::monitors::probe::ProbeOutcome;
use crate::monitors::state::{StateTracker, TargetSnapshot, Thresholds, Transition};
use crate::storage::{ProbeLog, ProbeRecord};
use crate::{Recipient, Target};

/// What happened to one target after a probe outcome was recorded.
#[derive(Debug)]
pub struct RecordedOutcome {
    pub transition: Option<Transition>,
    /// Present when a transition was announced
    pub dispatch: Option<DispatchReport>,
}

pub struct Monitor {
    targets: Arc<[Target]>,
    tracker: StateTracker,
    dispatcher: AlertDispatcher,
    log: Arc<dyn ProbeLog>,
    metrics: MetricsWriter,
}

impl Monitor {
    pub fn new(
        targets: Vec<Target>,
        recipients: Vec<Recipient>,
        thresholds: Thresholds,
        notifier: Arc<dyn Notifier>,
        log: Arc<dyn ProbeLog>,
        metrics: MetricsWriter,
    ) -> Self {
        let tracker = StateTracker::new(&targets, thresholds);

        Self {
            targets: targets.into(),
            tracker,
            dispatcher: AlertDispatcher::new(notifier, recipients),
            log,
            metrics,
        }
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn recipients(&self) -> &[Recipient] {
        self.dispatcher.recipients()
    }

    pub fn recipient(&self, id: &str) -> Option<&Recipient> {
        self.recipients().iter().find(|recipient| recipient.id == id)
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        self.dispatcher.notifier()
    }

    pub fn thresholds(&self) -> Thresholds {
        self.tracker.thresholds()
    }

    /// Feed one probe outcome through the state machine, then log the record,
    /// refresh the metrics and announce any transition.
    ///
    /// Log and metrics failures are reported and swallowed so the probe loop
    /// keeps running.
    #[instrument(skip(self, target, outcome), fields(host = %target.host, success = outcome.success))]
    pub async fn record_outcome(&self, target: &Target, outcome: ProbeOutcome) -> RecordedOutcome {
        let now = Utc::now();

        let Some(update) = self.tracker.record(&target.host, outcome.success, now).await else {
            warn!("outcome for untracked target {target} ignored");
            return RecordedOutcome {
                transition: None,
                dispatch: None,
            };
        };

        let record = ProbeRecord::from_outcome(target, &outcome, &update.state, now);
        if let Err(e) = self.log.append(&record).await {
            error!("failed to append probe record to {}: {e}", self.log.backend_name());
        }

        if let Err(e) = self.metrics.refresh(&self.tracker, &self.targets).await {
            error!(
                "failed to write metrics to {}: {e}",
                self.metrics.path().display()
            );
        }

        let dispatch = match &update.transition {
            Some(transition) => Some(self.dispatcher.dispatch(target, transition).await),
            None => None,
        };

        RecordedOutcome {
            transition: update.transition,
            dispatch,
        }
    }

    /// Current state of every target, in configuration order.
    pub async fn snapshots(&self) -> Vec<TargetSnapshot> {
        self.tracker.snapshot_all(&self.targets).await
    }

    /// Current state of the targets `recipient` may see.
    pub async fn visible_snapshots(&self, recipient: &Recipient) -> Vec<TargetSnapshot> {
        let visible = self
            .targets
            .iter()
            .filter(|target| recipient.can_access(target))
            .cloned()
            .collect::<Vec<_>>();

        self.tracker.snapshot_all(&visible).await
    }
}
