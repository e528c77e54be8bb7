use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, error, info, instrument};

use crate::channel::Notifier;
use crate::error::TransportError;
use crate::monitors::state::Transition;
use crate::util::format_duration;
use crate::{Recipient, Target};

/// Outcome of fanning one transition out to the recipients.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Recipient ids that received the alert
    pub delivered: Vec<String>,
    /// Recipient ids whose delivery failed, with the reason
    pub failed: Vec<(String, TransportError)>,
}

impl DispatchReport {
    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.failed.len()
    }
}

/// Sends transition alerts to every recipient allowed to see the target.
#[derive(Clone)]
pub struct AlertDispatcher {
    notifier: Arc<dyn Notifier>,
    recipients: Arc<[Recipient]>,
}

impl AlertDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, recipients: Vec<Recipient>) -> Self {
        Self {
            notifier,
            recipients: recipients.into(),
        }
    }

    pub fn recipients(&self) -> &[Recipient] {
        &self.recipients
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    /// Deliver the alert for `transition` to every recipient in scope.
    ///
    /// Deliveries run concurrently and independently: a failing recipient is
    /// logged and reported but never stops the others.
    #[instrument(skip(self, target), fields(host = %target.host))]
    pub async fn dispatch(&self, target: &Target, transition: &Transition) -> DispatchReport {
        let text = format_alert(target, transition);

        let deliveries = self
            .recipients
            .iter()
            .filter(|recipient| recipient.can_access(target))
            .map(|recipient| {
                let text = &text;
                async move {
                    let result = self.notifier.send_message(&recipient.id, text).await;
                    (recipient.id.clone(), result)
                }
            });

        let mut report = DispatchReport::default();
        for (recipient, result) in join_all(deliveries).await {
            match result {
                Ok(()) => report.delivered.push(recipient),
                Err(e) => {
                    error!("failed to deliver alert to {recipient}: {e}");
                    report.failed.push((recipient, e));
                }
            }
        }

        if report.attempted() == 0 {
            debug!("no recipient covers {target}");
        } else {
            info!(
                "alert {transition:?} for {target}: {} delivered, {} failed",
                report.delivered.len(),
                report.failed.len()
            );
        }

        report
    }
}

pub fn format_alert(target: &Target, transition: &Transition) -> String {
    match transition {
        Transition::Degraded => format!("⚠️ {target} is unstable"),
        Transition::Down => format!("❌ {target} is unreachable"),
        Transition::Recovered { outage } => {
            let duration = outage
                .map(format_duration)
                .unwrap_or_else(|| String::from("unknown"));
            format!("✅ {target} recovered. Outage duration: {duration}.")
        }
    }
}
