//! Anti-flap availability state machine
//!
//! Every target owns a [`TargetState`] that is driven by consecutive probe
//! outcomes. Transitions only happen once a streak reaches its threshold:
//!
//! ```text
//! success: streak >= success, status Warn|Down  → Ok   (Recovered alert)
//!          streak >= success, status Unknown    → Ok   (silent warm-up)
//! failure: streak >= fail,    status != Down    → Down (Down alert)
//!          streak >= warn,    status Ok         → Warn (Degraded alert)
//! ```
//!
//! A target that is already down never re-fires the down alert and keeps its
//! first outage start until it fully recovers.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::Target;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetStatus {
    #[default]
    Unknown,
    Ok,
    Warn,
    Down,
}

impl TargetStatus {
    pub fn label(&self) -> &'static str {
        match self {
            TargetStatus::Unknown => "unknown",
            TargetStatus::Ok => "ok",
            TargetStatus::Warn => "warn",
            TargetStatus::Down => "down",
        }
    }
}

impl fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Consecutive outcomes required before a transition is honored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub warn: u32,
    pub fail: u32,
    pub success: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            warn: 1,
            fail: 3,
            success: 2,
        }
    }
}

/// An alert-worthy change of a target's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Degraded,
    Down,
    /// `outage` is `None` when no outage start was recorded.
    Recovered { outage: Option<TimeDelta> },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TargetState {
    pub status: TargetStatus,
    pub fail_streak: u32,
    pub success_streak: u32,
    pub outage_started_at: Option<DateTime<Utc>>,
}

impl TargetState {
    /// Feed one probe outcome into the state machine.
    ///
    /// Returns the transition that should be announced, if any. The silent
    /// `Unknown → Ok` warm-up changes the status without returning one.
    pub fn apply(
        &mut self,
        success: bool,
        thresholds: &Thresholds,
        now: DateTime<Utc>,
    ) -> Option<Transition> {
        if success {
            self.success_streak = self.success_streak.saturating_add(1);
            self.fail_streak = 0;

            if self.success_streak < thresholds.success {
                return None;
            }

            match self.status {
                TargetStatus::Warn | TargetStatus::Down => {
                    let outage = self
                        .outage_started_at
                        .take()
                        .map(|started| (now - started).max(TimeDelta::zero()));
                    self.status = TargetStatus::Ok;
                    Some(Transition::Recovered { outage })
                }
                TargetStatus::Unknown => {
                    self.status = TargetStatus::Ok;
                    None
                }
                TargetStatus::Ok => None,
            }
        } else {
            self.fail_streak = self.fail_streak.saturating_add(1);
            self.success_streak = 0;

            if self.fail_streak >= thresholds.fail && self.status != TargetStatus::Down {
                self.status = TargetStatus::Down;
                self.outage_started_at = Some(now);
                Some(Transition::Down)
            } else if self.fail_streak >= thresholds.warn && self.status == TargetStatus::Ok {
                self.status = TargetStatus::Warn;
                Some(Transition::Degraded)
            } else {
                None
            }
        }
    }
}

/// Result of feeding one outcome to the tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct StateUpdate {
    /// State after the update
    pub state: TargetState,
    pub transition: Option<Transition>,
}

/// Point-in-time copy of one target's state.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetSnapshot {
    pub target: Target,
    pub state: TargetState,
}

/// Owns the state machine of every target.
///
/// The set of targets is fixed at construction; each state sits behind its
/// own lock so updates of one target never wait on another.
#[derive(Debug)]
pub struct StateTracker {
    thresholds: Thresholds,
    states: HashMap<String, Mutex<TargetState>>,
}

impl StateTracker {
    pub fn new(targets: &[Target], thresholds: Thresholds) -> Self {
        let states = targets
            .iter()
            .map(|target| (target.host.clone(), Mutex::new(TargetState::default())))
            .collect();

        Self { thresholds, states }
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Apply a probe outcome for `host`. Returns `None` for unknown hosts.
    pub async fn record(
        &self,
        host: &str,
        success: bool,
        now: DateTime<Utc>,
    ) -> Option<StateUpdate> {
        let mut state = self.states.get(host)?.lock().await;
        let previous = state.status;
        let transition = state.apply(success, &self.thresholds, now);

        if previous != state.status {
            debug!("{host}: {previous} -> {}", state.status);
        }
        trace!(
            "{host}: success={success} fail_streak={} success_streak={}",
            state.fail_streak, state.success_streak
        );

        Some(StateUpdate {
            state: state.clone(),
            transition,
        })
    }

    pub async fn snapshot(&self, host: &str) -> Option<TargetState> {
        let state = self.states.get(host)?.lock().await;
        Some(state.clone())
    }

    /// Snapshots of `targets` in the given order. Each state is locked only
    /// while it is copied.
    pub async fn snapshot_all(&self, targets: &[Target]) -> Vec<TargetSnapshot> {
        let mut snapshots = Vec::with_capacity(targets.len());
        for target in targets {
            if let Some(state) = self.snapshot(&target.host).await {
                snapshots.push(TargetSnapshot {
                    target: target.clone(),
                    state,
                });
            }
        }
        snapshots
    }
}
