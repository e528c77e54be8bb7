//! Integration tests for the probe pipeline
//!
//! These tests verify that the pieces work correctly together:
//! - Scheduler → Monitor → ProbeLog / MetricsWriter / AlertDispatcher
//! - Alerts only reach recipients whose scope covers the target
//! - A failing recipient does not stop the others

use std::sync::Arc;
use std::time::Duration;

use ipwatch::Role;
use ipwatch::actors::scheduler::SchedulerHandle;
use ipwatch::monitors::state::{TargetStatus, Transition};
use ipwatch::storage::csv::CsvLog;
use ipwatch::storage::memory::MemoryLog;
use ipwatch::storage::RecordStatus;
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

use crate::helpers::*;

#[tokio::test]
async fn test_outage_and_recovery_reach_scoped_recipients() {
    let dir = tempdir().unwrap();
    let notifier = Arc::new(RecordingNotifier::default());
    let prober = Arc::new(ScriptedProber::default());

    let monitor = build_monitor(
        vec![target("10.0.0.1", "router"), target("10.0.0.2", "nas")],
        vec![
            recipient("100", Role::Admin, ipwatch::AccessScope::All),
            recipient("200", Role::User, only(&["nas"])),
        ],
        notifier.clone(),
        Arc::new(MemoryLog::new()),
        dir.path(),
    );

    let scheduler = SchedulerHandle::spawn(
        monitor.clone(),
        prober.clone(),
        Duration::from_secs(3600),
        2,
        CancellationToken::new(),
    );

    // warm-up: the initial round plus one more brings both targets to ok
    scheduler.run_now().await.unwrap();
    let snapshots = monitor.snapshots().await;
    assert!(snapshots.iter().all(|s| s.state.status == TargetStatus::Ok));
    assert!(notifier.sent().await.is_empty());

    prober.set_reachable("10.0.0.1", false);
    let mut transitions = vec![];
    for _ in 0..3 {
        transitions.extend(scheduler.run_now().await.unwrap().transitions);
    }
    assert_eq!(
        transitions,
        vec![
            ("10.0.0.1".to_string(), Transition::Degraded),
            ("10.0.0.1".to_string(), Transition::Down),
        ]
    );

    prober.set_reachable("10.0.0.1", true);
    scheduler.run_now().await.unwrap();
    let summary = scheduler.run_now().await.unwrap();
    assert!(matches!(
        summary.transitions.as_slice(),
        [(host, Transition::Recovered { outage: Some(_) })] if host == "10.0.0.1"
    ));

    let admin = notifier.sent_to("100").await;
    assert_eq!(admin.len(), 3);
    assert_eq!(admin[0], "⚠️ router (10.0.0.1) is unstable");
    assert_eq!(admin[1], "❌ router (10.0.0.1) is unreachable");
    assert!(admin[2].starts_with("✅ router (10.0.0.1) recovered. Outage duration: 0:00:"));

    // the user only sees the nas, which never changed
    assert!(notifier.sent_to("200").await.is_empty());

    scheduler.shutdown().await.unwrap();
    scheduler.join().await.unwrap();
}

#[tokio::test]
async fn test_failed_delivery_does_not_block_other_recipients() {
    let dir = tempdir().unwrap();
    let notifier = Arc::new(RecordingNotifier::failing_for(&["100"]));
    let prober = ScriptedProber::default();
    prober.set_reachable("10.0.0.1", false);

    let monitor = build_monitor(
        vec![target("10.0.0.1", "router")],
        vec![
            recipient("100", Role::Admin, ipwatch::AccessScope::All),
            recipient("200", Role::User, only(&["10.0.0.1"])),
        ],
        notifier.clone(),
        Arc::new(MemoryLog::new()),
        dir.path(),
    );

    let mut reports = vec![];
    for _ in 0..3 {
        let outcome = prober_outcome(&prober, &monitor).await;
        reports.extend(outcome);
    }

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].delivered, vec!["200".to_string()]);
    assert_eq!(reports[0].failed.len(), 1);
    assert_eq!(
        notifier.sent_to("200").await,
        vec!["❌ router (10.0.0.1) is unreachable".to_string()]
    );
}

async fn prober_outcome(
    prober: &ScriptedProber,
    monitor: &ipwatch::monitor::Monitor,
) -> Option<ipwatch::alerts::DispatchReport> {
    use ipwatch::monitors::probe::Prober;

    let target = monitor.targets()[0].clone();
    let outcome = prober.probe(&target).await;
    monitor.record_outcome(&target, outcome).await.dispatch
}

#[tokio::test]
async fn test_every_probe_is_logged_and_exported() {
    let dir = tempdir().unwrap();
    let log_path = dir.path().join("logs").join("ip_monitor.csv");
    let log = Arc::new(CsvLog::new(&log_path).await.unwrap());
    let prober = Arc::new(ScriptedProber::default());
    prober.set_reachable("10.0.0.2", false);

    let monitor = build_monitor(
        vec![target("10.0.0.1", "router"), target("10.0.0.2", "nas")],
        vec![],
        Arc::new(RecordingNotifier::default()),
        log,
        dir.path(),
    );

    let scheduler = SchedulerHandle::spawn(
        monitor,
        prober.clone(),
        Duration::from_secs(3600),
        1,
        CancellationToken::new(),
    );
    scheduler.run_now().await.unwrap();
    scheduler.shutdown().await.unwrap();
    scheduler.join().await.unwrap();

    // the initial round and the requested one
    assert_eq!(prober.calls(), 4);

    let rows = std::fs::read_to_string(&log_path).unwrap();
    let rows: Vec<&str> = rows.lines().collect();
    assert_eq!(rows.len(), 4);
    assert!(rows.iter().any(|row| row.ends_with(",10.0.0.1,router,ok,1.25")));
    assert_eq!(
        rows.iter()
            .filter(|row| row.ends_with(&format!(",10.0.0.2,nas,{},", RecordStatus::Fail)))
            .count(),
        2
    );

    let metrics = std::fs::read_to_string(dir.path().join("ip_monitor.prom")).unwrap();
    assert!(metrics.contains("ip_up{target=\"10.0.0.1\",name=\"router\"} 1"));
    assert!(metrics.contains("ip_up{target=\"10.0.0.2\",name=\"nas\"} 0"));
    assert!(metrics.contains("ip_fail_streak{target=\"10.0.0.2\",name=\"nas\"} 2"));
    assert_eq!(metrics.lines().filter(|l| l.starts_with("ip_up{")).count(), 2);
}
