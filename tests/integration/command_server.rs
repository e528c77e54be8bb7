//! Integration tests for operator commands
//!
//! These tests verify that:
//! - Replies honour the sender's role and scope
//! - The privileged rebuild is only reachable by admins
//! - The update cursor never moves backwards and survives poll failures

use std::sync::Arc;
use std::time::Duration;

use ipwatch::actors::command_server::{
    CommandHandler, CommandServerHandle, REPLY_CRON_UPDATED, REPLY_NO_RESOURCES,
    REPLY_PERMISSION_DENIED, REPLY_UNCONFIGURED, REPLY_UNKNOWN,
};
use ipwatch::monitors::probe::ProbeOutcome;
use ipwatch::storage::memory::MemoryLog;
use ipwatch::{AccessScope, Role};
use pretty_assertions::assert_eq;
use tempfile::{TempDir, tempdir};
use tokio_util::sync::CancellationToken;

use crate::helpers::*;

struct Fixture {
    handler: CommandHandler,
    monitor: Arc<ipwatch::monitor::Monitor>,
    notifier: Arc<RecordingNotifier>,
    delegate: Arc<CountingDelegate>,
    _dir: TempDir,
}

fn fixture(delegate: CountingDelegate) -> Fixture {
    let dir = tempdir().unwrap();
    let notifier = Arc::new(RecordingNotifier::default());
    let delegate = Arc::new(delegate);

    let monitor = build_monitor(
        vec![target("10.0.0.1", "router"), target("10.0.0.2", "nas")],
        vec![
            recipient("100", Role::Admin, AccessScope::All),
            recipient("200", Role::User, only(&["nas"])),
            recipient("300", Role::User, only(&["printer", "copier"])),
        ],
        notifier.clone(),
        Arc::new(MemoryLog::new()),
        dir.path(),
    );

    Fixture {
        handler: CommandHandler::new(monitor.clone(), delegate.clone()),
        monitor,
        notifier,
        delegate,
        _dir: dir,
    }
}

#[tokio::test]
async fn test_whoami() {
    let fx = fixture(CountingDelegate::default());

    assert_eq!(
        fx.handler.respond("200", "/whoami").await.unwrap(),
        "role: user\nresources: nas\ntimezone: Europe/Berlin"
    );
    assert_eq!(
        fx.handler.respond("100", "/WhoAmI@ipwatch_bot").await.unwrap(),
        "role: admin\nresources: *\ntimezone: Europe/Berlin"
    );
    assert_eq!(
        fx.handler.respond("999", "/whoami").await.unwrap(),
        REPLY_UNCONFIGURED
    );
}

#[tokio::test]
async fn test_whoami_lists_resources_in_configured_order() {
    let fx = fixture(CountingDelegate::default());

    assert_eq!(
        fx.handler.respond("300", "/whoami").await.unwrap(),
        "role: user\nresources: printer, copier\ntimezone: Europe/Berlin"
    );
}

#[tokio::test]
async fn test_status_is_filtered_by_scope() {
    let fx = fixture(CountingDelegate::default());
    let router = fx.monitor.targets()[0].clone();
    for _ in 0..3 {
        fx.monitor
            .record_outcome(&router, ProbeOutcome::unreachable())
            .await;
    }

    assert_eq!(
        fx.handler.respond("100", "/status").await.unwrap(),
        "router (10.0.0.1): down (fail 3, ok 0)\nnas (10.0.0.2): unknown (fail 0, ok 0)"
    );
    assert_eq!(
        fx.handler.respond("200", "/status").await.unwrap(),
        "nas (10.0.0.2): unknown (fail 0, ok 0)"
    );
    assert_eq!(
        fx.handler.respond("300", "/status").await.unwrap(),
        REPLY_NO_RESOURCES
    );
    assert_eq!(
        fx.handler.respond("999", "/status").await.unwrap(),
        REPLY_NO_RESOURCES
    );
}

#[tokio::test]
async fn test_rebuild_requires_admin() {
    let fx = fixture(CountingDelegate::default());

    assert_eq!(
        fx.handler.respond("200", "/rebuildcron").await.unwrap(),
        REPLY_PERMISSION_DENIED
    );
    assert_eq!(
        fx.handler.respond("999", "/rebuildcron").await.unwrap(),
        REPLY_PERMISSION_DENIED
    );
    assert_eq!(fx.delegate.calls(), 0);

    assert_eq!(
        fx.handler.respond("100", "/rebuildcron").await.unwrap(),
        REPLY_CRON_UPDATED
    );
    assert_eq!(fx.delegate.calls(), 1);
}

#[tokio::test]
async fn test_rebuild_failure_is_reported() {
    let fx = fixture(CountingDelegate::failing());

    let reply = fx.handler.respond("100", "/rebuildcron").await.unwrap();

    assert!(reply.starts_with("Cron update failed: "));
    assert!(reply.contains("errors in crontab file"));
}

#[tokio::test]
async fn test_unknown_and_plain_text() {
    let fx = fixture(CountingDelegate::default());

    assert_eq!(
        fx.handler.respond("100", "/reboot").await.unwrap(),
        REPLY_UNKNOWN
    );
    assert_eq!(fx.handler.respond("100", "good morning").await, None);
}

#[tokio::test(start_paused = true)]
async fn test_server_loop_replies_and_advances_cursor() {
    let fx = fixture(CountingDelegate::default());
    let source = Arc::new(ScriptedSource::new(vec![
        Poll::Updates(vec![
            message(10, "200", "/whoami"),
            message(11, "200", "just chatting"),
        ]),
        Poll::Failure,
        // a stale update below the cursor is ignored
        Poll::Updates(vec![message(9, "100", "/rebuildcron"), message(12, "100", "/status")]),
    ]));
    let cancel = CancellationToken::new();

    let server = CommandServerHandle::spawn(
        fx.handler.clone(),
        source.clone(),
        Duration::from_secs(10),
        &cancel,
    );

    // first poll, idle delay, failing poll, backoff, third poll
    tokio::time::sleep(Duration::from_secs(8)).await;
    cancel.cancel();
    tokio_test::assert_ok!(server.join().await);

    let offsets = source.offsets().await;
    assert_eq!(&offsets[..4], &[None, Some(12), Some(12), Some(13)]);
    assert_eq!(fx.delegate.calls(), 0);

    let sent = fx.notifier.sent().await;
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].0, "200");
    assert!(sent[0].1.starts_with("role: user"));
    assert_eq!(sent[1].0, "100");
    assert!(sent[1].1.contains("router (10.0.0.1)"));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_interrupts_long_poll() {
    let fx = fixture(CountingDelegate::default());
    let source = Arc::new(ScriptedSource::default());
    let cancel = CancellationToken::new();

    let server = CommandServerHandle::spawn(
        fx.handler.clone(),
        source.clone(),
        Duration::from_secs(600),
        &cancel,
    );
    tokio::time::sleep(Duration::from_millis(10)).await;
    server.shutdown();

    tokio::time::timeout(Duration::from_secs(1), server.join())
        .await
        .expect("server did not stop")
        .unwrap();
    assert_eq!(source.offsets().await, vec![None]);
    assert!(!cancel.is_cancelled());
}
