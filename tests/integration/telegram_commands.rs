//! End-to-end test of the command server against a mocked Bot API

use std::sync::Arc;
use std::time::Duration;

use ipwatch::actors::command_server::{CommandHandler, CommandServerHandle};
use ipwatch::channel::telegram::TelegramClient;
use ipwatch::storage::memory::MemoryLog;
use ipwatch::{AccessScope, Role};
use serde_json::json;
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

#[tokio::test]
async fn test_whoami_round_trip() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/botTOKEN/getUpdates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": [{
                "update_id": 42,
                "message": {"chat": {"id": 100}, "text": "/whoami"}
            }]
        })))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/botTOKEN/getUpdates"))
        .and(query_param("offset", "43"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": []})))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/botTOKEN/sendMessage"))
        .and(body_partial_json(json!({
            "chat_id": "100",
            "text": "role: admin\nresources: *\ntimezone: Europe/Berlin"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": {}})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = tempdir().unwrap();
    let telegram = Arc::new(TelegramClient::with_api_url(&mock_server.uri(), "TOKEN"));
    let monitor = build_monitor(
        vec![target("10.0.0.1", "router")],
        vec![recipient("100", Role::Admin, AccessScope::All)],
        telegram.clone(),
        Arc::new(MemoryLog::new()),
        dir.path(),
    );

    let cancel = CancellationToken::new();
    let server = CommandServerHandle::spawn(
        CommandHandler::new(monitor, Arc::new(CountingDelegate::default())),
        telegram,
        Duration::from_secs(1),
        &cancel,
    );

    // first poll, reply, idle delay, then at least one poll with the new offset
    tokio::time::sleep(Duration::from_millis(1500)).await;
    cancel.cancel();
    server.join().await.unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    let polls_with_offset = requests
        .iter()
        .filter(|r| r.url.path().ends_with("getUpdates"))
        .filter(|r| r.url.query().is_some_and(|q| q.contains("offset=43")))
        .count();
    assert!(polls_with_offset >= 1);
    // the sendMessage expectation is verified when the mock server drops
}
