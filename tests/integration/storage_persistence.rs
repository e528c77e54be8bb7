//! Integration tests for storage persistence
//!
//! These tests verify that:
//! - Probe records are persisted by every configured backend
//! - Appends from parallel probes do not interleave
//! - Time-window queries return the expected records

use std::sync::Arc;

use chrono::{Duration, Utc};
use ipwatch::config::StorageConfig;
use ipwatch::storage::{self, ProbeLog, ProbeRecord, RecordStatus};
use tempfile::tempdir;

fn record(host: &str, status: RecordStatus, offset_secs: i64) -> ProbeRecord {
    ProbeRecord {
        timestamp: Utc::now() + Duration::seconds(offset_secs),
        host: host.to_string(),
        name: format!("name of {host}"),
        status,
        latency_ms: (status != RecordStatus::Fail).then_some(2.5),
    }
}

#[tokio::test]
async fn test_csv_backend_from_config() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("probes.csv");

    let log = storage::open(&StorageConfig::Csv { path: path.clone() })
        .await
        .unwrap();
    assert_eq!(log.backend_name(), "csv");

    log.append(&record("10.0.0.1", RecordStatus::Ok, 0)).await.unwrap();
    log.append(&record("10.0.0.1", RecordStatus::Fail, 30)).await.unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let rows: Vec<&str> = content.lines().collect();
    assert_eq!(rows.len(), 2);
    assert!(rows[0].ends_with(",10.0.0.1,name of 10.0.0.1,ok,2.50"));
    assert!(rows[1].ends_with(",10.0.0.1,name of 10.0.0.1,fail,"));
}

#[tokio::test]
async fn test_csv_parallel_appends_stay_whole() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("probes.csv");
    let log = storage::open(&StorageConfig::Csv { path: path.clone() })
        .await
        .unwrap();

    let mut tasks = vec![];
    for i in 0..50 {
        let log = Arc::clone(&log);
        tasks.push(tokio::spawn(async move {
            log.append(&record(&format!("10.0.1.{i}"), RecordStatus::Ok, 0))
                .await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content.lines().count(), 50);
    assert!(content.lines().all(|row| row.split(',').count() == 5));
}

#[tokio::test]
async fn test_none_backend_keeps_records_in_memory() {
    let log = storage::open(&StorageConfig::None).await.unwrap();

    assert_eq!(log.backend_name(), "memory");
    log.append(&record("10.0.0.1", RecordStatus::Unknown, 0))
        .await
        .unwrap();
}

#[cfg(feature = "storage-sqlite")]
#[tokio::test]
async fn test_sqlite_time_window() {
    use ipwatch::storage::sqlite::SqliteLog;

    let dir = tempdir().unwrap();
    let log = SqliteLog::new(dir.path().join("probes.db")).await.unwrap();

    log.append(&record("10.0.0.1", RecordStatus::Ok, -3600)).await.unwrap();
    log.append(&record("10.0.0.1", RecordStatus::Warn, -60)).await.unwrap();
    log.append(&record("10.0.0.1", RecordStatus::Fail, -30)).await.unwrap();

    let records = log
        .records_between(Utc::now() - Duration::minutes(5), Utc::now())
        .await
        .unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].status, RecordStatus::Warn);
    assert_eq!(records[1].status, RecordStatus::Fail);
    assert_eq!(records[1].latency_ms, None);
}

#[cfg(feature = "storage-sqlite")]
#[tokio::test]
async fn test_sqlite_survives_reopen() {
    use ipwatch::storage::sqlite::SqliteLog;

    let dir = tempdir().unwrap();
    let db_path = dir.path().join("probes.db");

    {
        let log = SqliteLog::new(&db_path).await.unwrap();
        log.append(&record("10.0.0.2", RecordStatus::Down, -10)).await.unwrap();
    }

    let log = SqliteLog::new(&db_path).await.unwrap();
    let records = log
        .records_between(Utc::now() - Duration::minutes(1), Utc::now())
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].host, "10.0.0.2");
    assert_eq!(records[0].status, RecordStatus::Down);
}
