mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use common::{fast_config, memory_store, ScriptedCheck};
use fwaudit::{RunOrchestrator, SinkMode};
use fwaudit_core_audit::{AuditStatus, ConsoleLogRecord, Severity};
use fwaudit_core_store::{AuditQuery, AuditStore, SqliteStore};
use tempfile::NamedTempFile;

/// Poll with an advancing cursor until the task is terminal, then once more
async fn poll_until_done(
    store: Arc<dyn AuditStore>,
    audit_id: String,
    page: usize,
) -> Vec<ConsoleLogRecord> {
    let mut seen = Vec::new();
    let mut cursor = None;
    let mut terminal_seen = false;

    loop {
        let batch = store.fetch_logs_since(&audit_id, cursor, page).await.unwrap();
        if let Some(c) = cursor {
            assert!(batch.iter().all(|r| r.timestamp > c));
        }
        if let Some(last) = batch.last() {
            cursor = Some(last.timestamp);
        }
        let full_page = batch.len() == page;
        seen.extend(batch);

        if full_page {
            continue;
        }
        if terminal_seen {
            return seen;
        }
        terminal_seen = store
            .get_task(&audit_id)
            .await
            .unwrap()
            .is_some_and(|t| t.status.is_terminal());
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

fn assert_gapless(seen: &[ConsoleLogRecord], expected: usize) {
    assert_eq!(seen.len(), expected);
    assert!(seen.windows(2).all(|w| w[0].timestamp < w[1].timestamp));

    let unique: HashSet<_> = seen.iter().map(|r| r.timestamp).collect();
    assert_eq!(unique.len(), expected, "duplicate lines across polls");
}

async fn run_with_poller(store: Arc<dyn AuditStore>, mode: SinkMode, audit_id: &str) {
    let mut config = fast_config();
    config.max_concurrent_checks = 3;
    config.sink.mode = mode;
    config.sink.batch_size = 7;
    config.sink.flush_interval_ms = 5;

    let mut orchestrator = RunOrchestrator::new(store.clone(), &config);
    for n in 0..6 {
        orchestrator = orchestrator.with_check(
            ScriptedCheck::new(&format!("test_{n}"), vec![(n % 2 == 0, Severity::Error); 20])
                .with_pause(Duration::from_micros(200)),
        );
    }

    let poller = tokio::spawn(poll_until_done(store.clone(), audit_id.to_string(), 16));
    let report = orchestrator.run(audit_id, None).await.unwrap();
    let seen = poller.await.unwrap();

    assert_eq!(report.status, AuditStatus::Failed);
    assert_eq!(report.summary.total, 120);
    assert_gapless(&seen, 120);
}

#[tokio::test]
async fn test_memory_direct_polling_sees_every_line_once() {
    run_with_poller(memory_store(), SinkMode::Direct, "mem-direct").await;
}

#[tokio::test]
async fn test_memory_buffered_polling_sees_every_line_once() {
    run_with_poller(memory_store(), SinkMode::Buffered, "mem-buffered").await;
}

#[tokio::test]
async fn test_sqlite_direct_polling_sees_every_line_once() {
    let file = NamedTempFile::new().unwrap();
    let store = Arc::new(SqliteStore::open(file.path().to_str().unwrap()).await.unwrap());
    run_with_poller(store, SinkMode::Direct, "sqlite-direct").await;
}

#[tokio::test]
async fn test_sqlite_buffered_polling_sees_every_line_once() {
    let file = NamedTempFile::new().unwrap();
    let store = Arc::new(SqliteStore::open(file.path().to_str().unwrap()).await.unwrap());
    run_with_poller(store, SinkMode::Buffered, "sqlite-buffered").await;
}

#[tokio::test]
async fn test_sqlite_run_survives_reopen() {
    let file = NamedTempFile::new().unwrap();
    let path = file.path().to_str().unwrap().to_string();

    {
        let store = Arc::new(SqliteStore::open(&path).await.unwrap());
        RunOrchestrator::new(store, &fast_config())
            .with_check(ScriptedCheck::new("test_persist", vec![(true, Severity::Error); 4]))
            .run("persisted", None)
            .await
            .unwrap();
    }

    let store = SqliteStore::open(&path).await.unwrap();
    let task = store.get_task("persisted").await.unwrap().unwrap();
    assert_eq!(task.status, AuditStatus::Completed);
    assert_eq!(task.summary.unwrap().passed, 4);

    let logs = store.fetch_logs_since("persisted", None, 100).await.unwrap();
    assert_eq!(logs.len(), 4);
    let rest = store
        .fetch_logs_since("persisted", Some(logs[1].timestamp), 100)
        .await
        .unwrap();
    assert_eq!(rest, logs[2..].to_vec());

    let report = store.get_report("persisted").await.unwrap().unwrap();
    assert_eq!(report.checks.len(), 4);
}
