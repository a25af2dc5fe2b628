mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{fast_config, memory_store, FailingCheck, FlakyStore, PanickingCheck, ScriptedCheck};
use fwaudit::{AuditError, RunOrchestrator, SinkMode, TelemetryMetrics};
use fwaudit_core_audit::{AuditStatus, CheckStatus, FirmwareInfo, LogLevel, Severity};
use fwaudit_core_store::{AuditQuery, AuditStore, SqliteStore};
use tempfile::NamedTempFile;

#[tokio::test]
async fn test_broken_checks_do_not_stop_the_run() {
    let store = memory_store();
    let metrics = Arc::new(TelemetryMetrics::new().unwrap());

    let report = RunOrchestrator::new(store.clone(), &fast_config())
        .with_metrics(metrics.clone())
        .with_check(ScriptedCheck::new("test_before", vec![(true, Severity::Error)]))
        .with_check(PanickingCheck)
        .with_check(FailingCheck)
        .with_check(ScriptedCheck::new("test_after", vec![(true, Severity::Error)]))
        .run("broken", None)
        .await
        .unwrap();

    // before + panicking's own pass + two synthetic failures + after
    assert_eq!(report.summary.total, 5);
    assert_eq!(report.summary.passed, 3);
    assert_eq!(report.summary.failed, 2);
    assert_eq!(report.status, AuditStatus::Failed);
    assert_eq!(metrics.check_errors(), 2);

    let logs = store.fetch_logs_since("broken", None, 100).await.unwrap();
    let names: Vec<_> = logs.iter().map(|r| r.meta.test_name.as_str()).collect();
    assert_eq!(
        names,
        vec!["test_before", "test_panicking", "test_panicking", "test_failing", "test_after"]
    );

    let panic_line = &logs[2];
    assert_eq!(panic_line.level, LogLevel::Error);
    assert!(panic_line.message.contains("unexpected section header"));
    assert_eq!(panic_line.meta.step, Some(2));
    assert!(logs[3].message.contains("could not read manifest"));
}

#[tokio::test]
async fn test_task_lifecycle_and_report_contents() {
    let store = memory_store();
    let firmware = FirmwareInfo::from_filename("Acme_X1000_BMC_2.14.1.zip").unwrap();

    let report = RunOrchestrator::new(store.clone(), &fast_config())
        .with_check(ScriptedCheck::new(
            "test_signing",
            vec![(true, Severity::Error), (false, Severity::Warning)],
        ))
        .run("lifecycle", Some(firmware.clone()))
        .await
        .unwrap();

    let task = store.get_task("lifecycle").await.unwrap().unwrap();
    assert_eq!(task.status, AuditStatus::Completed);
    assert!(task.completed_at.is_some());
    assert_eq!(task.firmware.as_ref(), Some(&firmware));
    assert_eq!(task.error_message, None);

    let stored = store.get_report("lifecycle").await.unwrap().unwrap();
    assert_eq!(stored, report.report);
    assert_eq!(stored.firmware, Some(firmware));
    assert_eq!(stored.summary.total, 2);
    assert_eq!(stored.checks.len(), 2);
    assert_eq!(stored.checks[0].status, CheckStatus::Pass);
    assert_eq!(stored.checks[1].status, CheckStatus::Warning);

    let json = stored.to_json().unwrap();
    assert_eq!(json["auditId"], "lifecycle");
    assert_eq!(json["summary"]["warning"], 1);
    assert!(json["summary"].get("durationMs").is_some());
}

#[tokio::test]
async fn test_finalize_failure_marks_task_errored() {
    let store = Arc::new(FlakyStore::default());
    store.set_fail_reports(true);
    let metrics = Arc::new(TelemetryMetrics::new().unwrap());

    let result = RunOrchestrator::new(store.clone(), &fast_config())
        .with_metrics(metrics.clone())
        .with_check(ScriptedCheck::new("test_ok", vec![(true, Severity::Error)]))
        .run("finalize-fails", None)
        .await;

    match result {
        Err(AuditError::Finalize { audit_id, reason }) => {
            assert_eq!(audit_id, "finalize-fails");
            assert!(reason.contains("disk I/O error"));
        }
        other => panic!("expected a finalize error, got {other:?}"),
    }

    let task = store.get_task("finalize-fails").await.unwrap().unwrap();
    assert_eq!(task.status, AuditStatus::Error);
    assert!(task.error_message.unwrap().contains("disk I/O error"));
    assert_eq!(metrics.finalize_failures(), 1);

    // Logs written during the run stay readable.
    assert_eq!(store.inner.log_count("finalize-fails").await, 1);
}

#[tokio::test]
async fn test_run_timeout_marks_task_errored() {
    let store = memory_store();
    let mut config = fast_config();
    config.run_timeout_ms = Some(50);

    let result = RunOrchestrator::new(store.clone(), &config)
        .with_check(
            ScriptedCheck::new("test_slow", vec![(true, Severity::Error); 10])
                .with_pause(Duration::from_millis(30)),
        )
        .run("too-slow", None)
        .await;

    assert!(matches!(
        result,
        Err(AuditError::RunTimeout { timeout_ms: 50, .. })
    ));

    let task = store.get_task("too-slow").await.unwrap().unwrap();
    assert_eq!(task.status, AuditStatus::Error);
    assert!(task.error_message.unwrap().contains("50 ms"));
    assert!(store.get_report("too-slow").await.unwrap().is_none());
}

#[tokio::test]
async fn test_concurrent_checks_share_one_context() {
    let store = memory_store();
    let mut config = fast_config();
    config.max_concurrent_checks = 4;

    let mut orchestrator = RunOrchestrator::new(store.clone(), &config);
    for n in 0..8 {
        let script = vec![
            (true, Severity::Error),
            (false, Severity::Warning),
            (false, Severity::Error),
        ];
        orchestrator = orchestrator.with_check(
            ScriptedCheck::new(&format!("test_{n}"), script.repeat(5))
                .with_pause(Duration::from_millis(1)),
        );
    }

    let report = orchestrator.run("parallel", None).await.unwrap();
    assert_eq!(report.summary.total, 120);
    assert_eq!(report.summary.passed, 40);
    assert_eq!(report.summary.warning, 40);
    assert_eq!(report.summary.failed, 40);
    assert_eq!(report.logs_written, 120);

    let logs = store.fetch_logs_since("parallel", None, 1000).await.unwrap();
    assert_eq!(logs.len(), 120);
    assert!(logs.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
}

#[tokio::test]
async fn test_concurrent_runs_are_isolated() {
    let store = memory_store();
    let config = fast_config();

    let failing = RunOrchestrator::new(store.clone(), &config)
        .with_check(ScriptedCheck::new("test_bad", vec![(false, Severity::Error); 7]));
    let passing = RunOrchestrator::new(store.clone(), &config)
        .with_check(ScriptedCheck::new("test_good", vec![(true, Severity::Error); 3]));

    let (a, b) = tokio::join!(failing.run("run-a", None), passing.run("run-b", None));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.summary.total, 7);
    assert_eq!(a.status, AuditStatus::Failed);
    assert_eq!(b.summary.total, 3);
    assert_eq!(b.status, AuditStatus::Completed);

    assert_eq!(store.log_count("run-a").await, 7);
    assert_eq!(store.log_count("run-b").await, 3);
}

async fn sqlite_store() -> (NamedTempFile, Arc<SqliteStore>) {
    let file = NamedTempFile::new().unwrap();
    let store = SqliteStore::open(file.path().to_str().unwrap()).await.unwrap();
    (file, Arc::new(store))
}

async fn finalize_twice_at_once(store: Arc<dyn AuditStore>) {
    let orchestrator = RunOrchestrator::new(store.clone(), &fast_config()).with_check(
        ScriptedCheck::new("test_twice", vec![(true, Severity::Error), (false, Severity::Error)]),
    );

    let ctx = orchestrator.begin("twice", None).await.unwrap();
    orchestrator.run_checks(&ctx).await;
    let finished = ctx.finish().await;

    let (a, b) = tokio::join!(orchestrator.finalize(&finished), orchestrator.finalize(&finished));
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a, b);
    assert_eq!(a.status, AuditStatus::Failed);

    let stored = store.get_report("twice").await.unwrap().unwrap();
    assert_eq!(stored, a.report);
    assert_eq!(stored.checks.len(), 2);

    let task = store.get_task("twice").await.unwrap().unwrap();
    assert_eq!(task.status, AuditStatus::Failed);
    assert_eq!(task.summary, Some(a.summary));
    assert!(task.error_message.is_none());
}

#[tokio::test]
async fn test_concurrent_finalize_memory() {
    let store = memory_store();
    finalize_twice_at_once(store.clone()).await;
    assert_eq!(store.report_count().await, 1);
}

#[tokio::test]
async fn test_concurrent_finalize_sqlite() {
    let (_file, store) = sqlite_store().await;
    finalize_twice_at_once(store).await;
}

#[tokio::test]
async fn test_timed_out_append_that_landed_is_not_duplicated() {
    let store = Arc::new(FlakyStore::slow_first_acks(1, Duration::from_millis(400)));
    let mut config = fast_config();
    config.retry.attempt_timeout_ms = 100;

    let report = RunOrchestrator::new(store.clone(), &config)
        .with_check(ScriptedCheck::new("test_slow_ack", vec![(true, Severity::Error); 3]))
        .run("slow-ack", None)
        .await
        .unwrap();

    assert_eq!(report.logs_written, 3);
    assert_eq!(report.logs_dropped, 0);
    assert_eq!(store.inner.log_count("slow-ack").await, 3);

    let logs = store.fetch_logs_since("slow-ack", None, 100).await.unwrap();
    assert!(logs.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
}

#[tokio::test]
async fn test_failed_batch_is_appended_line_by_line() {
    let store = Arc::new(FlakyStore::default());
    store.set_fail_batches(true);
    let mut config = fast_config();
    config.sink.mode = SinkMode::Buffered;
    config.sink.batch_size = 4;

    let report = RunOrchestrator::new(store.clone(), &config)
        .with_check(ScriptedCheck::new("test_batched", vec![(true, Severity::Error); 10]))
        .run("batch-fallback", None)
        .await
        .unwrap();

    assert_eq!(report.summary.total, 10);
    assert_eq!(report.logs_written, 10);
    assert_eq!(report.logs_dropped, 0);

    let logs = store.fetch_logs_since("batch-fallback", None, 100).await.unwrap();
    assert_eq!(logs.len(), 10);
    assert!(logs.iter().all(|r| r.meta.test_name == "test_batched"));
}

#[tokio::test]
async fn test_run_deadline_during_sqlite_writes_leaves_store_usable() {
    let (_file, store) = sqlite_store().await;
    let config = fast_config();

    // Deadlines short enough to land inside begin, the appends or finalize.
    for (n, micros) in (100..4_000).step_by(300).enumerate() {
        let audit_id = format!("deadline-{n}");
        let orchestrator = RunOrchestrator::new(store.clone(), &config)
            .with_check(ScriptedCheck::new("test_deadline", vec![(true, Severity::Error); 5]));

        let started = std::time::Instant::now();
        let result = orchestrator
            .run_with_timeout(&audit_id, None, Duration::from_micros(micros))
            .await;
        assert!(started.elapsed() < Duration::from_secs(1), "run {n} blocked on a lock");

        match result {
            Ok(report) => {
                let task = store.get_task(&audit_id).await.unwrap().unwrap();
                assert_eq!(task.status, report.status);
            }
            Err(AuditError::RunTimeout { .. }) => {}
            Err(other) => panic!("run {n}: unexpected error {other:?}"),
        }
    }

    let report = RunOrchestrator::new(store.clone(), &config)
        .with_check(ScriptedCheck::new("test_after", vec![(true, Severity::Error); 3]))
        .run("after-deadlines", None)
        .await
        .unwrap();
    assert_eq!(report.status, AuditStatus::Completed);
    assert_eq!(store.fetch_logs_since("after-deadlines", None, 10).await.unwrap().len(), 3);
}
