//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fwaudit::{
    log_assert, Assertion, AuditConfig, AuditContext, BackoffStrategy, ComplianceCheck,
};
use fwaudit_core_audit::{
    AuditReport, AuditStatus, AuditSummary, AuditTask, CheckRecord, ConsoleLogRecord, Severity,
};
use fwaudit_core_store::{AuditQuery, LogStore, MemoryStore, ReportStore};

/// Config with millisecond retries so failure paths finish quickly
pub fn fast_config() -> AuditConfig {
    let mut config = AuditConfig::default();
    config.retry.max_attempts = 3;
    config.retry.initial_delay_ms = 1;
    config.retry.max_delay_ms = 2;
    config.retry.backoff = BackoffStrategy::Fixed;
    config.retry.jitter_factor = 0.0;
    config.retry.attempt_timeout_ms = 500;
    config
}

/// MemoryStore wrapper that fails on demand
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    /// Remaining log appends to fail
    failing_appends: AtomicU32,
    /// Fail every report upsert while set
    fail_reports: AtomicBool,
    /// Fail every batch append while set
    fail_batches: AtomicBool,
    /// Remaining appends that land but answer after `ack_delay`
    slow_acks: AtomicU32,
    ack_delay: Duration,
    pub append_calls: AtomicU32,
}

impl FlakyStore {
    pub fn failing_first(n: u32) -> Self {
        let store = Self::default();
        store.failing_appends.store(n, Ordering::SeqCst);
        store
    }

    /// The first `n` appends are stored, then acknowledged after `delay`
    pub fn slow_first_acks(n: u32, delay: Duration) -> Self {
        Self {
            slow_acks: AtomicU32::new(n),
            ack_delay: delay,
            ..Self::default()
        }
    }

    pub fn set_fail_reports(&self, fail: bool) {
        self.fail_reports.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_batches(&self, fail: bool) {
        self.fail_batches.store(fail, Ordering::SeqCst);
    }

    async fn acknowledge(&self) {
        let slow = self
            .slow_acks
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if slow {
            tokio::time::sleep(self.ack_delay).await;
        }
    }

    fn take_failure(&self) -> bool {
        self.append_calls.fetch_add(1, Ordering::SeqCst);
        self.failing_appends
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl LogStore for FlakyStore {
    async fn append_log(&self, record: &ConsoleLogRecord) -> anyhow::Result<()> {
        if self.take_failure() {
            anyhow::bail!("database is locked");
        }
        self.inner.append_log(record).await?;
        self.acknowledge().await;
        Ok(())
    }

    async fn append_logs(&self, records: &[ConsoleLogRecord]) -> anyhow::Result<()> {
        if self.take_failure() || self.fail_batches.load(Ordering::SeqCst) {
            anyhow::bail!("database is locked");
        }
        self.inner.append_logs(records).await?;
        self.acknowledge().await;
        Ok(())
    }

    async fn append_check(&self, check: &CheckRecord) -> anyhow::Result<()> {
        self.inner.append_check(check).await
    }
}

#[async_trait]
impl ReportStore for FlakyStore {
    async fn create_task(&self, task: &AuditTask) -> anyhow::Result<()> {
        self.inner.create_task(task).await
    }

    async fn upsert_task_status(
        &self,
        audit_id: &str,
        status: AuditStatus,
        summary: Option<&AuditSummary>,
    ) -> anyhow::Result<()> {
        self.inner.upsert_task_status(audit_id, status, summary).await
    }

    async fn mark_task_errored(&self, audit_id: &str, reason: &str) -> anyhow::Result<()> {
        self.inner.mark_task_errored(audit_id, reason).await
    }

    async fn upsert_report(&self, report: &AuditReport) -> anyhow::Result<()> {
        if self.fail_reports.load(Ordering::SeqCst) {
            anyhow::bail!("disk I/O error");
        }
        self.inner.upsert_report(report).await
    }
}

#[async_trait]
impl AuditQuery for FlakyStore {
    async fn fetch_logs_since(
        &self,
        audit_id: &str,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> anyhow::Result<Vec<ConsoleLogRecord>> {
        self.inner.fetch_logs_since(audit_id, since, limit).await
    }

    async fn list_checks(&self, audit_id: &str) -> anyhow::Result<Vec<CheckRecord>> {
        self.inner.list_checks(audit_id).await
    }

    async fn get_task(&self, audit_id: &str) -> anyhow::Result<Option<AuditTask>> {
        self.inner.get_task(audit_id).await
    }

    async fn get_report(&self, audit_id: &str) -> anyhow::Result<Option<AuditReport>> {
        self.inner.get_report(audit_id).await
    }
}

/// Check that makes a fixed list of `(condition, severity)` assertions
pub struct ScriptedCheck {
    pub name: String,
    pub script: Vec<(bool, Severity)>,
    pub pause: Option<Duration>,
}

impl ScriptedCheck {
    pub fn new(name: &str, script: Vec<(bool, Severity)>) -> Self {
        Self {
            name: name.to_string(),
            script,
            pause: None,
        }
    }

    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = Some(pause);
        self
    }
}

#[async_trait]
impl ComplianceCheck for ScriptedCheck {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &AuditContext) -> anyhow::Result<()> {
        for (n, (condition, severity)) in self.script.iter().enumerate() {
            if let Some(pause) = self.pause {
                tokio::time::sleep(pause).await;
            }
            log_assert(
                Some(ctx),
                Assertion::new(*condition, format!("assertion {n}"), self.name.as_str())
                    .fail_level(*severity),
            )
            .await;
        }
        Ok(())
    }
}

/// Check that panics after one passing assertion
pub struct PanickingCheck;

#[async_trait]
impl ComplianceCheck for PanickingCheck {
    fn name(&self) -> &str {
        "test_panicking"
    }

    fn step(&self) -> Option<u32> {
        Some(2)
    }

    async fn run(&self, ctx: &AuditContext) -> anyhow::Result<()> {
        log_assert(Some(ctx), Assertion::new(true, "opened image", self.name())).await;
        panic!("unexpected section header");
    }
}

/// Check that returns an error without asserting anything
pub struct FailingCheck;

#[async_trait]
impl ComplianceCheck for FailingCheck {
    fn name(&self) -> &str {
        "test_failing"
    }

    async fn run(&self, _ctx: &AuditContext) -> anyhow::Result<()> {
        anyhow::bail!("could not read manifest")
    }
}

pub fn memory_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new())
}
