//! In-memory backend
//!
//! Used for tests and for runs that only need the live counters. Contents are
//! lost when the store is dropped.

use crate::{AuditQuery, LogStore, ReportStore};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fwaudit_core_audit::{
    AuditReport, AuditStatus, AuditSummary, AuditTask, CheckRecord, ConsoleLogRecord,
};
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Collections {
    /// Lines keyed by cursor time; the first write for a time wins
    logs: HashMap<String, BTreeMap<DateTime<Utc>, ConsoleLogRecord>>,
    checks: HashMap<String, Vec<CheckRecord>>,
    tasks: HashMap<String, AuditTask>,
    reports: HashMap<String, AuditReport>,
}

/// Map-backed store
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of console lines stored for an audit
    pub async fn log_count(&self, audit_id: &str) -> usize {
        self.inner
            .read()
            .await
            .logs
            .get(audit_id)
            .map_or(0, BTreeMap::len)
    }

    /// Number of report documents across all audits
    pub async fn report_count(&self) -> usize {
        self.inner.read().await.reports.len()
    }
}

/// Apply a status transition to a task document in place
pub(crate) fn apply_status(
    task: &mut AuditTask,
    status: AuditStatus,
    summary: Option<&AuditSummary>,
    now: DateTime<Utc>,
) {
    // Re-finalizing with the same terminal status keeps the first completion time.
    let keep_completed = task.status == status && task.completed_at.is_some();
    task.status = status;
    if let Some(summary) = summary {
        task.summary = Some(*summary);
    }
    if !status.is_terminal() {
        task.completed_at = None;
    } else if !keep_completed {
        task.completed_at = Some(now);
    }
    if status != AuditStatus::Error {
        task.error_message = None;
    }
}

pub(crate) fn bare_task(audit_id: &str, now: DateTime<Utc>) -> AuditTask {
    AuditTask {
        id: audit_id.to_string(),
        status: AuditStatus::Pending,
        created_at: now,
        completed_at: None,
        firmware: None,
        summary: None,
        error_message: None,
    }
}

fn insert_log(inner: &mut Collections, record: &ConsoleLogRecord) {
    inner
        .logs
        .entry(record.audit_id.clone())
        .or_default()
        .entry(record.timestamp)
        .or_insert_with(|| record.clone());
}

#[async_trait]
impl LogStore for MemoryStore {
    async fn append_log(&self, record: &ConsoleLogRecord) -> Result<()> {
        insert_log(&mut *self.inner.write().await, record);
        Ok(())
    }

    async fn append_logs(&self, records: &[ConsoleLogRecord]) -> Result<()> {
        let mut inner = self.inner.write().await;
        for record in records {
            insert_log(&mut inner, record);
        }
        Ok(())
    }

    async fn append_check(&self, check: &CheckRecord) -> Result<()> {
        self.inner
            .write()
            .await
            .checks
            .entry(check.audit_id.clone())
            .or_default()
            .push(check.clone());
        Ok(())
    }
}

#[async_trait]
impl ReportStore for MemoryStore {
    async fn create_task(&self, task: &AuditTask) -> Result<()> {
        self.inner
            .write()
            .await
            .tasks
            .insert(task.id.clone(), task.clone());
        Ok(())
    }

    async fn upsert_task_status(
        &self,
        audit_id: &str,
        status: AuditStatus,
        summary: Option<&AuditSummary>,
    ) -> Result<()> {
        let now = Utc::now();
        let mut inner = self.inner.write().await;
        let task = inner
            .tasks
            .entry(audit_id.to_string())
            .or_insert_with(|| bare_task(audit_id, now));
        apply_status(task, status, summary, now);
        Ok(())
    }

    async fn mark_task_errored(&self, audit_id: &str, reason: &str) -> Result<()> {
        let now = Utc::now();
        let mut inner = self.inner.write().await;
        let task = inner
            .tasks
            .entry(audit_id.to_string())
            .or_insert_with(|| bare_task(audit_id, now));
        apply_status(task, AuditStatus::Error, None, now);
        task.error_message = Some(reason.to_string());
        Ok(())
    }

    async fn upsert_report(&self, report: &AuditReport) -> Result<()> {
        self.inner
            .write()
            .await
            .reports
            .insert(report.audit_id.clone(), report.clone());
        Ok(())
    }
}

#[async_trait]
impl AuditQuery for MemoryStore {
    async fn fetch_logs_since(
        &self,
        audit_id: &str,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<ConsoleLogRecord>> {
        let inner = self.inner.read().await;
        let Some(logs) = inner.logs.get(audit_id) else {
            return Ok(Vec::new());
        };

        let lower = since.map_or(Bound::Unbounded, Bound::Excluded);
        Ok(logs
            .range((lower, Bound::Unbounded))
            .map(|(_, record)| record.clone())
            .take(limit)
            .collect())
    }

    async fn list_checks(&self, audit_id: &str) -> Result<Vec<CheckRecord>> {
        Ok(self
            .inner
            .read()
            .await
            .checks
            .get(audit_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_task(&self, audit_id: &str) -> Result<Option<AuditTask>> {
        Ok(self.inner.read().await.tasks.get(audit_id).cloned())
    }

    async fn get_report(&self, audit_id: &str) -> Result<Option<AuditReport>> {
        Ok(self.inner.read().await.reports.get(audit_id).cloned())
    }
}
