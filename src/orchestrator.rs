//! Run orchestration
//!
//! A run moves through four states:
//!
//! ```text
//! CREATED ──► RUNNING ──► FINALIZING ──► COMPLETED | FAILED
//!    │           │             │
//!    │           │             └── persist failure ──► ERROR
//!    │           └── run deadline ───────────────────► ERROR
//!    └── task PENDING, then ANALYZING
//! ```
//!
//! Checks are opaque to the orchestrator. A check that returns an error or
//! panics is recorded as one failed assertion under its own name and the run
//! moves on to the next check.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{stream, FutureExt, StreamExt};
use fwaudit_core_audit::{
    AuditReport, AuditStatus, AuditSummary, AuditTask, FirmwareInfo, ReportBuilder,
};
use fwaudit_core_store::AuditStore;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{AuditConfig, SinkConfig};
use crate::context::{AuditContext, FinishedRun};
use crate::error::{AuditError, Result};
use crate::gateway::Assertion;
use crate::metrics::TelemetryMetrics;
use crate::retry::{with_retry, RetryPolicy};

/// A compliance check run against a shared context
#[async_trait]
pub trait ComplianceCheck: Send + Sync {
    /// Test name used for synthetic failures
    fn name(&self) -> &str;

    /// Ordinal position in the checklist
    fn step(&self) -> Option<u32> {
        None
    }

    async fn run(&self, ctx: &AuditContext) -> anyhow::Result<()>;
}

/// Outcome of a finalized run
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub audit_id: String,
    pub status: AuditStatus,
    pub summary: AuditSummary,
    pub report: AuditReport,
    pub logs_written: u64,
    pub logs_dropped: u64,
}

/// Fresh random audit identifier
pub fn new_audit_id() -> String {
    Uuid::new_v4().to_string()
}

/// Drives checks through one audit run and persists the outcome
pub struct RunOrchestrator {
    store: Arc<dyn AuditStore>,
    checks: Vec<Arc<dyn ComplianceCheck>>,
    policy: RetryPolicy,
    sink: SinkConfig,
    max_concurrent: usize,
    run_timeout: Option<Duration>,
    metrics: Option<Arc<TelemetryMetrics>>,
}

impl RunOrchestrator {
    pub fn new(store: Arc<dyn AuditStore>, config: &AuditConfig) -> Self {
        Self {
            store,
            checks: Vec::new(),
            policy: config.retry.to_policy(),
            sink: config.sink.clone(),
            max_concurrent: config.max_concurrent_checks.max(1),
            run_timeout: config.run_timeout(),
            metrics: None,
        }
    }

    pub fn with_check(mut self, check: impl ComplianceCheck + 'static) -> Self {
        self.checks.push(Arc::new(check));
        self
    }

    pub fn with_checks(
        mut self,
        checks: impl IntoIterator<Item = Arc<dyn ComplianceCheck>>,
    ) -> Self {
        self.checks.extend(checks);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<TelemetryMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn check_count(&self) -> usize {
        self.checks.len()
    }

    /// Run every check and finalize, honoring the configured run deadline
    pub async fn run(&self, audit_id: &str, firmware: Option<FirmwareInfo>) -> Result<RunReport> {
        match self.run_timeout {
            Some(limit) => self.run_with_timeout(audit_id, firmware, limit).await,
            None => self.execute(audit_id, firmware).await,
        }
    }

    /// Run with an explicit deadline; on expiry the task is marked `ERROR`
    pub async fn run_with_timeout(
        &self,
        audit_id: &str,
        firmware: Option<FirmwareInfo>,
        limit: Duration,
    ) -> Result<RunReport> {
        match tokio::time::timeout(limit, self.execute(audit_id, firmware)).await {
            Ok(result) => result,
            Err(_) => {
                let timeout_ms = limit.as_millis() as u64;
                warn!(audit_id, timeout_ms, "Audit run timed out");

                self.mark_errored(audit_id, &format!("Run exceeded {timeout_ms} ms"))
                    .await;
                if let Some(metrics) = &self.metrics {
                    metrics.record_run_duration(AuditStatus::Error, limit.as_secs_f64());
                }

                Err(AuditError::RunTimeout {
                    audit_id: audit_id.to_string(),
                    timeout_ms,
                })
            }
        }
    }

    async fn execute(&self, audit_id: &str, firmware: Option<FirmwareInfo>) -> Result<RunReport> {
        let ctx = self.begin(audit_id, firmware).await?;
        self.run_checks(&ctx).await;
        let finished = ctx.finish().await;
        self.finalize(&finished).await
    }

    /// Create the task and move it to `ANALYZING`
    pub async fn begin(
        &self,
        audit_id: &str,
        firmware: Option<FirmwareInfo>,
    ) -> Result<AuditContext> {
        let task = AuditTask::pending(audit_id, firmware.clone());

        with_retry(
            &self.policy,
            || self.store.create_task(&task),
            |attempt, e| debug!(audit_id, attempt, error = %e, "Retrying task creation"),
        )
        .await
        .result?;

        with_retry(
            &self.policy,
            || {
                self.store
                    .upsert_task_status(audit_id, AuditStatus::Analyzing, None)
            },
            |attempt, e| debug!(audit_id, attempt, error = %e, "Retrying status update"),
        )
        .await
        .result?;

        info!(audit_id, checks = self.checks.len(), "Audit run started");

        let ctx = AuditContext::with_options(
            audit_id,
            self.store.clone(),
            self.policy.clone(),
            &self.sink,
            self.metrics.clone(),
        );
        Ok(match firmware {
            Some(fw) => ctx.with_firmware(fw),
            None => ctx,
        })
    }

    /// Run every registered check against the context
    pub async fn run_checks(&self, ctx: &AuditContext) {
        let runs: Vec<_> = self
            .checks
            .iter()
            .map(|check| self.run_one(ctx, check.as_ref()))
            .collect();

        stream::iter(runs)
            .buffer_unordered(self.max_concurrent)
            .collect::<Vec<_>>()
            .await;
    }

    async fn run_one(&self, ctx: &AuditContext, check: &dyn ComplianceCheck) {
        let name = check.name();
        debug!(audit_id = ctx.audit_id(), check = name, "Running check");

        let reason = match AssertUnwindSafe(check.run(ctx)).catch_unwind().await {
            Ok(Ok(())) => return,
            Ok(Err(e)) => format!("Check aborted: {e:#}"),
            Err(panic) => format!("Check panicked: {}", panic_message(panic.as_ref())),
        };

        warn!(audit_id = ctx.audit_id(), check = name, %reason, "Check did not complete");
        if let Some(metrics) = &self.metrics {
            metrics.inc_check_error();
        }

        let mut assertion = Assertion::new(false, reason, name);
        if let Some(step) = check.step() {
            assertion = assertion.step(step);
        }
        ctx.record(assertion).await;
    }

    /// Persist the report and terminal status for a finished run
    ///
    /// Re-finalizing the same run overwrites with identical documents. On
    /// failure the task is marked `ERROR` and the error is returned.
    pub async fn finalize(&self, run: &FinishedRun) -> Result<RunReport> {
        let summary = AuditSummary::from_run(run.snapshot, run.started_at, run.finished_at);
        let status = run.snapshot.decide_status();

        match self.persist_outcome(run, summary, status).await {
            Ok(report) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_run_duration(status, summary.duration_ms as f64 / 1000.0);
                }
                info!(
                    audit_id = %run.audit_id,
                    status = status.as_str(),
                    total = summary.total,
                    passed = summary.passed,
                    warning = summary.warning,
                    failed = summary.failed,
                    dropped = run.logs_dropped,
                    "Audit run finalized"
                );

                Ok(RunReport {
                    audit_id: run.audit_id.clone(),
                    status,
                    summary,
                    report,
                    logs_written: run.logs_written,
                    logs_dropped: run.logs_dropped,
                })
            }
            Err(e) => {
                let reason = e.to_string();
                error!(audit_id = %run.audit_id, %reason, "Finalization failed");

                self.mark_errored(&run.audit_id, &reason).await;
                if let Some(metrics) = &self.metrics {
                    metrics.inc_finalize_failure();
                    metrics.record_run_duration(
                        AuditStatus::Error,
                        summary.duration_ms as f64 / 1000.0,
                    );
                }

                Err(AuditError::Finalize {
                    audit_id: run.audit_id.clone(),
                    reason,
                })
            }
        }
    }

    async fn persist_outcome(
        &self,
        run: &FinishedRun,
        summary: AuditSummary,
        status: AuditStatus,
    ) -> Result<AuditReport> {
        let audit_id = run.audit_id.as_str();

        let checks = with_retry(
            &self.policy,
            || self.store.list_checks(audit_id),
            |attempt, e| debug!(audit_id, attempt, error = %e, "Retrying check listing"),
        )
        .await
        .result?;

        // The report timestamp is the run's end, so re-finalizing is byte-stable.
        let report = ReportBuilder::new(audit_id, summary, run.finished_at)
            .with_firmware(run.firmware.clone())
            .with_checks(checks)
            .with_detail("logsDropped", run.logs_dropped)
            .build();

        with_retry(
            &self.policy,
            || self.store.upsert_report(&report),
            |attempt, e| debug!(audit_id, attempt, error = %e, "Retrying report upsert"),
        )
        .await
        .result?;

        with_retry(
            &self.policy,
            || self.store.upsert_task_status(audit_id, status, Some(&summary)),
            |attempt, e| debug!(audit_id, attempt, error = %e, "Retrying status update"),
        )
        .await
        .result?;

        Ok(report)
    }

    async fn mark_errored(&self, audit_id: &str, reason: &str) {
        let outcome = with_retry(
            &self.policy,
            || self.store.mark_task_errored(audit_id, reason),
            |attempt, e| debug!(audit_id, attempt, error = %e, "Retrying error mark"),
        )
        .await;

        if let Err(e) = outcome.result {
            error!(audit_id, error = %e, "Could not mark audit as errored");
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
