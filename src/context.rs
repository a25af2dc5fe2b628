//! Per-run audit context
//!
//! One [`AuditContext`] exists per audit run and is passed explicitly to every
//! check. It owns the run's counters and its log sink; nothing about a run is
//! held in process-wide state. [`AuditContext::finish`] consumes the context,
//! so a finished run cannot record further assertions.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use fwaudit_core_audit::{
    classify, CheckRecord, ConsoleLogRecord, FirmwareInfo, StatsAccumulator, StatsSnapshot,
};
use fwaudit_core_store::AuditStore;
use tracing::trace;

use crate::config::SinkConfig;
use crate::gateway::Assertion;
use crate::metrics::TelemetryMetrics;
use crate::retry::RetryPolicy;
use crate::sink::{LogSink, SinkReport};

/// Shared state for one audit run
pub struct AuditContext {
    audit_id: String,
    store: Arc<dyn AuditStore>,
    stats: StatsAccumulator,
    started_at: DateTime<Utc>,
    sink: LogSink,
    metrics: Option<Arc<TelemetryMetrics>>,
    firmware: Option<FirmwareInfo>,
}

impl AuditContext {
    /// Context with default retry and direct delivery
    pub fn new(audit_id: impl Into<String>, store: Arc<dyn AuditStore>) -> Self {
        Self::with_options(
            audit_id,
            store,
            RetryPolicy::default(),
            &SinkConfig::default(),
            None,
        )
    }

    pub fn with_options(
        audit_id: impl Into<String>,
        store: Arc<dyn AuditStore>,
        policy: RetryPolicy,
        sink: &SinkConfig,
        metrics: Option<Arc<TelemetryMetrics>>,
    ) -> Self {
        let audit_id = audit_id.into();
        let sink = LogSink::from_config(&audit_id, store.clone(), policy, metrics.clone(), sink);

        Self {
            audit_id,
            store,
            stats: StatsAccumulator::new(),
            started_at: Utc::now(),
            sink,
            metrics,
            firmware: None,
        }
    }

    /// Attach parsed firmware metadata carried into the report
    pub fn with_firmware(mut self, firmware: FirmwareInfo) -> Self {
        self.firmware = Some(firmware);
        self
    }

    pub fn audit_id(&self) -> &str {
        &self.audit_id
    }

    pub fn store(&self) -> &Arc<dyn AuditStore> {
        &self.store
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn firmware(&self) -> Option<&FirmwareInfo> {
        self.firmware.as_ref()
    }

    /// Current counts
    pub fn snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Lines delivered and dropped so far
    pub fn delivery(&self) -> SinkReport {
        self.sink.report()
    }

    /// Count one assertion and write its records
    ///
    /// Counters are updated before any store write, so a dropped line still
    /// counts toward the summary.
    pub(crate) async fn record(&self, assertion: Assertion) -> bool {
        let condition = assertion.condition;
        let class = classify(condition, assertion.fail_level);

        self.stats.record_outcome(class.outcome);
        if let Some(metrics) = &self.metrics {
            metrics.inc_assertion(class.level);
        }

        trace!(
            audit_id = %self.audit_id,
            test_name = %assertion.test_name,
            level = class.level.as_str(),
            "Assertion recorded"
        );

        let line = ConsoleLogRecord::new(
            self.audit_id.as_str(),
            assertion.test_name.as_str(),
            class.tag(),
            &assertion.message,
            class.level,
            Utc::now(),
            assertion.step,
        );

        let check = CheckRecord {
            audit_id: self.audit_id.clone(),
            name: assertion
                .check_name
                .unwrap_or_else(|| assertion.test_name.clone()),
            id: assertion.test_name,
            category: assertion.category,
            status: class.check_status,
            description: assertion.message,
            standard: assertion.standard,
            step: assertion.step,
        };

        self.sink.write(line, Some(check)).await;
        condition
    }

    /// Close the run: drain the sink and freeze the counts
    pub async fn finish(self) -> FinishedRun {
        let delivery = self.sink.close().await;
        let finished_at = Utc::now();

        FinishedRun {
            audit_id: self.audit_id,
            snapshot: self.stats.snapshot(),
            started_at: self.started_at,
            finished_at,
            firmware: self.firmware,
            logs_written: delivery.written,
            logs_dropped: delivery.dropped,
        }
    }
}

impl std::fmt::Debug for AuditContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditContext")
            .field("audit_id", &self.audit_id)
            .field("started_at", &self.started_at)
            .field("stats", &self.stats.snapshot())
            .field("buffered", &self.sink.is_buffered())
            .finish()
    }
}

/// Frozen result of a run, input to finalization
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedRun {
    pub audit_id: String,
    pub snapshot: StatsSnapshot,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub firmware: Option<FirmwareInfo>,
    pub logs_written: u64,
    pub logs_dropped: u64,
}

impl FinishedRun {
    pub fn duration_ms(&self) -> u64 {
        (self.finished_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }
}
