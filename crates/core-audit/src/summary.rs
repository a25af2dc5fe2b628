//! Task and report documents derived at finalization

use crate::error::{Error, Result};
use crate::firmware::FirmwareInfo;
use crate::record::CheckRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Immutable copy of a run's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub total: u64,
    pub passed: u64,
    pub warning: u64,
    pub failed: u64,
}

impl StatsSnapshot {
    /// Terminal status for a run that ended with these counts
    ///
    /// Warnings never fail a run.
    pub fn decide_status(&self) -> AuditStatus {
        if self.failed == 0 {
            AuditStatus::Completed
        } else {
            AuditStatus::Failed
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.total == self.passed + self.warning + self.failed
    }
}

/// Summary stored on the task and embedded in the report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditSummary {
    pub total: u64,
    pub passed: u64,
    pub warning: u64,
    pub failed: u64,
    pub duration_ms: u64,
}

impl AuditSummary {
    pub fn from_snapshot(snapshot: StatsSnapshot, duration_ms: u64) -> Self {
        Self {
            total: snapshot.total,
            passed: snapshot.passed,
            warning: snapshot.warning,
            failed: snapshot.failed,
            duration_ms,
        }
    }

    /// Build a summary from run start and end times, clamping negative spans to zero
    pub fn from_run(
        snapshot: StatsSnapshot,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        let duration_ms = (finished_at - started_at).num_milliseconds().max(0) as u64;
        Self::from_snapshot(snapshot, duration_ms)
    }

    pub fn counts(&self) -> StatsSnapshot {
        StatsSnapshot {
            total: self.total,
            passed: self.passed,
            warning: self.warning,
            failed: self.failed,
        }
    }
}

/// Lifecycle status of an audit task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditStatus {
    /// Task created, checks not started
    Pending,
    /// Checks running
    Analyzing,
    /// All checks done, no blocking failure
    Completed,
    /// All checks done, at least one blocking failure
    Failed,
    /// Infrastructure failure; the firmware verdict is unknown
    Error,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Pending => "PENDING",
            AuditStatus::Analyzing => "ANALYZING",
            AuditStatus::Completed => "COMPLETED",
            AuditStatus::Failed => "FAILED",
            AuditStatus::Error => "ERROR",
        }
    }

    /// Whether the task carries a `completedAt`
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AuditStatus::Completed | AuditStatus::Failed | AuditStatus::Error
        )
    }
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PENDING" => Ok(AuditStatus::Pending),
            "ANALYZING" => Ok(AuditStatus::Analyzing),
            "COMPLETED" => Ok(AuditStatus::Completed),
            "FAILED" => Ok(AuditStatus::Failed),
            "ERROR" => Ok(AuditStatus::Error),
            _ => Err(Error::invalid_status(s)),
        }
    }
}

/// Task document in the `audits` collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditTask {
    pub id: String,
    pub status: AuditStatus,
    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firmware: Option<FirmwareInfo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<AuditSummary>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl AuditTask {
    /// New `PENDING` task with a zeroed summary
    pub fn pending(id: impl Into<String>, firmware: Option<FirmwareInfo>) -> Self {
        Self {
            id: id.into(),
            status: AuditStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
            firmware,
            summary: Some(AuditSummary::default()),
            error_message: None,
        }
    }
}

/// Report document in the `audit_reports` collection, keyed by `auditId`
///
/// Fields beyond the summary belong to the report-generation collaborator and
/// are carried in `details` untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub audit_id: String,
    pub timestamp: DateTime<Utc>,
    pub status: AuditStatus,
    pub summary: AuditSummary,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firmware: Option<FirmwareInfo>,

    #[serde(default)]
    pub checks: Vec<CheckRecord>,

    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

impl AuditReport {
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

/// Builder for report documents
///
/// # Example
/// ```
/// use chrono::Utc;
/// use fwaudit_core_audit::{AuditSummary, ReportBuilder};
///
/// let summary = AuditSummary { total: 2, passed: 2, ..Default::default() };
/// let report = ReportBuilder::new("audit-1", summary, Utc::now())
///     .with_detail("overallScore", 100)
///     .build();
///
/// assert_eq!(report.status.as_str(), "COMPLETED");
/// ```
pub struct ReportBuilder {
    audit_id: String,
    timestamp: DateTime<Utc>,
    summary: AuditSummary,
    firmware: Option<FirmwareInfo>,
    checks: Vec<CheckRecord>,
    details: serde_json::Map<String, serde_json::Value>,
}

impl ReportBuilder {
    pub fn new(
        audit_id: impl Into<String>,
        summary: AuditSummary,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            audit_id: audit_id.into(),
            timestamp,
            summary,
            firmware: None,
            checks: Vec::new(),
            details: serde_json::Map::new(),
        }
    }

    pub fn with_firmware(mut self, firmware: Option<FirmwareInfo>) -> Self {
        self.firmware = firmware;
        self
    }

    pub fn with_checks(mut self, checks: Vec<CheckRecord>) -> Self {
        self.checks = checks;
        self
    }

    /// Attach a collaborator field; reserved keys are ignored
    pub fn with_detail(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        let key = key.into();
        if !matches!(
            key.as_str(),
            "auditId" | "timestamp" | "status" | "summary" | "firmware" | "checks"
        ) {
            self.details.insert(key, value.into());
        }
        self
    }

    pub fn build(self) -> AuditReport {
        AuditReport {
            audit_id: self.audit_id,
            timestamp: self.timestamp,
            status: self.summary.counts().decide_status(),
            summary: self.summary,
            firmware: self.firmware,
            checks: self.checks,
            details: self.details,
        }
    }
}
