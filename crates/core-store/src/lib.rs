//! Durable collections for audit telemetry
//!
//! # Overview
//!
//! Three narrow traits split the persistence surface by who uses it:
//!
//! - [`LogStore`]: append-only console lines and check records, written by the
//!   assertion path
//! - [`ReportStore`]: task status and report upserts, written by the run
//!   orchestrator
//! - [`AuditQuery`]: read side for pollers and operators; the write path never
//!   calls it
//!
//! Every backend implements all three; [`AuditStore`] names the combination.
//!
//! # Collections
//!
//! | collection      | key                     | semantics                       |
//! |-----------------|-------------------------|---------------------------------|
//! | `audit_logs`    | `(auditId, timestamp)`  | append-only, range by cursor    |
//! | `audit_checks`  | `auditId` + insert order | append-only                    |
//! | `audits`        | `id`                    | upsert, last write wins         |
//! | `audit_reports` | `auditId`               | upsert, last write wins         |
//!
//! # Example
//!
//! ```no_run
//! use fwaudit_core_audit::{AuditStatus, AuditTask};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = fwaudit_core_store::open("sqlite://audits.db").await?;
//!
//!     store.create_task(&AuditTask::pending("audit-1", None)).await?;
//!     store.upsert_task_status("audit-1", AuditStatus::Analyzing, None).await?;
//!
//!     let logs = store.fetch_logs_since("audit-1", None, 100).await?;
//!     println!("{} lines", logs.len());
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fwaudit_core_audit::{
    AuditReport, AuditStatus, AuditSummary, AuditTask, CheckRecord, ConsoleLogRecord,
};
use std::sync::Arc;

pub mod backends;

pub use backends::memory::MemoryStore;

#[cfg(feature = "sqlite")]
pub use backends::sqlite::SqliteStore;

/// URL selecting the in-memory backend
pub const MEMORY_URL: &str = "memory://";

/// Append-only sink for per-assertion records
///
/// Implementations must preserve append order per audit id as observed by
/// [`AuditQuery::fetch_logs_since`]. A line is identified by its audit id and
/// timestamp: appending the same line again is a no-op, so a write that timed
/// out after it landed can be retried.
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Append one console line
    async fn append_log(&self, record: &ConsoleLogRecord) -> anyhow::Result<()>;

    /// Append several console lines in order
    ///
    /// The default implementation appends one-by-one; backends should
    /// override this with a single transaction.
    async fn append_logs(&self, records: &[ConsoleLogRecord]) -> anyhow::Result<()> {
        for record in records {
            self.append_log(record).await?;
        }
        Ok(())
    }

    /// Append one check breakdown entry
    async fn append_check(&self, check: &CheckRecord) -> anyhow::Result<()>;
}

/// Keyed, idempotent task and report documents
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Insert a new task, replacing any existing task with the same id
    async fn create_task(&self, task: &AuditTask) -> anyhow::Result<()>;

    /// Set task status, and the summary when given
    ///
    /// Creates the task if missing. Terminal statuses stamp `completedAt`;
    /// non-terminal ones clear it.
    async fn upsert_task_status(
        &self,
        audit_id: &str,
        status: AuditStatus,
        summary: Option<&AuditSummary>,
    ) -> anyhow::Result<()>;

    /// Leave the task in the `ERROR` state with a reason
    async fn mark_task_errored(&self, audit_id: &str, reason: &str) -> anyhow::Result<()>;

    /// Replace the report document keyed by its audit id
    async fn upsert_report(&self, report: &AuditReport) -> anyhow::Result<()>;
}

/// Read side of the collections
#[async_trait]
pub trait AuditQuery: Send + Sync {
    /// Console lines with `timestamp > since`, oldest first, at most `limit`
    async fn fetch_logs_since(
        &self,
        audit_id: &str,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> anyhow::Result<Vec<ConsoleLogRecord>>;

    /// Check records in append order
    async fn list_checks(&self, audit_id: &str) -> anyhow::Result<Vec<CheckRecord>>;

    async fn get_task(&self, audit_id: &str) -> anyhow::Result<Option<AuditTask>>;

    async fn get_report(&self, audit_id: &str) -> anyhow::Result<Option<AuditReport>>;
}

/// A backend serving every collection
pub trait AuditStore: LogStore + ReportStore + AuditQuery {}

impl<T: LogStore + ReportStore + AuditQuery + ?Sized> AuditStore for T {}

/// Open a store from a URL
///
/// - `memory://`: process-local [`MemoryStore`]
/// - `sqlite://path`, `*.db`, `*.sqlite`: [`SqliteStore`]
/// - anything else defaults to SQLite
#[allow(clippy::needless_return)]
pub async fn open(url: &str) -> anyhow::Result<Arc<dyn AuditStore>> {
    if url == MEMORY_URL || url == "memory" {
        return Ok(Arc::new(MemoryStore::new()));
    }

    #[cfg(feature = "sqlite")]
    {
        let store = SqliteStore::open(url).await?;
        return Ok(Arc::new(store));
    }

    #[cfg(not(feature = "sqlite"))]
    Err(anyhow::anyhow!(
        "No backend available for {}. Use {} or enable the 'sqlite' feature.",
        url,
        MEMORY_URL
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_memory() {
        let store = open(MEMORY_URL).await.unwrap();
        assert!(store.get_task("missing").await.unwrap().is_none());
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_open_sqlite_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audits.db");
        let store = open(path.to_str().unwrap()).await.unwrap();

        store
            .create_task(&AuditTask::pending("audit-1", None))
            .await
            .unwrap();
        let task = store.get_task("audit-1").await.unwrap().unwrap();
        assert_eq!(task.status, AuditStatus::Pending);
    }
}
