//! SQLite backend implementation
//!
//! Provides persistent storage using SQLite with WAL mode so pollers can read
//! while a run appends. Console lines carry an integer microsecond column next
//! to the RFC 3339 text, indexed with the audit id for cursor range scans.

use crate::backends::memory::{apply_status, bare_task};
use crate::{AuditQuery, LogStore, ReportStore};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use fwaudit_core_audit::{
    AuditReport, AuditStatus, AuditSummary, AuditTask, CheckRecord, ConsoleLogRecord, LogMeta,
};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::Row;
use std::str::FromStr;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS audit_logs (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        audit_id TEXT NOT NULL,
        ts_micros INTEGER NOT NULL,
        timestamp TEXT NOT NULL,
        level TEXT NOT NULL,
        message TEXT NOT NULL,
        test_name TEXT NOT NULL,
        step INTEGER
    )",
    // One line per cursor time: a re-sent append is ignored
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_audit_logs_line ON audit_logs (audit_id, ts_micros)",
    "CREATE TABLE IF NOT EXISTS audit_checks (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        audit_id TEXT NOT NULL,
        document TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_audit_checks_audit ON audit_checks (audit_id, seq)",
    "CREATE TABLE IF NOT EXISTS audits (
        id TEXT PRIMARY KEY,
        document TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS audit_reports (
        audit_id TEXT PRIMARY KEY,
        timestamp TEXT NOT NULL,
        document TEXT NOT NULL
    )",
];

/// SQLite-backed audit store
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open or create a SQLite database
    ///
    /// Accepts `sqlite://path`, `sqlite:path` or a bare path. The schema is
    /// created on first open.
    pub async fn open(path: &str) -> Result<Self> {
        let db_url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite://{}", path)
        };

        // Configure connection with WAL mode so readers never block the appender
        let options = SqliteConnectOptions::from_str(&db_url)
            .with_context(|| format!("Invalid SQLite URL: {}", db_url))?
            .journal_mode(SqliteJournalMode::Wal)
            .create_if_missing(true);

        // Every connection to an in-memory database sees its own copy
        let max_connections = if db_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .context("Failed to initialize schema")?;
        }

        tracing::debug!(url = %db_url, "Opened SQLite audit store");
        Ok(Self { pool })
    }

    async fn load_task(&self, audit_id: &str) -> Result<Option<AuditTask>> {
        let row = sqlx::query("SELECT document FROM audits WHERE id = ?")
            .bind(audit_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(r) => {
                let document: String = r.try_get("document")?;
                Ok(Some(serde_json::from_str(&document)?))
            }
            None => Ok(None),
        }
    }

    async fn save_task(&self, task: &AuditTask) -> Result<()> {
        sqlx::query(
            "INSERT INTO audits (id, document) VALUES (?, ?)
             ON CONFLICT (id) DO UPDATE SET document = excluded.document",
        )
        .bind(&task.id)
        .bind(serde_json::to_string(task)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Read-modify-write of one task inside a single immediate transaction
    ///
    /// The write lock is taken at `BEGIN`. Dropping the future before commit
    /// rolls the transaction back when the connection returns to the pool.
    async fn update_task<F>(&self, audit_id: &str, apply: F) -> Result<()>
    where
        F: FnOnce(&mut AuditTask) + Send,
    {
        let now = Utc::now();
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

        let row = sqlx::query("SELECT document FROM audits WHERE id = ?")
            .bind(audit_id)
            .fetch_optional(&mut *tx)
            .await?;
        let mut task = match row {
            Some(r) => serde_json::from_str(&r.try_get::<String, _>("document")?)?,
            None => bare_task(audit_id, now),
        };
        apply(&mut task);

        sqlx::query(
            "INSERT INTO audits (id, document) VALUES (?, ?)
             ON CONFLICT (id) DO UPDATE SET document = excluded.document",
        )
        .bind(audit_id)
        .bind(serde_json::to_string(&task)?)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}

fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_ts(text: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(text)
        .with_context(|| format!("Invalid stored timestamp: {}", text))?
        .with_timezone(&Utc))
}

// Helper to convert SqliteRow to ConsoleLogRecord
fn row_to_log(row: &SqliteRow) -> Result<ConsoleLogRecord> {
    let level: String = row.try_get("level")?;
    let timestamp: String = row.try_get("timestamp")?;
    let step: Option<i64> = row.try_get("step")?;

    Ok(ConsoleLogRecord {
        audit_id: row.try_get("audit_id")?,
        message: row.try_get("message")?,
        timestamp: parse_ts(&timestamp)?,
        level: level.parse()?,
        meta: LogMeta {
            test_name: row.try_get("test_name")?,
            step: step.map(u32::try_from).transpose()?,
        },
    })
}

async fn insert_log<'e, E>(executor: E, record: &ConsoleLogRecord) -> Result<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(
        "INSERT INTO audit_logs (audit_id, ts_micros, timestamp, level, message, test_name, step)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT (audit_id, ts_micros) DO NOTHING",
    )
    .bind(&record.audit_id)
    .bind(record.timestamp.timestamp_micros())
    .bind(format_ts(&record.timestamp))
    .bind(record.level.as_str())
    .bind(&record.message)
    .bind(&record.meta.test_name)
    .bind(record.meta.step.map(i64::from))
    .execute(executor)
    .await?;
    Ok(())
}

#[async_trait]
impl LogStore for SqliteStore {
    async fn append_log(&self, record: &ConsoleLogRecord) -> Result<()> {
        insert_log(&self.pool, record).await
    }

    async fn append_logs(&self, records: &[ConsoleLogRecord]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for record in records {
            insert_log(&mut *tx, record).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn append_check(&self, check: &CheckRecord) -> Result<()> {
        sqlx::query("INSERT INTO audit_checks (audit_id, document) VALUES (?, ?)")
            .bind(&check.audit_id)
            .bind(serde_json::to_string(check)?)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ReportStore for SqliteStore {
    async fn create_task(&self, task: &AuditTask) -> Result<()> {
        self.save_task(task).await
    }

    async fn upsert_task_status(
        &self,
        audit_id: &str,
        status: AuditStatus,
        summary: Option<&AuditSummary>,
    ) -> Result<()> {
        let summary = summary.copied();
        let now = Utc::now();
        self.update_task(audit_id, move |task| {
            apply_status(task, status, summary.as_ref(), now)
        })
        .await
    }

    async fn mark_task_errored(&self, audit_id: &str, reason: &str) -> Result<()> {
        let reason = reason.to_string();
        let now = Utc::now();
        self.update_task(audit_id, move |task| {
            apply_status(task, AuditStatus::Error, None, now);
            task.error_message = Some(reason);
        })
        .await
    }

    async fn upsert_report(&self, report: &AuditReport) -> Result<()> {
        sqlx::query(
            "INSERT INTO audit_reports (audit_id, timestamp, document) VALUES (?, ?, ?)
             ON CONFLICT (audit_id) DO UPDATE SET
                 timestamp = excluded.timestamp,
                 document = excluded.document",
        )
        .bind(&report.audit_id)
        .bind(format_ts(&report.timestamp))
        .bind(serde_json::to_string(report)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl AuditQuery for SqliteStore {
    async fn fetch_logs_since(
        &self,
        audit_id: &str,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<ConsoleLogRecord>> {
        let cursor = since.map_or(i64::MIN, |ts| ts.timestamp_micros());
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let rows = sqlx::query(
            "SELECT audit_id, timestamp, level, message, test_name, step FROM audit_logs
             WHERE audit_id = ? AND ts_micros > ?
             ORDER BY ts_micros ASC, seq ASC
             LIMIT ?",
        )
        .bind(audit_id)
        .bind(cursor)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_log).collect()
    }

    async fn list_checks(&self, audit_id: &str) -> Result<Vec<CheckRecord>> {
        let rows =
            sqlx::query("SELECT document FROM audit_checks WHERE audit_id = ? ORDER BY seq ASC")
                .bind(audit_id)
                .fetch_all(&self.pool)
                .await?;

        rows.iter()
            .map(|row| {
                let document: String = row.try_get("document")?;
                Ok(serde_json::from_str(&document)?)
            })
            .collect()
    }

    async fn get_task(&self, audit_id: &str) -> Result<Option<AuditTask>> {
        self.load_task(audit_id).await
    }

    async fn get_report(&self, audit_id: &str) -> Result<Option<AuditReport>> {
        let row = sqlx::query("SELECT document FROM audit_reports WHERE audit_id = ?")
            .bind(audit_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(r) => {
                let document: String = r.try_get("document")?;
                Ok(Some(serde_json::from_str(&document)?))
            }
            None => Ok(None),
        }
    }
}
