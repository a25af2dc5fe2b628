//! LogSink: ordered, bounded-latency delivery of console lines
//!
//! # Cursor timestamps
//!
//! Pollers page through `audit_logs` with `timestamp > cursor`. For that to
//! see every line exactly once, each line of a run gets a timestamp that is
//! unique and strictly increasing in append order, and no line becomes visible
//! before every earlier-stamped line of the same run. The sink holds one lock
//! across stamping and handing the line to the store, which gives both.
//!
//! # Delivery modes
//!
//! ```text
//!                      ┌──────────── Direct ─────────────┐
//! check ──► log_assert ┤  stamp + append (with retry)    ├──► store
//!                      └──────────── Buffered ───────────┘
//!                         stamp + enqueue ──► mpsc ──► writer task
//!                                                     (batch of N lines
//!                                                      or every interval)
//! ```
//!
//! Direct mode is the default: the calling check waits for its own append.
//! Buffered mode is the write-behind variant; the writer task is the only
//! consumer, so batches commit in stamp order, and [`LogSink::close`] drains
//! the queue before finalization.
//!
//! Neither mode returns store errors to the caller. A record that still fails
//! after the retry budget is dropped and counted. Line appends are idempotent
//! in every store, so a timed-out append is retried; a timed-out check append
//! is not. A buffered batch that fails is retried line by line.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, SubsecRound, Utc};
use fwaudit_core_audit::{CheckRecord, ConsoleLogRecord};
use fwaudit_core_store::AuditStore;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{SinkConfig, SinkMode};
use crate::metrics::TelemetryMetrics;
use crate::retry::{with_retry, with_retry_once, RetryPolicy};

/// Hands out unique, strictly increasing microsecond timestamps
#[derive(Debug, Default)]
pub struct CursorClock {
    last: Option<DateTime<Utc>>,
}

impl CursorClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wall-clock time, bumped by one microsecond when it would not advance
    pub fn next(&mut self) -> DateTime<Utc> {
        self.next_from(Utc::now())
    }

    fn next_from(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        let now = now.trunc_subsecs(6);
        let ts = match self.last {
            Some(last) if now <= last => last + ChronoDuration::microseconds(1),
            _ => now,
        };
        self.last = Some(ts);
        ts
    }
}

/// Delivery counters for one run
#[derive(Debug, Default)]
struct SinkCounters {
    written: AtomicU64,
    dropped: AtomicU64,
}

/// Final delivery totals returned by [`LogSink::close`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkReport {
    pub written: u64,
    pub dropped: u64,
}

enum SinkEntry {
    Line(ConsoleLogRecord),
    Check(CheckRecord),
}

impl SinkEntry {
    fn test_name(&self) -> &str {
        match self {
            SinkEntry::Line(record) => &record.meta.test_name,
            SinkEntry::Check(check) => &check.id,
        }
    }
}

enum Delivery {
    Direct {
        clock: Mutex<CursorClock>,
    },
    Buffered {
        /// Clock plus the sender; `None` once closed
        queue: Mutex<(CursorClock, Option<mpsc::Sender<SinkEntry>>)>,
        writer: Mutex<Option<JoinHandle<()>>>,
    },
}

/// Shared writer state used by both delivery modes
#[derive(Clone)]
struct Writer {
    audit_id: Arc<str>,
    store: Arc<dyn AuditStore>,
    policy: RetryPolicy,
    metrics: Option<Arc<TelemetryMetrics>>,
    counters: Arc<SinkCounters>,
}

/// Per-run console line sink
pub struct LogSink {
    writer: Writer,
    delivery: Delivery,
}

impl LogSink {
    /// Sink that appends synchronously
    pub fn direct(
        audit_id: &str,
        store: Arc<dyn AuditStore>,
        policy: RetryPolicy,
        metrics: Option<Arc<TelemetryMetrics>>,
    ) -> Self {
        Self {
            writer: Writer::new(audit_id, store, policy, metrics),
            delivery: Delivery::Direct {
                clock: Mutex::new(CursorClock::new()),
            },
        }
    }

    /// Sink that queues lines for a background writer task
    ///
    /// Falls back to direct delivery outside a Tokio runtime.
    pub fn buffered(
        audit_id: &str,
        store: Arc<dyn AuditStore>,
        policy: RetryPolicy,
        metrics: Option<Arc<TelemetryMetrics>>,
        config: &SinkConfig,
    ) -> Self {
        let writer = Writer::new(audit_id, store, policy, metrics);

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(audit_id, "No Tokio runtime; buffered sink falls back to direct delivery");
            return Self {
                writer,
                delivery: Delivery::Direct {
                    clock: Mutex::new(CursorClock::new()),
                },
            };
        };

        let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
        let task = handle.spawn(run_writer_loop(
            writer.clone(),
            rx,
            config.batch_size.max(1),
            config.flush_interval(),
        ));

        Self {
            writer,
            delivery: Delivery::Buffered {
                queue: Mutex::new((CursorClock::new(), Some(tx))),
                writer: Mutex::new(Some(task)),
            },
        }
    }

    /// Build a sink in the mode the configuration names
    pub fn from_config(
        audit_id: &str,
        store: Arc<dyn AuditStore>,
        policy: RetryPolicy,
        metrics: Option<Arc<TelemetryMetrics>>,
        config: &SinkConfig,
    ) -> Self {
        match config.mode {
            SinkMode::Direct => Self::direct(audit_id, store, policy, metrics),
            SinkMode::Buffered => Self::buffered(audit_id, store, policy, metrics, config),
        }
    }

    pub fn is_buffered(&self) -> bool {
        matches!(self.delivery, Delivery::Buffered { .. })
    }

    /// Stamp and deliver one console line plus its check record
    ///
    /// The record's timestamp is replaced with the sink's cursor time.
    pub async fn write(&self, mut record: ConsoleLogRecord, check: Option<CheckRecord>) {
        match &self.delivery {
            Delivery::Direct { clock } => {
                let mut clock = clock.lock().await;
                record.timestamp = clock.next();
                self.writer.append_line(&record).await;
                drop(clock);

                if let Some(check) = check {
                    self.writer.append_check(&check).await;
                }
            }
            Delivery::Buffered { queue, .. } => {
                let mut guard = queue.lock().await;
                let (clock, sender) = &mut *guard;
                record.timestamp = clock.next();

                let Some(tx) = sender.as_ref() else {
                    self.writer.drop_record(&record.meta.test_name, "sink closed");
                    return;
                };

                if let Err(unsent) = tx.send(SinkEntry::Line(record)).await {
                    self.writer.drop_record(unsent.0.test_name(), "writer task stopped");
                    return;
                }
                if let Some(check) = check {
                    if let Err(unsent) = tx.send(SinkEntry::Check(check)).await {
                        self.writer.drop_record(unsent.0.test_name(), "writer task stopped");
                    }
                }
            }
        }
    }

    /// Flush queued lines and stop accepting new ones
    ///
    /// Safe to call more than once; later calls only report totals.
    pub async fn close(&self) -> SinkReport {
        if let Delivery::Buffered { queue, writer } = &self.delivery {
            // Dropping the last sender ends the writer loop after it drains.
            queue.lock().await.1.take();

            if let Some(task) = writer.lock().await.take() {
                if let Err(e) = task.await {
                    warn!(audit_id = %self.writer.audit_id, error = %e, "Sink writer task failed");
                }
            }
        }
        self.report()
    }

    /// Current delivery totals
    pub fn report(&self) -> SinkReport {
        SinkReport {
            written: self.writer.counters.written.load(Ordering::SeqCst),
            dropped: self.writer.counters.dropped.load(Ordering::SeqCst),
        }
    }
}

impl Writer {
    fn new(
        audit_id: &str,
        store: Arc<dyn AuditStore>,
        policy: RetryPolicy,
        metrics: Option<Arc<TelemetryMetrics>>,
    ) -> Self {
        Self {
            audit_id: Arc::from(audit_id),
            store,
            policy,
            metrics,
            counters: Arc::new(SinkCounters::default()),
        }
    }

    fn on_retry(&self, test_name: &str, attempt: u32, error: &crate::error::AuditError) {
        debug!(
            audit_id = %self.audit_id,
            test_name,
            attempt,
            error = %error,
            "Store write failed, retrying"
        );
    }

    fn record_retries(&self, retries: u32) {
        if let Some(metrics) = &self.metrics {
            metrics.inc_append_retries(retries);
        }
    }

    fn drop_record(&self, test_name: &str, reason: &str) {
        self.counters.dropped.fetch_add(1, Ordering::SeqCst);
        if let Some(metrics) = &self.metrics {
            metrics.inc_dropped();
        }
        warn!(
            audit_id = %self.audit_id,
            test_name,
            reason,
            "Dropped audit record"
        );
    }

    async fn append_line(&self, record: &ConsoleLogRecord) {
        let test_name = record.meta.test_name.as_str();
        let outcome = with_retry(
            &self.policy,
            || self.store.append_log(record),
            |attempt, e| self.on_retry(test_name, attempt, e),
        )
        .await;

        self.record_retries(outcome.retries());
        match outcome.result {
            Ok(()) => {
                self.counters.written.fetch_add(1, Ordering::SeqCst);
            }
            Err(e) => self.drop_record(test_name, &e.to_string()),
        }
    }

    /// Append a batch in one call, then line by line if the batch fails
    async fn append_lines(&self, records: &[ConsoleLogRecord]) {
        let Some(first) = records.first() else {
            return;
        };

        let outcome = with_retry(
            &self.policy,
            || self.store.append_logs(records),
            |attempt, e| self.on_retry(&first.meta.test_name, attempt, e),
        )
        .await;

        self.record_retries(outcome.retries());
        match outcome.result {
            Ok(()) => {
                self.counters
                    .written
                    .fetch_add(records.len() as u64, Ordering::SeqCst);
            }
            Err(e) => {
                warn!(
                    audit_id = %self.audit_id,
                    test_name = %first.meta.test_name,
                    count = records.len(),
                    error = %e,
                    "Batch append failed, appending lines one by one"
                );
                for record in records {
                    self.append_line(record).await;
                }
            }
        }
    }

    async fn append_check(&self, check: &CheckRecord) {
        let outcome = with_retry_once(
            &self.policy,
            || self.store.append_check(check),
            |attempt, e| self.on_retry(&check.id, attempt, e),
        )
        .await;

        self.record_retries(outcome.retries());
        if let Err(e) = outcome.result {
            self.drop_record(&check.id, &e.to_string());
        }
    }

    async fn flush(&self, buffer: &mut Vec<SinkEntry>) {
        if buffer.is_empty() {
            return;
        }

        let count = buffer.len();
        debug!(audit_id = %self.audit_id, count, "Flushing buffered audit records");

        let mut lines = Vec::with_capacity(count);
        let mut checks = Vec::new();
        for entry in buffer.drain(..) {
            match entry {
                SinkEntry::Line(record) => lines.push(record),
                SinkEntry::Check(check) => checks.push(check),
            }
        }

        self.append_lines(&lines).await;
        for check in &checks {
            self.append_check(check).await;
        }
    }
}

/// Background writer: the only consumer of a buffered sink's queue
async fn run_writer_loop(
    writer: Writer,
    mut rx: mpsc::Receiver<SinkEntry>,
    batch_size: usize,
    flush_interval: std::time::Duration,
) {
    let mut buffer = Vec::with_capacity(batch_size);
    let flush_interval = flush_interval.max(std::time::Duration::from_millis(1));
    let mut flush_timer = tokio::time::interval(flush_interval);
    flush_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    debug!(
        audit_id = %writer.audit_id,
        batch_size,
        flush_interval_ms = flush_interval.as_millis() as u64,
        "Sink writer started"
    );

    loop {
        tokio::select! {
            entry = rx.recv() => match entry {
                Some(entry) => {
                    buffer.push(entry);
                    if buffer.len() >= batch_size {
                        writer.flush(&mut buffer).await;
                    }
                }
                None => {
                    writer.flush(&mut buffer).await;
                    break;
                }
            },

            _ = flush_timer.tick() => {
                writer.flush(&mut buffer).await;
            }
        }
    }

    info!(
        audit_id = %writer.audit_id,
        written = writer.counters.written.load(Ordering::SeqCst),
        dropped = writer.counters.dropped.load(Ordering::SeqCst),
        "Sink writer drained"
    );
}
