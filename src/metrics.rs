//! Prometheus metrics for the telemetry side-channel
//!
//! Failures that must never reach a calling check (dropped lines, retries,
//! broken checks, finalize errors) are counted here. Each [`TelemetryMetrics`]
//! owns its registry, so two orchestrators in one process never share counters.

use prometheus::{
    Counter, CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};

use fwaudit_core_audit::{AuditStatus, LogLevel};

/// Operational counters for one orchestrator
#[derive(Clone)]
pub struct TelemetryMetrics {
    registry: Registry,

    /// Assertions recorded, by console level
    assertions_total: CounterVec,

    /// Store write attempts beyond the first
    append_retries_total: Counter,

    /// Console lines or check records given up on
    lines_dropped_total: Counter,

    /// Checks that returned an error or panicked
    check_errors_total: Counter,

    /// Runs whose summary or report could not be persisted
    finalize_failures_total: Counter,

    /// Run duration, by terminal status
    run_duration_seconds: HistogramVec,
}

impl TelemetryMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let assertions_total = CounterVec::new(
            Opts::new(
                "fwaudit_assertions_total",
                "Assertions recorded through the gateway",
            ),
            &["level"],
        )?;
        registry.register(Box::new(assertions_total.clone()))?;

        let append_retries_total = Counter::with_opts(Opts::new(
            "fwaudit_log_append_retries_total",
            "Store write attempts beyond the first",
        ))?;
        registry.register(Box::new(append_retries_total.clone()))?;

        let lines_dropped_total = Counter::with_opts(Opts::new(
            "fwaudit_log_lines_dropped_total",
            "Records dropped after exhausting retries",
        ))?;
        registry.register(Box::new(lines_dropped_total.clone()))?;

        let check_errors_total = Counter::with_opts(Opts::new(
            "fwaudit_check_errors_total",
            "Checks that returned an error or panicked",
        ))?;
        registry.register(Box::new(check_errors_total.clone()))?;

        let finalize_failures_total = Counter::with_opts(Opts::new(
            "fwaudit_finalize_failures_total",
            "Runs whose summary or report could not be persisted",
        ))?;
        registry.register(Box::new(finalize_failures_total.clone()))?;

        let run_duration_seconds = HistogramVec::new(
            HistogramOpts::new("fwaudit_run_duration_seconds", "Audit run duration")
                .buckets(vec![0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 900.0]),
            &["status"],
        )?;
        registry.register(Box::new(run_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            assertions_total,
            append_retries_total,
            lines_dropped_total,
            check_errors_total,
            finalize_failures_total,
            run_duration_seconds,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn inc_assertion(&self, level: LogLevel) {
        self.assertions_total
            .with_label_values(&[level.as_str()])
            .inc();
    }

    pub fn inc_append_retries(&self, retries: u32) {
        if retries > 0 {
            self.append_retries_total.inc_by(f64::from(retries));
        }
    }

    pub fn inc_dropped(&self) {
        self.lines_dropped_total.inc();
    }

    pub fn inc_check_error(&self) {
        self.check_errors_total.inc();
    }

    pub fn inc_finalize_failure(&self) {
        self.finalize_failures_total.inc();
    }

    pub fn record_run_duration(&self, status: AuditStatus, duration_secs: f64) {
        self.run_duration_seconds
            .with_label_values(&[status.as_str()])
            .observe(duration_secs);
    }

    pub fn dropped_total(&self) -> u64 {
        self.lines_dropped_total.get() as u64
    }

    pub fn retries_total(&self) -> u64 {
        self.append_retries_total.get() as u64
    }

    pub fn check_errors(&self) -> u64 {
        self.check_errors_total.get() as u64
    }

    pub fn finalize_failures(&self) -> u64 {
        self.finalize_failures_total.get() as u64
    }

    pub fn assertions(&self, level: LogLevel) -> u64 {
        self.assertions_total
            .with_label_values(&[level.as_str()])
            .get() as u64
    }

    /// Get metrics in Prometheus text format
    pub fn metrics_text(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::warn!(error = %e, "Failed to encode metrics");
            return String::new();
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

impl std::fmt::Debug for TelemetryMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryMetrics")
            .field("dropped", &self.dropped_total())
            .field("retries", &self.retries_total())
            .field("check_errors", &self.check_errors())
            .finish()
    }
}
