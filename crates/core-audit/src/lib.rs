//! Assertion outcome model for firmware audit telemetry
//!
//! This crate holds the pure, synchronous half of the telemetry core: how a
//! single compliance assertion is classified, how a run counts outcomes, and
//! the shape of every document the core persists.
//!
//! # Key Concepts
//!
//! - **Severity**: whether a failed assertion is advisory or blocking
//! - **Classification**: the console level and statistics bucket of one assertion
//! - **StatsAccumulator**: per-run counters, safe under concurrent updates
//! - **AuditReport**: final document keyed by audit id
//!
//! # Architecture
//!
//! ```text
//! (condition, Severity)
//!          │
//!          │ classify()
//!          ▼
//! ┌─────────────────────────────────────┐
//! │  Classification                     │
//! │  - level    (success|info|warn|error)│
//! │  - outcome  (passed|warning|failed) │
//! └──────┬──────────────────────┬───────┘
//!        │                      │
//!        ▼                      ▼
//! ConsoleLogRecord       StatsAccumulator
//!                               │ snapshot()
//!                               ▼
//!                  AuditSummary → AuditReport
//! ```
//!
//! # Example
//!
//! ```
//! use fwaudit_core_audit::{classify, LogLevel, Severity, StatsAccumulator};
//!
//! let stats = StatsAccumulator::new();
//! let c = classify(false, Severity::Warning);
//! stats.record_outcome(c.outcome);
//!
//! assert_eq!(c.level, LogLevel::Warn);
//! assert_eq!(stats.snapshot().warning, 1);
//! ```

pub mod error;
pub mod firmware;
pub mod record;
pub mod severity;
pub mod stats;
pub mod summary;

// Re-export main types
pub use error::{Error, Result};
pub use firmware::{FirmwareInfo, FirmwareType};
pub use record::{CheckRecord, ConsoleLogRecord, LogMeta};
pub use severity::{classify, CheckStatus, Classification, LogLevel, Outcome, Severity};
pub use stats::StatsAccumulator;
pub use summary::{AuditReport, AuditStatus, AuditSummary, AuditTask, ReportBuilder, StatsSnapshot};
