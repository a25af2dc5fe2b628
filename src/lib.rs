/*!
 * fwaudit - audit execution telemetry core
 *
 * Turns the assertions made by firmware compliance checks into:
 * - a live, cursor-pollable stream of console lines
 * - per-rule check records
 * - an aggregate summary and final status on the audit task
 * - a report document keyed by audit id
 *
 * Checks receive an [`AuditContext`] and report through [`log_assert`]; the
 * [`RunOrchestrator`] owns the run lifecycle. Storage is pluggable through
 * `fwaudit_core_store::AuditStore`.
 *
 * ```no_run
 * use std::sync::Arc;
 * use async_trait::async_trait;
 * use fwaudit::{
 *     log_assert, Assertion, AuditConfig, AuditContext, ComplianceCheck, RunOrchestrator,
 * };
 *
 * struct ZipLayout;
 *
 * #[async_trait]
 * impl ComplianceCheck for ZipLayout {
 *     fn name(&self) -> &str {
 *         "test_zip_layout"
 *     }
 *
 *     async fn run(&self, ctx: &AuditContext) -> anyhow::Result<()> {
 *         log_assert(Some(ctx), Assertion::new(true, "Archive opens", self.name())).await;
 *         Ok(())
 *     }
 * }
 *
 * # async fn demo() -> fwaudit::Result<()> {
 * let store = fwaudit_core_store::open("memory://").await?;
 * let report = RunOrchestrator::new(store, &AuditConfig::default())
 *     .with_check(ZipLayout)
 *     .run("audit-1", None)
 *     .await?;
 * assert_eq!(report.summary.passed, 1);
 * # Ok(())
 * # }
 * ```
 */

pub mod cli_style;
pub mod config;
pub mod context;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod retry;
pub mod sink;

// Re-export commonly used types
pub use config::{AuditConfig, RetryConfig, SinkConfig, SinkMode};
pub use context::{AuditContext, FinishedRun};
pub use error::{AuditError, Result};
pub use gateway::{log_assert, Assertion};
pub use metrics::TelemetryMetrics;
pub use orchestrator::{new_audit_id, ComplianceCheck, RunOrchestrator, RunReport};
pub use retry::{BackoffStrategy, RetryPolicy};
pub use sink::{LogSink, SinkReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
