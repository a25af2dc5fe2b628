//! Assertion gateway: the single entry point checks use to report a result
//!
//! ```no_run
//! use fwaudit::{log_assert, Assertion, AuditContext};
//! use fwaudit_core_audit::Severity;
//!
//! async fn check_signature(ctx: Option<&AuditContext>, signed: bool) -> bool {
//!     log_assert(
//!         ctx,
//!         Assertion::new(signed, "Image carries a vendor signature", "test_signature")
//!             .fail_level(Severity::Warning)
//!             .step(4),
//!     )
//!     .await
//! }
//! ```

use fwaudit_core_audit::Severity;

use crate::context::AuditContext;

/// One assertion as reported by a check
#[derive(Debug, Clone, PartialEq)]
pub struct Assertion {
    pub condition: bool,
    pub message: String,
    pub test_name: String,
    pub fail_level: Severity,
    pub step: Option<u32>,
    pub category: Option<String>,
    pub check_name: Option<String>,
    pub standard: Option<String>,
}

impl Assertion {
    /// Assertion failing at `ERROR` severity
    pub fn new(condition: bool, message: impl Into<String>, test_name: impl Into<String>) -> Self {
        Self {
            condition,
            message: message.into(),
            test_name: test_name.into(),
            fail_level: Severity::Error,
            step: None,
            category: None,
            check_name: None,
            standard: None,
        }
    }

    pub fn fail_level(mut self, severity: Severity) -> Self {
        self.fail_level = severity;
        self
    }

    /// Ordinal position in the checklist
    pub fn step(mut self, step: u32) -> Self {
        self.step = Some(step);
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Display name for the check breakdown (defaults to the test name)
    pub fn check_name(mut self, name: impl Into<String>) -> Self {
        self.check_name = Some(name.into());
        self
    }

    /// Standard or guideline the rule derives from
    pub fn standard(mut self, standard: impl Into<String>) -> Self {
        self.standard = Some(standard.into());
        self
    }
}

/// Record an assertion and return its condition unchanged
///
/// Without a context this is a pure pass-through: nothing is counted or
/// written. Storage failures are retried and then dropped; they never reach
/// the calling check.
pub async fn log_assert(context: Option<&AuditContext>, assertion: Assertion) -> bool {
    match context {
        Some(ctx) => ctx.record(assertion).await,
        None => assertion.condition,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fwaudit_core_store::MemoryStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_without_context_returns_condition() {
        assert!(log_assert(None, Assertion::new(true, "ok", "t")).await);
        assert!(!log_assert(None, Assertion::new(false, "bad", "t")).await);
    }

    #[tokio::test]
    async fn test_returns_condition_with_context() {
        let store = Arc::new(MemoryStore::new());
        let ctx = AuditContext::new("run", store);

        assert!(log_assert(Some(&ctx), Assertion::new(true, "ok", "t")).await);
        assert!(
            !log_assert(
                Some(&ctx),
                Assertion::new(false, "meh", "t").fail_level(Severity::Warning)
            )
            .await
        );
        assert_eq!(ctx.snapshot().total, 2);
    }

    #[test]
    fn test_builder_defaults() {
        let assertion = Assertion::new(true, "msg", "test_zip");
        assert_eq!(assertion.fail_level, Severity::Error);
        assert_eq!(assertion.step, None);
        assert_eq!(assertion.check_name, None);

        let assertion = assertion.check_name("Zip layout").step(2);
        assert_eq!(assertion.check_name.as_deref(), Some("Zip layout"));
        assert_eq!(assertion.step, Some(2));
    }
}
