/*!
 * Error types for fwaudit
 */

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuditError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_AUDIT_FAILED: i32 = 1;
pub const EXIT_FATAL: i32 = 2;
pub const EXIT_INFRA: i32 = 3;

#[derive(Debug, Error)]
pub enum AuditError {
    /// A store operation failed after its retry budget
    #[error("Store error: {0:#}")]
    Store(anyhow::Error),

    /// A store attempt exceeded the per-attempt deadline
    #[error("Store operation timed out after {0} ms")]
    Timeout(u64),

    /// Summary or report could not be persisted; the task is left in ERROR
    #[error("Finalization failed for audit {audit_id}: {reason}")]
    Finalize { audit_id: String, reason: String },

    /// The whole run exceeded its deadline
    #[error("Audit {audit_id} exceeded its run timeout of {timeout_ms} ms")]
    RunTimeout { audit_id: String, timeout_ms: u64 },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Audit model error
    #[error(transparent)]
    Core(#[from] fwaudit_core_audit::Error),

    /// Requested audit does not exist
    #[error("Audit not found: {0}")]
    NotFound(String),
}

impl AuditError {
    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            // Bad input: config, unknown audit, malformed values
            AuditError::Config(_) | AuditError::NotFound(_) | AuditError::Core(_) => EXIT_FATAL,
            // Infrastructure: storage, deadlines, finalization
            AuditError::Store(_)
            | AuditError::Timeout(_)
            | AuditError::Finalize { .. }
            | AuditError::RunTimeout { .. }
            | AuditError::Io(_) => EXIT_INFRA,
        }
    }

    /// Check if this error is transient (temporary, worth retrying)
    pub fn is_transient(&self) -> bool {
        match self {
            AuditError::Store(_) | AuditError::Timeout(_) => true,
            AuditError::Io(io_err) => Self::is_io_transient(io_err),
            _ => false,
        }
    }

    fn is_io_transient(io_err: &std::io::Error) -> bool {
        use std::io::ErrorKind::*;
        matches!(
            io_err.kind(),
            ConnectionRefused
                | ConnectionReset
                | ConnectionAborted
                | NotConnected
                | BrokenPipe
                | TimedOut
                | Interrupted
                | WouldBlock
        )
    }
}

impl From<anyhow::Error> for AuditError {
    fn from(err: anyhow::Error) -> Self {
        AuditError::Store(err)
    }
}

impl From<toml::de::Error> for AuditError {
    fn from(err: toml::de::Error) -> Self {
        AuditError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(AuditError::Store(anyhow::anyhow!("database is locked")).is_transient());
        assert!(AuditError::Timeout(50).is_transient());
        assert!(!AuditError::Config("bad".to_string()).is_transient());
        assert!(!AuditError::Finalize {
            audit_id: "a".to_string(),
            reason: "x".to_string()
        }
        .is_transient());

        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "slow disk");
        assert!(AuditError::Io(io).is_transient());
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert!(!AuditError::Io(io).is_transient());
    }

    #[test]
    fn test_display_includes_context() {
        let err = AuditError::Finalize {
            audit_id: "audit-7".to_string(),
            reason: "report upsert failed".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("audit-7"));
        assert!(text.contains("report upsert failed"));
    }

    #[test]
    fn test_core_error_is_transparent() {
        let err: AuditError = fwaudit_core_audit::Error::invalid_severity("FATAL").into();
        assert!(err.to_string().contains("FATAL"));
        assert_eq!(err.exit_code(), EXIT_FATAL);
        assert_eq!(AuditError::Timeout(10).exit_code(), EXIT_INFRA);
    }
}
