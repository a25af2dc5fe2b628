/*!
 * Configuration types for fwaudit
 */

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AuditError, Result};
use crate::retry::{BackoffStrategy, RetryPolicy};

/// Main configuration for audit runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Store location: `sqlite://path`, a bare path, or `memory://`
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Log level for diagnostic output
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log file path (None = stdout)
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Enable verbose logging (shorthand for log_level = debug)
    #[serde(default)]
    pub verbose: bool,

    /// Checks allowed to run at once (1 = sequential)
    #[serde(default = "default_max_concurrent_checks")]
    pub max_concurrent_checks: usize,

    /// Deadline for a whole run in milliseconds (None = no deadline)
    #[serde(default)]
    pub run_timeout_ms: Option<u64>,

    /// Retry behaviour for store writes
    #[serde(default)]
    pub retry: RetryConfig,

    /// How console lines reach the store
    #[serde(default)]
    pub sink: SinkConfig,
}

/// Retry settings for store writes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default)]
    pub backoff: BackoffStrategy,

    /// Jitter factor (0.0-1.0)
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,

    /// Deadline for a single attempt
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,
}

/// Console line delivery mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SinkMode {
    /// Each assertion waits for its own append
    #[default]
    Direct,

    /// Appends are queued and written in batches by a background task
    Buffered,
}

/// Sink settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkConfig {
    #[serde(default)]
    pub mode: SinkMode,

    /// Maximum number of lines to buffer before flushing
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Maximum time between flushes
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    /// Channel capacity for pending lines
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Error,

    /// Warnings and errors
    Warn,

    /// Info, warnings, and errors
    #[default]
    Info,

    /// Debug and above
    Debug,

    /// All messages including traces
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

fn default_database_url() -> String {
    "sqlite://fwaudit.db".to_string()
}

fn default_max_concurrent_checks() -> usize {
    1
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    50
}

fn default_max_delay_ms() -> u64 {
    2_000
}

fn default_jitter_factor() -> f64 {
    0.3
}

fn default_attempt_timeout_ms() -> u64 {
    5_000
}

fn default_batch_size() -> usize {
    100
}

fn default_flush_interval_ms() -> u64 {
    500
}

fn default_channel_capacity() -> usize {
    10_000
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            log_level: LogLevel::default(),
            log_file: None,
            verbose: false,
            retry: RetryConfig::default(),
            sink: SinkConfig::default(),
            max_concurrent_checks: default_max_concurrent_checks(),
            run_timeout_ms: None,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff: BackoffStrategy::default(),
            jitter_factor: default_jitter_factor(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
        }
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            mode: SinkMode::default(),
            batch_size: default_batch_size(),
            flush_interval_ms: default_flush_interval_ms(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            backoff: self.backoff,
            jitter_factor: self.jitter_factor,
            attempt_timeout: Duration::from_millis(self.attempt_timeout_ms),
        }
    }
}

impl SinkConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

impl AuditConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AuditError::Config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let config: AuditConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| AuditError::Config(format!("Cannot serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Reject settings that would make a run hang or never write
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(AuditError::Config(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.retry.jitter_factor) {
            return Err(AuditError::Config(format!(
                "retry.jitter_factor must be within [0, 1], got {}",
                self.retry.jitter_factor
            )));
        }
        if self.retry.attempt_timeout_ms == 0 {
            return Err(AuditError::Config(
                "retry.attempt_timeout_ms must be positive".to_string(),
            ));
        }
        if self.sink.batch_size == 0 || self.sink.channel_capacity == 0 {
            return Err(AuditError::Config(
                "sink.batch_size and sink.channel_capacity must be positive".to_string(),
            ));
        }
        if self.sink.flush_interval_ms == 0 {
            return Err(AuditError::Config(
                "sink.flush_interval_ms must be positive".to_string(),
            ));
        }
        if self.max_concurrent_checks == 0 {
            return Err(AuditError::Config(
                "max_concurrent_checks must be at least 1".to_string(),
            ));
        }
        if self.run_timeout_ms == Some(0) {
            return Err(AuditError::Config(
                "run_timeout_ms must be positive when set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = AuditConfig::default();
        assert_eq!(config.database_url, "sqlite://fwaudit.db");
        assert_eq!(config.sink.mode, SinkMode::Direct);
        assert_eq!(config.max_concurrent_checks, 1);
        assert_eq!(config.retry.max_attempts, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: AuditConfig = toml::from_str(
            r#"
            database_url = "memory://"
            max_concurrent_checks = 4

            [retry]
            max_attempts = 5
            backoff = "fixed"

            [sink]
            mode = "buffered"
            "#,
        )
        .unwrap();

        assert_eq!(config.database_url, "memory://");
        assert_eq!(config.max_concurrent_checks, 4);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.backoff, BackoffStrategy::Fixed);
        assert_eq!(config.retry.initial_delay_ms, 50);
        assert_eq!(config.sink.mode, SinkMode::Buffered);
        assert_eq!(config.sink.batch_size, 100);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AuditConfig::default();
        config.retry.max_attempts = 0;
        assert!(matches!(config.validate(), Err(AuditError::Config(_))));

        let mut config = AuditConfig::default();
        config.retry.jitter_factor = 1.5;
        assert!(config.validate().is_err());

        let mut config = AuditConfig::default();
        config.max_concurrent_checks = 0;
        assert!(config.validate().is_err());

        let mut config = AuditConfig::default();
        config.sink.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let file = NamedTempFile::new().unwrap();
        let mut config = AuditConfig::default();
        config.database_url = "memory://".to_string();
        config.run_timeout_ms = Some(60_000);

        config.save(file.path()).unwrap();
        let loaded = AuditConfig::load(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "max_concurrent_checks = 0\n").unwrap();
        assert!(AuditConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_retry_policy_conversion() {
        let policy = RetryConfig::default().to_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_delay, Duration::from_millis(50));
        assert_eq!(policy.attempt_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(LogLevel::Error.to_tracing_level(), tracing::Level::ERROR);
        assert_eq!(LogLevel::Debug.to_tracing_level(), tracing::Level::DEBUG);
        assert_eq!(LogLevel::Trace.to_tracing_level(), tracing::Level::TRACE);
    }
}
