//! Records written once per assertion
//!
//! A [`ConsoleLogRecord`] feeds the polling log stream; a [`CheckRecord`] feeds
//! the per-rule breakdown embedded in the final report. Both are immutable once
//! appended.

use crate::severity::{CheckStatus, LogLevel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata attached to a console log line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogMeta {
    pub test_name: String,

    /// Ordinal position in the checklist (1..N)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<u32>,
}

/// One line of the live console stream
///
/// `timestamp` doubles as the polling cursor, so within one audit it is unique
/// and strictly increasing in append order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleLogRecord {
    pub audit_id: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub meta: LogMeta,
}

impl ConsoleLogRecord {
    /// Build a record with the message prefixed by the originating check
    ///
    /// The stored message reads `"[<test_name>] [<tag>] <message>"`.
    pub fn new(
        audit_id: impl Into<String>,
        test_name: impl Into<String>,
        tag: &str,
        message: &str,
        level: LogLevel,
        timestamp: DateTime<Utc>,
        step: Option<u32>,
    ) -> Self {
        let test_name = test_name.into();
        Self {
            audit_id: audit_id.into(),
            message: format!("[{test_name}] [{tag}] {message}"),
            timestamp,
            level,
            meta: LogMeta { test_name, step },
        }
    }
}

/// Per-rule entry in the check breakdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckRecord {
    pub audit_id: String,

    /// Originating check identifier
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Rule display name; defaults to the check identifier
    pub name: String,
    pub status: CheckStatus,
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<u32>,
}
