//! Severity, console level and outcome classification
//!
//! Every assertion is reduced to a `(LogLevel, Outcome)` pair by [`classify`].
//! The table is closed: both enums are exhaustive, so adding a variant forces
//! every match below to be revisited.
//!
//! | condition | severity | level   | outcome |
//! |-----------|----------|---------|---------|
//! | true      | Error    | success | passed  |
//! | true      | Warning  | info    | warning |
//! | false     | Warning  | warn    | warning |
//! | false     | Error    | error   | failed  |

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How much a failed assertion matters
///
/// `Warning` marks an advisory rule. An advisory rule lands in the warning
/// bucket whatever its condition, so it can never flip a run to FAILED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Advisory: failure is reported but does not fail the run
    Warning,
    /// Blocking: failure fails the run
    #[default]
    Error,
}

impl Severity {
    /// Numeric level used by the legacy check scripts
    pub const WARNING_LEVEL: u8 = 30;
    /// Numeric level used by the legacy check scripts
    pub const ERROR_LEVEL: u8 = 40;

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "WARNING" | "WARN" => Ok(Severity::Warning),
            "ERROR" => Ok(Severity::Error),
            _ => Err(Error::invalid_severity(s)),
        }
    }
}

impl TryFrom<u8> for Severity {
    type Error = Error;

    fn try_from(level: u8) -> Result<Self> {
        match level {
            Self::WARNING_LEVEL => Ok(Severity::Warning),
            Self::ERROR_LEVEL => Ok(Severity::Error),
            other => Err(Error::invalid_severity(other.to_string())),
        }
    }
}

/// Level of a console log record as shown to pollers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Success,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Success => "success",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "success" => Ok(LogLevel::Success),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(Error::invalid_level(s)),
        }
    }
}

/// Statistics bucket an assertion is counted in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Passed,
    Warning,
    Failed,
}

/// Per-rule status stored in the check breakdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckStatus {
    Pass,
    Warning,
    Fail,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Pass => "PASS",
            CheckStatus::Warning => "WARNING",
            CheckStatus::Fail => "FAIL",
        }
    }
}

impl FromStr for CheckStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PASS" => Ok(CheckStatus::Pass),
            "WARNING" => Ok(CheckStatus::Warning),
            "FAIL" => Ok(CheckStatus::Fail),
            _ => Err(Error::InvalidCheckStatus(s.to_string())),
        }
    }
}

/// Result of classifying one assertion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub level: LogLevel,
    pub outcome: Outcome,
    pub check_status: CheckStatus,
}

impl Classification {
    /// Tag placed in front of the console message
    ///
    /// A true condition is always tagged `PASS`; a false one carries its severity.
    pub fn tag(&self) -> &'static str {
        match self.level {
            LogLevel::Success | LogLevel::Info => "PASS",
            LogLevel::Warn => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }
}

/// Classify an assertion outcome
pub fn classify(condition: bool, severity: Severity) -> Classification {
    match (condition, severity) {
        (true, Severity::Error) => Classification {
            level: LogLevel::Success,
            outcome: Outcome::Passed,
            check_status: CheckStatus::Pass,
        },
        (true, Severity::Warning) => Classification {
            level: LogLevel::Info,
            outcome: Outcome::Warning,
            check_status: CheckStatus::Pass,
        },
        (false, Severity::Warning) => Classification {
            level: LogLevel::Warn,
            outcome: Outcome::Warning,
            check_status: CheckStatus::Warning,
        },
        (false, Severity::Error) => Classification {
            level: LogLevel::Error,
            outcome: Outcome::Failed,
            check_status: CheckStatus::Fail,
        },
    }
}
