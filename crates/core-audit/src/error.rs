//! Error types for the audit model

use thiserror::Error;

/// Result type for audit model operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or parsing audit model values
#[derive(Error, Debug)]
pub enum Error {
    /// A check passed a severity that is neither WARNING nor ERROR
    #[error("Invalid severity: {0} (expected WARNING or ERROR)")]
    InvalidSeverity(String),

    /// Unknown console log level
    #[error("Invalid log level: {0}")]
    InvalidLevel(String),

    /// Unknown task status
    #[error("Invalid audit status: {0}")]
    InvalidStatus(String),

    /// Unknown check status
    #[error("Invalid check status: {0}")]
    InvalidCheckStatus(String),

    /// Firmware package filename does not follow the naming convention
    #[error("Firmware filename does not match <Manufacturer>_<Product>_<BMC|BIOS>_<Version>: {0}")]
    InvalidFirmwareName(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create an invalid severity error
    pub fn invalid_severity<S: Into<String>>(value: S) -> Self {
        Error::InvalidSeverity(value.into())
    }

    /// Create an invalid level error
    pub fn invalid_level<S: Into<String>>(value: S) -> Self {
        Error::InvalidLevel(value.into())
    }

    /// Create an invalid status error
    pub fn invalid_status<S: Into<String>>(value: S) -> Self {
        Error::InvalidStatus(value.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_severity_error() {
        let err = Error::invalid_severity("CRITICAL");
        assert!(matches!(err, Error::InvalidSeverity(_)));
        assert!(err.to_string().contains("CRITICAL"));
        assert!(err.to_string().contains("WARNING or ERROR"));
    }

    #[test]
    fn test_invalid_level_error() {
        let err = Error::invalid_level("fatal");
        assert!(err.to_string().contains("fatal"));
    }

    #[test]
    fn test_invalid_firmware_name() {
        let err = Error::InvalidFirmwareName("firmware.zip".to_string());
        assert!(err.to_string().contains("firmware.zip"));
    }
}
