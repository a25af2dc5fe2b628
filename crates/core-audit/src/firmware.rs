//! Firmware package metadata
//!
//! Packages are named `<Manufacturer>_<Product>_<BMC|BIOS>_<Version>.zip`.
//! Anything after the version (a `_release_notes` suffix, the extension) is
//! ignored.

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

static FIRMWARE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?P<manufacturer>[^_]+)_(?P<product>[^_]+)_",
        r"(?P<fw_type>BMC|BIOS)_(?P<version>[A-Za-z0-9.\-]+)",
    ))
    .expect("firmware filename pattern is valid")
});

/// Firmware family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FirmwareType {
    Bmc,
    Bios,
}

impl fmt::Display for FirmwareType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FirmwareType::Bmc => f.write_str("BMC"),
            FirmwareType::Bios => f.write_str("BIOS"),
        }
    }
}

/// Product metadata carried into the task and report documents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirmwareInfo {
    pub manufacturer: String,
    pub product: String,
    pub fw_type: FirmwareType,
    pub version: String,
    pub zip_filename: String,
}

impl FirmwareInfo {
    /// Parse metadata out of a package filename or path
    pub fn from_filename(filename: &str) -> Result<Self> {
        let zip_filename = Path::new(filename)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(filename)
            .to_string();

        let caps = FIRMWARE_NAME
            .captures(&zip_filename)
            .ok_or_else(|| Error::InvalidFirmwareName(filename.to_string()))?;

        let fw_type = match &caps["fw_type"] {
            "BMC" => FirmwareType::Bmc,
            _ => FirmwareType::Bios,
        };

        // The version class admits '.', so a bare extension would be swallowed.
        let version = caps["version"]
            .strip_suffix(".zip")
            .unwrap_or(&caps["version"])
            .to_string();

        Ok(Self {
            manufacturer: caps["manufacturer"].to_string(),
            product: caps["product"].to_string(),
            fw_type,
            version,
            zip_filename,
        })
    }
}
