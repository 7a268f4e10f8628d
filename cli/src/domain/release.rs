//! Release metadata: version markers, tag names and report lines.
//!
//! This module is intentionally free of I/O, async, and external layer imports.

use std::path::PathBuf;

use anyhow::Result;
use hoist_common::{PipelineReport, REPORT_PREFIX};

use crate::domain::error::ConfigError;

/// A packaged release, ready to be transferred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub app: String,
    pub version: String,
    pub id: String,
    pub archive_path: PathBuf,
    /// Lowercase hex SHA-1 of the archive.
    pub checksum: String,
}

impl Release {
    /// File name of the archive.
    #[must_use]
    pub fn archive_name(&self) -> String {
        self.archive_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Name and version read from the project's version marker file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionMarker {
    pub name: Option<String>,
    pub version: String,
}

/// Parse a version marker.
///
/// `.json` files contribute their top-level `version` (and `name`); any
/// other file is taken verbatim, trimmed.
///
/// # Errors
///
/// Returns [`ConfigError::MissingVersion`] if no non-empty version is found.
pub fn parse_version_marker(file_name: &str, contents: &str) -> Result<VersionMarker> {
    let missing = || ConfigError::MissingVersion(file_name.to_string());

    if file_name.ends_with(".json") {
        let value: serde_json::Value =
            serde_json::from_str(contents).map_err(|_| missing())?;
        let version = value
            .get("version")
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(missing)?;
        let name = value
            .get("name")
            .and_then(serde_json::Value::as_str)
            .map(str::to_owned);
        return Ok(VersionMarker {
            name,
            version: version.to_string(),
        });
    }

    let version = contents.trim();
    if version.is_empty() {
        return Err(missing().into());
    }
    Ok(VersionMarker {
        name: None,
        version: version.to_string(),
    })
}

/// Render the release tag name from its template.
#[must_use]
pub fn render_tag(template: &str, app: &str, version: &str, id: &str) -> String {
    template
        .replace("{app}", app)
        .replace("{version}", version)
        .replace("{id}", id)
}

/// One stdout line carrying `report`.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn format_report_line(report: &PipelineReport) -> Result<String> {
    Ok(format!("{REPORT_PREFIX}{}", serde_json::to_string(report)?))
}

/// Find the last well-formed report line in remote stdout.
#[must_use]
pub fn parse_report(stdout: &str) -> Option<PipelineReport> {
    stdout
        .lines()
        .rev()
        .filter_map(|line| line.trim_end().strip_prefix(REPORT_PREFIX))
        .find_map(|json| serde_json::from_str(json).ok())
}

/// Encode bytes as lowercase hex string.
#[must_use]
pub fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(char::from(HEX[(b >> 4) as usize]));
        out.push(char::from(HEX[(b & 0xf) as usize]));
    }
    out
}
